use core::num::NonZero;
use std::path::PathBuf;

use clap::{ArgAction, Parser};

/// HTTP load generator.
#[derive(Debug, Clone, Parser)]
#[command(version, about)]
pub struct Cmd {
    /// Target URL.
    ///
    /// The scheme is optional and ignored, requests always go out as plain
    /// HTTP/1.1. The port defaults to 80 and the path to "/".
    #[clap(required = true)]
    pub url: String,
    /// Number of concurrent workers.
    #[clap(short, long, default_value_t = NonZero::new(10).unwrap_or(NonZero::<usize>::MIN))]
    pub concurrency: NonZero<usize>,
    /// Total number of requests to perform.
    ///
    /// Zero means no request limit.
    #[clap(short = 'n', long, default_value_t = 0)]
    pub requests: u64,
    /// Run duration in seconds.
    ///
    /// Zero means no time limit. When both a request count and a duration are
    /// given, the run stops at whichever limit is hit first.
    #[clap(short, long, default_value_t = 0)]
    pub duration: u64,
    /// HTTP method of the generated requests.
    #[clap(short, long, default_value = "GET")]
    pub method: String,
    /// Connect/read timeout in seconds.
    ///
    /// Without it a request to an unresponsive server waits indefinitely.
    #[clap(long)]
    pub timeout: Option<u64>,
    /// Write the plain-text report to the given file.
    #[clap(short, long)]
    pub output: Option<PathBuf>,
    /// Write the report as JSON to the given file.
    #[clap(long)]
    pub json: Option<PathBuf>,
    /// Disable colored console output.
    #[clap(long)]
    pub no_color: bool,
    /// Be verbose in terms of logging.
    #[clap(short, action = ArgAction::Count)]
    pub verbose: u8,
}
