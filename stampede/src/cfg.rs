use core::{error::Error, num::NonZero, time::Duration};

use crate::cmd::Cmd;

/// Immutable run configuration.
///
/// Validated by the CLI layer; the engine copies it by value and never
/// re-checks the fields.
#[derive(Debug, Clone)]
pub struct Config {
    /// Target URL.
    pub url: String,
    /// HTTP method.
    pub method: String,
    /// Number of concurrent workers.
    pub concurrency: NonZero<usize>,
    /// Request target. `None` means unbounded by count.
    pub requests: Option<u64>,
    /// Duration limit. `None` means unbounded by time.
    pub duration: Option<Duration>,
    /// Connect/read timeout for the default transport.
    pub timeout: Option<Duration>,
}

impl TryFrom<Cmd> for Config {
    type Error = Box<dyn Error>;

    fn try_from(cmd: Cmd) -> Result<Self, Self::Error> {
        // A run with no limit at all could only be stopped by killing the
        // process.
        if cmd.requests == 0 && cmd.duration == 0 {
            return Err("either a request count (-n) or a duration (-d) must be given".into());
        }

        let m = Self {
            url: cmd.url,
            method: cmd.method,
            concurrency: cmd.concurrency,
            requests: (cmd.requests > 0).then_some(cmd.requests),
            duration: (cmd.duration > 0).then(|| Duration::from_secs(cmd.duration)),
            timeout: cmd.timeout.map(Duration::from_secs),
        };

        Ok(m)
    }
}

#[cfg(test)]
mod test {
    use clap::Parser;

    use super::*;

    #[test]
    fn test_requires_a_limit() {
        let cmd = Cmd::parse_from(["stampede", "http://localhost/"]);

        assert!(Config::try_from(cmd).is_err());
    }

    #[test]
    fn test_zero_maps_to_unbounded() {
        let cmd = Cmd::parse_from(["stampede", "http://localhost/", "-n", "100"]);
        let cfg = Config::try_from(cmd).unwrap();

        assert_eq!(cfg.requests, Some(100));
        assert_eq!(cfg.duration, None);
        assert_eq!(cfg.timeout, None);
        assert_eq!(cfg.method, "GET");
        assert_eq!(cfg.concurrency.get(), 10);
    }

    #[test]
    fn test_full_conversion() {
        let cmd = Cmd::parse_from([
            "stampede",
            "example.com:8080/api",
            "-c",
            "32",
            "-n",
            "1000",
            "-d",
            "30",
            "-m",
            "POST",
            "--timeout",
            "5",
        ]);
        let cfg = Config::try_from(cmd).unwrap();

        assert_eq!(cfg.url, "example.com:8080/api");
        assert_eq!(cfg.method, "POST");
        assert_eq!(cfg.concurrency.get(), 32);
        assert_eq!(cfg.requests, Some(1000));
        assert_eq!(cfg.duration, Some(Duration::from_secs(30)));
        assert_eq!(cfg.timeout, Some(Duration::from_secs(5)));
    }
}
