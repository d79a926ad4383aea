use core::time::Duration;

use bytes::Bytes;

pub use self::client::Client;

mod client;

/// Single request/response capability.
///
/// Implementations perform exactly one round trip per call and must never
/// fail hard: any transport-level error is reported through the returned
/// [`Outcome`].
pub trait Transport: Send + Sync {
    /// Executes the given request once, returning its outcome.
    fn execute(&self, request: &Request) -> Outcome;
}

/// A single HTTP request to perform.
#[derive(Debug, Clone)]
pub struct Request {
    /// Target URL.
    pub url: String,
    /// HTTP method.
    pub method: String,
    /// Request body.
    pub body: Bytes,
}

impl Request {
    /// Constructs a bodyless request for the given URL and method.
    pub fn new(url: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            body: Bytes::new(),
        }
    }
}

/// Result of one request attempt.
///
/// The latency covers the whole call, i.e. name resolution, connection
/// establishing and I/O, and is set regardless of whether the response could
/// be parsed.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// Whether a well-formed response was received.
    pub success: bool,
    /// HTTP status code. Meaningful only on success.
    pub status: u16,
    /// Response body. Meaningful only on success.
    pub body: Bytes,
    /// Wall-clock time the whole attempt took.
    pub latency: Duration,
    /// Failure description. Set only on failure.
    pub error: Option<String>,
}

impl Outcome {
    /// Constructs a successful outcome from a parsed response.
    pub fn response(status: u16, body: Bytes, latency: Duration) -> Self {
        Self {
            success: true,
            status,
            body,
            latency,
            error: None,
        }
    }

    /// Constructs a failed outcome with the given reason.
    pub fn failure(reason: impl Into<String>, latency: Duration) -> Self {
        Self {
            success: false,
            status: 0,
            body: Bytes::new(),
            latency,
            error: Some(reason.into()),
        }
    }
}
