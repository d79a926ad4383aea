use core::time::Duration;
use std::{
    io::{Read, Write},
    net::{TcpStream, ToSocketAddrs},
    time::Instant,
};

use anyhow::{bail, Context, Error};
use bytes::{Bytes, BytesMut};

use super::{Outcome, Request, Transport};

/// Blocking one-shot HTTP/1.1 client.
///
/// Every call opens a fresh TCP connection, sends a `Connection: close`
/// request and reads until the peer closes the connection. There is no
/// keep-alive, no TLS and no redirect handling.
#[derive(Debug, Default)]
pub struct Client {
    /// Applied to both connection establishing and each read.
    ///
    /// `None` (the default) blocks indefinitely, leaving an unresponsive peer
    /// to hold the worker until it disconnects.
    timeout: Option<Duration>,
}

impl Client {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    fn round_trip(&self, request: &Request) -> Result<BytesMut, Error> {
        let target = Target::parse(&request.url)?;
        let payload = build_request(&request.method, &target.path, &target.host, &request.body);

        let addr = (target.host.as_str(), target.port)
            .to_socket_addrs()
            .with_context(|| format!("failed to resolve host: {}", target.host))?
            .next()
            .with_context(|| format!("failed to resolve host: {}", target.host))?;

        let stream = match self.timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        };
        let mut stream = stream.with_context(|| format!("failed to connect to {}", target.host))?;
        stream
            .set_read_timeout(self.timeout)
            .context("failed to arm read timeout")?;

        stream.write_all(&payload).context("failed to send request")?;

        let mut buf = BytesMut::with_capacity(4096);
        let mut chunk = [0; 4096];
        loop {
            let n = stream.read(&mut chunk).context("failed to receive response")?;
            if n == 0 {
                // EOF, the peer has closed the connection.
                break;
            }

            buf.extend_from_slice(&chunk[..n]);
        }

        Ok(buf)
    }
}

impl Transport for Client {
    fn execute(&self, request: &Request) -> Outcome {
        let now = Instant::now();

        let raw = match self.round_trip(request) {
            Ok(raw) => raw,
            Err(err) => return Outcome::failure(format!("{err:#}"), now.elapsed()),
        };

        // The latency is fixed here so that a framing error still carries the
        // time the wire exchange took.
        let latency = now.elapsed();

        match parse_response(&raw) {
            Ok((status, body)) => Outcome::response(status, body, latency),
            Err(err) => Outcome::failure(format!("{err:#}"), latency),
        }
    }
}

/// Decomposed target URL.
#[derive(Debug, Clone, PartialEq)]
struct Target {
    host: String,
    port: u16,
    path: String,
}

impl Target {
    /// Parses `[scheme://]host[:port][/path]`.
    ///
    /// The scheme is skipped entirely: `https` given here still produces a
    /// plain-text connection on port 80 unless a port is set explicitly.
    fn parse(url: &str) -> Result<Self, Error> {
        let rest = match url.find("://") {
            Some(idx) => &url[idx + 3..],
            None => url,
        };

        let (host_port, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, "/"),
        };

        let (host, port) = match host_port.find(':') {
            Some(idx) => {
                let port = host_port[idx + 1..]
                    .parse()
                    .with_context(|| format!("invalid URL: malformed port in {host_port:?}"))?;

                (&host_port[..idx], port)
            }
            None => (host_port, 80),
        };

        if host.is_empty() {
            bail!("invalid URL: no host");
        }

        let m = Self {
            host: host.into(),
            port,
            path: path.into(),
        };

        Ok(m)
    }
}

/// Serializes a request into the literal bytes put on the wire.
///
/// `Content-Length` is emitted only for non-empty bodies.
fn build_request(method: &str, path: &str, host: &str, body: &[u8]) -> Vec<u8> {
    let mut out = format!("{method} {path} HTTP/1.1\r\nHost: {host}\r\nConnection: close\r\n");
    if !body.is_empty() {
        out.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }
    out.push_str("\r\n");

    let mut out = out.into_bytes();
    out.extend_from_slice(body);
    out
}

/// Splits a raw close-framed response into status code and body.
///
/// The status code is the second whitespace-delimited token of the status
/// line, the body is everything past the first blank line. Anything else in
/// the response is ignored.
fn parse_response(raw: &[u8]) -> Result<(u16, Bytes), Error> {
    let status_end = find(raw, b"\r\n").context("invalid HTTP response: no status line")?;
    let status_line =
        core::str::from_utf8(&raw[..status_end]).context("invalid HTTP response: malformed status line")?;

    let code = status_line
        .split_whitespace()
        .nth(1)
        .context("invalid HTTP response: no status code")?;
    let code: u16 = code
        .parse()
        .with_context(|| format!("invalid HTTP response: non-numeric status code {code:?}"))?;

    let body_start = find(raw, b"\r\n\r\n").context("invalid HTTP response: no header/body separator")? + 4;

    Ok((code, Bytes::copy_from_slice(&raw[body_start..])))
}

#[inline]
fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
