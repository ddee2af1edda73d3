//! Peer transport: sends a single framed request and reads back a single
//! framed reply over a reliable stream (spec §6: "Simple request-reply
//! framing over a reliable stream, each message as a UTF-8 string").
//!
//! Kept behind a trait, not a concrete `TcpStream` call, so the Sync Engine
//! and Node Supervisor can be driven by an in-memory double in tests
//! (spec §9's "capability handles, never direct pointers" design note).

use crate::protocol::Request;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    Unreachable(String),
    Timeout,
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Unreachable(reason) => write!(f, "PeerUnreachable: {reason}"),
            TransportError::Timeout => write!(f, "PeerTimeout"),
        }
    }
}
impl std::error::Error for TransportError {}

/// Default per-request timeout (spec §5: "Peer request calls honor a short
/// per-request timeout (default 5 s)").
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Sends `request` to `peer_url` and returns the single raw reply line
/// (unparsed — each caller knows its own expected shape, since spec §6's
/// reply forms vary from request to request: `ok`/`error:`, a decimal
/// length, a comma-separated list, or a Codec envelope).
pub trait PeerTransport: Send + Sync {
    fn request(
        &self,
        peer_url: &str,
        request: &Request,
        timeout: Duration,
    ) -> Result<String, TransportError>;
}

/// Real transport: dials the peer's `host:port`, writes one line, reads one
/// line back.
pub struct TcpTransport;

impl TcpTransport {
    fn peer_addr(peer_url: &str) -> Result<String, TransportError> {
        let without_scheme = peer_url
            .strip_prefix("http://")
            .or_else(|| peer_url.strip_prefix("https://"))
            .ok_or_else(|| TransportError::Unreachable(format!("not a url: {peer_url}")))?;
        Ok(without_scheme.trim_end_matches('/').to_string())
    }
}

impl PeerTransport for TcpTransport {
    fn request(
        &self,
        peer_url: &str,
        request: &Request,
        timeout: Duration,
    ) -> Result<String, TransportError> {
        let addr = Self::peer_addr(peer_url)?;
        let stream = TcpStream::connect(&addr).map_err(|e| TransportError::Unreachable(e.to_string()))?;
        stream.set_read_timeout(Some(timeout)).ok();
        stream.set_write_timeout(Some(timeout)).ok();
        let mut writer = stream.try_clone().map_err(|e| TransportError::Unreachable(e.to_string()))?;
        writeln!(writer, "{}", request.to_wire())
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => Err(TransportError::Unreachable("connection closed".to_string())),
            Ok(_) => Ok(line.trim_end_matches(['\n', '\r']).to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock
                || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Err(TransportError::Timeout)
            }
            Err(e) => Err(TransportError::Unreachable(e.to_string())),
        }
    }
}

/// In-memory transport double for tests: each peer URL maps to a handler
/// closure that computes a reply directly, with no actual socket I/O.
#[cfg(any(test, feature = "test-support"))]
pub struct MockTransport {
    pub handlers: std::collections::HashMap<String, Box<dyn Fn(&Request) -> String + Send + Sync>>,
}

#[cfg(any(test, feature = "test-support"))]
impl MockTransport {
    pub fn new() -> Self {
        MockTransport { handlers: std::collections::HashMap::new() }
    }

    pub fn on(
        mut self,
        peer_url: &str,
        handler: impl Fn(&Request) -> String + Send + Sync + 'static,
    ) -> Self {
        self.handlers.insert(peer_url.to_string(), Box::new(handler));
        self
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl PeerTransport for MockTransport {
    fn request(
        &self,
        peer_url: &str,
        request: &Request,
        _timeout: Duration,
    ) -> Result<String, TransportError> {
        match self.handlers.get(peer_url) {
            Some(handler) => Ok(handler(request)),
            None => Err(TransportError::Unreachable(format!("no route to {peer_url}"))),
        }
    }
}
