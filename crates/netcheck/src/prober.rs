use std::io::{Error as IoError, ErrorKind};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use serde::Serialize;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::ProbeError;
use crate::{DEFAULT_PROBE_PORT, DEFAULT_PROBE_TIMEOUT};

/// Result of a single successful probe attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeOutcome {
    Reachable,
    Unreachable,
}

impl ProbeOutcome {
    pub fn is_reachable(self) -> bool {
        matches!(self, Self::Reachable)
    }
}

impl std::fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeOutcome::Reachable => write!(f, "reachable"),
            ProbeOutcome::Unreachable => write!(f, "unreachable"),
        }
    }
}

/// Single reachability test against one address
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    /// Probe `address` once. Implementations must bound their own run time.
    async fn probe(&self, address: IpAddr) -> Result<ProbeOutcome, ProbeError>;
}

/// TCP connect prober
///
/// A completed handshake means reachable. Refused, reset, timed out and
/// unroutable connections mean unreachable; anything else is a transport
/// error.
#[derive(Debug, Clone)]
pub struct TcpProber {
    port: u16,
    timeout_duration: Duration,
}

impl TcpProber {
    pub fn new(port: u16, timeout_duration: Duration) -> Self {
        Self { port, timeout_duration }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn timeout(&self) -> Duration {
        self.timeout_duration
    }
}

impl Default for TcpProber {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_PORT, DEFAULT_PROBE_TIMEOUT)
    }
}

#[async_trait::async_trait]
impl Prober for TcpProber {
    async fn probe(&self, address: IpAddr) -> Result<ProbeOutcome, ProbeError> {
        let target = SocketAddr::new(address, self.port);

        match timeout(self.timeout_duration, TcpStream::connect(target)).await {
            Err(_elapsed) => Ok(ProbeOutcome::Unreachable),
            Ok(Ok(_stream)) => Ok(ProbeOutcome::Reachable),
            Ok(Err(e)) if is_unreachable(&e) => Ok(ProbeOutcome::Unreachable),
            Ok(Err(e)) => Err(ProbeError::Transport(e)),
        }
    }
}

fn is_unreachable(error: &IoError) -> bool {
    matches!(
        error.kind(),
        ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::TimedOut
            | ErrorKind::HostUnreachable
            | ErrorKind::NetworkUnreachable
    )
}

/// Parse a user supplied address for a one-off probe
pub fn parse_address(raw: &str) -> Result<IpAddr, ProbeError> {
    raw.trim().parse().map_err(|_| ProbeError::InvalidAddress(raw.to_string()))
}
