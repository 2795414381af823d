//! TCP connect probing

use std::io;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

/// What a single connection attempt told us about the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// Handshake completed
    Open,
    /// Host answered with a reset; its stack is alive
    Refused,
    /// Timed out or failed in a way that proves nothing
    Silent,
}

impl ConnectOutcome {
    pub fn is_reachable(self) -> bool {
        matches!(self, Self::Open | Self::Refused)
    }
}

/// Classify a connect error
pub(crate) fn is_refusal(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::ConnectionRefused
}

/// Try one port
pub async fn connect_outcome(ip: Ipv4Addr, port: u16, limit: Duration) -> ConnectOutcome {
    match timeout(limit, TcpStream::connect((ip, port))).await {
        Ok(Ok(_)) => ConnectOutcome::Open,
        Ok(Err(e)) if is_refusal(&e) => ConnectOutcome::Refused,
        Ok(Err(e)) => {
            trace!(ip = %ip, port, error = %e, "Connect failed");
            ConnectOutcome::Silent
        }
        Err(_) => ConnectOutcome::Silent,
    }
}

/// Walk `ports` in order, stopping at the first open or refused one
pub async fn tcp_any_port(ip: Ipv4Addr, ports: &[u16], limit: Duration) -> Option<u16> {
    for &port in ports {
        if connect_outcome(ip, port, limit).await.is_reachable() {
            trace!(ip = %ip, port, "Host answered TCP connect");
            return Some(port);
        }
    }
    None
}
