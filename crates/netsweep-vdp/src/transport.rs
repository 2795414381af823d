//! UDP and TCP transport for the vendor discovery protocol

use futures_util::stream::{self, StreamExt};
use netsweep_core::{sort_hosts, HostRecord, ScanConfig};
use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::{timeout, Instant};
use tracing::{debug, info, trace};

use crate::codec::{build_discovery_request, parse_response_frame};
use crate::identity::{guess_identity, IdentityGuess, IdentityHints};

/// Largest datagram or TCP reply read in one go
const MAX_RESPONSE_LEN: usize = 4096;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to bind discovery socket: {0}")]
    Bind(#[source] io::Error),
    #[error("Failed to enable broadcast on discovery socket: {0}")]
    Broadcast(#[source] io::Error),
}

/// UDP socket owned by one discovery run; closed when dropped
pub struct UdpDiscovery {
    socket: UdpSocket,
    port: u16,
    frame: Vec<u8>,
}

impl UdpDiscovery {
    /// Bind an ephemeral broadcast-capable socket
    pub async fn bind(port: u16) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .await
            .map_err(TransportError::Bind)?;
        socket
            .set_broadcast(true)
            .map_err(TransportError::Broadcast)?;

        Ok(Self {
            socket,
            port,
            frame: build_discovery_request(),
        })
    }

    /// Send one discovery request to every target; returns how many went out
    pub async fn send_round(&self, targets: &[Ipv4Addr]) -> usize {
        let mut sent = 0;
        for &target in targets {
            match self.socket.send_to(&self.frame, (target, self.port)).await {
                Ok(_) => sent += 1,
                Err(e) => trace!(target = %target, error = %e, "Discovery send failed"),
            }
        }
        sent
    }

    /// Listen for replies until `window` elapses
    pub async fn collect(&self, window: Duration, hints: &IdentityHints) -> Vec<HostRecord> {
        let deadline = Instant::now() + window;
        let mut buf = vec![0u8; MAX_RESPONSE_LEN];
        let mut found: HashMap<Ipv4Addr, HostRecord> = HashMap::new();

        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }

            let (len, addr) = match timeout(deadline - now, self.socket.recv_from(&mut buf)).await
            {
                Err(_) => break,
                Ok(Ok(received)) => received,
                // ICMP port-unreachable from unicast targets can surface here on some platforms
                Ok(Err(e))
                    if matches!(
                        e.kind(),
                        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionRefused
                    ) =>
                {
                    trace!(error = %e, "Ignoring discovery receive error");
                    continue;
                }
                Ok(Err(e)) => {
                    debug!(error = %e, "Discovery receive failed, stopping listener");
                    break;
                }
            };

            let Some(payload) = parse_response_frame(&buf[..len]) else {
                trace!(from = %addr, len, "Discarding malformed discovery frame");
                continue;
            };

            let guess = guess_identity(&payload, hints);
            let Some(ip) = guess.ip.or_else(|| source_ipv4(addr)) else {
                continue;
            };

            debug!(
                ip = %ip,
                from = %addr,
                name = ?guess.name,
                serial = ?guess.serial,
                "Discovery response"
            );

            found
                .entry(ip)
                .or_insert_with(|| HostRecord::new(ip))
                .fill_missing(guess.name.as_deref(), guess.serial.as_deref());
        }

        let mut hosts: Vec<HostRecord> = found.into_values().collect();
        sort_hosts(&mut hosts);
        hosts
    }
}

fn source_ipv4(addr: SocketAddr) -> Option<Ipv4Addr> {
    match addr.ip() {
        IpAddr::V4(ip) => Some(ip),
        IpAddr::V6(ip) => ip.to_ipv4_mapped(),
    }
}

/// Run the UDP discovery phase: broadcast plus unicast to every address in range
pub async fn udp_discover(config: &ScanConfig) -> Result<Vec<HostRecord>, TransportError> {
    let hints = IdentityHints::from_config(config);
    let discovery = UdpDiscovery::bind(config.udp_discovery_port).await?;

    let broadcasts = config.broadcast_targets();
    let unicast = config.addresses();

    for attempt in 0..config.attempts {
        let sent = discovery.send_round(&broadcasts).await + discovery.send_round(&unicast).await;
        trace!(attempt, sent, "Discovery round sent");
    }

    let hosts = discovery.collect(config.listen_window(), &hints).await;
    info!(
        port = config.udp_discovery_port,
        found = hosts.len(),
        "UDP discovery complete"
    );
    Ok(hosts)
}

/// Ask one host directly over TCP for its identity
pub async fn tcp_identify(
    ip: Ipv4Addr,
    port: u16,
    limit: Duration,
    hints: &IdentityHints,
) -> Option<IdentityGuess> {
    let exchange = async {
        let mut stream = TcpStream::connect((ip, port)).await?;
        stream.write_all(&build_discovery_request()).await?;
        let mut buf = vec![0u8; MAX_RESPONSE_LEN];
        let len = stream.read(&mut buf).await?;
        buf.truncate(len);
        Ok::<_, io::Error>(buf)
    };

    let data = match timeout(limit, exchange).await {
        Ok(Ok(data)) => data,
        Ok(Err(e)) => {
            trace!(ip = %ip, port, error = %e, "TCP identify failed");
            return None;
        }
        Err(_) => {
            trace!(ip = %ip, port, "TCP identify timed out");
            return None;
        }
    };

    let payload = parse_response_frame(&data)?;
    Some(guess_identity(&payload, hints))
}

/// Fill missing hostname/serial fields by asking each incomplete host over TCP
pub async fn tcp_gap_fill(hosts: &mut [HostRecord], config: &ScanConfig) {
    let hints = IdentityHints::from_config(config);
    let port = config.tcp_identify_port;
    let limit = config.identify_timeout();

    let pending: Vec<(usize, Ipv4Addr)> = hosts
        .iter()
        .enumerate()
        .filter(|(_, h)| !h.is_identified())
        .map(|(i, h)| (i, h.ip))
        .collect();

    if pending.is_empty() {
        return;
    }

    let hints = &hints;
    let results: Vec<(usize, IdentityGuess)> = stream::iter(pending)
        .map(|(i, ip)| async move { tcp_identify(ip, port, limit, hints).await.map(|g| (i, g)) })
        .buffer_unordered(config.concurrency.max(1))
        .filter_map(|r| async move { r })
        .collect()
        .await;

    debug!(filled = results.len(), "TCP gap-fill complete");

    for (i, guess) in results {
        hosts[i].fill_missing(guess.name.as_deref(), guess.serial.as_deref());
    }
}
