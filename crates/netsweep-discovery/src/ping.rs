//! ICMP echo reachability check
//!
//! Uses a `surge_ping` client where the OS lets us open an ICMP socket and
//! falls back to the system `ping` binary otherwise.

use std::net::{IpAddr, Ipv4Addr};
use std::process::Stdio;
use std::time::Duration;
use surge_ping::{Client, Config, PingIdentifier, PingSequence};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::trace;

const PAYLOAD: [u8; 56] = [0; 56];

/// True if the host answered an ICMP echo within `limit`
pub async fn icmp_ping(ip: Ipv4Addr, limit: Duration) -> bool {
    let client = match Client::new(&Config::default()) {
        Ok(client) => client,
        Err(e) => {
            trace!(error = %e, "ICMP client unavailable, using ping command");
            return ping_command(ip, limit).await;
        }
    };

    let mut pinger = client
        .pinger(IpAddr::V4(ip), PingIdentifier(identifier(ip)))
        .await;
    pinger.timeout(limit);

    match timeout(limit, pinger.ping(PingSequence(0), &PAYLOAD)).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            trace!(ip = %ip, error = %e, "ICMP echo got no reply");
            false
        }
        Err(_) => false,
    }
}

/// Per-target identifier so concurrent pings on one host don't collide
fn identifier(ip: Ipv4Addr) -> u16 {
    (u32::from(ip) as u16) ^ 0x6e73
}

/// Run the system ping binary with no console window
async fn ping_command(ip: Ipv4Addr, limit: Duration) -> bool {
    let mut cmd = Command::new("ping");

    #[cfg(windows)]
    {
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        cmd.args(["-n", "1", "-w", &limit.as_millis().to_string()]);
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    #[cfg(not(windows))]
    {
        let secs = limit.as_secs().max(1).to_string();
        cmd.args(["-c", "1", "-W", &secs]);
    }

    cmd.arg(ip.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    match timeout(limit + Duration::from_secs(1), cmd.status()).await {
        Ok(Ok(status)) => status.success(),
        Ok(Err(e)) => {
            trace!(ip = %ip, error = %e, "ping command unavailable");
            false
        }
        Err(_) => false,
    }
}
