//! Per-host reachability and identity probing
//!
//! Each technique lives in its own module and returns plain optional data.
//! [`ReachabilityProber`] runs them cheapest first and stops asking for
//! things it already knows.

use netsweep_core::{HostRecord, ProbeTimeouts, ScanConfig};
use std::future::Future;
use std::net::Ipv4Addr;
use tracing::{debug, trace};

use crate::dns::reverse_lookup;
use crate::http::{http_probe, HTTP_PORT};
use crate::modbus::{modbus_device_id, MODBUS_PORT};
use crate::netbios::netbios_name;
use crate::ping::icmp_ping;
use crate::tcp::tcp_any_port;
use crate::telnet::{telnet_banner, TELNET_PORT};

/// What probing one address produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub reachable: bool,
    pub hostname: Option<String>,
    pub serial: Option<String>,
}

impl ProbeOutcome {
    pub fn unreachable() -> Self {
        Self::default()
    }

    /// A record for the result list, if the host answered or has a name
    pub fn into_record(self, ip: Ipv4Addr) -> Option<HostRecord> {
        if !self.reachable && self.hostname.is_none() {
            return None;
        }
        let mut record = HostRecord::new(ip);
        record.fill_missing(self.hostname.as_deref(), self.serial.as_deref());
        Some(record)
    }
}

/// Something that can characterise a single address
pub trait HostProbe: Send + Sync {
    fn probe(&self, ip: Ipv4Addr) -> impl Future<Output = ProbeOutcome> + Send;
}

/// The generic probe sequence: TCP, HTTP, reverse DNS, Telnet, Modbus, ICMP, NetBIOS
#[derive(Debug, Clone)]
pub struct ReachabilityProber {
    /// Ports tried in order for the TCP-any-port check
    pub ports: Vec<u16>,
    pub timeouts: ProbeTimeouts,
    pub http_port: u16,
    pub telnet_port: u16,
    pub modbus_port: u16,
}

impl ReachabilityProber {
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            ports: config.probe_ports.clone(),
            timeouts: config.probe_timeouts(),
            http_port: HTTP_PORT,
            telnet_port: TELNET_PORT,
            modbus_port: MODBUS_PORT,
        }
    }

    async fn run(&self, ip: Ipv4Addr) -> ProbeOutcome {
        let t = &self.timeouts;
        let mut outcome = ProbeOutcome::unreachable();

        if tcp_any_port(ip, &self.ports, t.connect).await.is_some() {
            outcome.reachable = true;
        }

        let http = http_probe(ip, self.http_port, t.http).await;
        outcome.reachable |= http.reachable;

        outcome.hostname = reverse_lookup(ip, t.reverse_dns).await;

        if outcome.hostname.is_none() {
            outcome.hostname = http.identity().map(str::to_string);
        }

        if outcome.hostname.is_none() && outcome.reachable {
            outcome.hostname = telnet_banner(ip, self.telnet_port, t.telnet).await;
        }

        if outcome.reachable && outcome.serial.is_none() {
            let modbus = modbus_device_id(ip, self.modbus_port, t.modbus).await;
            if outcome.hostname.is_none() {
                outcome.hostname = modbus.name;
            }
            outcome.serial = modbus.serial;
        }

        if !outcome.reachable && outcome.hostname.is_none() {
            outcome.reachable = icmp_ping(ip, t.icmp).await;
            if outcome.reachable {
                trace!(ip = %ip, "Host answered ICMP echo only");
            }
        }

        if outcome.reachable && outcome.hostname.is_none() {
            outcome.hostname = netbios_name(ip, t.netbios).await;
        }

        debug!(
            ip = %ip,
            reachable = outcome.reachable,
            hostname = outcome.hostname.as_deref().unwrap_or(""),
            serial = outcome.serial.as_deref().unwrap_or(""),
            "Probe finished"
        );
        outcome
    }
}

impl HostProbe for ReachabilityProber {
    fn probe(&self, ip: Ipv4Addr) -> impl Future<Output = ProbeOutcome> + Send {
        self.run(ip)
    }
}
