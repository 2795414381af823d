//! Scan configuration and validation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// UDP port the vendor discovery protocol listens on
pub const UDP_DISCOVERY_PORT: u16 = 30311;

/// TCP port used for direct vendor identification
pub const TCP_IDENTIFY_PORT: u16 = 30313;

/// Lower bound applied to the per-probe timeout
pub const MIN_PROBE_TIMEOUT_MS: u64 = 200;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid subnet prefix {0:?}: expected three dotted octets such as \"172.22.10\"")]
    InvalidPrefix(String),
    #[error("Invalid address range: start {start} is greater than end {end}")]
    InvalidRange { start: u8, end: u8 },
    #[error("Concurrency must be at least 1")]
    ZeroConcurrency,
    #[error("Discovery attempts must be at least 1")]
    ZeroAttempts,
    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),
    #[error("At least one probe port is required")]
    NoProbePorts,
    #[error("{0} must be a non-zero port")]
    InvalidPort(&'static str),
}

/// First three octets of the scanned /24-style range (e.g. "172.22.10")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubnetPrefix(pub [u8; 3]);

impl SubnetPrefix {
    pub fn new(a: u8, b: u8, c: u8) -> Self {
        Self([a, b, c])
    }

    /// Full address for a host octet within this prefix
    pub fn host(&self, last: u8) -> Ipv4Addr {
        Ipv4Addr::new(self.0[0], self.0[1], self.0[2], last)
    }

    /// First two octets, used to recognise in-subnet addresses in payloads
    pub fn leading_octets(&self) -> [u8; 2] {
        [self.0[0], self.0[1]]
    }
}

impl fmt::Display for SubnetPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.0[0], self.0[1], self.0[2])
    }
}

impl FromStr for SubnetPrefix {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_end_matches('.');
        let parts: Vec<&str> = trimmed.split('.').collect();
        if parts.len() != 3 {
            return Err(ConfigError::InvalidPrefix(s.to_string()));
        }
        let mut octets = [0u8; 3];
        for (slot, part) in octets.iter_mut().zip(parts) {
            *slot = part
                .parse()
                .map_err(|_| ConfigError::InvalidPrefix(s.to_string()))?;
        }
        Ok(Self(octets))
    }
}

impl TryFrom<String> for SubnetPrefix {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SubnetPrefix> for String {
    fn from(prefix: SubnetPrefix) -> Self {
        prefix.to_string()
    }
}

/// Configuration for one scan; immutable once the scan starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Subnet prefix to scan
    #[serde(default = "default_prefix")]
    pub prefix: SubnetPrefix,
    /// First host octet (inclusive)
    #[serde(default = "default_start")]
    pub start: u8,
    /// Last host octet (inclusive)
    #[serde(default = "default_end")]
    pub end: u8,
    /// Subnet mask reported alongside the results
    #[serde(default = "default_subnet_mask")]
    pub subnet_mask: Ipv4Addr,
    /// Per-probe timeout in milliseconds
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,
    /// Number of hosts probed in parallel
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// TCP ports tried when checking reachability, in order
    #[serde(default = "default_probe_ports")]
    pub probe_ports: Vec<u16>,
    /// Broadcast addresses for UDP discovery (empty = prefix.255)
    #[serde(default)]
    pub broadcasts: Vec<Ipv4Addr>,
    /// Number of UDP discovery send rounds
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    /// How long to listen for UDP discovery replies, in milliseconds
    #[serde(default = "default_listen_window")]
    pub listen_window_ms: u64,
    /// Vendor discovery UDP port
    #[serde(default = "default_udp_port")]
    pub udp_discovery_port: u16,
    /// Vendor identification TCP port
    #[serde(default = "default_tcp_port")]
    pub tcp_identify_port: u16,
    /// Timeout for the TCP identification exchange, in milliseconds
    #[serde(default = "default_identify_timeout")]
    pub identify_timeout_ms: u64,
    /// Case-insensitive substrings preferred when guessing a device name
    #[serde(default = "default_name_patterns")]
    pub name_patterns: Vec<String>,
}

fn default_prefix() -> SubnetPrefix {
    SubnetPrefix::new(172, 22, 10)
}

fn default_start() -> u8 {
    1
}

fn default_end() -> u8 {
    255
}

fn default_subnet_mask() -> Ipv4Addr {
    Ipv4Addr::new(255, 255, 0, 0)
}

fn default_probe_timeout() -> u64 {
    300
}

fn default_concurrency() -> usize {
    24
}

fn default_probe_ports() -> Vec<u16> {
    vec![80, 443, 8080, 22, 23, 21, 502, 445, 3389, 8000, 8888, TCP_IDENTIFY_PORT]
}

fn default_attempts() -> u32 {
    2
}

fn default_listen_window() -> u64 {
    3000
}

fn default_udp_port() -> u16 {
    UDP_DISCOVERY_PORT
}

fn default_tcp_port() -> u16 {
    TCP_IDENTIFY_PORT
}

fn default_identify_timeout() -> u64 {
    1000
}

fn default_name_patterns() -> Vec<String> {
    ["HPSC", "IPSC", "FRAMOS", "SMARTEK", "Controller"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            start: default_start(),
            end: default_end(),
            subnet_mask: default_subnet_mask(),
            probe_timeout_ms: default_probe_timeout(),
            concurrency: default_concurrency(),
            probe_ports: default_probe_ports(),
            broadcasts: Vec::new(),
            attempts: default_attempts(),
            listen_window_ms: default_listen_window(),
            udp_discovery_port: default_udp_port(),
            tcp_identify_port: default_tcp_port(),
            identify_timeout_ms: default_identify_timeout(),
            name_patterns: default_name_patterns(),
        }
    }
}

impl ScanConfig {
    /// Check the configuration before any I/O is attempted
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.start > self.end {
            return Err(ConfigError::InvalidRange {
                start: self.start,
                end: self.end,
            });
        }
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if self.probe_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout("probe_timeout_ms"));
        }
        if self.listen_window_ms == 0 {
            return Err(ConfigError::ZeroTimeout("listen_window_ms"));
        }
        if self.identify_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout("identify_timeout_ms"));
        }
        if self.probe_ports.is_empty() {
            return Err(ConfigError::NoProbePorts);
        }
        if self.udp_discovery_port == 0 {
            return Err(ConfigError::InvalidPort("udp_discovery_port"));
        }
        if self.tcp_identify_port == 0 {
            return Err(ConfigError::InvalidPort("tcp_identify_port"));
        }
        Ok(())
    }

    /// Every address in the inclusive range, in ascending order
    pub fn addresses(&self) -> Vec<Ipv4Addr> {
        (self.start..=self.end).map(|o| self.prefix.host(o)).collect()
    }

    /// Range label used in the report, e.g. "172.22.10.1-172.22.10.255"
    pub fn range_label(&self) -> String {
        format!(
            "{}-{}",
            self.prefix.host(self.start),
            self.prefix.host(self.end)
        )
    }

    /// Broadcast targets for UDP discovery
    pub fn broadcast_targets(&self) -> Vec<Ipv4Addr> {
        if self.broadcasts.is_empty() {
            vec![self.prefix.host(255)]
        } else {
            self.broadcasts.clone()
        }
    }

    /// Per-probe timeout with the lower bound applied
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms.max(MIN_PROBE_TIMEOUT_MS))
    }

    pub fn listen_window(&self) -> Duration {
        Duration::from_millis(self.listen_window_ms)
    }

    pub fn identify_timeout(&self) -> Duration {
        Duration::from_millis(self.identify_timeout_ms)
    }

    /// Timeouts for each reachability technique
    pub fn probe_timeouts(&self) -> ProbeTimeouts {
        ProbeTimeouts::from_base(self.probe_timeout())
    }
}

/// Explicit per-technique timeouts handed to the prober
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeTimeouts {
    pub connect: Duration,
    pub http: Duration,
    pub reverse_dns: Duration,
    pub telnet: Duration,
    pub modbus: Duration,
    pub icmp: Duration,
    pub netbios: Duration,
}

impl ProbeTimeouts {
    pub fn from_base(base: Duration) -> Self {
        Self {
            connect: base,
            http: base,
            reverse_dns: Duration::from_millis(500),
            telnet: Duration::from_millis(600),
            modbus: Duration::from_millis(700),
            icmp: base,
            netbios: Duration::from_millis(1000),
        }
    }
}

impl Default for ProbeTimeouts {
    fn default() -> Self {
        Self::from_base(Duration::from_millis(default_probe_timeout()))
    }
}
