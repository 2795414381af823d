//! Host records for probed and discovered devices

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::net::Ipv4Addr;

/// A single host found on the scanned segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    /// Host address, unique within a result set
    pub ip: Ipv4Addr,
    /// Best-effort identity string (reverse DNS, HTTP title, banner, ...)
    #[serde(
        default,
        serialize_with = "serialize_hostname",
        deserialize_with = "deserialize_optional_text"
    )]
    pub hostname: Option<String>,
    /// Best-effort device serial, hex or ASCII
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_text"
    )]
    pub serial: Option<String>,
}

impl HostRecord {
    /// Create a record with no identity information
    pub fn new(ip: Ipv4Addr) -> Self {
        Self {
            ip,
            hostname: None,
            serial: None,
        }
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = non_empty(hostname.into());
        self
    }

    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = non_empty(serial.into());
        self
    }

    /// Fill hostname/serial only where this record has none yet
    pub fn fill_missing(&mut self, hostname: Option<&str>, serial: Option<&str>) {
        if self.hostname.is_none() {
            self.hostname = hostname.map(str::to_string).and_then(non_empty);
        }
        if self.serial.is_none() {
            self.serial = serial.map(str::to_string).and_then(non_empty);
        }
    }

    /// True when both identity fields are known
    pub fn is_identified(&self) -> bool {
        self.hostname.is_some() && self.serial.is_some()
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == s.len() {
        Some(s)
    } else {
        Some(trimmed.to_string())
    }
}

// The report layer expects `hostname` to always be present, empty when unknown
fn serialize_hostname<S>(hostname: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(hostname.as_deref().unwrap_or(""))
}

fn deserialize_optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.and_then(non_empty))
}

/// Sort hosts by numeric address (172.22.10.9 before 172.22.10.10)
pub fn sort_hosts(hosts: &mut [HostRecord]) {
    hosts.sort_by_key(|h| u32::from(h.ip));
}
