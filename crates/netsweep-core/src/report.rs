//! Report fragments consumed by the external report layer

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

use crate::config::ScanConfig;
use crate::host::HostRecord;

/// A local network adapter, merged unchanged next to the scan result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub interface_name: String,
    pub index: Option<u32>,
    pub mac_address: String,
    pub ip_addresses: Vec<String>,
    pub subnet_masks: Vec<String>,
    pub gateways: Vec<String>,
    pub dns_servers: Vec<String>,
}

/// Result of one subnet scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Scanned range, e.g. "172.22.10.1-172.22.10.255"
    pub range: String,
    pub subnet_mask: Ipv4Addr,
    /// Hosts in ascending numeric address order
    pub hosts: Vec<HostRecord>,
}

impl ScanResult {
    pub fn new(config: &ScanConfig, hosts: Vec<HostRecord>) -> Self {
        Self {
            range: config.range_label(),
            subnet_mask: config.subnet_mask,
            hosts,
        }
    }

    pub fn host(&self, ip: Ipv4Addr) -> Option<&HostRecord> {
        self.hosts.iter().find(|h| h.ip == ip)
    }
}

/// Whether interface enumeration succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Success,
    Failed,
}

/// Complete network report: local interfaces plus the scan result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    pub network_interfaces: Vec<NetworkInterface>,
    pub network_scan: ScanResult,
    pub total_count: usize,
    pub status: ScanStatus,
}

impl ScanReport {
    pub fn new(interfaces: Option<Vec<NetworkInterface>>, scan: ScanResult) -> Self {
        let status = if interfaces.is_some() {
            ScanStatus::Success
        } else {
            ScanStatus::Failed
        };
        let network_interfaces = interfaces.unwrap_or_default();
        Self {
            total_count: network_interfaces.len(),
            network_interfaces,
            network_scan: scan,
            status,
        }
    }
}
