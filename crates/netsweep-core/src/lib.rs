//! Netsweep Core - Shared types for subnet scanning and device discovery
//!
//! This crate provides the foundational types for the netsweep system:
//! - Host records produced by probing and vendor discovery
//! - Scan configuration with validation
//! - The serializable report handed to the report layer

pub mod config;
pub mod host;
pub mod report;

pub use config::{ConfigError, ProbeTimeouts, ScanConfig, SubnetPrefix};
pub use host::{sort_hosts, HostRecord};
pub use report::{NetworkInterface, ScanReport, ScanResult, ScanStatus};
