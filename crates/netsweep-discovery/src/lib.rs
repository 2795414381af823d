//! Netsweep Discovery - Host probing and subnet scanning
//!
//! This crate combines several discovery methods:
//! - Generic reachability probes (TCP connect, HTTP, Telnet, Modbus, ICMP, NetBIOS, reverse DNS)
//! - Bounded-concurrency sweeps over an address range
//! - Vendor protocol discovery (via `netsweep-vdp`) and reconciliation of both sources

pub mod dns;
pub mod http;
pub mod interfaces;
pub mod modbus;
pub mod netbios;
pub mod ping;
pub mod probe;
pub mod reconcile;
pub mod scanner;
pub mod sweep;
pub mod tcp;
pub mod telnet;

pub use probe::{HostProbe, ProbeOutcome, ReachabilityProber};
pub use reconcile::reconcile;
pub use scanner::{NetworkScanner, ScanError};
pub use sweep::sweep_range;
