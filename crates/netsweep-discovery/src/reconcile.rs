//! Merge swept hosts with vendor-discovered hosts

use netsweep_core::{sort_hosts, HostRecord};
use std::collections::HashMap;
use std::net::Ipv4Addr;

/// Merge `discovered` into `scanned`, keyed by address
///
/// An existing host only gains a hostname it lacks, but a discovered serial
/// always replaces the scanned one. Hosts seen only by discovery are added
/// as they are. The result is sorted by numeric address.
pub fn reconcile(scanned: Vec<HostRecord>, discovered: Vec<HostRecord>) -> Vec<HostRecord> {
    let mut merged: HashMap<Ipv4Addr, HostRecord> =
        scanned.into_iter().map(|h| (h.ip, h)).collect();

    for found in discovered {
        match merged.get_mut(&found.ip) {
            Some(existing) => {
                existing.fill_missing(found.hostname.as_deref(), None);
                if found.serial.is_some() {
                    existing.serial = found.serial;
                }
            }
            None => {
                merged.insert(found.ip, found);
            }
        }
    }

    let mut hosts: Vec<HostRecord> = merged.into_values().collect();
    sort_hosts(&mut hosts);
    hosts
}
