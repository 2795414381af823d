//! Local network adapter enumeration

use netsweep_core::NetworkInterface;
use network_interface::{Addr, NetworkInterface as OsInterface, NetworkInterfaceConfig};
use tracing::{debug, warn};

/// Enumerate local adapters; `None` when the OS query fails
///
/// Gateways and DNS servers are not reported by the enumeration facility and
/// are left empty.
pub fn list_interfaces() -> Option<Vec<NetworkInterface>> {
    match OsInterface::show() {
        Ok(raw) => {
            let interfaces = group_by_name(raw);
            debug!(count = interfaces.len(), "Enumerated network interfaces");
            Some(interfaces)
        }
        Err(e) => {
            warn!(error = %e, "Failed to enumerate network interfaces");
            None
        }
    }
}

/// Some platforms return one entry per address; fold them per adapter name
fn group_by_name(raw: Vec<OsInterface>) -> Vec<NetworkInterface> {
    let mut interfaces: Vec<NetworkInterface> = Vec::new();

    for iface in raw {
        let pos = match interfaces.iter().position(|i| i.interface_name == iface.name) {
            Some(pos) => pos,
            None => {
                interfaces.push(NetworkInterface {
                    interface_name: iface.name.clone(),
                    index: Some(iface.index),
                    mac_address: String::new(),
                    ip_addresses: Vec::new(),
                    subnet_masks: Vec::new(),
                    gateways: Vec::new(),
                    dns_servers: Vec::new(),
                });
                interfaces.len() - 1
            }
        };
        let entry = &mut interfaces[pos];

        if entry.mac_address.is_empty() {
            if let Some(mac) = iface.mac_addr.filter(|m| !m.is_empty()) {
                entry.mac_address = mac.to_uppercase();
            }
        }

        for addr in &iface.addr {
            let (ip, mask) = match addr {
                Addr::V4(v4) => (v4.ip.to_string(), v4.netmask.map(|m| m.to_string())),
                Addr::V6(v6) => (v6.ip.to_string(), v6.netmask.map(|m| m.to_string())),
            };
            if entry.ip_addresses.contains(&ip) {
                continue;
            }
            entry.ip_addresses.push(ip);
            if let Some(mask) = mask {
                entry.subnet_masks.push(mask);
            }
        }
    }

    interfaces
}
