//! Bounded-concurrency sweep over an address range

use futures_util::stream::{self, StreamExt};
use netsweep_core::{sort_hosts, HostRecord};
use std::net::Ipv4Addr;
use tracing::debug;

use crate::probe::HostProbe;

/// Probe every address with at most `concurrency` probes in flight
///
/// Results are collected in completion order by this single loop, then
/// returned sorted by numeric address. Hosts that neither answered nor
/// yielded a name are dropped.
pub async fn sweep_range<P: HostProbe>(
    prober: &P,
    addresses: Vec<Ipv4Addr>,
    concurrency: usize,
) -> Vec<HostRecord> {
    let total = addresses.len();

    let mut hosts: Vec<HostRecord> = stream::iter(addresses)
        .map(|ip| async move { prober.probe(ip).await.into_record(ip) })
        .buffer_unordered(concurrency.max(1))
        .filter_map(|record| async move { record })
        .collect()
        .await;

    sort_hosts(&mut hosts);
    debug!(probed = total, alive = hosts.len(), "Sweep complete");
    hosts
}
