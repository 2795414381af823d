//! Reverse DNS with an explicit per-call timeout

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tokio::time::timeout;
use tracing::trace;

/// PTR lookup for `ip`, bounded by `limit`
///
/// The resolver call blocks, so it runs on the blocking pool. A timed out
/// lookup is abandoned there and finishes on its own.
pub async fn reverse_lookup(ip: Ipv4Addr, limit: Duration) -> Option<String> {
    let lookup = tokio::task::spawn_blocking(move || dns_lookup::lookup_addr(&IpAddr::V4(ip)));

    match timeout(limit, lookup).await {
        Ok(Ok(Ok(name))) => usable_name(&name),
        Ok(Ok(Err(e))) => {
            trace!(ip = %ip, error = %e, "Reverse lookup failed");
            None
        }
        Ok(Err(e)) => {
            trace!(ip = %ip, error = %e, "Reverse lookup task failed");
            None
        }
        Err(_) => None,
    }
}

/// Resolvers hand back the numeric address when no PTR record exists
fn usable_name(name: &str) -> Option<String> {
    let name = name.trim().trim_end_matches('.');
    if name.is_empty() || name.parse::<IpAddr>().is_ok() {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_answer_is_not_a_name() {
        assert_eq!(usable_name("172.22.10.5"), None);
        assert_eq!(usable_name(""), None);
        assert_eq!(usable_name("ctrl-1.plant.local."), Some("ctrl-1.plant.local".into()));
    }

    #[tokio::test]
    async fn test_lookup_is_bounded() {
        // TEST-NET-1 has no PTR records; the call must return within the limit
        let started = std::time::Instant::now();
        let _ = reverse_lookup(Ipv4Addr::new(192, 0, 2, 1), Duration::from_millis(300)).await;
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
