//! Scan orchestration: sweep, vendor discovery, gap-fill, reconcile

use netsweep_core::{ConfigError, HostRecord, ScanConfig, ScanReport, ScanResult};
use netsweep_vdp::{tcp_gap_fill, udp_discover};
use std::collections::HashSet;
use std::net::Ipv4Addr;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::interfaces::list_interfaces;
use crate::probe::{HostProbe, ReachabilityProber};
use crate::reconcile::reconcile;
use crate::sweep::sweep_range;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid scan configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Runs one complete scan for a fixed configuration
pub struct NetworkScanner<P = ReachabilityProber> {
    config: ScanConfig,
    prober: P,
}

impl NetworkScanner {
    /// Scanner using the generic reachability probe sequence
    pub fn new(config: ScanConfig) -> Self {
        let prober = ReachabilityProber::from_config(&config);
        Self { config, prober }
    }
}

impl<P: HostProbe> NetworkScanner<P> {
    /// Scanner with a custom per-host prober
    pub fn with_prober(config: ScanConfig, prober: P) -> Self {
        Self { config, prober }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Sweep the range, run vendor discovery, and merge both into one result
    ///
    /// Configuration is validated before any packet is sent. A discovery
    /// socket failure only empties the discovery half of the result.
    pub async fn scan(&self) -> Result<ScanResult, ScanError> {
        self.config.validate()?;
        let config = &self.config;
        let started = Instant::now();

        info!(
            range = %config.range_label(),
            concurrency = config.concurrency,
            "Starting subnet scan"
        );

        let phase = Instant::now();
        let scanned = sweep_range(&self.prober, config.addresses(), config.concurrency).await;
        info!(
            alive = scanned.len(),
            elapsed_ms = phase.elapsed().as_millis() as u64,
            "Subnet sweep finished"
        );

        let phase = Instant::now();
        let mut discovered = match udp_discover(config).await {
            Ok(hosts) => hosts,
            Err(e) => {
                warn!(error = %e, "Vendor discovery unavailable, continuing without it");
                Vec::new()
            }
        };
        info!(
            found = discovered.len(),
            elapsed_ms = phase.elapsed().as_millis() as u64,
            "Vendor discovery finished"
        );

        let phase = Instant::now();
        add_gap_fill_targets(&mut discovered, &scanned);
        tcp_gap_fill(&mut discovered, config).await;
        info!(
            elapsed_ms = phase.elapsed().as_millis() as u64,
            "Identity gap-fill finished"
        );

        let hosts = reconcile(scanned, discovered);

        info!(
            hosts = hosts.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Scan complete"
        );
        Ok(ScanResult::new(config, hosts))
    }

    /// Scan plus the local interface list, as one report
    pub async fn report(&self) -> Result<ScanReport, ScanError> {
        let scan = self.scan().await?;
        let interfaces = tokio::task::spawn_blocking(list_interfaces)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Interface enumeration task failed");
                None
            });
        Ok(ScanReport::new(interfaces, scan))
    }
}

/// Queue swept hosts that still lack identity for TCP identification
///
/// They join the discovery list as blank records, so anything the TCP
/// exchange learns is merged with discovery precedence.
fn add_gap_fill_targets(discovered: &mut Vec<HostRecord>, scanned: &[HostRecord]) {
    let known: HashSet<Ipv4Addr> = discovered.iter().map(|h| h.ip).collect();
    discovered.extend(
        scanned
            .iter()
            .filter(|h| !h.is_identified() && !known.contains(&h.ip))
            .map(|h| HostRecord::new(h.ip)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeOutcome;
    use netsweep_core::{ScanStatus, SubnetPrefix};
    use netsweep_vdp::{build_discovery_request, DiscoveryFrame};
    use std::collections::HashMap;
    use std::future::Future;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, UdpSocket};

    /// Fixed answers per address; unknown addresses time out
    struct Scripted(HashMap<Ipv4Addr, ProbeOutcome>);

    impl HostProbe for Scripted {
        fn probe(&self, ip: Ipv4Addr) -> impl Future<Output = ProbeOutcome> + Send {
            let outcome = self.0.get(&ip).cloned().unwrap_or_default();
            async move { outcome }
        }
    }

    async fn spawn_udp_device(bind: Ipv4Addr, payload: Vec<u8>) -> u16 {
        let socket = UdpSocket::bind((bind, 0)).await.unwrap();
        let port = socket.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let reply = DiscoveryFrame::response(payload).encode();
            while let Ok((len, from)) = socket.recv_from(&mut buf).await {
                if buf[..len] == build_discovery_request()[..] {
                    let _ = socket.send_to(&reply, from).await;
                }
            }
        });
        port
    }

    async fn closed_tcp_port() -> u16 {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        listener.local_addr().unwrap().port()
    }

    fn loopback_config(udp_port: u16, tcp_port: u16) -> ScanConfig {
        ScanConfig {
            prefix: SubnetPrefix::new(127, 0, 0),
            start: 1,
            end: 3,
            broadcasts: vec![Ipv4Addr::new(127, 255, 255, 255)],
            attempts: 1,
            listen_window_ms: 400,
            udp_discovery_port: udp_port,
            tcp_identify_port: tcp_port,
            identify_timeout_ms: 300,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_scan_merges_sweep_and_discovery() {
        // .1 refuses everything, .2 is silent, .3 only answers vendor discovery
        let device = Ipv4Addr::new(127, 0, 0, 3);
        let udp_port = spawn_udp_device(device, vec![0xDE, 0xAD, 0xBE, 0xEF, 0, 0, 0, 0]).await;
        let config = loopback_config(udp_port, closed_tcp_port().await);

        let mut answers = HashMap::new();
        answers.insert(
            Ipv4Addr::new(127, 0, 0, 1),
            ProbeOutcome {
                reachable: true,
                ..Default::default()
            },
        );
        let scanner = NetworkScanner::with_prober(config, Scripted(answers));

        let result = scanner.scan().await.unwrap();
        assert_eq!(result.range, "127.0.0.1-127.0.0.3");
        assert_eq!(result.subnet_mask, Ipv4Addr::new(255, 255, 0, 0));

        let ips: Vec<_> = result.hosts.iter().map(|h| h.ip).collect();
        assert_eq!(ips, vec![Ipv4Addr::new(127, 0, 0, 1), device]);

        assert!(result.hosts[0].hostname.is_none());
        assert!(result.hosts[0].serial.is_none());
        assert!(result.hosts[1].hostname.is_none());
        let serial = result.hosts[1].serial.as_deref().unwrap();
        assert!(serial.starts_with("DEADBEEF"));
    }

    #[tokio::test]
    async fn test_tcp_identified_serial_replaces_swept_serial() {
        let host = Ipv4Addr::LOCALHOST;

        // UDP answer carries a name and an all-zero serial block
        let mut udp_payload = vec![0u8; 8];
        udp_payload.extend_from_slice(b"HPSC-1\0");
        let udp_port = spawn_udp_device(host, udp_payload).await;

        let listener = TcpListener::bind((host, 0)).await.unwrap();
        let tcp_port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 16];
                let _ = stream.read(&mut buf).await;
                let reply = DiscoveryFrame::response(vec![0xAB, 0x12, 0, 0, 0, 0, 0, 0]).encode();
                let _ = stream.write_all(&reply).await;
            }
        });

        let config = ScanConfig {
            end: 1,
            ..loopback_config(udp_port, tcp_port)
        };
        let mut answers = HashMap::new();
        answers.insert(
            host,
            ProbeOutcome {
                reachable: true,
                hostname: None,
                serial: Some("SN-MODBUS".into()),
            },
        );
        let scanner = NetworkScanner::with_prober(config, Scripted(answers));

        let result = scanner.scan().await.unwrap();
        assert_eq!(result.hosts.len(), 1);
        assert_eq!(result.hosts[0].hostname.as_deref(), Some("HPSC-1"));
        assert_eq!(result.hosts[0].serial.as_deref(), Some("AB12000000000000"));
    }

    #[test]
    fn test_gap_fill_targets_skip_identified_and_known() {
        let ip = |last| Ipv4Addr::new(172, 22, 10, last);
        let mut discovered = vec![HostRecord::new(ip(3)).with_serial("DEADBEEF")];
        let scanned = vec![
            HostRecord::new(ip(1)).with_serial("SN-1"),
            HostRecord::new(ip(2)).with_hostname("done").with_serial("SN-2"),
            HostRecord::new(ip(3)),
        ];
        add_gap_fill_targets(&mut discovered, &scanned);

        let ips: Vec<_> = discovered.iter().map(|h| h.ip).collect();
        assert_eq!(ips, vec![ip(3), ip(1)]);
        // queued sweep hosts carry no data of their own
        assert!(discovered[1].serial.is_none());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_io() {
        let config = ScanConfig {
            start: 9,
            end: 1,
            ..Default::default()
        };
        let scanner = NetworkScanner::with_prober(config, Scripted(HashMap::new()));
        match scanner.scan().await {
            Err(ScanError::Config(ConfigError::InvalidRange { start, end })) => {
                assert_eq!((start, end), (9, 1));
            }
            other => panic!("expected range error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_report_envelope() {
        let config = loopback_config(closed_tcp_port().await, closed_tcp_port().await);
        let scanner = NetworkScanner::with_prober(config, Scripted(HashMap::new()));
        let report = scanner.report().await.unwrap();
        assert!(report.network_scan.hosts.is_empty());
        assert_eq!(report.total_count, report.network_interfaces.len());
        if report.status == ScanStatus::Failed {
            assert!(report.network_interfaces.is_empty());
        }
    }
}
