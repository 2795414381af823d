//! Netsweep - Command-line entry point
//!
//! Runs one subnet scan and prints the network report as JSON.

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use netsweep_core::{ScanReport, SubnetPrefix};
use netsweep_discovery::NetworkScanner;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "netsweep")]
#[command(about = "Subnet reachability scan with vendor device discovery")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "netsweep.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Shorthand for --log-level debug
    #[arg(short, long)]
    verbose: bool,

    /// Subnet prefix to scan, e.g. 172.22.10
    #[arg(long)]
    prefix: Option<SubnetPrefix>,

    /// First host octet
    #[arg(long)]
    start: Option<u8>,

    /// Last host octet
    #[arg(long)]
    end: Option<u8>,

    /// Per-probe timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Hosts probed in parallel
    #[arg(long)]
    concurrency: Option<usize>,

    /// Write the report to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print one line per host to stderr
    #[arg(long)]
    summary: bool,

    /// Write a default configuration file to --config and exit
    #[arg(long)]
    write_default_config: bool,
}

impl Args {
    fn apply_overrides(&self, config: &mut config::Config) {
        let scan = &mut config.scan;
        if let Some(prefix) = self.prefix {
            scan.prefix = prefix;
        }
        if let Some(start) = self.start {
            scan.start = start;
        }
        if let Some(end) = self.end {
            scan.end = end;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            scan.probe_timeout_ms = timeout_ms;
        }
        if let Some(concurrency) = self.concurrency {
            scan.concurrency = concurrency;
        }
    }

    fn level(&self) -> Level {
        if self.verbose {
            return Level::DEBUG;
        }
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

fn print_summary(report: &ScanReport) {
    let scan = &report.network_scan;
    eprintln!("Found {} hosts in {}:", scan.hosts.len(), scan.range);
    for host in &scan.hosts {
        let name = host.hostname.as_deref().unwrap_or("-");
        match &host.serial {
            Some(serial) => eprintln!("  {:<15} {} (serial {})", host.ip, name, serial),
            None => eprintln!("  {:<15} {}", host.ip, name),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries the report
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.level())
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Netsweep v{}", env!("CARGO_PKG_VERSION"));

    if args.write_default_config {
        config::save_default_config(&args.config)?;
        info!(path = %args.config.display(), "Wrote default configuration");
        return Ok(());
    }

    let mut config = config::load_config(&args.config)?;
    args.apply_overrides(&mut config);

    info!(
        range = %config.scan.range_label(),
        timeout_ms = config.scan.probe_timeout_ms,
        "Configuration loaded"
    );

    let scanner = NetworkScanner::new(config.scan);
    let report = scanner.report().await?;

    if args.summary {
        print_summary(&report);
    }

    let json = serde_json::to_string_pretty(&report)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!(path = %path.display(), "Report written");
        }
        None => println!("{}", json),
    }

    Ok(())
}
