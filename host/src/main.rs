//! # beaconwatch-host
//!
//! Watches for one WiFi beacon (typically a Remote-ID transmitter) using the
//! system's scan tools, and reports when it comes online, each confirmed
//! sighting, and when it drops off.
//!
//! | Source        | Tool                                | Staleness | Vendor IE |
//! |---------------|-------------------------------------|-----------|-----------|
//! | `nmcli`       | `nmcli dev wifi list`               | no        | no        |
//! | `nmcli-terse` | `nmcli -t dev wifi list`            | no        | no        |
//! | `iw`          | `iw dev <if> scan` (root)           | yes       | yes       |
//!
//! ```text
//! beaconwatch-host --bssid 84:FC:E6:00:FC:05 --ssid TEST-OP-12345
//! sudo beaconwatch-host --bssid 84:FC:E6:00:FC:05 --source iw --interface wlan0 --format text
//! ```
//!
//! Reports go to stdout, logs to stderr (`RUST_LOG` to adjust).

mod sink;
mod source;

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use beaconwatch::comm::ReportSink;
use beaconwatch::defaults::{
    ASSUMED_FLIGHT, DEFAULT_FAILURE_WARN_THRESHOLD, DEFAULT_FRESHNESS_SECS, DEFAULT_MISS_THRESHOLD,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_SCAN_TIMEOUT_MS, DEFAULT_STATUS_EVERY,
};
use beaconwatch::filter::TargetFilter;
use beaconwatch::monitor::{Monitor, MonitorConfig, ScanSource};
use beaconwatch::presence::PresenceConfig;
use beaconwatch::protocol::VERSION;
use beaconwatch::scanner;
use clap::{Parser, ValueEnum};

use sink::{JsonSink, TextSink};
use source::{IwSource, NmcliSource};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SourceKind {
    /// `nmcli dev wifi list`, column output
    Nmcli,
    /// `nmcli -t dev wifi list`, colon-delimited
    NmcliTerse,
    /// `iw dev <if> scan`
    Iw,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// NDJSON, one object per line
    Json,
    /// Colored human-readable lines
    Text,
}

#[derive(Parser, Debug)]
#[command(name = env!("CARGO_PKG_NAME"))]
#[command(version, about = "Beacon presence monitor with vendor IE decoding")]
struct Cli {
    /// Target hardware address (AA:BB:CC:DD:EE:FF).
    #[arg(short, long)]
    bssid: Option<String>,

    /// Target SSID (exact match).
    #[arg(short, long)]
    ssid: Option<String>,

    /// Scan tool to poll.
    #[arg(long, value_enum, default_value_t = SourceKind::Nmcli)]
    source: SourceKind,

    /// WiFi interface.  Required for `iw`, optional for nmcli.
    #[arg(short, long)]
    interface: Option<String>,

    /// Ask NetworkManager to rescan before each listing.
    #[arg(long)]
    rescan: bool,

    /// Minimum time between cycle starts (ms).
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    interval_ms: u64,

    /// Per-scan timeout (ms).
    #[arg(long, default_value_t = DEFAULT_SCAN_TIMEOUT_MS)]
    timeout_ms: u64,

    /// Oldest sighting still counted as live (s).
    #[arg(long, default_value_t = DEFAULT_FRESHNESS_SECS)]
    freshness_secs: u64,

    /// Consecutive misses before the target is declared offline.
    #[arg(long, default_value_t = DEFAULT_MISS_THRESHOLD)]
    miss_threshold: u32,

    /// Consecutive scan failures before warning about the source.
    #[arg(long, default_value_t = DEFAULT_FAILURE_WARN_THRESHOLD)]
    failure_threshold: u32,

    /// Status heartbeat every N cycles (0 disables).
    #[arg(long, default_value_t = DEFAULT_STATUS_EVERY)]
    status_every: u32,

    /// Report format.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Attach the assumed test-flight profile to confirmations.
    #[arg(long)]
    assumed_profile: bool,

    /// Stop after N cycles (0 runs until interrupted).
    #[arg(long, default_value_t = 0)]
    max_cycles: u64,
}

impl Cli {
    fn target(&self) -> anyhow::Result<TargetFilter> {
        let identity = match &self.bssid {
            Some(text) => Some(
                scanner::parse_identity(text.trim())
                    .with_context(|| format!("invalid --bssid {text:?}, expected AA:BB:CC:DD:EE:FF"))?,
            ),
            None => None,
        };
        if identity.is_none() && self.ssid.is_none() {
            bail!("at least one of --bssid or --ssid is required");
        }
        if let Some(ssid) = &self.ssid {
            if ssid.len() > 32 {
                bail!("--ssid is longer than 32 bytes");
            }
        }
        Ok(TargetFilter::new(identity, self.ssid.as_deref()))
    }

    fn monitor_config(&self) -> anyhow::Result<MonitorConfig> {
        let mut config = MonitorConfig::new(self.target()?);
        config.presence = PresenceConfig::new()
            .with_miss_threshold(self.miss_threshold)
            .with_freshness(Duration::from_secs(self.freshness_secs));
        config.poll_interval = Duration::from_millis(self.interval_ms);
        config.scan_timeout = Duration::from_millis(self.timeout_ms.max(1));
        config.failure_warn_threshold = self.failure_threshold;
        config.status_every = self.status_every;
        config.max_cycles = self.max_cycles;
        Ok(config)
    }

    fn scan_source(&self) -> anyhow::Result<Box<dyn ScanSource>> {
        Ok(match self.source {
            SourceKind::Nmcli | SourceKind::NmcliTerse => Box::new(NmcliSource::new(
                self.source == SourceKind::NmcliTerse,
                self.interface.clone(),
                self.rescan,
            )),
            SourceKind::Iw => {
                let Some(interface) = self.interface.clone() else {
                    bail!("--source iw needs --interface");
                };
                Box::new(IwSource::new(interface))
            }
        })
    }

    fn report_sink(&self) -> Box<dyn ReportSink> {
        let assumed = self.assumed_profile.then_some(&ASSUMED_FLIGHT);
        match self.format {
            OutputFormat::Json => Box::new(JsonSink::new(io::stdout(), assumed)),
            OutputFormat::Text => Box::new(TextSink::new(io::stdout(), assumed)),
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();
    let config = cli.monitor_config()?;
    let source = cli.scan_source()?;
    let sink = cli.report_sink();

    log::info!(
        "beaconwatch v{} watching {} via {}",
        VERSION,
        describe_target(&cli),
        source.format().as_str()
    );
    if cli.assumed_profile {
        log::info!("assumed flight profile attached to confirmations (not decoded from the wire)");
    }

    // ── Ctrl-C handler ──────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || {
            log::info!("interrupt received, finishing current cycle");
            running.store(false, Ordering::Relaxed);
        })
        .context("failed to set Ctrl-C handler")?;
    }

    // ── Poll loop ───────────────────────────────────────────────────────
    let mut monitor = Monitor::new(config, source, sink);
    let summary = monitor.run(&running);

    log::info!(
        "done: {} cycles, {} confirmed, target {}",
        summary.cycles,
        summary.confirmed_ticks,
        if summary.online { "online" } else { "offline" }
    );
    Ok(())
}

fn describe_target(cli: &Cli) -> String {
    match (&cli.bssid, &cli.ssid) {
        (Some(bssid), Some(ssid)) => format!("{bssid} / {ssid:?}"),
        (Some(bssid), None) => bssid.clone(),
        (None, Some(ssid)) => format!("{ssid:?}"),
        (None, None) => "nothing".into(),
    }
}
