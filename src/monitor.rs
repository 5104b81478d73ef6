//! Scan loop driver.
//!
//! Single-threaded: each cycle runs one bounded scan, parses it, feeds the
//! presence tracker, decodes the vendor payload of a confirmed sighting and
//! hands the results to the report sink. The stop flag is checked at the
//! top of every cycle and while waiting for the next one; a scan already in
//! flight is always allowed to finish.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::comm::{MonitorSummary, Report, ReportSink};
use crate::defaults::{
    DEFAULT_FAILURE_WARN_THRESHOLD, DEFAULT_POLL_INTERVAL_MS, DEFAULT_SCAN_TIMEOUT_MS,
    DEFAULT_STATUS_EVERY,
};
use crate::filter::TargetFilter;
use crate::presence::{Millis, PresenceConfig, PresenceEvent, PresenceTracker, TickEvents};
use crate::scanner::{self, ScanFormat, ScanRecord};
use crate::vendor;

/// Longest single sleep while waiting for the next cycle
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Why a scan produced nothing usable. Every variant counts as a miss.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    #[error("scan timed out after {0:?}")]
    TimedOut(Duration),
    #[error("scan command could not be started: {0}")]
    Spawn(String),
    #[error("scan command failed: {0}")]
    Failed(String),
    #[error("scan returned no output")]
    Empty,
    #[error("scan tool reported: {0}")]
    Sentinel(String),
}

/// External scan command.
pub trait ScanSource {
    /// Layout of the text returned by [`ScanSource::scan`]
    fn format(&self) -> ScanFormat;

    /// Run one scan, giving up after `timeout`.
    fn scan(&mut self, timeout: Duration) -> Result<String, ScanError>;
}

impl<S: ScanSource + ?Sized> ScanSource for Box<S> {
    fn format(&self) -> ScanFormat {
        (**self).format()
    }

    fn scan(&mut self, timeout: Duration) -> Result<String, ScanError> {
        (**self).scan(timeout)
    }
}

/// Driver configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub target: TargetFilter,
    pub presence: PresenceConfig,
    /// Minimum time between cycle starts
    pub poll_interval: Duration,
    /// Bound passed to every scan call
    pub scan_timeout: Duration,
    /// Consecutive scan failures that raise a degraded-source report
    pub failure_warn_threshold: u32,
    /// Status heartbeat every N cycles (0 disables)
    pub status_every: u32,
    /// Stop after this many cycles (0 runs until stopped)
    pub max_cycles: u64,
}

impl MonitorConfig {
    pub fn new(target: TargetFilter) -> Self {
        Self {
            target,
            presence: PresenceConfig::new(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            scan_timeout: Duration::from_millis(DEFAULT_SCAN_TIMEOUT_MS),
            failure_warn_threshold: DEFAULT_FAILURE_WARN_THRESHOLD,
            status_every: DEFAULT_STATUS_EVERY,
            max_cycles: 0,
        }
    }
}

/// Driver-local counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleCounters {
    pub cycles: u64,
    pub scan_failures: u64,
    pub consecutive_failures: u32,
    pub records_parsed: u64,
    /// Confirmed sightings whose vendor payload failed to decode
    pub undecodable: u64,
}

/// Owns the tracker and counters; nothing else touches them.
pub struct Monitor<S, R> {
    config: MonitorConfig,
    source: S,
    sink: R,
    tracker: PresenceTracker,
    counters: CycleCounters,
}

impl<S: ScanSource, R: ReportSink> Monitor<S, R> {
    pub fn new(config: MonitorConfig, source: S, sink: R) -> Self {
        let tracker = PresenceTracker::new(config.presence);
        Self {
            config,
            source,
            sink,
            tracker,
            counters: CycleCounters::default(),
        }
    }

    pub fn tracker(&self) -> &PresenceTracker {
        &self.tracker
    }

    pub fn counters(&self) -> &CycleCounters {
        &self.counters
    }

    pub fn sink(&self) -> &R {
        &self.sink
    }

    /// Run one poll cycle at time `now` and return the tracker's events.
    pub fn run_cycle(&mut self, now: Millis) -> TickEvents {
        self.counters.cycles += 1;

        let records = match self.source.scan(self.config.scan_timeout).and_then(check_output) {
            Ok(text) => {
                self.counters.consecutive_failures = 0;
                let mut records = Vec::new();
                let n = scanner::parse_scan_output(self.source.format(), &text, |r| records.push(r));
                self.counters.records_parsed += n as u64;
                log::debug!("cycle {}: {} record(s)", self.counters.cycles, n);
                records
            }
            Err(err) => {
                self.on_scan_failure(now, &err);
                Vec::new()
            }
        };

        let target = self.config.target.select(&records);
        let events = self
            .tracker
            .tick(now, target.is_some(), target.and_then(|r| r.staleness));

        for event in &events {
            match *event {
                PresenceEvent::BecameOnline { at } => {
                    if let Some(record) = target {
                        self.sink.report(&Report::BecameOnline { at, record });
                    }
                }
                PresenceEvent::Confirmed { at } => {
                    if let Some(record) = target {
                        self.confirm(at, record);
                    }
                }
                PresenceEvent::BecameOffline { at, last_seen_at } => {
                    self.sink.report(&Report::BecameOffline { at, last_seen_at });
                }
            }
        }

        let every = self.config.status_every as u64;
        if every > 0 && self.counters.cycles % every == 0 {
            self.sink.report(&Report::Status {
                at: now,
                cycles: self.counters.cycles,
                state: *self.tracker.state(),
            });
        }

        events
    }

    /// Run cycles until `running` is cleared (or the cycle cap is hit),
    /// then emit the summary.
    pub fn run(&mut self, running: &AtomicBool) -> MonitorSummary {
        let started = Instant::now();
        log::info!(
            "monitoring every {:?} (scan timeout {:?}, {} misses to offline)",
            self.config.poll_interval,
            self.config.scan_timeout,
            self.tracker.config().miss_threshold
        );

        while running.load(Ordering::Relaxed) {
            let cycle_start = Instant::now();
            self.run_cycle(elapsed_millis(started));

            if self.config.max_cycles > 0 && self.counters.cycles >= self.config.max_cycles {
                log::info!("cycle limit {} reached", self.config.max_cycles);
                break;
            }

            let next = cycle_start + self.config.poll_interval;
            while running.load(Ordering::Relaxed) {
                let now = Instant::now();
                if now >= next {
                    break;
                }
                thread::sleep((next - now).min(SLEEP_SLICE));
            }
        }

        self.finish(elapsed_millis(started))
    }

    /// Report and return the run summary.
    pub fn finish(&mut self, now: Millis) -> MonitorSummary {
        let summary = self.summary();
        self.sink.report(&Report::Summary { at: now, summary });
        summary
    }

    pub fn summary(&self) -> MonitorSummary {
        let state = self.tracker.state();
        MonitorSummary {
            cycles: self.counters.cycles,
            confirmed_ticks: state.total_confirmed_ticks,
            detection_rate: self.tracker.detection_rate(),
            scan_failures: self.counters.scan_failures,
            undecodable: self.counters.undecodable,
            online: state.is_online,
            last_seen_at: state.last_seen_at,
        }
    }

    fn on_scan_failure(&mut self, now: Millis, err: &ScanError) {
        self.counters.scan_failures += 1;
        self.counters.consecutive_failures = self.counters.consecutive_failures.saturating_add(1);
        log::debug!("cycle {}: {}", self.counters.cycles, err);

        if self.counters.consecutive_failures == self.config.failure_warn_threshold.max(1) {
            log::warn!(
                "scan source degraded: {} consecutive failures ({})",
                self.counters.consecutive_failures,
                err
            );
            let reason = err.to_string();
            self.sink.report(&Report::DegradedSource {
                at: now,
                consecutive_failures: self.counters.consecutive_failures,
                reason: &reason,
            });
        }
    }

    fn confirm(&mut self, at: Millis, record: &ScanRecord) {
        let vendor = record
            .vendor_payload
            .as_ref()
            .map(|p| vendor::decode(&p.bytes, p.framing));
        if let Some(Err(err)) = &vendor {
            self.counters.undecodable += 1;
            log::debug!("vendor payload present but undecodable: {}", err);
        }
        self.sink.report(&Report::Confirmed {
            at,
            record,
            vendor,
            tick: self.tracker.state().total_confirmed_ticks,
        });
    }
}

/// Map empty output and the tool's textual error sentinel onto failures.
fn check_output(text: String) -> Result<String, ScanError> {
    let Some(first) = text.lines().map(str::trim).find(|l| !l.is_empty()) else {
        return Err(ScanError::Empty);
    };
    if first.starts_with("Error") {
        return Err(ScanError::Sentinel(first.to_string()));
    }
    Ok(text)
}

fn elapsed_millis(since: Instant) -> Millis {
    since.elapsed().as_millis() as Millis
}
