//! Report sinks: NDJSON for machines, colored lines for people.

use std::io::Write;

use beaconwatch::comm::{encode_report, Report, ReportSink};
use beaconwatch::filter::format_mac;
use beaconwatch::protocol::{AssumedFlight, MacString, MAX_MSG_LEN};
use beaconwatch::vendor::DecodeError;
use colored::Colorize;

/// One NDJSON object per report.
pub struct JsonSink<W: Write> {
    out: W,
    assumed: Option<&'static AssumedFlight>,
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W, assumed: Option<&'static AssumedFlight>) -> Self {
        Self { out, assumed }
    }
}

impl<W: Write> ReportSink for JsonSink<W> {
    fn report(&mut self, report: &Report<'_>) {
        let mut buf = [0u8; MAX_MSG_LEN];
        match encode_report(report, self.assumed, &mut buf) {
            Some(len) => {
                if let Err(e) = self.out.write_all(&buf[..len]).and_then(|_| self.out.flush()) {
                    log::warn!("report write failed: {e}");
                }
            }
            None => log::warn!("report did not fit in {MAX_MSG_LEN} bytes, dropped"),
        }
    }
}

/// Colored one-line reports.
pub struct TextSink<W: Write> {
    out: W,
    assumed: Option<&'static AssumedFlight>,
}

impl<W: Write> TextSink<W> {
    pub fn new(out: W, assumed: Option<&'static AssumedFlight>) -> Self {
        Self { out, assumed }
    }

    fn render(&self, report: &Report<'_>) -> String {
        match report {
            Report::BecameOnline { at, record } => format!(
                "{} {}  {}  {:?}",
                stamp(*at),
                "ONLINE ".green().bold(),
                mac(&record.identity).yellow(),
                record.label.as_str(),
            ),
            Report::BecameOffline { at, last_seen_at } => format!(
                "{} {}  last seen {}",
                stamp(*at),
                "OFFLINE".red().bold(),
                match last_seen_at {
                    Some(seen) => format!("{:.1}s ago", at.saturating_sub(*seen) as f64 / 1000.0),
                    None => "never".to_string(),
                }
            ),
            Report::Confirmed {
                at,
                record,
                vendor,
                tick,
            } => {
                let mut line = format!(
                    "{} {}  #{tick}  {}  {:?}",
                    stamp(*at),
                    "SEEN   ".cyan(),
                    mac(&record.identity).yellow(),
                    record.label.as_str(),
                );
                if let Some(ch) = record.channel {
                    line.push_str(&format!("  ch {ch}"));
                }
                if let Some(rate) = &record.data_rate {
                    line.push_str(&format!("  {rate}"));
                }
                if let Some(signal) = record.signal_percent {
                    line.push_str(&format!("  {signal}%"));
                }
                if let Some(security) = &record.security {
                    line.push_str(&format!("  {security}"));
                }
                if let Some(stale) = record.staleness {
                    line.push_str(&format!("  {}ms old", stale.as_millis()));
                }
                match vendor {
                    Some(Ok(el)) => {
                        line.push_str(&format!(
                            "  vendor {}/{} {} B",
                            el.organization_hex(),
                            el.type_hex(),
                            el.payload.len()
                        ));
                        if let Some(org) = el.organization_name() {
                            line.push_str(&format!(" ({org})"));
                        }
                        if el.is_remote_id() {
                            line.push_str(&format!(" {}", "[remote-id]".magenta()));
                        }
                    }
                    Some(Err(DecodeError::Truncated { available })) => {
                        line.push_str(&format!("  vendor {}", format!("truncated ({available} B)").red()));
                    }
                    None => {}
                }
                if let Some(flight) = self.assumed {
                    line.push_str(&format!(
                        "\n          {} {} @ {} {} {}  {} m MSL / {} m AGL  {} kts",
                        "assumed:".dimmed(),
                        flight.uav_id,
                        flight.location,
                        flight.latitude,
                        flight.longitude,
                        flight.altitude_msl_m,
                        flight.altitude_agl_m,
                        flight.speed_kts,
                    ));
                }
                line
            }
            Report::DegradedSource {
                at,
                consecutive_failures,
                reason,
            } => format!(
                "{} {}  {consecutive_failures} consecutive scan failures: {reason}",
                stamp(*at),
                "DEGRADED".yellow().bold(),
            ),
            Report::Status { at, cycles, state } => format!(
                "{} {}  {}  cycles {cycles}  confirmed {}  misses {}",
                stamp(*at),
                "STATUS ".dimmed(),
                if state.is_online { "online" } else { "offline" },
                state.total_confirmed_ticks,
                state.consecutive_misses,
            ),
            Report::Summary { summary, .. } => format!(
                "\n{}\n  cycles        {}\n  confirmed     {} ({}%)\n  scan failures {}\n  undecodable   {}\n  final state   {}",
                "  ── Final summary ──".bold().cyan(),
                summary.cycles,
                summary.confirmed_ticks,
                summary.rate_pct(),
                summary.scan_failures,
                summary.undecodable,
                if summary.online { "online" } else { "offline" },
            ),
        }
    }
}

impl<W: Write> ReportSink for TextSink<W> {
    fn report(&mut self, report: &Report<'_>) {
        let line = self.render(report);
        if let Err(e) = writeln!(self.out, "{line}") {
            log::warn!("report write failed: {e}");
        }
    }
}

fn mac(identity: &[u8; 6]) -> String {
    let mut s = MacString::new();
    format_mac(identity, &mut s);
    s.as_str().to_string()
}

/// "[   12.3s]"
fn stamp(at: u64) -> String {
    format!("[{:>7.1}s]", at as f64 / 1000.0)
}
