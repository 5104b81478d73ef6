/// Reporting seam: structured reports out of the core, NDJSON encoding.
///
/// The monitor never formats text itself. It hands each [`Report`] to a
/// [`ReportSink`]; sinks decide how to render it. [`encode_report`] turns a
/// report into one NDJSON line for sinks that want the wire form.
use crate::filter::format_mac;
use crate::presence::{Millis, PresenceState};
use crate::protocol::{AssumedFlight, MacString, MonitorMessage, VendorField, VERSION};
use crate::scanner::ScanRecord;
use crate::vendor::{DecodeError, VendorElement};

/// Outcome of decoding a confirmed record's vendor payload
pub type VendorOutcome<'a> = Result<VendorElement<'a>, DecodeError>;

/// Run totals reported once at shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MonitorSummary {
    pub cycles: u64,
    pub confirmed_ticks: u64,
    /// Share of cycles with a confirmed sighting, 0..=1
    pub detection_rate: f32,
    pub scan_failures: u64,
    pub undecodable: u64,
    pub online: bool,
    pub last_seen_at: Option<Millis>,
}

impl MonitorSummary {
    /// Detection rate as a whole percentage
    pub fn rate_pct(&self) -> u8 {
        (self.detection_rate.clamp(0.0, 1.0) * 100.0 + 0.5) as u8
    }
}

/// One thing worth telling the outside world about.
#[derive(Debug, Clone)]
pub enum Report<'a> {
    BecameOnline {
        at: Millis,
        record: &'a ScanRecord,
    },
    BecameOffline {
        at: Millis,
        last_seen_at: Option<Millis>,
    },
    /// Fresh sighting, with the vendor payload decode if one was attached
    Confirmed {
        at: Millis,
        record: &'a ScanRecord,
        vendor: Option<VendorOutcome<'a>>,
        tick: u64,
    },
    /// Scan source failed `consecutive_failures` times in a row
    DegradedSource {
        at: Millis,
        consecutive_failures: u32,
        reason: &'a str,
    },
    /// Periodic heartbeat
    Status {
        at: Millis,
        cycles: u64,
        state: PresenceState,
    },
    Summary {
        at: Millis,
        summary: MonitorSummary,
    },
}

/// Receives reports from the monitor. Responsible for all formatting.
pub trait ReportSink {
    fn report(&mut self, report: &Report<'_>);
}

impl<S: ReportSink + ?Sized> ReportSink for &mut S {
    fn report(&mut self, report: &Report<'_>) {
        (**self).report(report)
    }
}

#[cfg(feature = "std")]
impl<S: ReportSink + ?Sized> ReportSink for Box<S> {
    fn report(&mut self, report: &Report<'_>) {
        (**self).report(report)
    }
}

// ── Serialization helpers ──────────────────────────────────────────────

/// Serialize a MonitorMessage to JSON bytes and write to the output buffer.
/// Returns the number of bytes written, or None if serialization failed.
pub fn serialize_message(msg: &MonitorMessage, buf: &mut [u8]) -> Option<usize> {
    match serde_json_core::to_slice(msg, buf) {
        Ok(len) => {
            // Append newline for NDJSON
            if len < buf.len() {
                buf[len] = b'\n';
                Some(len + 1)
            } else {
                Some(len)
            }
        }
        Err(_) => None,
    }
}

/// Encode a report as one NDJSON line.
///
/// `assumed` is attached to confirmations only; pass `None` unless demo
/// flight data was explicitly requested.
pub fn encode_report(report: &Report<'_>, assumed: Option<&AssumedFlight>, buf: &mut [u8]) -> Option<usize> {
    match report {
        Report::BecameOnline { at, record } => {
            let mut mac = MacString::new();
            format_mac(&record.identity, &mut mac);
            serialize_message(
                &MonitorMessage::Online {
                    mac: &mac,
                    ssid: &record.label,
                    ts: *at,
                },
                buf,
            )
        }
        Report::BecameOffline { at, last_seen_at } => serialize_message(
            &MonitorMessage::Offline {
                last_seen: *last_seen_at,
                ts: *at,
            },
            buf,
        ),
        Report::Confirmed {
            at,
            record,
            vendor,
            tick,
        } => {
            let mut mac = MacString::new();
            format_mac(&record.identity, &mut mac);

            let decoded = vendor.as_ref().and_then(|v| v.as_ref().ok());
            let oui = decoded.map(|el| el.organization_hex());
            let vtype = decoded.map(|el| el.type_hex());
            let field = vendor.as_ref().map(|v| match v {
                Ok(el) => VendorField {
                    status: "decoded",
                    oui: oui.as_ref(),
                    element_type: vtype.as_ref(),
                    org: el.organization_name(),
                    len: el.payload.len(),
                    remote_id: el.is_remote_id(),
                },
                Err(DecodeError::Truncated { available }) => VendorField {
                    status: "truncated",
                    oui: None,
                    element_type: None,
                    org: None,
                    len: *available,
                    remote_id: false,
                },
            });

            serialize_message(
                &MonitorMessage::Confirmed {
                    mac: &mac,
                    ssid: &record.label,
                    ch: record.channel,
                    rate: record.data_rate.as_deref(),
                    signal: record.signal_percent,
                    security: record.security.as_deref(),
                    stale_ms: record.staleness.map(|d| d.as_millis() as u64),
                    vendor: field,
                    assumed,
                    tick: *tick,
                    ts: *at,
                },
                buf,
            )
        }
        Report::DegradedSource {
            at,
            consecutive_failures,
            reason,
        } => serialize_message(
            &MonitorMessage::Degraded {
                failures: *consecutive_failures,
                reason: *reason,
                ts: *at,
            },
            buf,
        ),
        Report::Status { at, cycles, state } => serialize_message(
            &MonitorMessage::Status {
                online: state.is_online,
                cycles: *cycles,
                confirmed: state.total_confirmed_ticks,
                misses: state.consecutive_misses,
                last_seen_ago: state.last_seen_at.map(|seen| at.saturating_sub(seen)),
                ts: *at,
            },
            buf,
        ),
        Report::Summary { at, summary } => serialize_message(
            &MonitorMessage::Summary {
                cycles: summary.cycles,
                confirmed: summary.confirmed_ticks,
                rate_pct: summary.rate_pct(),
                scan_failures: summary.scan_failures,
                undecodable: summary.undecodable,
                online: summary.online,
                version: VERSION,
                ts: *at,
            },
            buf,
        ),
    }
}
