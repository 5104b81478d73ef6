/// Parser for `iw dev <if> scan` output.
///
/// Unlike nmcli, iw reports how long ago each BSS was actually heard
/// (`last seen: N ms ago`) and dumps the raw information elements, so this
/// is the source that feeds staleness and vendor payloads into a record.
///
/// ```text
/// BSS 84:fc:e6:00:fc:05(on wlan0)
///         freq: 2437
///         signal: -45.00 dBm
///         last seen: 120 ms ago
///         SSID: TEST-OP-12345
///         DS Parameter set: channel 6
///         Vendor specific: OUI fa:0b:bc, data: 0d f1 19 ...
/// ```
use core::fmt::Write;
use core::time::Duration;

use crate::scanner::{
    parse_identity, parse_staleness, push_truncated, ModeString, RateString, ScanRecord,
    SecurityString, VendorBytes, VendorPayload,
};
use crate::vendor::{self, VendorFraming, VENDOR_SPECIFIC_ELEMENT_ID};

/// Accumulates one BSS block while its lines are read.
struct BlockBuilder {
    record: ScanRecord,
    /// Highest advertised rate in units of 0.5 Mbit/s
    best_rate: u16,
    rsn: bool,
    wpa: bool,
}

impl BlockBuilder {
    fn start(line: &str) -> Option<Self> {
        let rest = line.strip_prefix("BSS ")?;
        let identity = parse_identity(rest.get(..17)?)?;
        Some(Self {
            record: ScanRecord::new(identity, ""),
            best_rate: 0,
            rsn: false,
            wpa: false,
        })
    }

    fn feed(&mut self, line: &str) {
        let line = line.trim();
        let record = &mut self.record;

        if let Some(v) = line.strip_prefix("SSID:") {
            record.label.clear();
            push_truncated(&mut record.label, v.trim());
        } else if let Some(v) = line.strip_prefix("last seen:") {
            if let Some(age) = parse_last_seen(v) {
                record.staleness = Some(age);
            }
        } else if let Some(v) = line.strip_prefix("signal:") {
            if let Some(pct) = parse_signal_dbm(v).map(dbm_to_percent) {
                record.signal_percent = Some(pct);
            }
        } else if let Some(v) = line.strip_prefix("DS Parameter set: channel") {
            record.channel = v.trim().parse().ok();
        } else if let Some(v) = line.strip_prefix("* primary channel:") {
            record.channel = v.trim().parse().ok();
        } else if let Some(v) = line.strip_prefix("freq:") {
            // DS Parameter set, when present, overrides this
            if record.channel.is_none() {
                record.channel = v.trim().split('.').next().and_then(|f| f.parse().ok()).and_then(freq_to_channel);
            }
        } else if let Some(v) = line.strip_prefix("capability:") {
            let mode = if v.contains("IBSS") {
                Some("Ad-Hoc")
            } else if v.contains("ESS") {
                Some("Infra")
            } else {
                None
            };
            record.mode = mode.map(|m| {
                let mut s = ModeString::new();
                push_truncated(&mut s, m);
                s
            });
        } else if let Some(v) = line
            .strip_prefix("Supported rates:")
            .or_else(|| line.strip_prefix("Extended supported rates:"))
        {
            for token in v.split_whitespace() {
                if let Some(half) = parse_rate_half_mbps(token.trim_end_matches('*')) {
                    self.best_rate = self.best_rate.max(half);
                }
            }
        } else if line.starts_with("RSN:") {
            self.rsn = true;
        } else if line.starts_with("WPA:") {
            self.wpa = true;
        } else if let Some(v) = line.strip_prefix("Vendor specific: OUI ") {
            if let Some(payload) = parse_vendor_specific(v) {
                self.offer_vendor(payload);
            }
        } else if let Some(at) = line.find("Unknown") {
            if let Some(payload) = parse_unknown_dump(&line[at + "Unknown".len()..]) {
                self.offer_vendor(payload);
            }
        }
    }

    /// Keep the first vendor element, unless a later one is Remote ID.
    fn offer_vendor(&mut self, payload: VendorPayload) {
        let is_remote_id = vendor::decode(&payload.bytes, payload.framing)
            .map(|el| el.is_remote_id())
            .unwrap_or(false);
        if self.record.vendor_payload.is_none() || is_remote_id {
            self.record.vendor_payload = Some(payload);
        }
    }

    fn finish(mut self) -> ScanRecord {
        if self.best_rate > 0 {
            let mut rate = RateString::new();
            let _ = if self.best_rate % 2 == 0 {
                write!(rate, "{} Mbit/s", self.best_rate / 2)
            } else {
                write!(rate, "{}.5 Mbit/s", self.best_rate / 2)
            };
            self.record.data_rate = Some(rate);
        }
        let security = match (self.wpa, self.rsn) {
            (true, true) => Some("WPA1 WPA2"),
            (false, true) => Some("WPA2"),
            (true, false) => Some("WPA1"),
            (false, false) => None,
        };
        self.record.security = security.map(|s| {
            let mut out = SecurityString::new();
            push_truncated(&mut out, s);
            out
        });
        self.record
    }
}

/// Split `iw` scan output into BSS blocks and hand each parsed record to `sink`.
pub fn parse_blocks<F: FnMut(ScanRecord)>(text: &str, mut sink: F) {
    let mut current: Option<BlockBuilder> = None;
    for line in text.lines() {
        if line.starts_with("BSS ") {
            if let Some(done) = current.take() {
                sink(done.finish());
            }
            current = BlockBuilder::start(line);
            if current.is_none() {
                log::trace!("skipped BSS header: {:?}", line);
            }
        } else if let Some(block) = current.as_mut() {
            block.feed(line);
        }
    }
    if let Some(done) = current.take() {
        sink(done.finish());
    }
}

/// "120 ms ago" -> 120 ms. The absolute "1234.5s [boottime]" form is ignored.
fn parse_last_seen(v: &str) -> Option<Duration> {
    let mut tokens = v.split_whitespace();
    let value = tokens.next()?;
    match tokens.next() {
        Some("ms") => value.parse::<u64>().ok().map(Duration::from_millis),
        Some("s") => value.parse::<u64>().ok().map(Duration::from_secs),
        Some("ago") | None => parse_staleness(value),
        _ => None,
    }
}

/// "-45.00 dBm" -> -45
fn parse_signal_dbm(v: &str) -> Option<i16> {
    let value = v.split_whitespace().next()?;
    value.split('.').next()?.parse().ok()
}

/// Map dBm onto the 0..=100 quality scale nmcli reports.
pub fn dbm_to_percent(dbm: i16) -> u8 {
    ((i32::from(dbm) + 100) * 2).clamp(0, 100) as u8
}

fn freq_to_channel(mhz: u32) -> Option<u8> {
    let ch = match mhz {
        2484 => 14,
        2412..=2472 => (mhz - 2407) / 5,
        5000..=5895 => (mhz - 5000) / 5,
        5955..=7115 => (mhz - 5950) / 5,
        _ => return None,
    };
    u8::try_from(ch).ok()
}

/// "5.5" -> 11, "54.0" -> 108 (half-Mbit/s units)
fn parse_rate_half_mbps(token: &str) -> Option<u16> {
    let (whole, frac) = token.split_once('.').unwrap_or((token, "0"));
    let whole: u16 = whole.parse().ok()?;
    let half = match frac {
        "0" | "" => 0,
        "5" => 1,
        _ => return None,
    };
    whole.checked_mul(2)?.checked_add(half)
}

/// "fa:0b:bc, data: 0d 01 02" -> bytes starting at the OUI
fn parse_vendor_specific(v: &str) -> Option<VendorPayload> {
    let (oui, data) = match v.split_once(',') {
        Some((oui, rest)) => (oui, rest.trim().strip_prefix("data:").unwrap_or("")),
        None => (v, ""),
    };
    let mut bytes = VendorBytes::new();
    if !vendor::parse_hex_dump(oui.trim(), &mut bytes) || bytes.len() != 3 {
        return None;
    }
    let data = data.trim();
    if !data.is_empty() && !vendor::parse_hex_dump(data, &mut bytes) {
        return None;
    }
    Some(VendorPayload {
        bytes,
        framing: VendorFraming::BARE,
    })
}

/// Raw element dump after an "Unknown" marker.
///
/// Two shapes carry a vendor element: " IE (221): fa 0b bc 0d 00", where iw
/// has already stripped the tag and length, and ": dd 05 fa 0b bc 0d 00",
/// the whole element. Any other element ID is not vendor data.
fn parse_unknown_dump(v: &str) -> Option<VendorPayload> {
    let v = v.trim_start();
    if let Some(rest) = v.strip_prefix("IE (") {
        let (id, tail) = rest.split_once(')')?;
        if id.trim().parse::<u8>().ok()? != VENDOR_SPECIFIC_ELEMENT_ID {
            return None;
        }
        let hex = tail.trim_start().strip_prefix(':')?;
        let mut bytes = VendorBytes::new();
        if !vendor::parse_hex_dump(hex.trim(), &mut bytes) {
            return None;
        }
        return Some(VendorPayload {
            bytes,
            framing: VendorFraming::BARE,
        });
    }

    let hex = v.strip_prefix(':')?;
    let mut bytes = VendorBytes::new();
    if !vendor::parse_hex_dump(hex.trim(), &mut bytes) {
        return None;
    }
    if bytes.first() != Some(&VENDOR_SPECIFIC_ELEMENT_ID) {
        return None;
    }
    Some(VendorPayload {
        bytes,
        framing: VendorFraming::ELEMENT,
    })
}
