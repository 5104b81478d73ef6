/// Scan record model and scan-tool output parsing.
///
/// The external scan tool is unreliable and its output is only loosely
/// structured, so every parser here is total: a line or block that does not
/// look like an emitter entry yields no record, never an error.
///
/// Three layouts are understood:
/// - `nmcli dev wifi list` columns (`IN-USE BSSID SSID MODE CHAN RATE SIGNAL BARS SECURITY`)
/// - `nmcli -t` terse output (colon-delimited, `\:` escaped)
/// - `iw dev <if> scan` blocks (see [`crate::iw`])
use core::time::Duration;

use heapless::{String, Vec};

use crate::protocol::NameString;
use crate::vendor::VendorFraming;

/// Maximum vendor element size: 1 (tag) + 1 (length) + 255 (body)
pub const MAX_VENDOR_LEN: usize = 257;

/// Maximum whitespace tokens considered on one tabular line
const MAX_TOKENS: usize = 32;

/// Maximum fields considered on one terse line
const MAX_TERSE_FIELDS: usize = 10;

/// Data rate text, e.g. "65 Mbit/s"
pub type RateString = String<16>;

/// Security descriptor text, e.g. "WPA1 WPA2"
pub type SecurityString = String<32>;

/// Operating mode text, e.g. "Infra"
pub type ModeString = String<8>;

/// Raw vendor element bytes as captured by the scan tool
pub type VendorBytes = Vec<u8, MAX_VENDOR_LEN>;

/// Vendor element bytes together with how they were framed on capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorPayload {
    pub bytes: VendorBytes,
    pub framing: VendorFraming,
}

/// One emitter entry observed in a single scan pass.
///
/// Built fresh from every pass and dropped at the end of it; the presence
/// tracker only keeps what it derives from the record.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRecord {
    /// Hardware address of the emitter (BSSID)
    pub identity: [u8; 6],
    /// SSID; empty when hidden
    pub label: NameString,
    pub mode: Option<ModeString>,
    pub channel: Option<u8>,
    pub data_rate: Option<RateString>,
    /// Signal quality 0..=100
    pub signal_percent: Option<u8>,
    pub security: Option<SecurityString>,
    /// Age reported by the tool. `None` means observed in this pass.
    pub staleness: Option<Duration>,
    pub vendor_payload: Option<VendorPayload>,
}

impl ScanRecord {
    /// Create a record with only identity and label set.
    pub fn new(identity: [u8; 6], label: &str) -> Self {
        let mut l = NameString::new();
        push_truncated(&mut l, label);
        Self {
            identity,
            label: l,
            mode: None,
            channel: None,
            data_rate: None,
            signal_percent: None,
            security: None,
            staleness: None,
            vendor_payload: None,
        }
    }

    /// Effective age of the sighting (zero when the tool reported none).
    pub fn age(&self) -> Duration {
        self.staleness.unwrap_or(Duration::ZERO)
    }
}

/// Layout of the scan tool's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanFormat {
    NmcliTabular,
    NmcliTerse,
    IwBlocks,
}

impl ScanFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanFormat::NmcliTabular => "nmcli",
            ScanFormat::NmcliTerse => "nmcli-terse",
            ScanFormat::IwBlocks => "iw",
        }
    }
}

/// Parse a full scan output and hand every recognised record to `sink`.
///
/// Returns the number of records produced.
pub fn parse_scan_output<F: FnMut(ScanRecord)>(format: ScanFormat, text: &str, mut sink: F) -> usize {
    let mut count = 0;
    match format {
        ScanFormat::NmcliTabular | ScanFormat::NmcliTerse => {
            for line in text.lines() {
                let record = if format == ScanFormat::NmcliTabular {
                    parse_nmcli_line(line)
                } else {
                    parse_terse_line(line)
                };
                match record {
                    Some(record) => {
                        count += 1;
                        sink(record);
                    }
                    None => log::trace!("skipped scan line: {:?}", line),
                }
            }
        }
        ScanFormat::IwBlocks => {
            crate::iw::parse_blocks(text, |record| {
                count += 1;
                sink(record);
            });
        }
    }
    count
}

/// Parse an address of the form "AA:BB:CC:DD:EE:FF" (either case).
pub fn parse_identity(s: &str) -> Option<[u8; 6]> {
    let bytes = s.as_bytes();
    if bytes.len() != 17 {
        return None;
    }
    let mut out = [0u8; 6];
    for (i, slot) in out.iter_mut().enumerate() {
        let at = i * 3;
        if i > 0 && bytes[at - 1] != b':' {
            return None;
        }
        *slot = (hex_nibble(bytes[at])? << 4) | hex_nibble(bytes[at + 1])?;
    }
    Some(out)
}

pub(crate) fn hex_nibble(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Parse a staleness token: "800ms", "12s" or a bare number of seconds.
pub fn parse_staleness(token: &str) -> Option<Duration> {
    let (digits, millis) = if let Some(d) = token.strip_suffix("ms") {
        (d, true)
    } else if let Some(d) = token.strip_suffix('s') {
        (d, false)
    } else {
        (token, false)
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n: u64 = digits.parse().ok()?;
    Some(if millis {
        Duration::from_millis(n)
    } else {
        Duration::from_secs(n)
    })
}

/// Parse one line of `nmcli dev wifi list` output.
///
/// Column order: `[*] BSSID SSID MODE CHAN RATE SIGNAL [BARS] SECURITY [STALENESS]`.
/// The SSID may contain spaces, and may itself contain a mode word and a
/// number ("My AP 2"), so every mode word followed by a numeric channel is
/// a candidate and the last one whose trailing columns parse wins. The rate
/// is usually two tokens ("65" "Mbit/s"); the unit is detected by looking
/// at the next token, so an absent rate ("--") does not shift the later
/// columns.
pub fn parse_nmcli_line(line: &str) -> Option<ScanRecord> {
    let mut tokens: Vec<&str, MAX_TOKENS> = line.split_whitespace().take(MAX_TOKENS).collect();
    if tokens.first() == Some(&"*") {
        tokens.remove(0);
    }

    let identity = parse_identity(tokens.first()?)?;

    (2..tokens.len())
        .rev()
        .filter(|&i| is_mode(tokens[i]) && tokens.get(i + 1).and_then(|t| t.parse::<u8>().ok()).is_some())
        .find_map(|mode_at| nmcli_columns(identity, &tokens, mode_at))
}

/// Build a record assuming the mode column sits at `mode_at`.
fn nmcli_columns(identity: [u8; 6], tokens: &[&str], mode_at: usize) -> Option<ScanRecord> {
    let mut record = ScanRecord::new(identity, "");
    for (n, part) in tokens[1..mode_at].iter().enumerate() {
        if n > 0 {
            let _ = record.label.push(' ');
        }
        push_truncated(&mut record.label, part);
    }
    if record.label == "--" {
        record.label.clear();
    }
    record.mode = placeholder(tokens[mode_at]).map(to_string);
    record.channel = tokens[mode_at + 1].parse().ok();

    let mut idx = mode_at + 2;

    // Rate: number (or "--") plus optional unit token
    let rate = *tokens.get(idx)?;
    idx += 1;
    if let Some(value) = placeholder(rate) {
        value.parse::<f32>().ok()?;
        let mut merged = RateString::new();
        push_truncated(&mut merged, value);
        if let Some(unit) = tokens.get(idx).filter(|t| is_rate_unit(t)) {
            let _ = merged.push(' ');
            push_truncated(&mut merged, unit);
            idx += 1;
        }
        record.data_rate = Some(merged);
    }

    // Signal must be numeric (or "--"), otherwise the columns are misaligned
    let signal = *tokens.get(idx)?;
    idx += 1;
    record.signal_percent = match placeholder(signal) {
        Some(s) => Some(s.parse::<u8>().ok()?.min(100)),
        None => None,
    };

    if tokens.get(idx).is_some_and(|t| is_bars(t)) {
        idx += 1;
    }

    let mut rest = &tokens[idx.min(tokens.len())..];
    if let Some((last, head)) = rest.split_last() {
        if let Some(age) = parse_staleness(last) {
            record.staleness = Some(age);
            rest = head;
        }
    }
    record.security = join_security(rest.iter().copied());

    Some(record)
}

/// Parse one line of `nmcli -t` output.
///
/// Fields: `[IN-USE:]BSSID:SSID:MODE:CHAN:RATE:SIGNAL:BARS:SECURITY[:STALENESS]`
pub fn parse_terse_line(line: &str) -> Option<ScanRecord> {
    let fields = split_terse(line)?;
    let mut fields: &[String<64>] = &fields;

    if parse_identity(fields.first()?).is_none() {
        // Leading IN-USE column ("*" or blank)
        let first = fields.first()?.trim();
        if first.is_empty() || first == "*" {
            fields = &fields[1..];
        }
    }
    if fields.len() < 6 {
        return None;
    }

    let identity = parse_identity(fields[0].trim())?;
    let mut record = ScanRecord::new(identity, fields[1].as_str());
    if record.label == "--" {
        record.label.clear();
    }
    record.mode = placeholder(fields[2].trim()).map(to_string);
    record.channel = fields[3].trim().parse().ok();

    if let Some(rate) = placeholder(fields[4].trim()) {
        let mut merged = RateString::new();
        for (n, part) in rate.split_whitespace().enumerate() {
            if n > 0 {
                let _ = merged.push(' ');
            }
            push_truncated(&mut merged, part);
        }
        record.data_rate = Some(merged);
    }

    record.signal_percent = match placeholder(fields[5].trim()) {
        Some(s) => Some(s.parse::<u8>().ok()?.min(100)),
        None => None,
    };

    if let Some(security) = fields.get(7) {
        record.security = join_security(security.split_whitespace());
    }
    record.staleness = fields.get(8).and_then(|s| parse_staleness(s.trim()));

    Some(record)
}

/// Split a terse line on unescaped ':' and unescape `\:` / `\\`.
fn split_terse(line: &str) -> Option<Vec<String<64>, MAX_TERSE_FIELDS>> {
    let mut fields: Vec<String<64>, MAX_TERSE_FIELDS> = Vec::new();
    let mut current = String::<64>::new();
    let mut escaped = false;
    for c in line.trim_end_matches(&['\r', '\n'][..]).chars() {
        if escaped {
            let _ = current.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == ':' {
            fields.push(core::mem::take(&mut current)).ok()?;
        } else {
            let _ = current.push(c);
        }
    }
    fields.push(current).ok()?;
    Some(fields)
}

fn is_mode(token: &str) -> bool {
    matches!(token, "Infra" | "Ad-Hoc" | "Mesh" | "AP" | "--")
}

fn is_rate_unit(token: &str) -> bool {
    token.ends_with("/s")
}

/// Signal-quality glyph: "▂▄▆█", "▂▄__", or "***" / "**__" in non-UTF8 locales.
fn is_bars(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| matches!(c, '▂' | '▄' | '▆' | '█' | '_' | '*'))
}

/// `None` for the "--" placeholder nmcli prints for absent fields
fn placeholder(token: &str) -> Option<&str> {
    if token == "--" || token.is_empty() {
        None
    } else {
        Some(token)
    }
}

fn join_security<'a, I: Iterator<Item = &'a str>>(parts: I) -> Option<SecurityString> {
    let mut out = SecurityString::new();
    for part in parts {
        if part == "--" {
            continue;
        }
        if !out.is_empty() {
            let _ = out.push(' ');
        }
        push_truncated(&mut out, part);
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

fn to_string<const N: usize>(s: &str) -> String<N> {
    let mut out = String::new();
    push_truncated(&mut out, s);
    out
}

/// Append as much of `s` as fits, never splitting a UTF-8 character.
pub(crate) fn push_truncated<const N: usize>(out: &mut String<N>, s: &str) {
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
}
