/// Target selection for scan records.
///
/// A monitor watches exactly one emitter, identified by its hardware
/// address, its SSID, or both. Every configured key must match.
use crate::protocol::{MacString, NameString};
use crate::scanner::{push_truncated, ScanRecord};

/// Which emitter to track.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TargetFilter {
    /// Hardware address; compared as bytes, so text case never matters
    pub identity: Option<[u8; 6]>,
    /// SSID; compared exactly
    pub label: Option<NameString>,
}

impl TargetFilter {
    pub fn new(identity: Option<[u8; 6]>, label: Option<&str>) -> Self {
        Self {
            identity,
            label: label.map(|l| {
                let mut s = NameString::new();
                push_truncated(&mut s, l);
                s
            }),
        }
    }

    /// A filter with no keys matches nothing.
    pub fn is_configured(&self) -> bool {
        self.identity.is_some() || self.label.is_some()
    }

    /// Evaluate a record against the filter.
    pub fn matches(&self, record: &ScanRecord) -> bool {
        if !self.is_configured() {
            return false;
        }
        if let Some(id) = &self.identity {
            if *id != record.identity {
                return false;
            }
        }
        if let Some(label) = &self.label {
            if *label != record.label {
                return false;
            }
        }
        true
    }

    /// Pick the target out of a scan pass.
    ///
    /// If the tool lists the target more than once (multiple radios or a
    /// cached duplicate), the freshest entry wins.
    pub fn select<'a, I>(&self, records: I) -> Option<&'a ScanRecord>
    where
        I: IntoIterator<Item = &'a ScanRecord>,
    {
        records
            .into_iter()
            .filter(|r| self.matches(r))
            .min_by_key(|r| r.age())
    }
}

/// Format a 6-byte MAC address into "AA:BB:CC:DD:EE:FF" string
pub fn format_mac(mac: &[u8; 6], buf: &mut MacString) {
    use core::fmt::Write;
    let _ = write!(
        buf,
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;

    const TARGET: [u8; 6] = [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF];

    fn record(identity: [u8; 6], label: &str) -> ScanRecord {
        ScanRecord::new(identity, label)
    }

    #[test]
    fn identity_and_label_must_both_match() {
        let f = TargetFilter::new(Some(TARGET), Some("OP-1"));
        assert!(f.matches(&record(TARGET, "OP-1")));
        assert!(!f.matches(&record(TARGET, "OP-2")));
        assert!(!f.matches(&record([0; 6], "OP-1")));
    }

    #[test]
    fn identity_only() {
        let f = TargetFilter::new(crate::scanner::parse_identity("aa:bb:cc:dd:ee:ff"), None);
        assert!(f.matches(&record(TARGET, "anything")));
        assert!(f.matches(&record(TARGET, "")));
    }

    #[test]
    fn label_only() {
        let f = TargetFilter::new(None, Some("OP-1"));
        assert!(f.matches(&record([1, 2, 3, 4, 5, 6], "OP-1")));
        assert!(!f.matches(&record(TARGET, "op-1")));
    }

    #[test]
    fn empty_filter_matches_nothing() {
        let f = TargetFilter::default();
        assert!(!f.is_configured());
        assert!(!f.matches(&record(TARGET, "OP-1")));
    }

    #[test]
    fn select_prefers_freshest_duplicate() {
        let f = TargetFilter::new(Some(TARGET), None);
        let mut cached = record(TARGET, "OP-1");
        cached.staleness = Some(Duration::from_secs(9));
        let mut live = record(TARGET, "OP-1");
        live.staleness = Some(Duration::from_millis(100));
        let other = record([0; 6], "OP-1");

        let records = [cached, other, live];
        let picked = f.select(records.iter()).unwrap();
        assert_eq!(picked.staleness, Some(Duration::from_millis(100)));

        assert!(f.select(records[1..2].iter()).is_none());
    }

    #[test]
    fn format_mac_uppercase() {
        let mut s = MacString::new();
        format_mac(&[0x84, 0xfc, 0xe6, 0x00, 0xfc, 0x05], &mut s);
        assert_eq!(s, "84:FC:E6:00:FC:05");
    }
}
