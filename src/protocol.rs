/// JSON message protocol for reporting monitor results.
///
/// All messages are newline-delimited JSON (NDJSON), one object per line,
/// tagged by a `type` field. Uses `heapless` types for no_std/no-alloc
/// operation.
use heapless::String;
use serde::Serialize;

/// Maximum length for MAC address strings ("AA:BB:CC:DD:EE:FF")
pub type MacString = String<18>;

/// Maximum length for SSID strings
pub type NameString = String<33>;

/// Vendor organization identifier as hex ("fa0bbc")
pub type OuiString = String<6>;

/// Vendor element type as hex ("0d")
pub type TypeString = String<2>;

/// Flight parameters the transmitter is assumed to broadcast.
///
/// Display data only, never decoded from the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AssumedFlight {
    /// Always "assumed"
    pub source: &'static str,
    pub uav_id: &'static str,
    pub location: &'static str,
    pub latitude: &'static str,
    pub longitude: &'static str,
    pub altitude_msl_m: u16,
    pub altitude_agl_m: u16,
    pub speed_kts: u16,
}

/// Framing-level result of decoding a vendor payload
#[derive(Debug, Clone, Serialize)]
pub struct VendorField<'a> {
    /// "decoded" or "truncated"
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oui: Option<&'a OuiString>,
    #[serde(rename = "vtype", skip_serializing_if = "Option::is_none")]
    pub element_type: Option<&'a TypeString>,
    /// Registered organization name, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org: Option<&'static str>,
    /// Payload bytes after the header, or bytes available when truncated
    pub len: usize,
    pub remote_id: bool,
}

/// Messages emitted by the monitor
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum MonitorMessage<'a> {
    /// Target came online
    #[serde(rename = "online")]
    Online {
        mac: &'a MacString,
        ssid: &'a NameString,
        /// Milliseconds since monitor start
        ts: u64,
    },
    /// Target went offline
    #[serde(rename = "offline")]
    Offline {
        #[serde(skip_serializing_if = "Option::is_none")]
        last_seen: Option<u64>,
        ts: u64,
    },
    /// Fresh sighting of the target
    #[serde(rename = "confirmed")]
    Confirmed {
        mac: &'a MacString,
        ssid: &'a NameString,
        #[serde(skip_serializing_if = "Option::is_none")]
        ch: Option<u8>,
        #[serde(skip_serializing_if = "Option::is_none")]
        rate: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        signal: Option<u8>,
        #[serde(skip_serializing_if = "Option::is_none")]
        security: Option<&'a str>,
        /// Staleness the scan tool reported, if any
        #[serde(skip_serializing_if = "Option::is_none")]
        stale_ms: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        vendor: Option<VendorField<'a>>,
        /// Demo flight data, only when requested
        #[serde(skip_serializing_if = "Option::is_none")]
        assumed: Option<&'a AssumedFlight>,
        /// Running count of confirmed ticks
        tick: u64,
        ts: u64,
    },
    /// Scan source failing repeatedly
    #[serde(rename = "degraded")]
    Degraded {
        failures: u32,
        reason: &'a str,
        ts: u64,
    },
    /// Periodic heartbeat
    #[serde(rename = "status")]
    Status {
        online: bool,
        cycles: u64,
        confirmed: u64,
        misses: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        last_seen_ago: Option<u64>,
        ts: u64,
    },
    /// Final statistics on shutdown
    #[serde(rename = "summary")]
    Summary {
        cycles: u64,
        confirmed: u64,
        /// Detection rate, whole percent
        rate_pct: u8,
        scan_failures: u64,
        undecodable: u64,
        online: bool,
        version: &'static str,
        ts: u64,
    },
}

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum size of a serialized JSON message
pub const MAX_MSG_LEN: usize = 768;

#[cfg(test)]
mod tests {
    use super::*;

    fn to_json(msg: &MonitorMessage) -> std::string::String {
        let mut buf = [0u8; MAX_MSG_LEN];
        let len = serde_json_core::to_slice(msg, &mut buf).unwrap();
        core::str::from_utf8(&buf[..len]).unwrap().into()
    }

    // ── MonitorMessage serialization ────────────────────────────────

    #[test]
    fn serialize_online_message() {
        let mac = MacString::try_from("84:FC:E6:00:FC:05").unwrap();
        let ssid = NameString::try_from("TEST-OP-12345").unwrap();
        let json = to_json(&MonitorMessage::Online {
            mac: &mac,
            ssid: &ssid,
            ts: 1000,
        });
        assert!(json.contains(r#""type":"online""#));
        assert!(json.contains(r#""mac":"84:FC:E6:00:FC:05""#));
        assert!(json.contains(r#""ssid":"TEST-OP-12345""#));
        assert!(json.contains(r#""ts":1000"#));
    }

    #[test]
    fn serialize_offline_without_last_seen_omits_field() {
        let json = to_json(&MonitorMessage::Offline {
            last_seen: None,
            ts: 9000,
        });
        assert!(json.contains(r#""type":"offline""#));
        assert!(!json.contains("last_seen"));
    }

    #[test]
    fn serialize_confirmed_with_vendor() {
        let mac = MacString::try_from("AA:BB:CC:DD:EE:FF").unwrap();
        let ssid = NameString::try_from("OP-1").unwrap();
        let oui = OuiString::try_from("fa0bbc").unwrap();
        let vtype = TypeString::try_from("0d").unwrap();
        let json = to_json(&MonitorMessage::Confirmed {
            mac: &mac,
            ssid: &ssid,
            ch: Some(6),
            rate: Some("65 Mbit/s"),
            signal: Some(100),
            security: None,
            stale_ms: Some(120),
            vendor: Some(VendorField {
                status: "decoded",
                oui: Some(&oui),
                element_type: Some(&vtype),
                org: Some("ASTM Remote ID"),
                len: 25,
                remote_id: true,
            }),
            assumed: None,
            tick: 3,
            ts: 2000,
        });
        assert!(json.contains(r#""type":"confirmed""#));
        assert!(json.contains(r#""ch":6"#));
        assert!(json.contains(r#""rate":"65 Mbit/s""#));
        assert!(json.contains(r#""stale_ms":120"#));
        assert!(json.contains(r#""oui":"fa0bbc""#));
        assert!(json.contains(r#""vtype":"0d""#));
        assert!(json.contains(r#""remote_id":true"#));
        assert!(!json.contains("security"));
        assert!(!json.contains("assumed"));
    }

    #[test]
    fn serialize_truncated_vendor_omits_header_fields() {
        let mac = MacString::try_from("AA:BB:CC:DD:EE:FF").unwrap();
        let ssid = NameString::new();
        let json = to_json(&MonitorMessage::Confirmed {
            mac: &mac,
            ssid: &ssid,
            ch: None,
            rate: None,
            signal: None,
            security: None,
            stale_ms: None,
            vendor: Some(VendorField {
                status: "truncated",
                oui: None,
                element_type: None,
                org: None,
                len: 2,
                remote_id: false,
            }),
            assumed: None,
            tick: 1,
            ts: 0,
        });
        assert!(json.contains(r#""status":"truncated""#));
        assert!(json.contains(r#""len":2"#));
        assert!(!json.contains("oui"));
        assert!(!json.contains("vtype"));
    }

    #[test]
    fn assumed_flight_is_labelled_in_output() {
        let mac = MacString::try_from("AA:BB:CC:DD:EE:FF").unwrap();
        let ssid = NameString::new();
        let json = to_json(&MonitorMessage::Confirmed {
            mac: &mac,
            ssid: &ssid,
            ch: None,
            rate: None,
            signal: None,
            security: None,
            stale_ms: None,
            vendor: None,
            assumed: Some(&crate::defaults::ASSUMED_FLIGHT),
            tick: 1,
            ts: 0,
        });
        assert!(json.contains(r#""assumed":{"source":"assumed""#));
        assert!(json.contains(r#""uav_id":"TEST-UAV-C3-001""#));
    }

    #[test]
    fn serialize_degraded_and_summary() {
        let json = to_json(&MonitorMessage::Degraded {
            failures: 3,
            reason: "scan timed out",
            ts: 3000,
        });
        assert!(json.contains(r#""type":"degraded""#));
        assert!(json.contains(r#""failures":3"#));

        let json = to_json(&MonitorMessage::Summary {
            cycles: 10,
            confirmed: 4,
            rate_pct: 40,
            scan_failures: 2,
            undecodable: 0,
            online: false,
            version: VERSION,
            ts: 10_000,
        });
        assert!(json.contains(r#""type":"summary""#));
        assert!(json.contains(r#""rate_pct":40"#));
    }

    // ── Version constant ────────────────────────────────────────────

    #[test]
    fn version_is_semver() {
        let parts: heapless::Vec<&str, 4> = VERSION.split('.').collect();
        assert_eq!(
            parts.len(),
            3,
            "VERSION should be semver (major.minor.patch)"
        );
        for part in &parts {
            assert!(part.parse::<u32>().is_ok(), "'{part}' is not a number");
        }
    }
}
