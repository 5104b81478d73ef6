/// Compiled-in defaults: timing and threshold values, the vendor
/// organization table, and the assumed flight profile used for demos.
///
/// Thresholds follow what the bench scripts converged on: one scan a
/// second, a 3 s scan timeout, offline after 5 consecutive misses.
use crate::protocol::AssumedFlight;

/// Minimum time between the starts of two poll cycles
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

/// Upper bound on one scan command
pub const DEFAULT_SCAN_TIMEOUT_MS: u64 = 3_000;

/// Oldest cached sighting that still counts as live
pub const DEFAULT_FRESHNESS_SECS: u64 = 3;

/// Consecutive misses before the target is declared offline
pub const DEFAULT_MISS_THRESHOLD: u32 = 5;

/// Consecutive scan failures before a degraded-source warning
pub const DEFAULT_FAILURE_WARN_THRESHOLD: u32 = 3;

/// Status heartbeat cadence in cycles (0 disables)
pub const DEFAULT_STATUS_EVERY: u32 = 5;

/// ASTM F3411 Remote ID vendor OUI (OpenDroneID over WiFi beacon)
pub const ASTM_REMOTE_ID_OUI: [u8; 3] = [0xFA, 0x0B, 0xBC];

/// Vendor type byte carrying an OpenDroneID message pack
pub const ASTM_REMOTE_ID_TYPE: u8 = 0x0D;

/// Known vendor-specific element OUIs (3-byte OUI, organization name).
pub static VENDOR_OUIS: &[([u8; 3], &str)] = &[
    // === Remote ID ===
    (ASTM_REMOTE_ID_OUI, "ASTM Remote ID"),
    // === Standards bodies ===
    ([0x50, 0x6F, 0x9A], "Wi-Fi Alliance"),
    ([0x00, 0x50, 0xF2], "Microsoft (WPA/WMM/WPS)"),
    // === Chipset vendors ===
    ([0x00, 0x10, 0x18], "Broadcom"),
    ([0x00, 0x90, 0x4C], "Epigram (Broadcom)"),
    ([0x00, 0x03, 0x7F], "Atheros"),
    ([0x8C, 0xFD, 0xF0], "Qualcomm"),
    ([0x00, 0x0C, 0x43], "Ralink"),
    ([0x00, 0xE0, 0x4C], "Realtek"),
    ([0x18, 0xFE, 0x34], "Espressif"),
    // === Infrastructure ===
    ([0x00, 0x40, 0x96], "Cisco Aironet"),
    ([0x00, 0x0B, 0x86], "Aruba"),
    ([0x00, 0x13, 0x92], "Ruckus"),
    ([0x00, 0x17, 0xF2], "Apple"),
];

/// Flight parameters the bench transmitter is programmed with.
///
/// These are NOT decoded from the beacon. They are reported only on
/// request and always tagged `"source":"assumed"`.
pub const ASSUMED_FLIGHT: AssumedFlight = AssumedFlight {
    source: "assumed",
    uav_id: "TEST-UAV-C3-001",
    location: "Aldrich Park, Irvine, CA",
    latitude: "33.6405N",
    longitude: "117.8443W",
    altitude_msl_m: 100,
    altitude_agl_m: 50,
    speed_kts: 25,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_ouis_are_unique() {
        for (i, (a, _)) in VENDOR_OUIS.iter().enumerate() {
            for (b, _) in &VENDOR_OUIS[i + 1..] {
                assert_ne!(a, b, "duplicate OUI {a:02X?}");
            }
        }
    }

    #[test]
    fn remote_id_oui_is_first() {
        assert_eq!(VENDOR_OUIS[0].0, ASTM_REMOTE_ID_OUI);
    }

    #[test]
    fn degraded_warning_precedes_offline() {
        assert!(DEFAULT_FAILURE_WARN_THRESHOLD <= DEFAULT_MISS_THRESHOLD);
    }

    #[test]
    fn assumed_flight_is_labelled() {
        assert_eq!(ASSUMED_FLIGHT.source, "assumed");
    }
}
