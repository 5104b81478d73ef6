/// Vendor-specific information element decoder.
///
/// Framing-level only: splits an element into organization identifier,
/// type byte and opaque payload. The payload itself (OpenDroneID message
/// packs and the like) is not interpreted.
///
/// Element layout: `[tag 0xDD] [length] [OUI x3] [type] [payload...]`
/// where the tag and length bytes may or may not be present depending on
/// how the scan tool printed the element.
use core::fmt::Write;

use heapless::{String, Vec};

use crate::defaults::{ASTM_REMOTE_ID_OUI, ASTM_REMOTE_ID_TYPE, VENDOR_OUIS};

/// Element ID of a vendor-specific information element
pub const VENDOR_SPECIFIC_ELEMENT_ID: u8 = 0xDD;

/// OUI (3) + type (1)
pub const HEADER_LEN: usize = 4;

/// Which prefix bytes precede the organization header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VendorFraming {
    /// A 1-byte element ID leads the bytes
    pub tagged: bool,
    /// A 1-byte length follows the element ID (or leads, if untagged)
    pub length_prefixed: bool,
}

impl VendorFraming {
    /// Bytes start directly at the organization identifier
    pub const BARE: Self = Self {
        tagged: false,
        length_prefixed: false,
    };

    /// Full element as it appears in the frame: tag, length, body
    pub const ELEMENT: Self = Self {
        tagged: true,
        length_prefixed: true,
    };

    fn prefix_len(&self) -> usize {
        self.tagged as usize + self.length_prefixed as usize
    }
}

/// Decoding failure. Never fatal; the caller reports the payload as
/// present but undecodable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("vendor element truncated: {available} byte(s) after framing, header needs 4")]
    Truncated { available: usize },
}

/// A decoded vendor element borrowing its payload from the raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VendorElement<'a> {
    pub organization_id: [u8; 3],
    pub element_type: u8,
    pub payload: &'a [u8],
}

/// Decode raw element bytes.
///
/// Strips the tag and length bytes when `framing` says they are present.
/// A length byte shorter than the remaining data clips the payload; a
/// length byte promising more than is available is ignored.
pub fn decode(raw: &[u8], framing: VendorFraming) -> Result<VendorElement<'_>, DecodeError> {
    let mut rest = raw;

    if framing.tagged {
        let (&tag, tail) = rest.split_first().ok_or(DecodeError::Truncated { available: 0 })?;
        if tag != VENDOR_SPECIFIC_ELEMENT_ID {
            log::debug!("vendor element tag is 0x{:02x}, expected 0xdd", tag);
        }
        rest = tail;
    }

    if framing.length_prefixed {
        let (&len, tail) = rest.split_first().ok_or(DecodeError::Truncated { available: 0 })?;
        rest = tail;
        let len = len as usize;
        if len < rest.len() {
            rest = &rest[..len];
        } else if len > rest.len() {
            log::debug!("vendor element declares {} bytes, {} available", len, rest.len());
        }
    }

    if rest.len() < HEADER_LEN {
        return Err(DecodeError::Truncated {
            available: rest.len(),
        });
    }

    Ok(VendorElement {
        organization_id: [rest[0], rest[1], rest[2]],
        element_type: rest[3],
        payload: &rest[HEADER_LEN..],
    })
}

impl<'a> VendorElement<'a> {
    /// Serialize the element with the given framing.
    ///
    /// Returns `None` if the result does not fit in `N` bytes or the body
    /// is too long for a 1-byte length.
    pub fn encode<const N: usize>(&self, framing: VendorFraming) -> Option<Vec<u8, N>> {
        let body_len = HEADER_LEN + self.payload.len();
        if framing.length_prefixed && body_len > u8::MAX as usize {
            return None;
        }
        if framing.prefix_len() + body_len > N {
            return None;
        }

        let mut out = Vec::new();
        if framing.tagged {
            out.push(VENDOR_SPECIFIC_ELEMENT_ID).ok()?;
        }
        if framing.length_prefixed {
            out.push(body_len as u8).ok()?;
        }
        out.extend_from_slice(&self.organization_id).ok()?;
        out.push(self.element_type).ok()?;
        out.extend_from_slice(self.payload).ok()?;
        Some(out)
    }

    /// Organization identifier as lowercase hex, e.g. "fa0bbc"
    pub fn organization_hex(&self) -> String<6> {
        let mut s = String::new();
        for b in self.organization_id {
            let _ = write!(s, "{:02x}", b);
        }
        s
    }

    /// Element type as lowercase hex, e.g. "0d"
    pub fn type_hex(&self) -> String<2> {
        let mut s = String::new();
        let _ = write!(s, "{:02x}", self.element_type);
        s
    }

    /// Registered name of the organization, if it is a known one
    pub fn organization_name(&self) -> Option<&'static str> {
        known_organization(&self.organization_id)
    }

    /// ASTM F3411 Remote ID framing (OUI FA:0B:BC, type 0x0D).
    /// Says nothing about whether the message pack inside is valid.
    pub fn is_remote_id(&self) -> bool {
        self.organization_id == ASTM_REMOTE_ID_OUI && self.element_type == ASTM_REMOTE_ID_TYPE
    }
}

/// Look up a vendor OUI in the compiled-in table.
pub fn known_organization(oui: &[u8; 3]) -> Option<&'static str> {
    VENDOR_OUIS
        .iter()
        .find(|(prefix, _)| prefix == oui)
        .map(|&(_, name)| name)
}

/// Parse a hex dump such as "dd 1e fa 0b bc", "fa:0b:bc" or "dd1efa0bbc"
/// into bytes. Returns `false` if the text is not pure hex or overflows `out`.
pub fn parse_hex_dump<const N: usize>(text: &str, out: &mut Vec<u8, N>) -> bool {
    let mut high: Option<u8> = None;
    for b in text.bytes() {
        if b == b' ' || b == b':' || b == b'\t' {
            if high.is_some() {
                return false;
            }
            continue;
        }
        let Some(nibble) = crate::scanner::hex_nibble(b) else {
            return false;
        };
        match high.take() {
            None => high = Some(nibble),
            Some(h) => {
                if out.push((h << 4) | nibble).is_err() {
                    return false;
                }
            }
        }
    }
    high.is_none() && !out.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: [u8; 4] = [0xDE, 0xAD, 0xBE, 0xEF];

    fn sample() -> VendorElement<'static> {
        VendorElement {
            organization_id: [0x01, 0x02, 0x03],
            element_type: 0x04,
            payload: &PAYLOAD,
        }
    }

    // ── Decoding ────────────────────────────────────────────────────

    #[test]
    fn decode_bare_header() {
        let raw = [0x01, 0x02, 0x03, 0x04, 0xDE, 0xAD, 0xBE, 0xEF];
        let el = decode(&raw, VendorFraming::BARE).unwrap();
        assert_eq!(el, sample());
        assert_eq!(el.organization_hex(), "010203");
        assert_eq!(el.type_hex(), "04");
        assert_eq!(el.payload.len(), 4);
    }

    #[test]
    fn decode_full_element() {
        let raw = [0xDD, 0x08, 0x01, 0x02, 0x03, 0x04, 0xDE, 0xAD, 0xBE, 0xEF];
        assert_eq!(decode(&raw, VendorFraming::ELEMENT).unwrap(), sample());
    }

    #[test]
    fn encode_then_decode_each_framing() {
        for framing in [
            VendorFraming::BARE,
            VendorFraming::ELEMENT,
            VendorFraming {
                tagged: false,
                length_prefixed: true,
            },
        ] {
            let bytes: Vec<u8, 32> = sample().encode(framing).unwrap();
            assert_eq!(decode(&bytes, framing).unwrap(), sample(), "{framing:?}");
        }
    }

    #[test]
    fn decode_header_only_has_empty_payload() {
        let el = decode(&[0xFA, 0x0B, 0xBC, 0x0D], VendorFraming::BARE).unwrap();
        assert!(el.payload.is_empty());
        assert!(el.is_remote_id());
        assert_eq!(el.organization_name(), Some("ASTM Remote ID"));
    }

    #[test]
    fn decode_truncated_reports_available_bytes() {
        assert_eq!(
            decode(&[], VendorFraming::BARE),
            Err(DecodeError::Truncated { available: 0 })
        );
        assert_eq!(
            decode(&[0x01, 0x02, 0x03], VendorFraming::BARE),
            Err(DecodeError::Truncated { available: 3 })
        );
        // tag and length stripped, two bytes left
        assert_eq!(
            decode(&[0xDD, 0x02, 0x01, 0x02], VendorFraming::ELEMENT),
            Err(DecodeError::Truncated { available: 2 })
        );
        assert_eq!(
            decode(&[0xDD], VendorFraming::ELEMENT),
            Err(DecodeError::Truncated { available: 0 })
        );
    }

    #[test]
    fn length_byte_clips_trailing_bytes() {
        let raw = [0xDD, 0x05, 0x01, 0x02, 0x03, 0x04, 0xAA, 0xBB, 0xCC];
        let el = decode(&raw, VendorFraming::ELEMENT).unwrap();
        assert_eq!(el.payload, &[0xAA]);
    }

    #[test]
    fn overlong_length_byte_uses_available_bytes() {
        let raw = [0xDD, 0xFF, 0x01, 0x02, 0x03, 0x04, 0xAA];
        let el = decode(&raw, VendorFraming::ELEMENT).unwrap();
        assert_eq!(el.payload, &[0xAA]);
    }

    #[test]
    fn short_declared_length_is_truncated() {
        let raw = [0xDD, 0x02, 0x01, 0x02, 0x03, 0x04];
        assert_eq!(
            decode(&raw, VendorFraming::ELEMENT),
            Err(DecodeError::Truncated { available: 2 })
        );
    }

    #[test]
    fn encode_rejects_oversized_body() {
        let big = [0u8; 300];
        let el = VendorElement {
            organization_id: [0, 0, 0],
            element_type: 0,
            payload: &big,
        };
        assert!(el.encode::<512>(VendorFraming::ELEMENT).is_none());
        assert!(el.encode::<16>(VendorFraming::BARE).is_none());
        assert!(el.encode::<512>(VendorFraming::BARE).is_some());
    }

    #[test]
    fn unknown_organization() {
        assert_eq!(known_organization(&[0x01, 0x02, 0x03]), None);
        assert_eq!(known_organization(&[0x50, 0x6F, 0x9A]), Some("Wi-Fi Alliance"));
    }

    // ── Hex dumps ───────────────────────────────────────────────────

    #[test]
    fn hex_dump_formats() {
        let mut a: Vec<u8, 16> = Vec::new();
        assert!(parse_hex_dump("dd 05 fa 0b bc 0d 01", &mut a));
        assert_eq!(&a[..], &[0xDD, 0x05, 0xFA, 0x0B, 0xBC, 0x0D, 0x01]);

        let mut b: Vec<u8, 16> = Vec::new();
        assert!(parse_hex_dump("FA:0B:BC", &mut b));
        assert_eq!(&b[..], &[0xFA, 0x0B, 0xBC]);

        let mut c: Vec<u8, 16> = Vec::new();
        assert!(parse_hex_dump("deadbeef", &mut c));
        assert_eq!(&c[..], &PAYLOAD);
    }

    #[test]
    fn hex_dump_rejects_garbage() {
        let mut out: Vec<u8, 4> = Vec::new();
        assert!(!parse_hex_dump("", &mut out));
        out.clear();
        assert!(!parse_hex_dump("zz", &mut out));
        out.clear();
        assert!(!parse_hex_dump("a b", &mut out));
        out.clear();
        assert!(!parse_hex_dump("abc", &mut out));
        out.clear();
        assert!(!parse_hex_dump("00 11 22 33 44", &mut out));
    }
}
