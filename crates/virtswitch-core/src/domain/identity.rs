//! USB device identity.
//!
//! A [`DeviceIdentity`] names a *class* of USB device by its 16-bit vendor
//! and product ids, the same pair `lsusb` prints as `046d:c52b`.  It is the
//! unit of matching everywhere in virtswitch: the configuration lists the
//! identities the switch owns, and the reconciliation planner compares them
//! against the identities reported by the hypervisor.
//!
//! Equality is exact-value equality on both ids.  virtswitch never matches on
//! bus/port addressing — that is deliberately left to the hypervisor.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a hexadecimal device id string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid hexadecimal device id '{raw}'")]
pub struct ParseIdError {
    /// The offending input, verbatim.
    pub raw: String,
}

/// Parses a 16-bit device id from its hexadecimal string form.
///
/// Accepts an optional `0x`/`0X` prefix and either letter case, because
/// configuration files and libvirt descriptors disagree on both: libvirt
/// emits `0x046d`, users commonly write `046d` or `0x46D`.
///
/// # Errors
///
/// Returns [`ParseIdError`] if the digits are not valid hexadecimal or the
/// value does not fit in 16 bits.
pub fn parse_hex_id(raw: &str) -> Result<u16, ParseIdError> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    u16::from_str_radix(digits, 16).map_err(|_| ParseIdError {
        raw: raw.to_string(),
    })
}

/// The (vendor id, product id) pair naming a class of USB device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl DeviceIdentity {
    /// Creates an identity from raw 16-bit ids.
    pub const fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }

    /// Parses an identity from a pair of hexadecimal strings, as found in
    /// configuration files and libvirt descriptors.
    pub fn from_hex(vendor: &str, product: &str) -> Result<Self, ParseIdError> {
        Ok(Self {
            vendor_id: parse_hex_id(vendor)?,
            product_id: parse_hex_id(product)?,
        })
    }
}

impl fmt::Display for DeviceIdentity {
    /// Formats as `vvvv:pppp` in lowercase hex, matching `lsusb` output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.product_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_id_accepts_prefixed_lowercase() {
        assert_eq!(parse_hex_id("0x046d").unwrap(), 0x046d);
    }

    #[test]
    fn test_parse_hex_id_accepts_unprefixed_uppercase() {
        assert_eq!(parse_hex_id("C52B").unwrap(), 0xc52b);
    }

    #[test]
    fn test_parse_hex_id_accepts_surrounding_whitespace() {
        assert_eq!(parse_hex_id(" 0x1a2b ").unwrap(), 0x1a2b);
    }

    #[test]
    fn test_parse_hex_id_rejects_non_hex_digits() {
        let err = parse_hex_id("0xzz").unwrap_err();
        assert_eq!(err.raw, "0xzz");
    }

    #[test]
    fn test_parse_hex_id_rejects_values_wider_than_16_bits() {
        assert!(parse_hex_id("0x10000").is_err());
    }

    #[test]
    fn test_identity_equality_ignores_source_letter_case() {
        let from_config = DeviceIdentity::from_hex("0x046D", "0xC52B").unwrap();
        let from_descriptor = DeviceIdentity::from_hex("0x046d", "0xc52b").unwrap();
        assert_eq!(from_config, from_descriptor);
    }

    #[test]
    fn test_identity_display_is_lsusb_style() {
        let id = DeviceIdentity::new(0x046d, 0xc52b);
        assert_eq!(id.to_string(), "046d:c52b");
    }
}
