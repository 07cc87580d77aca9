//! Shared parsing helpers for wire-facing types
//!
//! Ethereum JSON-RPC encodes quantities as `0x`-prefixed hex strings
//! (`"0x12d4"`), but some upstreams and older middleware emit plain
//! decimal strings or JSON numbers. The helpers here accept both string
//! forms; numeric JSON values are handled at the serde layer.

use crate::error::{IndexaError, Result};

/// Parse a JSON-RPC quantity string into a `u64`.
///
/// Accepts `0x`-prefixed hexadecimal (`"0x12d4"`) and plain decimal
/// (`"4820"`) representations.
pub fn parse_hex_quantity(s: &str) -> Result<u64> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        if hex.is_empty() {
            return Err(IndexaError::Parse(format!("empty hex quantity: {s:?}")));
        }
        u64::from_str_radix(hex, 16)
            .map_err(|e| IndexaError::Parse(format!("invalid hex quantity {s:?}: {e}")))
    } else {
        s.parse::<u64>()
            .map_err(|e| IndexaError::Parse(format!("invalid decimal quantity {s:?}: {e}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_quantity_hex() {
        assert_eq!(parse_hex_quantity("0x3039").unwrap(), 12345);
        assert_eq!(parse_hex_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_hex_quantity("0X1A").unwrap(), 26);
    }

    #[test]
    fn test_parse_hex_quantity_decimal() {
        assert_eq!(parse_hex_quantity("12345").unwrap(), 12345);
        assert_eq!(parse_hex_quantity(" 7 ").unwrap(), 7);
    }

    #[test]
    fn test_parse_hex_quantity_invalid() {
        assert!(parse_hex_quantity("0x").is_err());
        assert!(parse_hex_quantity("0xzz").is_err());
        assert!(parse_hex_quantity("not-a-number").is_err());
        assert!(parse_hex_quantity("-3").is_err());
    }
}
