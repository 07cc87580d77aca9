//! ABI decoding primitives
//!
//! Topics are 32-byte slots: `topics[0]` carries the keccak-256 fingerprint
//! of the event signature, `topics[1..]` carry the indexed parameters,
//! ABI-padded to 32 bytes each. The `data` payload carries the non-indexed
//! parameters; for a `Transfer` event that is a single `uint256`.

use alloy_primitives::{hex, keccak256, B256, U256};
use thiserror::Error;

/// Canonical ERC-20 transfer event signature.
pub const TRANSFER_EVENT_SIGNATURE: &str = "Transfer(address,address,uint256)";

/// Number of bytes in a topic slot.
const TOPIC_LEN: usize = 32;

/// Number of bytes in an EVM address.
const ADDRESS_LEN: usize = 20;

/// ABI decoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AbiError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("wrong topic length: expected {expected} bytes, got {got}")]
    WrongLength { expected: usize, got: usize },

    #[error("empty data payload")]
    EmptyPayload,
}

/// Keccak-256 hash of an event signature string.
///
/// Computed once at startup to build the subscription filter.
pub fn event_signature_hash(signature: &str) -> B256 {
    keccak256(signature.as_bytes())
}

/// The subscription topic for `Transfer(address,address,uint256)`.
pub fn transfer_signature_hash() -> B256 {
    event_signature_hash(TRANSFER_EVENT_SIGNATURE)
}

/// Render a 32-byte hash as a `0x`-prefixed lowercase hex string.
pub fn topic_hex(hash: &B256) -> String {
    format!("0x{}", hex::encode(hash))
}

/// Decode an indexed `address` parameter from a topic.
///
/// The address occupies the low-order 20 bytes of the 32-byte slot; the
/// high-order 12 bytes are ABI padding. Output is lowercase `0x` hex.
pub fn decode_address(topic: &str) -> Result<String, AbiError> {
    let bytes = decode_hex(topic)?;
    if bytes.len() != TOPIC_LEN {
        return Err(AbiError::WrongLength {
            expected: TOPIC_LEN,
            got: bytes.len(),
        });
    }
    Ok(format!(
        "0x{}",
        hex::encode(&bytes[TOPIC_LEN - ADDRESS_LEN..])
    ))
}

/// Decode a `uint256` parameter from a data payload.
///
/// ABI encodes the value in the first 32 bytes of the payload; shorter
/// even-length payloads are accepted as the big-endian value itself, which
/// is how upstream decoders treat them.
pub fn decode_uint256(data: &str) -> Result<U256, AbiError> {
    let bytes = decode_hex(data)?;
    if bytes.is_empty() {
        return Err(AbiError::EmptyPayload);
    }
    let slot = if bytes.len() > TOPIC_LEN {
        &bytes[..TOPIC_LEN]
    } else {
        &bytes[..]
    };
    Ok(U256::from_be_slice(slot))
}

fn decode_hex(s: &str) -> Result<Vec<u8>, AbiError> {
    let stripped = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    hex::decode(stripped).map_err(|e| AbiError::InvalidHex(format!("{s:?}: {e}")))
}

/// A decoded numeric value as different ABI libraries surface it: already
/// a decimal string, a big integer, or a small machine integer.
///
/// All three shapes normalize through [`AbiValue::into_decimal`] to one
/// canonical base-10 string; the stored `value` column never depends on
/// which shape the decoder produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    Str(String),
    BigInt(U256),
    Num(i64),
}

impl AbiValue {
    /// Normalize to the canonical decimal string representation.
    pub fn into_decimal(self) -> String {
        match self {
            AbiValue::Str(s) => s,
            AbiValue::BigInt(v) => v.to_string(),
            AbiValue::Num(n) => n.to_string(),
        }
    }
}
