//! Wire records and the normalized transfer event

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use indexa_common::types::parse_hex_quantity;

/// A raw log record as pushed by the upstream `eth_subscription` feed.
///
/// Every field is optional: the upstream filter is signature-based only, so
/// the feed can push shapes that do not match the expected event layout.
/// Completeness rules live in the decoder, not here — any JSON object the
/// upstream emits deserializes into this type and gets a decode verdict.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLogRecord {
    /// Topic list; `topics[0]` is the event signature hash
    #[serde(default)]
    pub topics: Option<Vec<String>>,

    /// ABI-encoded non-indexed arguments, hex-encoded
    #[serde(default)]
    pub data: Option<String>,

    /// Address of the emitting contract
    #[serde(default)]
    pub address: Option<String>,

    /// Upstream-assigned block number (hex quantity or plain number)
    #[serde(default, deserialize_with = "quantity_opt")]
    pub block_number: Option<u64>,

    /// Transaction hash, when the upstream provides it
    #[serde(default)]
    pub transaction_hash: Option<String>,

    /// Position of the log within its block (hex quantity or plain number)
    #[serde(default, deserialize_with = "quantity_opt")]
    pub log_index: Option<u64>,
}

/// The normalized, persisted transfer record.
///
/// Invariant: `from`, `to`, and `value` are non-empty on every constructed
/// value — the decoder only builds one after all three decoded successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEvent {
    /// Sender address, lowercase hex
    pub from: String,
    /// Receiver address, lowercase hex
    pub to: String,
    /// Transferred amount as a base-10 string (may exceed 64 bits)
    pub value: String,
    /// Address of the emitting token contract
    pub token_address: String,
    /// Block the event was observed in
    pub block_number: i64,
    /// Transaction hash, when known; half of the dedup key
    pub transaction_hash: Option<String>,
    /// Log index within the block, when known; half of the dedup key
    pub log_index: Option<i64>,
    /// Wall-clock time the record was decoded (not the chain timestamp)
    pub observed_at: DateTime<Utc>,
}

/// Deserialize an optional JSON-RPC quantity that may arrive as a hex
/// string, a decimal string, or a plain number. Unparseable strings map to
/// `None` so the record still reaches the decoder's completeness check.
fn quantity_opt<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Quantity {
        Num(u64),
        Str(String),
    }

    Ok(match Option::<Quantity>::deserialize(deserializer)? {
        None => None,
        Some(Quantity::Num(n)) => Some(n),
        Some(Quantity::Str(s)) => parse_hex_quantity(&s).ok(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_full_log() {
        let json = r#"{
            "address": "0x1234567890abcdef1234567890abcdef12345678",
            "topics": [
                "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a1c6f9f3b3ef",
                "0x000000000000000000000000abcdef1234567890abcdef1234567890abcdef12",
                "0x000000000000000000000000fedcba0987654321fedcba0987654321fedcba09"
            ],
            "data": "0x0000000000000000000000000000000000000000000000000de0b6b3a7640000",
            "blockNumber": "0x3039",
            "transactionHash": "0xaaaa",
            "logIndex": "0x2",
            "blockHash": "0xbbbb",
            "removed": false
        }"#;

        let record: RawLogRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.topics.as_ref().unwrap().len(), 3);
        assert_eq!(record.block_number, Some(12345));
        assert_eq!(record.log_index, Some(2));
        assert_eq!(record.transaction_hash.as_deref(), Some("0xaaaa"));
    }

    #[test]
    fn test_deserialize_numeric_block_number() {
        let json = r#"{"topics": [], "data": "0x", "address": "0xabc", "blockNumber": 12345}"#;
        let record: RawLogRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.block_number, Some(12345));
    }

    #[test]
    fn test_deserialize_missing_fields() {
        let record: RawLogRecord = serde_json::from_str("{}").unwrap();
        assert_eq!(record, RawLogRecord::default());
        assert!(record.topics.is_none());
        assert!(record.data.is_none());
        assert!(record.block_number.is_none());
    }

    #[test]
    fn test_deserialize_unparseable_quantity_is_none() {
        let json = r#"{"blockNumber": "0xzz"}"#;
        let record: RawLogRecord = serde_json::from_str(json).unwrap();
        assert!(record.block_number.is_none());
    }
}
