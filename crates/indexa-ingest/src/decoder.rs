//! Raw log decoding
//!
//! Pure translation from a [`RawLogRecord`] to a [`TransferEvent`]. Every
//! failure is a value, never a panic — the caller drops the record and the
//! pipeline keeps running.

use chrono::Utc;
use thiserror::Error;

use crate::abi::{self, AbiValue};
use crate::models::{RawLogRecord, TransferEvent};

/// Why a raw record could not be decoded.
///
/// The upstream filter matches on the signature topic only, so records
/// with other shapes are an expected, frequent condition rather than an
/// exceptional one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer than the three topics a transfer carries (signature + from + to)
    #[error("insufficient topics: got {got}, need 3")]
    InsufficientTopics { got: usize },

    /// Record is missing `data`, `address`, or `blockNumber`
    #[error("record missing required fields")]
    IncompleteRecord,

    /// Topic or data payload failed to decode
    #[error("malformed payload: {detail}")]
    MalformedPayload { detail: String },
}

impl From<abi::AbiError> for DecodeError {
    fn from(err: abi::AbiError) -> Self {
        DecodeError::MalformedPayload {
            detail: err.to_string(),
        }
    }
}

/// Decode one raw log record into a normalized transfer event.
///
/// On success the returned event satisfies the persistence invariant
/// (non-empty `from`, `to`, `value`) and needs no further validation by
/// the sink. `observed_at` is stamped with the wall clock at decode time;
/// the chain's own block timestamp is never fetched.
pub fn decode(record: &RawLogRecord) -> Result<TransferEvent, DecodeError> {
    let topics = record.topics.as_deref().unwrap_or(&[]);
    if topics.len() < 3 {
        return Err(DecodeError::InsufficientTopics { got: topics.len() });
    }

    let (Some(data), Some(address), Some(block_number)) = (
        record.data.as_deref(),
        record.address.as_deref(),
        record.block_number,
    ) else {
        return Err(DecodeError::IncompleteRecord);
    };

    let from = abi::decode_address(&topics[1])?;
    let to = abi::decode_address(&topics[2])?;
    let value = AbiValue::BigInt(abi::decode_uint256(data)?).into_decimal();

    let block_number = i64::try_from(block_number).map_err(|_| DecodeError::MalformedPayload {
        detail: format!("block number {block_number} out of range"),
    })?;

    Ok(TransferEvent {
        from,
        to,
        value,
        token_address: address.to_ascii_lowercase(),
        block_number,
        transaction_hash: record.transaction_hash.clone(),
        log_index: record.log_index.and_then(|i| i64::try_from(i).ok()),
        observed_at: Utc::now(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SIG: &str = "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a1c6f9f3b3ef";
    const FROM_TOPIC: &str =
        "0x000000000000000000000000abcdef1234567890abcdef1234567890abcdef12";
    const TO_TOPIC: &str =
        "0x000000000000000000000000fedcba0987654321fedcba0987654321fedcba09";
    const ONE_ETHER: &str =
        "0x0000000000000000000000000000000000000000000000000de0b6b3a7640000";

    fn valid_record() -> RawLogRecord {
        RawLogRecord {
            topics: Some(vec![
                SIG.to_string(),
                FROM_TOPIC.to_string(),
                TO_TOPIC.to_string(),
            ]),
            data: Some(ONE_ETHER.to_string()),
            address: Some("0x1234567890abcdef1234567890abcdef12345678".to_string()),
            block_number: Some(12345),
            transaction_hash: Some("0xdeadbeef".to_string()),
            log_index: Some(7),
        }
    }

    #[test]
    fn test_decode_valid_transfer() {
        let event = decode(&valid_record()).unwrap();

        assert_eq!(event.from, "0xabcdef1234567890abcdef1234567890abcdef12");
        assert_eq!(event.to, "0xfedcba0987654321fedcba0987654321fedcba09");
        assert_eq!(event.value, "1000000000000000000");
        assert_eq!(
            event.token_address,
            "0x1234567890abcdef1234567890abcdef12345678"
        );
        assert_eq!(event.block_number, 12345);
        assert_eq!(event.transaction_hash.as_deref(), Some("0xdeadbeef"));
        assert_eq!(event.log_index, Some(7));
    }

    #[test]
    fn test_decode_satisfies_persistence_invariant() {
        let event = decode(&valid_record()).unwrap();
        assert!(!event.from.is_empty());
        assert!(!event.to.is_empty());
        assert!(!event.value.is_empty());
    }

    #[test]
    fn test_decode_normalizes_token_address_case() {
        let mut record = valid_record();
        record.address = Some("0x1234567890ABCDEF1234567890ABCDEF12345678".to_string());
        let event = decode(&record).unwrap();
        assert_eq!(
            event.token_address,
            "0x1234567890abcdef1234567890abcdef12345678"
        );
    }

    #[test]
    fn test_decode_insufficient_topics() {
        let mut record = valid_record();
        record.topics = Some(vec![SIG.to_string()]);
        assert_eq!(
            decode(&record),
            Err(DecodeError::InsufficientTopics { got: 1 })
        );
    }

    #[test]
    fn test_decode_absent_topics() {
        let mut record = valid_record();
        record.topics = None;
        assert_eq!(
            decode(&record),
            Err(DecodeError::InsufficientTopics { got: 0 })
        );
    }

    #[test]
    fn test_decode_empty_record() {
        assert_eq!(
            decode(&RawLogRecord::default()),
            Err(DecodeError::InsufficientTopics { got: 0 })
        );
    }

    #[test]
    fn test_decode_missing_data() {
        let mut record = valid_record();
        record.data = None;
        assert_eq!(decode(&record), Err(DecodeError::IncompleteRecord));
    }

    #[test]
    fn test_decode_missing_address() {
        let mut record = valid_record();
        record.address = None;
        assert_eq!(decode(&record), Err(DecodeError::IncompleteRecord));
    }

    #[test]
    fn test_decode_missing_block_number() {
        let mut record = valid_record();
        record.block_number = None;
        assert_eq!(decode(&record), Err(DecodeError::IncompleteRecord));
    }

    #[test]
    fn test_decode_malformed_topic() {
        let mut record = valid_record();
        record.topics = Some(vec![
            SIG.to_string(),
            "0x1234".to_string(), // not a 32-byte slot
            TO_TOPIC.to_string(),
        ]);
        assert!(matches!(
            decode(&record),
            Err(DecodeError::MalformedPayload { .. })
        ));
    }

    #[test]
    fn test_decode_malformed_data() {
        let mut record = valid_record();
        record.data = Some("0xnot-hex".to_string());
        assert!(matches!(
            decode(&record),
            Err(DecodeError::MalformedPayload { .. })
        ));
    }

    #[test]
    fn test_decode_value_beyond_u64() {
        let mut record = valid_record();
        // 2^65
        record.data = Some(
            "0x0000000000000000000000000000000000000000000000020000000000000000".to_string(),
        );
        let event = decode(&record).unwrap();
        assert_eq!(event.value, "36893488147419103232");
    }

    #[test]
    fn test_decode_missing_dedup_key_is_tolerated() {
        let mut record = valid_record();
        record.transaction_hash = None;
        record.log_index = None;
        let event = decode(&record).unwrap();
        assert!(event.transaction_hash.is_none());
        assert!(event.log_index.is_none());
    }
}
