//! Upstream log-stream transport
//!
//! The ingester talks to the upstream node through the [`Transport`] /
//! [`TransportSession`] seam: `connect` yields a session, `subscribe`
//! establishes the log feed, and `next_record` pulls one raw record at a
//! time. A session is single-use — after an error or a clean end the
//! caller closes it and connects a fresh one.
//!
//! [`WsTransport`] is the production implementation: Ethereum JSON-RPC
//! pub/sub (`eth_subscribe` / `eth_subscription`) over WebSocket.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, warn};

use crate::abi::{topic_hex, transfer_signature_hash};
use crate::models::RawLogRecord;

/// JSON-RPC request id used for the single subscribe call per session.
const SUBSCRIBE_REQUEST_ID: u64 = 1;

/// Transport-level failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("subscribe failed: {0}")]
    Subscribe(String),

    #[error("read failed: {0}")]
    Read(String),
}

/// Log filter sent with the subscription request.
///
/// Topic position 0 matches the event signature hash; the filter is
/// signature-based only, so same-signature events of other shapes will
/// still be delivered and must be tolerated downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub topics: Vec<String>,
}

impl LogFilter {
    /// Filter for ERC-20 `Transfer(address,address,uint256)` logs.
    pub fn transfer() -> Self {
        Self {
            topics: vec![topic_hex(&transfer_signature_hash())],
        }
    }
}

/// Factory for upstream sessions; one fresh session per (re)connect.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    type Session: TransportSession + Send + 'static;

    async fn connect(&self, url: &str) -> Result<Self::Session, TransportError>;
}

/// One live connection plus at most one live subscription.
#[async_trait]
pub trait TransportSession: Send {
    /// Establish the log subscription; returns the upstream subscription id.
    async fn subscribe(&mut self, filter: &LogFilter) -> Result<String, TransportError>;

    /// Pull the next raw record. `None` means the upstream ended the
    /// stream cleanly; `Some(Err(_))` is a transport or subscription
    /// error. Both require a reconnect.
    async fn next_record(&mut self) -> Option<Result<RawLogRecord, TransportError>>;

    /// Tear the connection down. Best effort — failures are swallowed, the
    /// session is discarded either way.
    async fn close(&mut self);
}

/// WebSocket JSON-RPC transport.
#[derive(Debug, Clone, Default)]
pub struct WsTransport;

impl WsTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for WsTransport {
    type Session = WsSession;

    async fn connect(&self, url: &str) -> Result<WsSession, TransportError> {
        let (stream, _response) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        Ok(WsSession { stream })
    }
}

/// A live WebSocket session speaking Ethereum pub/sub.
pub struct WsSession {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl TransportSession for WsSession {
    async fn subscribe(&mut self, filter: &LogFilter) -> Result<String, TransportError> {
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": SUBSCRIBE_REQUEST_ID,
            "method": "eth_subscribe",
            "params": ["logs", { "topics": filter.topics }],
        });

        self.stream
            .send(Message::Text(request.to_string().into()))
            .await
            .map_err(|e| TransportError::Subscribe(e.to_string()))?;

        // Read until the ack for our request id arrives.
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    let Ok(value) = serde_json::from_str::<Value>(text.as_str()) else {
                        continue;
                    };
                    if value.get("id").and_then(Value::as_u64) != Some(SUBSCRIBE_REQUEST_ID) {
                        continue;
                    }
                    if let Some(err) = value.get("error") {
                        return Err(TransportError::Subscribe(err.to_string()));
                    }
                    let Some(id) = value.get("result").and_then(Value::as_str) else {
                        return Err(TransportError::Subscribe(
                            "subscribe ack carried no subscription id".to_string(),
                        ));
                    };
                    return Ok(id.to_string());
                }
                Some(Ok(Message::Ping(payload))) => {
                    let _ = self.stream.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(_))) | None => {
                    return Err(TransportError::Subscribe(
                        "connection closed before subscribe ack".to_string(),
                    ));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(TransportError::Subscribe(e.to_string())),
            }
        }
    }

    async fn next_record(&mut self) -> Option<Result<RawLogRecord, TransportError>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    if let Some(record) = parse_notification(text.as_str()) {
                        return Some(Ok(record));
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    let _ = self.stream.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "upstream sent close frame");
                    return None;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Some(Err(TransportError::Read(e.to_string()))),
                None => return None,
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.stream.send(Message::Close(None)).await;
    }
}

/// Extract the log object from an `eth_subscription` notification frame.
///
/// Acks, unrelated methods, and unparseable frames return `None` and are
/// skipped; the completeness of the log object itself is judged by the
/// decoder, not here.
fn parse_notification(text: &str) -> Option<RawLogRecord> {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "skipping unparseable frame from upstream");
            return None;
        }
    };

    if value.get("method").and_then(Value::as_str) != Some("eth_subscription") {
        return None;
    }

    let result = value.pointer("/params/result")?.clone();
    match serde_json::from_value::<RawLogRecord>(result) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(error = %e, "skipping notification with non-object payload");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_filter_topic() {
        let filter = LogFilter::transfer();
        assert_eq!(
            filter.topics,
            vec!["0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a1c6f9f3b3ef"
                .to_string()]
        );
    }

    #[test]
    fn test_parse_notification_log() {
        let frame = r#"{
            "jsonrpc": "2.0",
            "method": "eth_subscription",
            "params": {
                "subscription": "0x9cef478923ff08bf67fde6c64013158d",
                "result": {
                    "address": "0x1234567890abcdef1234567890abcdef12345678",
                    "topics": ["0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a1c6f9f3b3ef"],
                    "data": "0x00",
                    "blockNumber": "0x3039"
                }
            }
        }"#;

        let record = parse_notification(frame).unwrap();
        assert_eq!(record.block_number, Some(12345));
        assert_eq!(record.topics.unwrap().len(), 1);
    }

    #[test]
    fn test_parse_notification_skips_ack() {
        let ack = r#"{"jsonrpc":"2.0","id":1,"result":"0x9cef478923ff08bf67fde6c64013158d"}"#;
        assert!(parse_notification(ack).is_none());
    }

    #[test]
    fn test_parse_notification_skips_garbage() {
        assert!(parse_notification("not json at all").is_none());
        assert!(parse_notification(r#"{"method":"eth_subscription","params":{"result":42}}"#)
            .is_none());
    }
}
