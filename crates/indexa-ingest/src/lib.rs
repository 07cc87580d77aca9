//! Transfer event ingestion
//!
//! Long-running ingester for ERC-20 `Transfer` events: subscribes to an
//! Ethereum JSON-RPC log stream over WebSocket, decodes each raw log into
//! a normalized transfer record, and persists it to PostgreSQL.
//!
//! # Architecture
//!
//! - **config**: environment-derived configuration (`INDEXER_*`,
//!   `DATABASE_*` variables)
//! - **models**: raw wire records and the normalized transfer event
//! - **abi**: ABI decoding primitives (topics, `uint256` data, signature
//!   hash)
//! - **decoder**: per-record decoding with the drop-on-failure taxonomy
//! - **transport**: the upstream log-stream interface and its WebSocket
//!   implementation
//! - **connection**: connection lifecycle state machine and reconnect
//!   backoff
//! - **storage**: the event sink interface and its PostgreSQL
//!   implementation
//! - **orchestrator**: startup sequencing, the record pipeline, and
//!   shutdown

pub mod abi;
pub mod config;
pub mod connection;
pub mod decoder;
pub mod models;
pub mod orchestrator;
pub mod storage;
pub mod transport;

pub use config::{DatabaseConfig, IndexerConfig, PipelineConfig, UpstreamConfig};
pub use connection::{ConnectionManager, ConnectionState, ReconnectPolicy};
pub use decoder::{decode, DecodeError};
pub use models::{RawLogRecord, TransferEvent};
pub use orchestrator::IndexerOrchestrator;
pub use storage::{EventSink, PgEventStore};
pub use transport::{LogFilter, Transport, TransportError, TransportSession, WsTransport};
