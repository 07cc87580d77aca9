//! Ingestion orchestration
//!
//! Wires the connection manager, decoder, and sink together: storage
//! handshake before anything touches the network, then a bounded channel
//! between the transport reader and the processing loop, then a shutdown
//! path that closes storage before the transport and is bounded in time
//! even when a close call hangs.

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::IndexerConfig;
use crate::connection::{ConnectionManager, ReconnectPolicy};
use crate::decoder::{self, DecodeError};
use crate::models::RawLogRecord;
use crate::storage::EventSink;
use crate::transport::{LogFilter, Transport};

/// Sequences startup, owns the record pipeline, and drives shutdown.
pub struct IndexerOrchestrator<S: EventSink> {
    config: IndexerConfig,
    sink: S,
}

impl<S: EventSink> IndexerOrchestrator<S> {
    pub fn new(config: IndexerConfig, sink: S) -> Self {
        Self { config, sink }
    }

    /// Run until the shutdown token fires.
    ///
    /// The only error that escapes is a failed storage handshake during
    /// startup — everything after that is contained: connection failures
    /// feed the reconnect loop, record failures are dropped with a log
    /// line, and shutdown-path failures are logged and ignored.
    pub async fn run<T: Transport>(
        self,
        transport: T,
        shutdown: CancellationToken,
    ) -> Result<()> {
        self.sink
            .authenticate()
            .await
            .context("storage authentication failed; refusing to ingest without a sink")?;
        info!("storage connection verified");

        // The signature filter is fixed for the lifetime of the process.
        let filter = LogFilter::transfer();

        // Reader and processor are joined by a bounded channel so a slow
        // sink backpressures the socket instead of buffering in memory.
        let (tx, mut rx) = mpsc::channel::<RawLogRecord>(self.config.pipeline.channel_capacity);

        let policy = ReconnectPolicy::new(
            self.config.upstream.reconnect_initial_delay(),
            self.config.upstream.reconnect_max_delay(),
            self.config.upstream.reconnect_jitter,
        );
        let manager =
            ConnectionManager::new(transport, self.config.upstream.ws_url.clone(), policy);

        // Deliberately not a child of `shutdown`: the reader is cancelled
        // only after the storage connection has been closed, preserving the
        // storage-before-transport shutdown order.
        let reader_shutdown = CancellationToken::new();
        let reader = tokio::spawn(manager.run(filter, tx, reader_shutdown.clone()));

        info!("transfer event listener is now running");

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                record = rx.recv() => match record {
                    Some(record) => self.process_record(&record).await,
                    None => {
                        warn!("record channel closed by reader");
                        break;
                    }
                }
            }
        }

        self.shutdown(reader, reader_shutdown).await;
        Ok(())
    }

    /// Decode one record and hand it to the sink. Failures never escape:
    /// the record is dropped and the pipeline moves on.
    async fn process_record(&self, record: &RawLogRecord) {
        let event = match decoder::decode(record) {
            Ok(event) => event,
            Err(DecodeError::InsufficientTopics { got }) => {
                // Expected often: the upstream filter matches the signature
                // topic only, not the argument shape.
                debug!(topics = got, "dropping record with insufficient topics");
                return;
            }
            Err(DecodeError::IncompleteRecord) => {
                debug!("dropping incomplete record");
                return;
            }
            Err(err @ DecodeError::MalformedPayload { .. }) => {
                warn!(
                    error = %err,
                    contract = record.address.as_deref().unwrap_or("<unknown>"),
                    block_number = ?record.block_number,
                    "dropping undecodable record"
                );
                return;
            }
        };

        match timeout(self.config.pipeline.persist_timeout(), self.sink.create(&event)).await {
            Ok(Ok(())) => {
                info!(
                    from = %event.from,
                    to = %event.to,
                    value = %event.value,
                    token = %event.token_address,
                    block_number = event.block_number,
                    "persisted transfer"
                );
            }
            Ok(Err(e)) => {
                error!(
                    error = %e,
                    block_number = event.block_number,
                    "failed to persist transfer"
                );
            }
            Err(_) => {
                error!(
                    block_number = event.block_number,
                    "persistence call timed out"
                );
            }
        }
    }

    /// Storage first, then transport; each step bounded by the shutdown
    /// timeout and tolerated on failure so exit is never blocked.
    async fn shutdown(&self, reader: JoinHandle<()>, reader_shutdown: CancellationToken) {
        info!("shutting down ingester");
        let step_timeout = self.config.pipeline.shutdown_timeout();

        match timeout(step_timeout, self.sink.close()).await {
            Ok(Ok(())) => info!("storage connection closed"),
            Ok(Err(e)) => error!(error = %e, "error closing storage connection"),
            Err(_) => error!("timed out closing storage connection"),
        }

        reader_shutdown.cancel();
        match timeout(step_timeout, reader).await {
            Ok(Ok(())) => info!("upstream connection closed"),
            Ok(Err(e)) => error!(error = %e, "upstream reader task failed"),
            Err(_) => error!("timed out waiting for upstream connection to close"),
        }
    }
}
