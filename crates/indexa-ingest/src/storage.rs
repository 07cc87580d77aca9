//! Event persistence
//!
//! The sink side of the pipeline: one `create` call per successfully
//! decoded record. The ingester never retries a failed insert — the
//! upstream has already pushed the record and it is not recoverable — so
//! the sink's only obligations are to not lose writes it acknowledged and
//! to absorb re-delivered records without duplicating rows.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::debug;

use indexa_common::IndexaError;

use crate::config::DatabaseConfig;
use crate::models::TransferEvent;

/// Storage collaborator interface.
#[async_trait]
pub trait EventSink: Send + Sync + 'static {
    /// Verify the storage connection. Called once at startup; failure is
    /// fatal to the process.
    async fn authenticate(&self) -> Result<(), IndexaError>;

    /// Persist one normalized transfer event.
    async fn create(&self, event: &TransferEvent) -> Result<(), IndexaError>;

    /// Release the storage connection. Failures are logged by the caller
    /// and never block shutdown.
    async fn close(&self) -> Result<(), IndexaError>;
}

/// PostgreSQL-backed event sink.
#[derive(Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    /// Build the connection pool and run pending migrations.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, IndexaError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout())
            .connect(&config.url)
            .await
            .map_err(|e| IndexaError::Database(e.to_string()))?;

        sqlx::migrate!("../../migrations")
            .run(&pool)
            .await
            .map_err(|e| IndexaError::Database(format!("migration failed: {e}")))?;

        Ok(Self { pool })
    }

    /// Access the underlying pool (shared with the query-serving layer).
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl EventSink for PgEventStore {
    async fn authenticate(&self) -> Result<(), IndexaError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| IndexaError::Database(e.to_string()))?;
        Ok(())
    }

    async fn create(&self, event: &TransferEvent) -> Result<(), IndexaError> {
        // Resubscribing without a cursor can re-deliver recent logs; the
        // partial unique index on (transaction_hash, log_index) makes the
        // re-delivery a no-op instead of a duplicate row.
        let result = sqlx::query(
            r#"
            INSERT INTO transfer_events
                (from_address, to_address, value, token_address, block_number,
                 transaction_hash, log_index, observed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (transaction_hash, log_index)
                WHERE transaction_hash IS NOT NULL AND log_index IS NOT NULL
                DO NOTHING
            "#,
        )
        .bind(&event.from)
        .bind(&event.to)
        .bind(&event.value)
        .bind(&event.token_address)
        .bind(event.block_number)
        .bind(&event.transaction_hash)
        .bind(event.log_index)
        .bind(event.observed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| IndexaError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            debug!(
                transaction_hash = ?event.transaction_hash,
                log_index = ?event.log_index,
                "skipped re-delivered transfer"
            );
        }

        Ok(())
    }

    async fn close(&self) -> Result<(), IndexaError> {
        self.pool.close().await;
        Ok(())
    }
}
