//! Ingester configuration
//!
//! All configuration is environment-derived; the ingester has no CLI
//! contract of its own beyond logging verbosity.

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// Ingester Configuration Constants
// ============================================================================

/// Default initial reconnect delay in seconds.
pub const DEFAULT_RECONNECT_INITIAL_DELAY_SECS: u64 = 5;

/// Default maximum reconnect delay in seconds.
pub const DEFAULT_RECONNECT_MAX_DELAY_SECS: u64 = 60;

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/indexa_db";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 1;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default capacity of the channel between the transport reader and the
/// processing loop.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Default timeout for a single persistence call in seconds.
pub const DEFAULT_PERSIST_TIMEOUT_SECS: u64 = 30;

/// Default per-step shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 10;

/// Ingester configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    pub upstream: UpstreamConfig,
    pub database: DatabaseConfig,
    pub pipeline: PipelineConfig,
}

/// Upstream log-stream configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// WebSocket endpoint of the JSON-RPC node (`ws://` or `wss://`)
    pub ws_url: String,
    /// Initial reconnect delay in seconds
    pub reconnect_initial_delay_secs: u64,
    /// Maximum reconnect delay in seconds
    pub reconnect_max_delay_secs: u64,
    /// Whether to apply jitter to reconnect delays
    pub reconnect_jitter: bool,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
}

/// Record pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Bounded channel capacity between reader and processor
    pub channel_capacity: usize,
    /// Timeout for a single persistence call in seconds
    pub persist_timeout_secs: u64,
    /// Timeout applied to each shutdown step in seconds
    pub shutdown_timeout_secs: u64,
}

impl IndexerConfig {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = IndexerConfig {
            upstream: UpstreamConfig {
                // INFURA_URL is the variable the surrounding deployment
                // already sets; INDEXER_WS_URL takes precedence.
                ws_url: std::env::var("INDEXER_WS_URL")
                    .or_else(|_| std::env::var("INFURA_URL"))
                    .unwrap_or_default(),
                reconnect_initial_delay_secs: std::env::var("INDEXER_RECONNECT_INITIAL_DELAY")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_RECONNECT_INITIAL_DELAY_SECS),
                reconnect_max_delay_secs: std::env::var("INDEXER_RECONNECT_MAX_DELAY")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_RECONNECT_MAX_DELAY_SECS),
                reconnect_jitter: std::env::var("INDEXER_RECONNECT_JITTER")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(true),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_MAX_CONNECTIONS),
                min_connections: std::env::var("DATABASE_MIN_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_MIN_CONNECTIONS),
                connect_timeout_secs: std::env::var("DATABASE_CONNECT_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS),
            },
            pipeline: PipelineConfig {
                channel_capacity: std::env::var("INDEXER_CHANNEL_CAPACITY")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_CHANNEL_CAPACITY),
                persist_timeout_secs: std::env::var("INDEXER_PERSIST_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_PERSIST_TIMEOUT_SECS),
                shutdown_timeout_secs: std::env::var("INDEXER_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.upstream.ws_url.is_empty() {
            anyhow::bail!(
                "Upstream WebSocket URL is required (set INDEXER_WS_URL or INFURA_URL)"
            );
        }

        if !self.upstream.ws_url.starts_with("ws://") && !self.upstream.ws_url.starts_with("wss://")
        {
            anyhow::bail!(
                "Upstream URL must use ws:// or wss://, got: {}",
                self.upstream.ws_url
            );
        }

        if self.upstream.reconnect_initial_delay_secs == 0 {
            anyhow::bail!("INDEXER_RECONNECT_INITIAL_DELAY must be greater than 0");
        }

        if self.upstream.reconnect_max_delay_secs < self.upstream.reconnect_initial_delay_secs {
            anyhow::bail!(
                "INDEXER_RECONNECT_MAX_DELAY ({}) cannot be less than the initial delay ({})",
                self.upstream.reconnect_max_delay_secs,
                self.upstream.reconnect_initial_delay_secs
            );
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        if self.pipeline.channel_capacity == 0 {
            anyhow::bail!("INDEXER_CHANNEL_CAPACITY must be greater than 0");
        }

        if self.pipeline.persist_timeout_secs == 0 {
            anyhow::bail!("INDEXER_PERSIST_TIMEOUT must be greater than 0");
        }

        Ok(())
    }
}

impl UpstreamConfig {
    /// Initial reconnect delay as a Duration
    pub fn reconnect_initial_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_initial_delay_secs)
    }

    /// Maximum reconnect delay as a Duration
    pub fn reconnect_max_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_max_delay_secs)
    }
}

impl DatabaseConfig {
    /// Connection timeout as a Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl PipelineConfig {
    /// Persistence timeout as a Duration
    pub fn persist_timeout(&self) -> Duration {
        Duration::from_secs(self.persist_timeout_secs)
    }

    /// Per-step shutdown timeout as a Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            upstream: UpstreamConfig::default(),
            database: DatabaseConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            ws_url: String::new(),
            reconnect_initial_delay_secs: DEFAULT_RECONNECT_INITIAL_DELAY_SECS,
            reconnect_max_delay_secs: DEFAULT_RECONNECT_MAX_DELAY_SECS,
            reconnect_jitter: true,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
            min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
            connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            persist_timeout_secs: DEFAULT_PERSIST_TIMEOUT_SECS,
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> IndexerConfig {
        IndexerConfig {
            upstream: UpstreamConfig {
                ws_url: "wss://mainnet.example.org/ws".to_string(),
                ..UpstreamConfig::default()
            },
            ..IndexerConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = IndexerConfig::default();
        assert_eq!(config.upstream.reconnect_initial_delay_secs, 5);
        assert_eq!(config.upstream.reconnect_max_delay_secs, 60);
        assert!(config.upstream.reconnect_jitter);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.pipeline.channel_capacity, 1024);
    }

    #[test]
    fn test_validation_valid() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validation_missing_url() {
        let config = IndexerConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_non_ws_url() {
        let mut config = valid_config();
        config.upstream.ws_url = "https://mainnet.example.org".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_zero_initial_delay() {
        let mut config = valid_config();
        config.upstream.reconnect_initial_delay_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_max_below_initial_delay() {
        let mut config = valid_config();
        config.upstream.reconnect_max_delay_secs = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_pool_bounds() {
        let mut config = valid_config();
        config.database.min_connections = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duration_helpers() {
        let config = valid_config();
        assert_eq!(
            config.upstream.reconnect_initial_delay(),
            Duration::from_secs(5)
        );
        assert_eq!(config.pipeline.persist_timeout(), Duration::from_secs(30));
        assert_eq!(config.pipeline.shutdown_timeout(), Duration::from_secs(10));
    }
}
