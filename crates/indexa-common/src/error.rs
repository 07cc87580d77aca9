//! Error types for Indexa

use thiserror::Error;

/// Result type alias for Indexa operations
pub type Result<T> = std::result::Result<T, IndexaError>;

/// Main error type for Indexa
#[derive(Error, Debug)]
pub enum IndexaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Transport error: {0}")]
    Transport(String),
}
