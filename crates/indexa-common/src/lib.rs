//! Indexa Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling, logging, and parsing utilities for the Indexa
//! workspace.
//!
//! # Overview
//!
//! - **Error Handling**: the `IndexaError` type and `Result` alias
//! - **Logging**: centralized tracing initialization for all binaries
//! - **Types**: hex-quantity parsing shared by the wire-facing models
//!
//! # Example
//!
//! ```no_run
//! use indexa_common::logging::{init_logging, LogConfig};
//!
//! let config = LogConfig::from_env().unwrap();
//! init_logging(&config).unwrap();
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{IndexaError, Result};
