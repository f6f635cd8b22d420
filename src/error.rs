//! Error types for the Neurogen brain engine
//!
//! This module provides structured error handling using thiserror. Every
//! persistence boundary returns these errors; the evolution path logs them
//! instead of propagating.

use crate::config::ConfigError;
use thiserror::Error;

/// Main error type for Neurogen operations
#[derive(Error, Debug)]
pub enum BrainError {
    /// Archival database operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Connection pool could not hand out or run a connection
    #[error("Connection pool error: {0}")]
    Pool(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Persisted record was written by a newer schema
    #[error("Unsupported schema version {found} (supported up to {supported})")]
    UnsupportedSchema { found: u32, supported: u32 },

    /// State holds a value that cannot be persisted (NaN or infinity)
    #[error("Non-finite value in {0}")]
    NonFinite(String),

    /// Background flush scheduler failure
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Result type alias for Neurogen operations
pub type Result<T> = std::result::Result<T, BrainError>;

impl From<rusqlite::Error> for BrainError {
    fn from(err: rusqlite::Error) -> Self {
        BrainError::Database(err.to_string())
    }
}
