//! Error types for hashdex
//!
//! Provides a unified error type for all operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using HashdexError
pub type Result<T> = std::result::Result<T, HashdexError>;

/// Unified error type for hashdex operations
#[derive(Debug, Error)]
pub enum HashdexError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported hash algorithm: {0}")]
    UnsupportedAlgorithm(String),

    // -------------------------------------------------------------------------
    // Index Errors
    // -------------------------------------------------------------------------
    #[error("Index directory {} does not exist", .0.display())]
    MissingIndex(PathBuf),

    #[error("Corrupt shard {}: {reason}", .path.display())]
    CorruptShard { path: PathBuf, reason: String },

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Record Source Errors
    // -------------------------------------------------------------------------
    #[error("Record source error: {0}")]
    Source(String),
}

impl HashdexError {
    /// Whether repeating the failed operation could succeed.
    ///
    /// Only interrupted system calls qualify; every other failure needs an
    /// operator to change something first.
    pub fn is_retryable(&self) -> bool {
        matches!(self, HashdexError::Io(e) if e.kind() == io::ErrorKind::Interrupted)
    }
}

impl From<serde_json::Error> for HashdexError {
    fn from(err: serde_json::Error) -> Self {
        HashdexError::Serialization(err.to_string())
    }
}
