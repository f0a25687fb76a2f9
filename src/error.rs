//! Crate-level error types.
//!
//! File- and backend-level failures are recoverable and normally logged and
//! swallowed by the caller; only project-level failures propagate.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Failed to parse {path}: {reason}")]
    ParseFailure { path: PathBuf, reason: String },

    #[error("Backend '{backend}' unavailable: {reason}")]
    BackendUnavailable { backend: String, reason: String },

    #[error("All extraction methods failed for project '{project}'")]
    AllBackendsFailed { project: String },

    #[error("Incremental update failed: {reason}")]
    IncrementalApplyFailure { reason: String },

    #[error("Failed to start monitoring: {reason}")]
    WatchStartFailure { reason: String },

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),

    #[error("{0}")]
    General(String),
}

pub type IndexResult<T> = Result<T, IndexError>;
