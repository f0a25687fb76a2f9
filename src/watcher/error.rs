//! Error types for the file watcher.

use std::path::PathBuf;
use thiserror::Error;

use crate::error::IndexError;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to initialize watcher: {reason}")]
    InitFailed { reason: String },

    #[error("Cannot watch path {path}: {reason}")]
    PathWatchFailed { path: PathBuf, reason: String },
}

impl From<notify::Error> for WatchError {
    fn from(e: notify::Error) -> Self {
        WatchError::InitFailed {
            reason: e.to_string(),
        }
    }
}

impl From<WatchError> for IndexError {
    fn from(e: WatchError) -> Self {
        IndexError::WatchStartFailure { reason: e.to_string() }
    }
}
