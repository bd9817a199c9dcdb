//! Error types for aesd-storage

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by a backing store
///
/// Any of these on the append or read-back path means the log can no longer
/// be trusted; callers treat them as fatal.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error on the backing object
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Opening the backing object failed
    #[error("Failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Removing the backing file at shutdown failed
    #[error("Failed to remove {}: {source}", path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub(crate) fn open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Open {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
