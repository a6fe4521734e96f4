//! Error types for the mirror store.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Filesystem failures while maintaining the mirror tree.
///
/// Any of these aborts the whole run: a mirror that cannot be written to is
/// not a per-provider problem.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to create a directory.
    #[error("failed to create directory {path}: {source}")]
    CreateDirFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to write (or atomically publish) a file.
    #[error("failed to write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to read a file or directory.
    #[error("failed to read {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A manifest could not be serialized.
    #[error("failed to serialize {path}: {reason}")]
    Serialize { path: PathBuf, reason: String },

    /// A blocking filesystem task panicked or was aborted.
    #[error("filesystem task failed: {reason}")]
    TaskFailed { reason: String },
}
