//! Error types for artifact fetching.

use thiserror::Error;

/// Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Errors that can occur while fetching an archive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Network failure worth retrying (timeout, reset, 5xx, 429).
    #[error("transient failure downloading {url}: {reason}")]
    Transient { url: String, reason: String },

    /// The server refused the request in a way retrying will not fix.
    #[error("download of {url} rejected: {reason}")]
    Rejected { url: String, reason: String },

    /// Transient failures persisted through every allowed attempt.
    #[error("gave up downloading {url} after {attempts} attempt(s): {reason}")]
    Exhausted {
        url: String,
        attempts: u32,
        reason: String,
    },

    /// Downloaded bytes do not hash to the published checksum.
    #[error("checksum mismatch for {filename}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        filename: String,
        expected: String,
        actual: String,
    },

    /// The run was cancelled while the download was pending.
    #[error("download of {url} cancelled")]
    Cancelled { url: String },
}

impl FetchError {
    /// Whether the failure is eligible for another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}
