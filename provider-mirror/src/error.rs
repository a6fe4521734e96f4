//! Crate-level error type.

use thiserror::Error;

use crate::config::ConfigError;
use crate::fetch::FetchError;
use crate::provider::ReferenceError;
use crate::resolver::ResolveError;
use crate::store::StoreError;

/// Result type for mirror runs.
pub type MirrorResult<T> = Result<T, MirrorError>;

/// Everything that can go wrong while mirroring.
///
/// `Resolution`, `Fetch`, `Integrity` and `Cancelled` are scoped to a single
/// provider or archive and end up in the run report. `Store` and `Config`
/// abort the run.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// The provider could not be resolved to a version and packages.
    #[error("resolution failed: {0}")]
    Resolution(#[from] ResolveError),

    /// The archive could not be downloaded.
    #[error("download failed: {0}")]
    Fetch(FetchError),

    /// Downloaded bytes did not match the published checksum.
    #[error("integrity check failed for {filename}: expected sha256 {expected}, got {actual}")]
    Integrity {
        filename: String,
        expected: String,
        actual: String,
    },

    /// The mirror directory could not be written.
    #[error("mirror store failure: {0}")]
    Store(#[from] StoreError),

    /// Invalid input to the run.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The run was cancelled.
    #[error("cancelled")]
    Cancelled,
}

impl MirrorError {
    /// Short category name for logs and summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Resolution(_) => "resolution",
            Self::Fetch(_) => "fetch",
            Self::Integrity { .. } => "integrity",
            Self::Store(_) => "store",
            Self::Config(_) => "config",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<FetchError> for MirrorError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::ChecksumMismatch {
                filename,
                expected,
                actual,
            } => Self::Integrity {
                filename,
                expected,
                actual,
            },
            FetchError::Cancelled { .. } => Self::Cancelled,
            other => Self::Fetch(other),
        }
    }
}

impl From<ReferenceError> for MirrorError {
    fn from(e: ReferenceError) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<ConfigError> for MirrorError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
