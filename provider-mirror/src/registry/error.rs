//! Error types for registry queries.

use thiserror::Error;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors reported by a [`super::RegistryClient`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The registry does not know this provider.
    #[error("provider {provider} not found in registry")]
    NotFound { provider: String },

    /// The version exists but has no build for the platform.
    #[error("provider {provider} v{version} has no package for {platform}")]
    PlatformUnavailable {
        provider: String,
        version: String,
        platform: String,
    },

    /// Transport, TLS, authentication or server failure.
    #[error("registry request to {url} failed: {reason}")]
    Unavailable { url: String, reason: String },

    /// The registry answered with something we could not understand.
    #[error("invalid registry response from {url}: {reason}")]
    InvalidResponse { url: String, reason: String },
}
