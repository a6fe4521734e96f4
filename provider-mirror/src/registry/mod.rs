//! Upstream registry collaborator.
//!
//! The resolver only talks to a registry through the [`RegistryClient`]
//! trait, which keeps transport, TLS and discovery out of the core and lets
//! tests substitute in-memory registries.
//!
//! [`HttpRegistryClient`] implements the provider registry protocol over
//! HTTPS:
//!
//! ```text
//! GET https://<host>/.well-known/terraform.json          → {"providers.v1": "/v1/providers/"}
//! GET <base><namespace>/<type>/versions                  → {"versions": [{"version": "2.1.0"}, ...]}
//! GET <base><namespace>/<type>/<version>/download/<os>/<arch>
//!                                                        → {"filename", "download_url", "shasum"}
//! ```

mod error;
mod http;

pub use error::{RegistryError, RegistryResult};
pub use http::HttpRegistryClient;

use semver::Version;

use crate::provider::{Platform, ProviderAddress};
use crate::BoxFuture;

/// Package details the registry reports for one version on one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryPackage {
    /// Filename as published by the registry (informational only).
    pub filename: String,
    /// Absolute URL of the archive.
    pub download_url: String,
    /// Hex SHA-256 of the archive.
    pub shasum: String,
}

/// Read-only view of an upstream provider registry.
///
/// Implementations must be `Send + Sync`; the reconciler shares one client
/// across concurrently resolving providers.
pub trait RegistryClient: Send + Sync {
    /// List every version string the registry publishes for a provider.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::NotFound`] if the registry does not know the provider
    /// - [`RegistryError::Unavailable`] on transport or authentication failure
    fn list_versions<'a>(
        &'a self,
        address: &'a ProviderAddress,
    ) -> BoxFuture<'a, RegistryResult<Vec<String>>>;

    /// Fetch the package details for one version on one platform.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::PlatformUnavailable`] if no build exists for the platform
    /// - [`RegistryError::Unavailable`] on transport or authentication failure
    fn get_package<'a>(
        &'a self,
        address: &'a ProviderAddress,
        version: &'a Version,
        platform: &'a Platform,
    ) -> BoxFuture<'a, RegistryResult<RegistryPackage>>;
}
