//! Upstream version resolution.
//!
//! The resolver turns a [`ProviderRequirement`] and a platform set into a
//! [`Resolution`]: one concrete version plus one [`PlatformPackage`] per
//! platform the registry has a build for. It performs no writes; the result
//! is a plan that the reconciler executes.

use std::sync::Arc;

use futures::future::join_all;
use semver::Version;
use thiserror::Error;
use tracing::{debug, warn};

use crate::provider::{archive_filename, Platform, PlatformPackage, ProviderAddress, ProviderRequirement};
use crate::registry::{RegistryClient, RegistryError};

/// Result type for resolution.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Errors that abort resolution of a single provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// No published version satisfies the constraint, or the provider is unknown.
    #[error("no version of {provider} satisfies constraint {constraint}")]
    NotFound {
        provider: String,
        constraint: String,
    },

    /// The registry could not be reached or answered nonsensically.
    #[error("registry unavailable while resolving {provider}: {source}")]
    RegistryUnavailable {
        provider: String,
        #[source]
        source: RegistryError,
    },

    /// The chosen version has no build for any requested platform.
    #[error("{provider} v{version} has no package for any of: {platforms}")]
    NoPlatformBuild {
        provider: String,
        version: String,
        platforms: String,
    },

    /// Resolution was asked for an empty platform set.
    #[error("no target platforms given for {provider}")]
    NoPlatforms { provider: String },
}

/// A resolved provider version and the packages to mirror for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub address: ProviderAddress,
    pub version: Version,
    /// One package per available platform, in request order.
    pub packages: Vec<PlatformPackage>,
    /// Requested platforms the registry has no build for.
    pub omitted: Vec<Platform>,
}

/// Resolves requirements against a [`RegistryClient`].
#[derive(Clone)]
pub struct UpstreamResolver {
    client: Arc<dyn RegistryClient>,
}

impl UpstreamResolver {
    /// Create a resolver over a registry client.
    pub fn new(client: Arc<dyn RegistryClient>) -> Self {
        Self { client }
    }

    /// Pick a version for `requirement` and enumerate its platform packages.
    ///
    /// Platforms without a build are reported in [`Resolution::omitted`];
    /// resolution only fails for missing builds when every platform is missing.
    pub async fn resolve(
        &self,
        requirement: &ProviderRequirement,
        platforms: &[Platform],
    ) -> ResolveResult<Resolution> {
        let address = &requirement.address;
        if platforms.is_empty() {
            return Err(ResolveError::NoPlatforms {
                provider: address.to_string(),
            });
        }

        let version = self.select_version(requirement).await?;
        debug!(provider = %address, version = %version, "Selected version");

        let lookups = platforms
            .iter()
            .map(|platform| self.client.get_package(address, &version, platform));
        let results = join_all(lookups).await;

        let mut packages = Vec::with_capacity(platforms.len());
        let mut omitted = Vec::new();
        for (platform, result) in platforms.iter().zip(results) {
            match result {
                Ok(pkg) => {
                    let filename = archive_filename(address, &version, platform);
                    if pkg.filename != filename {
                        debug!(
                            provider = %address,
                            upstream = %pkg.filename,
                            mirrored = %filename,
                            "Registry filename differs from mirror naming"
                        );
                    }
                    packages.push(PlatformPackage {
                        platform: platform.clone(),
                        filename,
                        checksum: pkg.shasum.trim().to_ascii_lowercase(),
                        download_url: pkg.download_url,
                    });
                }
                Err(RegistryError::PlatformUnavailable { .. }) => {
                    warn!(
                        provider = %address,
                        version = %version,
                        platform = %platform,
                        "No package available for platform, omitting"
                    );
                    omitted.push(platform.clone());
                }
                Err(e) => {
                    return Err(ResolveError::RegistryUnavailable {
                        provider: address.to_string(),
                        source: e,
                    })
                }
            }
        }

        if packages.is_empty() {
            return Err(ResolveError::NoPlatformBuild {
                provider: address.to_string(),
                version: version.to_string(),
                platforms: platforms
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }

        Ok(Resolution {
            address: address.clone(),
            version,
            packages,
            omitted,
        })
    }

    async fn select_version(&self, requirement: &ProviderRequirement) -> ResolveResult<Version> {
        let address = &requirement.address;
        let not_found = || ResolveError::NotFound {
            provider: address.to_string(),
            constraint: requirement.constraint.to_string(),
        };

        let listed = match self.client.list_versions(address).await {
            Ok(listed) => listed,
            Err(RegistryError::NotFound { .. }) => return Err(not_found()),
            Err(e) => {
                return Err(ResolveError::RegistryUnavailable {
                    provider: address.to_string(),
                    source: e,
                })
            }
        };

        let available: Vec<Version> = listed
            .iter()
            .filter_map(|raw| match Version::parse(raw.trim_start_matches('v')) {
                Ok(v) => Some(v),
                Err(e) => {
                    debug!(provider = %address, version = %raw, error = %e, "Skipping unparseable version");
                    None
                }
            })
            .collect();

        requirement
            .constraint
            .select_newest(&available)
            .cloned()
            .ok_or_else(not_found)
    }
}
