//! Centralized mirror naming conventions.
//!
//! This module is the single source of truth for every filename that appears
//! in a mirror:
//! - Archive filenames (e.g., `terraform-provider-null_2.1.0_linux_amd64.zip`)
//! - Version manifests (e.g., `2.1.0.json`)
//! - The provider index (`index.json`)
//!
//! The store and resolver use these functions rather than constructing names
//! directly, which keeps the layout a pure function of provider identity.

use semver::Version;

use super::{Platform, ProviderAddress};

/// Filename of the per-provider version index.
const INDEX_MANIFEST: &str = "index.json";

/// Generate the archive filename for one provider version on one platform.
///
/// # Format
///
/// `terraform-provider-{type}_{version}_{os}_{arch}.zip`
///
/// # Examples
///
/// ```
/// use provider_mirror::provider::{archive_filename, Platform, ProviderAddress, Version};
///
/// let address: ProviderAddress = "hashicorp/null".parse().unwrap();
/// let platform: Platform = "linux_amd64".parse().unwrap();
/// assert_eq!(
///     archive_filename(&address, &Version::new(2, 1, 0), &platform),
///     "terraform-provider-null_2.1.0_linux_amd64.zip"
/// );
/// ```
pub fn archive_filename(address: &ProviderAddress, version: &Version, platform: &Platform) -> String {
    format!(
        "terraform-provider-{}_{}_{}_{}.zip",
        address.provider_type(),
        version,
        platform.os(),
        platform.arch()
    )
}

/// Generate the version manifest filename, `{version}.json`.
pub fn version_manifest_filename(version: &Version) -> String {
    format!("{}.json", version)
}

/// The index manifest filename.
pub fn index_manifest_filename() -> &'static str {
    INDEX_MANIFEST
}
