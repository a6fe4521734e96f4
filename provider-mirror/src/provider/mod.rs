//! Provider identity types and parsing.
//!
//! This module provides the data structures that identify what gets mirrored:
//!
//! - **ProviderAddress**: source identity (host, namespace, type)
//! - **VersionConstraint**: caller-supplied version requirement
//! - **Platform**: an (os, arch) pair
//! - **ProviderRequirement**: an address paired with its constraint
//! - **PlatformPackage**: one downloadable archive for one version/platform
//!
//! # Type Hierarchy
//!
//! ```text
//! ProviderRequirement               PlatformPackage
//! ├── address: ProviderAddress      ├── platform: Platform
//! │   ├── host                      ├── filename   ←── naming::archive_filename
//! │   ├── namespace                 ├── checksum (sha256 hex)
//! │   └── provider_type             └── download_url
//! └── constraint: VersionConstraint
//! ```
//!
//! Archive filenames are never taken from the registry. They are derived by
//! [`archive_filename`] so the mirror layout is a pure function of identity.

mod address;
mod constraint;
mod naming;
mod package;
mod platform;

pub use address::{ProviderAddress, DEFAULT_REGISTRY_HOST};
pub use constraint::VersionConstraint;
pub use naming::{archive_filename, index_manifest_filename, version_manifest_filename};
pub use package::{PlatformPackage, ProviderRequirement};
pub use platform::Platform;

// Re-export semver::Version for convenience
pub use semver::Version;

use thiserror::Error;

/// Errors raised while parsing provider references from user input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    /// Provider address is not `[host/]namespace/type`.
    #[error("invalid provider address {input:?}: {reason}")]
    InvalidAddress { input: String, reason: String },

    /// Version constraint could not be parsed.
    #[error("invalid version constraint {input:?}: {reason}")]
    InvalidConstraint { input: String, reason: String },

    /// Platform is not `OS_ARCH`.
    #[error("invalid platform {input:?}: expected OS_ARCH, e.g. linux_amd64")]
    InvalidPlatform { input: String },
}
