//! Artifact download and verification.
//!
//! This module provides functionality for fetching provider archives:
//! - Byte sources behind the [`PackageSource`] trait (`source`)
//! - Bounded exponential-backoff retry (`retry`)
//! - Checksum-verified fetching with cancellation (`fetcher`)
//!
//! # Architecture
//!
//! ```text
//! ArtifactFetcher
//!         │
//!         ├── PackageSource (trait)
//!         │       └── HttpPackageSource
//!         │
//!         ├── RetryPolicy (transient failures only)
//!         │
//!         └── checksum::sha256_hex (verification before hand-off)
//! ```
//!
//! Bytes leave the fetcher only after their SHA-256 matches the package
//! checksum, so the store never sees an unverified archive.

mod error;
mod fetcher;
mod retry;
mod source;

pub use error::{FetchError, FetchResult};
pub use fetcher::ArtifactFetcher;
pub use retry::RetryPolicy;
pub use source::{HttpPackageSource, PackageSource};
