//! Mirror manifest documents.
//!
//! Both manifests use `BTreeMap` so the serialized form is independent of
//! insertion order and two runs over the same inputs produce identical bytes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::provider::PlatformPackage;

/// `index.json`: the versions mirrored for one provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexManifest {
    #[serde(default)]
    pub versions: BTreeMap<String, IndexEntry>,
}

/// Per-version entry of `index.json`. Always serialized as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {}

impl IndexManifest {
    /// Add a version, returning `true` if it was not already listed.
    pub fn insert(&mut self, version: impl Into<String>) -> bool {
        self.versions
            .insert(version.into(), IndexEntry::default())
            .is_none()
    }

    /// Whether `version` is listed.
    pub fn contains(&self, version: &str) -> bool {
        self.versions.contains_key(version)
    }
}

/// `<version>.json`: the archives of one version, keyed by `os_arch`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionManifest {
    #[serde(default)]
    pub archives: BTreeMap<String, ArchiveEntry>,
}

/// One archive listed in a version manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    /// Archive location relative to the manifest (a bare filename).
    pub url: String,
    #[serde(default)]
    pub hashes: Vec<String>,
}

impl ArchiveEntry {
    /// Entry describing a mirrored package.
    pub fn for_package(package: &PlatformPackage) -> Self {
        Self {
            url: package.filename.clone(),
            hashes: vec![package.zip_hash()],
        }
    }

    /// The hex digest of the first `zh:` hash, if any.
    pub fn zip_hash(&self) -> Option<&str> {
        self.hashes.iter().find_map(|h| h.strip_prefix("zh:"))
    }
}

/// Serialize a manifest as pretty JSON with a trailing newline.
pub(crate) fn to_bytes<T: Serialize>(manifest: &T) -> serde_json::Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(manifest)?;
    bytes.push(b'\n');
    Ok(bytes)
}
