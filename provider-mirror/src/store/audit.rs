//! Read-only consistency check of a mirror tree.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::atomic::is_temp_name;
use super::manifest::{IndexManifest, VersionManifest};
use super::{
    list_dir_names, list_file_names, read_json, version_manifest_stems, MirrorStore, StoreResult,
};
use crate::checksum::{checksums_match, file_checksum};
use crate::provider::index_manifest_filename;

/// A problem found while auditing a mirror.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum AuditIssue {
    /// A provider directory has content but no `index.json`.
    MissingIndex { provider: String },
    /// A manifest exists but cannot be read or parsed.
    UnreadableManifest { path: PathBuf, reason: String },
    /// `index.json` lists a version with no `<version>.json`.
    MissingVersionManifest { provider: String, version: String },
    /// A version manifest lists an archive that is not on disk.
    MissingArchive { path: PathBuf },
    /// An archive's content disagrees with its `zh:` hash.
    HashMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
    /// A temp file left behind by an interrupted write.
    StrayTempFile { path: PathBuf },
}

impl fmt::Display for AuditIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingIndex { provider } => write!(f, "{}: missing index.json", provider),
            Self::UnreadableManifest { path, reason } => {
                write!(f, "{}: unreadable manifest ({})", path.display(), reason)
            }
            Self::MissingVersionManifest { provider, version } => {
                write!(f, "{}: version {} listed without {}.json", provider, version, version)
            }
            Self::MissingArchive { path } => write!(f, "{}: archive missing", path.display()),
            Self::HashMismatch {
                path,
                expected,
                actual,
            } => write!(
                f,
                "{}: hash mismatch (expected zh:{}, found zh:{})",
                path.display(),
                expected,
                actual
            ),
            Self::StrayTempFile { path } => {
                write!(f, "{}: leftover temporary file", path.display())
            }
        }
    }
}

pub(super) fn audit_tree(store: &MirrorStore) -> StoreResult<Vec<AuditIssue>> {
    let mut issues = Vec::new();
    let root = store.root();

    for host in list_dir_names(root)? {
        let host_dir = root.join(&host);
        for namespace in list_dir_names(&host_dir)? {
            let ns_dir = host_dir.join(&namespace);
            for provider_type in list_dir_names(&ns_dir)? {
                let provider = format!("{}/{}/{}", host, namespace, provider_type);
                audit_provider(&provider, &ns_dir.join(&provider_type), &mut issues)?;
            }
        }
    }

    issues.sort();
    Ok(issues)
}

fn audit_provider(provider: &str, dir: &Path, issues: &mut Vec<AuditIssue>) -> StoreResult<()> {
    debug!(provider = %provider, "Auditing provider");
    let files = list_file_names(dir)?;

    for name in files.iter().filter(|n| is_temp_name(n)) {
        issues.push(AuditIssue::StrayTempFile {
            path: dir.join(name),
        });
    }

    // Versions listed by the index must have a manifest. Without a usable
    // index, the version manifests on disk are checked instead.
    let index_path = dir.join(index_manifest_filename());
    let versions: BTreeSet<String> = match read_json::<IndexManifest>(&index_path) {
        Ok(Some(index)) => {
            for version in index.versions.keys() {
                if !files.contains(&version_manifest_name(version)) {
                    issues.push(AuditIssue::MissingVersionManifest {
                        provider: provider.to_string(),
                        version: version.clone(),
                    });
                }
            }
            index.versions.into_keys().collect()
        }
        Ok(None) => {
            if !files.is_empty() {
                issues.push(AuditIssue::MissingIndex {
                    provider: provider.to_string(),
                });
            }
            version_manifest_stems(dir)?
        }
        Err(e) => {
            issues.push(AuditIssue::UnreadableManifest {
                path: index_path,
                reason: e.to_string(),
            });
            version_manifest_stems(dir)?
        }
    };

    for version in &versions {
        let manifest_path = dir.join(version_manifest_name(version));
        match read_json::<VersionManifest>(&manifest_path) {
            Ok(Some(manifest)) => audit_archives(dir, &manifest, issues),
            Ok(None) => {}
            Err(e) => issues.push(AuditIssue::UnreadableManifest {
                path: manifest_path,
                reason: e.to_string(),
            }),
        }
    }

    Ok(())
}

fn version_manifest_name(version: &str) -> String {
    format!("{}.json", version)
}

fn audit_archives(dir: &Path, manifest: &VersionManifest, issues: &mut Vec<AuditIssue>) {
    for entry in manifest.archives.values() {
        let archive = dir.join(&entry.url);
        if !archive.is_file() {
            issues.push(AuditIssue::MissingArchive { path: archive });
            continue;
        }
        let Some(expected) = entry.zip_hash() else {
            continue;
        };
        match file_checksum(&archive) {
            Ok(actual) if checksums_match(&actual, expected) => {}
            Ok(actual) => issues.push(AuditIssue::HashMismatch {
                path: archive,
                expected: expected.to_string(),
                actual,
            }),
            Err(e) => issues.push(AuditIssue::UnreadableManifest {
                path: archive,
                reason: e.to_string(),
            }),
        }
    }
}
