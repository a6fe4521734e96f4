//! The on-disk mirror tree.
//!
//! [`MirrorStore`] exclusively owns the output directory. Every path is a pure
//! function of the provider address, version and platform:
//!
//! ```text
//! <root>/<host>/<namespace>/<type>/index.json
//! <root>/<host>/<namespace>/<type>/<version>.json
//! <root>/<host>/<namespace>/<type>/terraform-provider-<type>_<version>_<os>_<arch>.zip
//! ```
//!
//! All writes are atomic (temp file + fsync + rename). The store methods are
//! synchronous; async callers run them on the blocking pool.

mod atomic;
mod audit;
mod error;
mod manifest;

pub use audit::AuditIssue;
pub use error::{StoreError, StoreResult};
pub use manifest::{ArchiveEntry, IndexEntry, IndexManifest, VersionManifest};

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use semver::Version;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::checksum::{checksums_match, file_checksum};
use crate::provider::{
    archive_filename, index_manifest_filename, version_manifest_filename, PlatformPackage,
    ProviderAddress,
};

use atomic::write_atomic;

/// How a manifest write treats an existing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overwrite {
    /// Rebuild the file from this run's data and always rewrite it.
    Always,
    /// Merge with verified prior content, and leave the file (and its mtime)
    /// alone when the bytes would not change.
    IfChanged,
}

/// What a manifest write actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    Unchanged,
}

/// Filesystem view of a mirror rooted at one directory.
#[derive(Debug, Clone)]
pub struct MirrorStore {
    root: PathBuf,
}

impl MirrorStore {
    /// Create a store rooted at `root`. Nothing is touched until a write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The mirror root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory if it does not exist.
    pub fn prepare(&self) -> StoreResult<()> {
        create_dir(&self.root)
    }

    /// Directory holding everything mirrored for `address`.
    pub fn provider_dir(&self, address: &ProviderAddress) -> PathBuf {
        self.root
            .join(address.host())
            .join(address.namespace())
            .join(address.provider_type())
    }

    /// Deterministic archive path for a package of `version`.
    pub fn archive_path(
        &self,
        address: &ProviderAddress,
        version: &Version,
        package: &PlatformPackage,
    ) -> PathBuf {
        self.provider_dir(address)
            .join(archive_filename(address, version, &package.platform))
    }

    /// Path of `<version>.json`.
    pub fn version_manifest_path(&self, address: &ProviderAddress, version: &Version) -> PathBuf {
        self.provider_dir(address)
            .join(version_manifest_filename(version))
    }

    /// Path of `index.json`.
    pub fn index_manifest_path(&self, address: &ProviderAddress) -> PathBuf {
        self.provider_dir(address).join(index_manifest_filename())
    }

    /// Whether the archive for `package` is already on disk with the expected
    /// checksum. Read-only.
    pub fn has_valid_artifact(
        &self,
        address: &ProviderAddress,
        version: &Version,
        package: &PlatformPackage,
    ) -> bool {
        let path = self.archive_path(address, version, package);
        if !path.is_file() {
            return false;
        }
        match file_checksum(&path) {
            Ok(actual) => {
                let valid = checksums_match(&actual, &package.checksum);
                if !valid {
                    debug!(path = %path.display(), "Existing archive has wrong checksum");
                }
                valid
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Existing archive unreadable");
                false
            }
        }
    }

    /// Atomically write a verified archive, replacing any file at its path.
    pub fn write_artifact(
        &self,
        address: &ProviderAddress,
        version: &Version,
        package: &PlatformPackage,
        bytes: &[u8],
    ) -> StoreResult<PathBuf> {
        create_dir(&self.provider_dir(address))?;
        let path = self.archive_path(address, version, package);
        write_atomic(&path, bytes)?;
        debug!(path = %path.display(), bytes = bytes.len(), "Archive written");
        Ok(path)
    }

    /// Read `<version>.json`, if present.
    pub fn read_version_manifest(
        &self,
        address: &ProviderAddress,
        version: &Version,
    ) -> StoreResult<Option<VersionManifest>> {
        read_json(&self.version_manifest_path(address, version))
    }

    /// Write `<version>.json` listing `packages`.
    ///
    /// With [`Overwrite::Always`] the manifest lists exactly `packages`. With
    /// [`Overwrite::IfChanged`], platforms listed by an existing manifest but
    /// absent from `packages` are kept while their archive on disk still
    /// matches the recorded `zh:` hash.
    pub fn write_version_manifest(
        &self,
        address: &ProviderAddress,
        version: &Version,
        packages: &[PlatformPackage],
        overwrite: Overwrite,
    ) -> StoreResult<WriteOutcome> {
        let dir = self.provider_dir(address);
        let path = self.version_manifest_path(address, version);
        let mut manifest = VersionManifest::default();

        if overwrite == Overwrite::IfChanged {
            match read_json::<VersionManifest>(&path) {
                Ok(Some(existing)) => {
                    for (platform, entry) in existing.archives {
                        if archive_matches_entry(&dir, &entry) {
                            manifest.archives.insert(platform, entry);
                        } else {
                            debug!(
                                platform = %platform,
                                url = %entry.url,
                                "Dropping unverified manifest entry"
                            );
                        }
                    }
                }
                Ok(None) => {}
                Err(e) if is_corrupt(&e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Ignoring malformed version manifest"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        for package in packages {
            manifest
                .archives
                .insert(package.platform.to_string(), ArchiveEntry::for_package(package));
        }

        create_dir(&dir)?;
        publish(&path, &manifest, overwrite)
    }

    /// Read `index.json`, if present.
    pub fn read_index_manifest(
        &self,
        address: &ProviderAddress,
    ) -> StoreResult<Option<IndexManifest>> {
        read_json(&self.index_manifest_path(address))
    }

    /// Add `versions` to `index.json`, keeping every version already listed.
    ///
    /// A corrupt index is rebuilt from the `<version>.json` files present in
    /// the provider directory.
    pub fn write_index_manifest(
        &self,
        address: &ProviderAddress,
        versions: &[Version],
        overwrite: Overwrite,
    ) -> StoreResult<WriteOutcome> {
        let dir = self.provider_dir(address);
        let path = self.index_manifest_path(address);

        let mut index = match read_json::<IndexManifest>(&path) {
            Ok(existing) => existing.unwrap_or_default(),
            Err(e) if is_corrupt(&e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Index manifest unreadable, rebuilding from version manifests"
                );
                scan_versions(&dir)?
            }
            Err(e) => return Err(e),
        };

        for version in versions {
            index.insert(version.to_string());
        }

        create_dir(&dir)?;
        publish(&path, &index, overwrite)
    }

    /// Walk the mirror and report inconsistencies. Read-only.
    pub fn audit(&self) -> StoreResult<Vec<AuditIssue>> {
        audit::audit_tree(self)
    }
}

/// Rebuild an index from the `<version>.json` files in `dir`.
fn scan_versions(dir: &Path) -> StoreResult<IndexManifest> {
    let mut index = IndexManifest::default();
    for version in version_manifest_stems(dir)? {
        index.insert(version);
    }
    Ok(index)
}

/// Versions that have a `<version>.json` file in `dir`, sorted.
pub(crate) fn version_manifest_stems(dir: &Path) -> StoreResult<BTreeSet<String>> {
    Ok(list_file_names(dir)?
        .into_iter()
        .filter_map(|name| {
            let stem = name.strip_suffix(".json")?;
            Version::parse(stem).ok().map(|_| stem.to_string())
        })
        .collect())
}

/// Whether `entry` names a plain file in `dir` whose content matches its
/// `zh:` hash.
fn archive_matches_entry(dir: &Path, entry: &ArchiveEntry) -> bool {
    if !is_plain_filename(&entry.url) {
        return false;
    }
    let Some(expected) = entry.zip_hash() else {
        return false;
    };
    match file_checksum(&dir.join(&entry.url)) {
        Ok(actual) => checksums_match(&actual, expected),
        Err(_) => false,
    }
}

/// A manifest that exists but does not parse. Other read errors are not
/// corruption and must not trigger a rewrite.
fn is_corrupt(error: &StoreError) -> bool {
    matches!(
        error,
        StoreError::ReadFailed { source, .. } if source.kind() == io::ErrorKind::InvalidData
    )
}

/// Names of regular files directly inside `dir`, sorted. Missing dir is empty.
pub(crate) fn list_file_names(dir: &Path) -> StoreResult<BTreeSet<String>> {
    list_entries(dir, |ft| ft.is_file())
}

/// Names of subdirectories directly inside `dir`, sorted. Missing dir is empty.
pub(crate) fn list_dir_names(dir: &Path) -> StoreResult<BTreeSet<String>> {
    list_entries(dir, |ft| ft.is_dir())
}

fn list_entries(
    dir: &Path,
    keep: impl Fn(&fs::FileType) -> bool,
) -> StoreResult<BTreeSet<String>> {
    let read_failed = |source| StoreError::ReadFailed {
        path: dir.to_path_buf(),
        source,
    };
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
        Err(e) => return Err(read_failed(e)),
    };

    let mut names = BTreeSet::new();
    for entry in entries {
        let entry = entry.map_err(read_failed)?;
        let file_type = entry.file_type().map_err(read_failed)?;
        if keep(&file_type) {
            names.insert(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(names)
}

fn create_dir(path: &Path) -> StoreResult<()> {
    fs::create_dir_all(path).map_err(|source| StoreError::CreateDirFailed {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse a JSON file. A missing file is `Ok(None)`; malformed JSON is an
/// `InvalidData` read error.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> StoreResult<Option<T>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::ReadFailed {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| StoreError::ReadFailed {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })
}

fn publish<T: serde::Serialize>(
    path: &Path,
    manifest: &T,
    overwrite: Overwrite,
) -> StoreResult<WriteOutcome> {
    let bytes = manifest::to_bytes(manifest).map_err(|e| StoreError::Serialize {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    if overwrite == Overwrite::IfChanged {
        if let Ok(existing) = fs::read(path) {
            if existing == bytes {
                debug!(path = %path.display(), "Manifest unchanged, not rewriting");
                return Ok(WriteOutcome::Unchanged);
            }
        }
    }

    write_atomic(path, &bytes)?;
    debug!(path = %path.display(), "Manifest written");
    Ok(WriteOutcome::Written)
}

/// A manifest `url` that stays inside the provider directory.
fn is_plain_filename(url: &str) -> bool {
    !url.is_empty() && url != "." && url != ".." && !url.contains(|c| c == '/' || c == '\\')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::sha256_hex;
    use crate::provider::Platform;
    use tempfile::TempDir;

    fn address() -> ProviderAddress {
        "hashicorp/null".parse().unwrap()
    }

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn package(platform: &str, version: &str, data: &[u8]) -> PlatformPackage {
        let platform: Platform = platform.parse().unwrap();
        PlatformPackage {
            filename: archive_filename(&address(), &v(version), &platform),
            platform,
            checksum: sha256_hex(data),
            download_url: "https://releases.example/null.zip".to_string(),
        }
    }

    #[test]
    fn test_layout_paths() {
        let store = MirrorStore::new("/mirror");
        let pkg = package("linux_amd64", "2.1.0", b"x");
        assert_eq!(
            store.archive_path(&address(), &v("2.1.0"), &pkg),
            PathBuf::from(
                "/mirror/registry.terraform.io/hashicorp/null/terraform-provider-null_2.1.0_linux_amd64.zip"
            )
        );
        assert_eq!(
            store.version_manifest_path(&address(), &v("2.1.0")),
            PathBuf::from("/mirror/registry.terraform.io/hashicorp/null/2.1.0.json")
        );
        assert_eq!(
            store.index_manifest_path(&address()),
            PathBuf::from("/mirror/registry.terraform.io/hashicorp/null/index.json")
        );
    }

    #[test]
    fn test_write_and_validate_artifact() {
        let dir = TempDir::new().unwrap();
        let store = MirrorStore::new(dir.path());
        let pkg = package("linux_amd64", "2.1.0", b"archive");

        assert!(!store.has_valid_artifact(&address(), &v("2.1.0"), &pkg));
        let path = store
            .write_artifact(&address(), &v("2.1.0"), &pkg, b"archive")
            .unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"archive");
        assert!(store.has_valid_artifact(&address(), &v("2.1.0"), &pkg));
    }

    #[test]
    fn test_corrupt_artifact_is_not_valid() {
        let dir = TempDir::new().unwrap();
        let store = MirrorStore::new(dir.path());
        let pkg = package("linux_amd64", "2.1.0", b"archive");

        store
            .write_artifact(&address(), &v("2.1.0"), &pkg, b"corrupted")
            .unwrap();
        assert!(!store.has_valid_artifact(&address(), &v("2.1.0"), &pkg));
    }

    #[test]
    fn test_version_manifest_content() {
        let dir = TempDir::new().unwrap();
        let store = MirrorStore::new(dir.path());
        let packages = vec![
            package("linux_amd64", "2.1.0", b"a"),
            package("windows_386", "2.1.0", b"b"),
        ];

        let outcome = store
            .write_version_manifest(&address(), &v("2.1.0"), &packages, Overwrite::Always)
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Written);

        let manifest = store
            .read_version_manifest(&address(), &v("2.1.0"))
            .unwrap()
            .unwrap();
        assert_eq!(manifest.archives.len(), 2);
        let linux = &manifest.archives["linux_amd64"];
        assert_eq!(linux.url, "terraform-provider-null_2.1.0_linux_amd64.zip");
        assert_eq!(linux.hashes, vec![format!("zh:{}", sha256_hex(b"a"))]);
    }

    fn manifest_platforms(store: &MirrorStore, version: &str) -> Vec<String> {
        store
            .read_version_manifest(&address(), &v(version))
            .unwrap()
            .unwrap()
            .archives
            .into_keys()
            .collect()
    }

    #[test]
    fn test_if_changed_retains_only_verified_platforms() {
        let dir = TempDir::new().unwrap();
        let store = MirrorStore::new(dir.path());
        let linux = package("linux_amd64", "2.1.0", b"a");
        let darwin = package("darwin_arm64", "2.1.0", b"b");
        let windows = package("windows_386", "2.1.0", b"c");
        let freebsd = package("freebsd_amd64", "2.1.0", b"d");

        // darwin intact, windows missing, freebsd corrupted after the fact
        store.write_artifact(&address(), &v("2.1.0"), &darwin, b"b").unwrap();
        store.write_artifact(&address(), &v("2.1.0"), &freebsd, b"d").unwrap();
        store
            .write_version_manifest(
                &address(),
                &v("2.1.0"),
                &[darwin.clone(), windows, freebsd.clone()],
                Overwrite::Always,
            )
            .unwrap();
        fs::write(store.archive_path(&address(), &v("2.1.0"), &freebsd), b"corrupt").unwrap();

        store
            .write_version_manifest(&address(), &v("2.1.0"), &[linux], Overwrite::IfChanged)
            .unwrap();
        assert_eq!(
            manifest_platforms(&store, "2.1.0"),
            vec!["darwin_arm64", "linux_amd64"]
        );
    }

    #[test]
    fn test_always_lists_exactly_the_given_packages() {
        let dir = TempDir::new().unwrap();
        let store = MirrorStore::new(dir.path());
        let linux = package("linux_amd64", "2.1.0", b"a");
        let windows = package("windows_386", "2.1.0", b"c");

        store.write_artifact(&address(), &v("2.1.0"), &linux, b"a").unwrap();
        store.write_artifact(&address(), &v("2.1.0"), &windows, b"c").unwrap();
        store
            .write_version_manifest(
                &address(),
                &v("2.1.0"),
                &[linux.clone(), windows.clone()],
                Overwrite::Always,
            )
            .unwrap();
        fs::write(store.archive_path(&address(), &v("2.1.0"), &windows), b"corrupt").unwrap();

        store
            .write_version_manifest(&address(), &v("2.1.0"), &[linux], Overwrite::Always)
            .unwrap();
        assert_eq!(manifest_platforms(&store, "2.1.0"), vec!["linux_amd64"]);
    }

    #[test]
    fn test_unreadable_index_is_not_rebuilt() {
        let dir = TempDir::new().unwrap();
        let store = MirrorStore::new(dir.path());

        // a directory where index.json belongs fails with a non-parse error
        fs::create_dir_all(store.index_manifest_path(&address())).unwrap();

        let result = store.write_index_manifest(&address(), &[v("2.1.0")], Overwrite::Always);
        assert!(matches!(result, Err(StoreError::ReadFailed { .. })));
        assert!(store.index_manifest_path(&address()).is_dir());
    }

    #[test]
    fn test_index_manifest_is_union() {
        let dir = TempDir::new().unwrap();
        let store = MirrorStore::new(dir.path());

        store
            .write_index_manifest(&address(), &[v("2.0.0")], Overwrite::Always)
            .unwrap();
        store
            .write_index_manifest(&address(), &[v("2.1.0")], Overwrite::Always)
            .unwrap();

        let index = store.read_index_manifest(&address()).unwrap().unwrap();
        assert!(index.contains("2.0.0"));
        assert!(index.contains("2.1.0"));
    }

    #[test]
    fn test_corrupt_index_rebuilt_from_version_manifests() {
        let dir = TempDir::new().unwrap();
        let store = MirrorStore::new(dir.path());
        let pkg = package("linux_amd64", "1.5.0", b"a");

        store
            .write_version_manifest(&address(), &v("1.5.0"), &[pkg], Overwrite::Always)
            .unwrap();
        fs::write(store.index_manifest_path(&address()), b"{not json").unwrap();

        store
            .write_index_manifest(&address(), &[v("2.1.0")], Overwrite::Always)
            .unwrap();
        let index = store.read_index_manifest(&address()).unwrap().unwrap();
        assert!(index.contains("1.5.0"));
        assert!(index.contains("2.1.0"));
        assert_eq!(index.versions.len(), 2);
    }

    #[test]
    fn test_if_changed_skips_identical_manifest() {
        let dir = TempDir::new().unwrap();
        let store = MirrorStore::new(dir.path());

        let first = store
            .write_index_manifest(&address(), &[v("2.1.0")], Overwrite::IfChanged)
            .unwrap();
        let second = store
            .write_index_manifest(&address(), &[v("2.1.0")], Overwrite::IfChanged)
            .unwrap();
        let forced = store
            .write_index_manifest(&address(), &[v("2.1.0")], Overwrite::Always)
            .unwrap();

        assert_eq!(first, WriteOutcome::Written);
        assert_eq!(second, WriteOutcome::Unchanged);
        assert_eq!(forced, WriteOutcome::Written);
    }

    #[test]
    fn test_plain_filename() {
        assert!(is_plain_filename("terraform-provider-null_2.1.0_linux_amd64.zip"));
        assert!(!is_plain_filename("../escape.zip"));
        assert!(!is_plain_filename("sub\\file.zip"));
        assert!(!is_plain_filename(".."));
        assert!(!is_plain_filename(""));
    }
}
