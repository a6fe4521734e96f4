//! End-to-end mirror runs against in-memory registry and download fakes.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use filetime::FileTime;
use parking_lot::Mutex;
use provider_mirror::checksum::sha256_hex;
use provider_mirror::fetch::{FetchError, FetchResult, PackageSource, RetryPolicy};
use provider_mirror::provider::{Platform, ProviderAddress, ProviderRequirement, Version};
use provider_mirror::reconcile::ProviderOutcome;
use provider_mirror::registry::{RegistryClient, RegistryError, RegistryPackage, RegistryResult};
use provider_mirror::{BoxFuture, MirrorConfig, MirrorError, MirrorPolicy, Reconciler};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const DOWNLOAD_BASE: &str = "https://releases.example";

/// Archive content served for a provider type, version and platform.
fn archive_bytes(provider_type: &str, version: &str, platform: &str) -> Vec<u8> {
    format!("zip:{}:{}:{}", provider_type, version, platform).into_bytes()
}

fn download_url(provider_type: &str, version: &str, platform: &str) -> String {
    format!("{}/{}/{}/{}.zip", DOWNLOAD_BASE, provider_type, version, platform)
}

/// Registry knowing a fixed set of provider types and versions. Every
/// platform has a build unless listed in `missing` as `type/os_arch`.
struct FakeRegistry {
    versions: HashMap<String, Vec<String>>,
    missing: HashSet<String>,
}

impl FakeRegistry {
    fn new(entries: &[(&str, &[&str])]) -> Arc<Self> {
        Self::without_builds(entries, &[])
    }

    fn without_builds(entries: &[(&str, &[&str])], missing: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            versions: entries
                .iter()
                .map(|(t, vs)| (t.to_string(), vs.iter().map(|v| v.to_string()).collect()))
                .collect(),
            missing: missing.iter().map(|m| m.to_string()).collect(),
        })
    }
}

impl RegistryClient for FakeRegistry {
    fn list_versions<'a>(
        &'a self,
        address: &'a ProviderAddress,
    ) -> BoxFuture<'a, RegistryResult<Vec<String>>> {
        Box::pin(async move {
            self.versions
                .get(address.provider_type())
                .cloned()
                .ok_or_else(|| RegistryError::NotFound {
                    provider: address.to_string(),
                })
        })
    }

    fn get_package<'a>(
        &'a self,
        address: &'a ProviderAddress,
        version: &'a Version,
        platform: &'a Platform,
    ) -> BoxFuture<'a, RegistryResult<RegistryPackage>> {
        Box::pin(async move {
            let t = address.provider_type();
            let (v, p) = (version.to_string(), platform.to_string());
            if self.missing.contains(&format!("{}/{}", t, p)) {
                return Err(RegistryError::PlatformUnavailable {
                    provider: address.to_string(),
                    version: v,
                    platform: p,
                });
            }
            Ok(RegistryPackage {
                filename: format!("terraform-provider-{}_{}_{}.zip", t, v, p),
                download_url: download_url(t, &v, &p),
                shasum: sha256_hex(&archive_bytes(t, &v, &p)),
            })
        })
    }
}

/// Download source serving [`archive_bytes`], with optional tampering and
/// hanging per URL.
#[derive(Default)]
struct FakeSource {
    tampered: Mutex<HashSet<String>>,
    hanging: Mutex<HashSet<String>>,
    hang_entered: AtomicBool,
    downloads: AtomicUsize,
}

impl FakeSource {
    fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

impl PackageSource for FakeSource {
    fn download<'a>(&'a self, url: &'a str) -> BoxFuture<'a, FetchResult<Bytes>> {
        Box::pin(async move {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            if self.hanging.lock().contains(url) {
                self.hang_entered.store(true, Ordering::SeqCst);
                futures::future::pending::<()>().await;
            }
            if self.tampered.lock().contains(url) {
                return Ok(Bytes::from_static(b"tampered archive"));
            }
            let parts: Vec<&str> = url
                .strip_prefix(DOWNLOAD_BASE)
                .and_then(|rest| rest.strip_suffix(".zip"))
                .map(|rest| rest.trim_start_matches('/').split('/').collect())
                .unwrap_or_default();
            match parts.as_slice() {
                [t, v, p] => Ok(Bytes::from(archive_bytes(t, v, p))),
                _ => Err(FetchError::Rejected {
                    url: url.to_string(),
                    reason: "HTTP 404".to_string(),
                }),
            }
        })
    }
}

fn platforms() -> Vec<Platform> {
    vec![
        "linux_amd64".parse().unwrap(),
        "windows_386".parse().unwrap(),
    ]
}

fn config(dir: &Path, policy: MirrorPolicy) -> MirrorConfig {
    MirrorConfig::new(dir)
        .with_policy(policy)
        .with_platforms(platforms())
        .with_parallel_downloads(2)
        .with_retry_policy(RetryPolicy::none())
}

fn requirements(list: &[&str]) -> Vec<ProviderRequirement> {
    list.iter().map(|r| r.parse().unwrap()).collect()
}

fn scenario_registry() -> Arc<FakeRegistry> {
    FakeRegistry::new(&[
        ("null", &["2.0.0", "2.1.0", "2.1.2"][..]),
        ("template", &["2.1.0", "2.1.1", "2.2.0"][..]),
    ])
}

/// Every file under `root`, relative, with forward slashes.
fn file_set(root: &Path) -> BTreeSet<String> {
    fn walk(root: &Path, dir: &Path, out: &mut BTreeSet<String>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                let rel = path.strip_prefix(root).unwrap();
                let parts: Vec<String> = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                out.insert(parts.join("/"));
            }
        }
    }
    let mut out = BTreeSet::new();
    if root.exists() {
        walk(root, root, &mut out);
    }
    out
}

fn file_contents(root: &Path) -> BTreeMap<String, Vec<u8>> {
    file_set(root)
        .into_iter()
        .map(|rel| {
            let bytes = fs::read(root.join(&rel)).unwrap();
            (rel, bytes)
        })
        .collect()
}

async fn run(
    dir: &Path,
    policy: MirrorPolicy,
    registry: Arc<FakeRegistry>,
    source: Arc<FakeSource>,
    reqs: &[&str],
) -> provider_mirror::MirrorReport {
    Reconciler::new(config(dir, policy), registry, source)
        .run(&requirements(reqs), &CancellationToken::new())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_scenario_produces_exact_layout() {
    let dir = TempDir::new().unwrap();
    let report = run(
        dir.path(),
        MirrorPolicy::Replace,
        scenario_registry(),
        Arc::new(FakeSource::default()),
        &["hashicorp/null=2.1.0", "hashicorp/template=2.1.1"],
    )
    .await;

    assert!(report.is_success(), "{}", report);
    let expected: BTreeSet<String> = [
        "registry.terraform.io/hashicorp/null/index.json",
        "registry.terraform.io/hashicorp/null/2.1.0.json",
        "registry.terraform.io/hashicorp/null/terraform-provider-null_2.1.0_linux_amd64.zip",
        "registry.terraform.io/hashicorp/null/terraform-provider-null_2.1.0_windows_386.zip",
        "registry.terraform.io/hashicorp/template/index.json",
        "registry.terraform.io/hashicorp/template/2.1.1.json",
        "registry.terraform.io/hashicorp/template/terraform-provider-template_2.1.1_linux_amd64.zip",
        "registry.terraform.io/hashicorp/template/terraform-provider-template_2.1.1_windows_386.zip",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    // 2N + N*P with N = 2 providers, P = 2 platforms
    assert_eq!(file_set(dir.path()), expected);

    let index: serde_json::Value = serde_json::from_slice(
        &fs::read(dir.path().join("registry.terraform.io/hashicorp/null/index.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(index, serde_json::json!({"versions": {"2.1.0": {}}}));

    let manifest: serde_json::Value = serde_json::from_slice(
        &fs::read(dir.path().join("registry.terraform.io/hashicorp/null/2.1.0.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(
        manifest["archives"]["linux_amd64"],
        serde_json::json!({
            "url": "terraform-provider-null_2.1.0_linux_amd64.zip",
            "hashes": [format!("zh:{}", sha256_hex(&archive_bytes("null", "2.1.0", "linux_amd64")))]
        })
    );

    let archive = fs::read(
        dir.path()
            .join("registry.terraform.io/hashicorp/template/terraform-provider-template_2.1.1_windows_386.zip"),
    )
    .unwrap();
    assert_eq!(archive, archive_bytes("template", "2.1.1", "windows_386"));
}

#[tokio::test]
async fn test_constraint_selects_newest_match() {
    let dir = TempDir::new().unwrap();
    let report = run(
        dir.path(),
        MirrorPolicy::Replace,
        scenario_registry(),
        Arc::new(FakeSource::default()),
        &["hashicorp/template=~> 2.1.0"],
    )
    .await;

    assert_eq!(report.providers[0].version(), Some(&Version::new(2, 1, 1)));
}

#[tokio::test]
async fn test_replace_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let reqs = ["hashicorp/null=2.1.0", "hashicorp/template=2.1.1"];

    run(dir.path(), MirrorPolicy::Replace, scenario_registry(), Arc::new(FakeSource::default()), &reqs).await;
    let first = file_contents(dir.path());

    let source = Arc::new(FakeSource::default());
    let report = run(dir.path(), MirrorPolicy::Replace, scenario_registry(), source.clone(), &reqs).await;
    let second = file_contents(dir.path());

    assert!(report.is_success());
    assert_eq!(source.downloads(), 4);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_keep_restores_only_missing_archives() {
    let dir = TempDir::new().unwrap();
    let reqs = ["hashicorp/null=2.1.0", "hashicorp/template=2.1.1"];
    run(dir.path(), MirrorPolicy::Replace, scenario_registry(), Arc::new(FakeSource::default()), &reqs).await;

    let original_files = file_set(dir.path());
    let original_contents = file_contents(dir.path());

    // Pin every file to a known old mtime so untouched files are detectable.
    let pinned = FileTime::from_unix_time(1_000_000_000, 0);
    for rel in &original_files {
        filetime::set_file_mtime(dir.path().join(rel), pinned).unwrap();
    }

    let deleted =
        "registry.terraform.io/hashicorp/null/terraform-provider-null_2.1.0_windows_386.zip";
    fs::remove_file(dir.path().join(deleted)).unwrap();

    let source = Arc::new(FakeSource::default());
    let report = run(dir.path(), MirrorPolicy::Keep, scenario_registry(), source.clone(), &reqs).await;

    assert!(report.is_success(), "{}", report);
    assert_eq!(source.downloads(), 1);
    assert_eq!(report.archives_written(), 1);
    assert_eq!(report.archives_skipped(), 3);
    assert_eq!(file_set(dir.path()), original_files);
    assert_eq!(file_contents(dir.path()), original_contents);

    for rel in original_files.iter().filter(|rel| rel.as_str() != deleted) {
        let meta = fs::metadata(dir.path().join(rel)).unwrap();
        assert_eq!(
            FileTime::from_last_modification_time(&meta),
            pinned,
            "{} was modified",
            rel
        );
    }
}

#[tokio::test]
async fn test_keep_replaces_corrupted_archive() {
    let dir = TempDir::new().unwrap();
    let reqs = ["hashicorp/null=2.1.0"];
    run(dir.path(), MirrorPolicy::Replace, scenario_registry(), Arc::new(FakeSource::default()), &reqs).await;

    let corrupted = dir
        .path()
        .join("registry.terraform.io/hashicorp/null/terraform-provider-null_2.1.0_linux_amd64.zip");
    fs::write(&corrupted, b"bit rot").unwrap();

    let source = Arc::new(FakeSource::default());
    run(dir.path(), MirrorPolicy::Keep, scenario_registry(), source.clone(), &reqs).await;

    assert_eq!(source.downloads(), 1);
    assert_eq!(
        fs::read(&corrupted).unwrap(),
        archive_bytes("null", "2.1.0", "linux_amd64")
    );
}

#[tokio::test]
async fn test_unresolvable_provider_does_not_block_others() {
    let dir = TempDir::new().unwrap();
    let report = run(
        dir.path(),
        MirrorPolicy::Replace,
        scenario_registry(),
        Arc::new(FakeSource::default()),
        &["hashicorp/doesnotexist", "hashicorp/null=2.1.0", "hashicorp/template=9.0.0"],
    )
    .await;

    assert!(!report.is_success());
    assert_eq!(report.failed_providers().count(), 2);
    assert!(report.providers[1].is_success());

    let files = file_set(dir.path());
    assert_eq!(files.len(), 4);
    assert!(files.iter().all(|f| f.starts_with("registry.terraform.io/hashicorp/null/")));
}

#[tokio::test]
async fn test_platform_without_build_is_omitted() {
    let dir = TempDir::new().unwrap();
    let registry = FakeRegistry::without_builds(
        &[("null", &["2.1.0"][..]), ("template", &["2.1.1"][..])],
        &["null/windows_386"],
    );
    let report = run(
        dir.path(),
        MirrorPolicy::Replace,
        registry,
        Arc::new(FakeSource::default()),
        &["hashicorp/null=2.1.0", "hashicorp/template=2.1.1"],
    )
    .await;

    assert!(report.is_success());
    let null = &report.providers[0];
    assert!(matches!(null.outcome, ProviderOutcome::Mirrored { .. }));
    assert_eq!(null.omitted(), &["windows_386".parse::<Platform>().unwrap()][..]);
    assert!(report
        .to_string()
        .contains("registry.terraform.io/hashicorp/null 2.1.0: no build for windows_386"));

    let null_files: BTreeSet<String> = file_set(dir.path())
        .into_iter()
        .filter(|f| f.starts_with("registry.terraform.io/hashicorp/null/"))
        .collect();
    let expected: BTreeSet<String> = [
        "index.json",
        "2.1.0.json",
        "terraform-provider-null_2.1.0_linux_amd64.zip",
    ]
    .iter()
    .map(|name| format!("registry.terraform.io/hashicorp/null/{}", name))
    .collect();
    assert_eq!(null_files, expected);

    let manifest: serde_json::Value = serde_json::from_slice(
        &fs::read(dir.path().join("registry.terraform.io/hashicorp/null/2.1.0.json")).unwrap(),
    )
    .unwrap();
    let archives = manifest["archives"].as_object().unwrap();
    assert_eq!(archives.keys().collect::<Vec<_>>(), vec!["linux_amd64"]);

    // template is unaffected: 2 manifests + 2 archives
    assert_eq!(file_set(dir.path()).len(), 3 + 4);
}

#[tokio::test]
async fn test_replace_with_fewer_platforms_drops_stale_entries() {
    let dir = TempDir::new().unwrap();
    run(
        dir.path(),
        MirrorPolicy::Replace,
        scenario_registry(),
        Arc::new(FakeSource::default()),
        &["hashicorp/null=2.1.0"],
    )
    .await;

    let null_dir = dir.path().join("registry.terraform.io/hashicorp/null");
    fs::write(
        null_dir.join("terraform-provider-null_2.1.0_windows_386.zip"),
        b"corrupt",
    )
    .unwrap();

    for policy in [MirrorPolicy::Keep, MirrorPolicy::Replace] {
        let linux_only = config(dir.path(), policy)
            .with_platforms(vec!["linux_amd64".parse::<Platform>().unwrap()]);
        let report = Reconciler::new(
            linux_only,
            scenario_registry(),
            Arc::new(FakeSource::default()),
        )
        .run(&requirements(&["hashicorp/null=2.1.0"]), &CancellationToken::new())
        .await
        .unwrap();
        assert!(report.is_success());

        let manifest: serde_json::Value =
            serde_json::from_slice(&fs::read(null_dir.join("2.1.0.json")).unwrap()).unwrap();
        let archives = manifest["archives"].as_object().unwrap();
        assert_eq!(
            archives.keys().collect::<Vec<_>>(),
            vec!["linux_amd64"],
            "{} mode",
            policy
        );
    }
}

#[tokio::test]
async fn test_checksum_mismatch_is_never_written() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(FakeSource::default());
    source
        .tampered
        .lock()
        .insert(download_url("null", "2.1.0", "windows_386"));

    let report = run(
        dir.path(),
        MirrorPolicy::Replace,
        scenario_registry(),
        source,
        &["hashicorp/null=2.1.0", "hashicorp/template=2.1.1"],
    )
    .await;

    assert!(!report.is_success());
    let null = &report.providers[0];
    assert!(matches!(null.outcome, ProviderOutcome::Incomplete { .. }));
    assert_eq!(null.failures().len(), 1);
    assert!(matches!(null.failures()[0].error, MirrorError::Integrity { .. }));
    assert!(report.providers[1].is_success());

    let null_dir = dir.path().join("registry.terraform.io/hashicorp/null");
    assert!(!null_dir
        .join("terraform-provider-null_2.1.0_windows_386.zip")
        .exists());
    assert!(null_dir
        .join("terraform-provider-null_2.1.0_linux_amd64.zip")
        .exists());
    assert!(!null_dir.join("index.json").exists());
    assert!(!null_dir.join("2.1.0.json").exists());
}

#[tokio::test]
async fn test_index_keeps_previously_mirrored_versions() {
    let dir = TempDir::new().unwrap();
    run(dir.path(), MirrorPolicy::Replace, scenario_registry(), Arc::new(FakeSource::default()), &["hashicorp/null=2.0.0"]).await;
    run(dir.path(), MirrorPolicy::Replace, scenario_registry(), Arc::new(FakeSource::default()), &["hashicorp/null=2.1.0"]).await;

    let index: serde_json::Value = serde_json::from_slice(
        &fs::read(dir.path().join("registry.terraform.io/hashicorp/null/index.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(
        index,
        serde_json::json!({"versions": {"2.0.0": {}, "2.1.0": {}}})
    );
    assert!(dir
        .path()
        .join("registry.terraform.io/hashicorp/null/2.0.0.json")
        .exists());
}

#[tokio::test]
async fn test_duplicate_requirements_are_merged() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(FakeSource::default());
    let report = run(
        dir.path(),
        MirrorPolicy::Replace,
        scenario_registry(),
        source.clone(),
        &["hashicorp/null=>= 2.0.0", "hashicorp/null=< 2.1.0"],
    )
    .await;

    assert_eq!(report.providers.len(), 1);
    assert_eq!(report.providers[0].version(), Some(&Version::new(2, 0, 0)));
    assert_eq!(source.downloads(), 2);
}

#[tokio::test]
async fn test_cancellation_keeps_written_archives_and_suppresses_manifests() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(FakeSource::default());
    source
        .hanging
        .lock()
        .insert(download_url("template", "2.1.1", "linux_amd64"));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let watched_source = source.clone();
    let null_index: PathBuf = dir
        .path()
        .join("registry.terraform.io/hashicorp/null/index.json");
    tokio::spawn(async move {
        while !(watched_source.hang_entered.load(Ordering::SeqCst) && null_index.exists()) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        trigger.cancel();
    });

    let reconciler = Reconciler::new(
        config(dir.path(), MirrorPolicy::Replace),
        scenario_registry(),
        source,
    );
    let report = tokio::time::timeout(
        Duration::from_secs(10),
        reconciler.run(
            &requirements(&["hashicorp/null=2.1.0", "hashicorp/template=2.1.1"]),
            &cancel,
        ),
    )
    .await
    .expect("run should stop promptly after cancellation")
    .unwrap();

    assert!(report.cancelled);
    assert!(!report.is_success());
    assert!(report.providers[0].is_success());
    let template = &report.providers[1];
    assert!(template
        .failures()
        .iter()
        .any(|f| matches!(f.error, MirrorError::Cancelled)));

    let template_dir = dir.path().join("registry.terraform.io/hashicorp/template");
    assert!(!template_dir.join("index.json").exists());
    assert!(!template_dir.join("2.1.1.json").exists());
    assert!(!template_dir
        .join("terraform-provider-template_2.1.1_linux_amd64.zip")
        .exists());
    assert_eq!(
        file_set(&dir.path().join("registry.terraform.io/hashicorp/null")).len(),
        4
    );
}

#[tokio::test]
async fn test_store_failure_aborts_run() {
    let dir = TempDir::new().unwrap();
    // A regular file where the host directory should go.
    fs::write(dir.path().join("registry.terraform.io"), b"in the way").unwrap();

    let result = Reconciler::new(
        config(dir.path(), MirrorPolicy::Replace),
        scenario_registry(),
        Arc::new(FakeSource::default()),
    )
    .run(&requirements(&["hashicorp/null=2.1.0"]), &CancellationToken::new())
    .await;

    assert!(matches!(result, Err(MirrorError::Store(_))));
}

#[tokio::test]
async fn test_audit_after_mirror_is_clean() {
    let dir = TempDir::new().unwrap();
    let reconciler = Reconciler::new(
        config(dir.path(), MirrorPolicy::Replace),
        scenario_registry(),
        Arc::new(FakeSource::default()),
    );
    reconciler
        .run(
            &requirements(&["hashicorp/null=2.1.0", "hashicorp/template=2.1.1"]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(reconciler.store().audit().unwrap().is_empty());
}
