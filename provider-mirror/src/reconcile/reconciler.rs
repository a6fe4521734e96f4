//! Mirror run orchestration.

use std::sync::Arc;

use futures::future::join_all;
use semver::Version;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::outcome::{Settlement, TripleOutcome};
use super::progress::{MirrorEvent, MirrorProgressCallback};
use super::report::{MirrorReport, ProviderOutcome, ProviderReport};
use crate::config::MirrorConfig;
use crate::error::{MirrorError, MirrorResult};
use crate::fetch::{ArtifactFetcher, HttpPackageSource, PackageSource};
use crate::provider::{PlatformPackage, ProviderAddress, ProviderRequirement};
use crate::registry::{HttpRegistryClient, RegistryClient};
use crate::resolver::{Resolution, UpstreamResolver};
use crate::store::{MirrorStore, StoreError, StoreResult};

/// Drives a mirror run: resolve, settle every archive, then write manifests.
///
/// Providers run concurrently and independently; a failure in one never
/// prevents another from completing. Downloads across the whole run share a
/// single bounded pool. Filesystem failures are fatal: they cancel the run
/// and [`run`](Self::run) returns `Err` once in-flight work has drained.
pub struct Reconciler {
    resolver: UpstreamResolver,
    fetcher: ArtifactFetcher,
    store: MirrorStore,
    config: MirrorConfig,
    on_progress: Option<MirrorProgressCallback>,
}

impl Reconciler {
    /// Create a reconciler over explicit collaborators.
    pub fn new(
        config: MirrorConfig,
        registry: Arc<dyn RegistryClient>,
        source: Arc<dyn PackageSource>,
    ) -> Self {
        Self {
            resolver: UpstreamResolver::new(registry),
            fetcher: ArtifactFetcher::new(source, config.retry.clone()),
            store: MirrorStore::new(config.output_dir.clone()),
            config,
            on_progress: None,
        }
    }

    /// Create a reconciler talking HTTPS to real registries.
    pub fn from_config(config: MirrorConfig) -> MirrorResult<Self> {
        let registry = HttpRegistryClient::new(config.timeout)
            .map_err(|e| MirrorError::Config(e.to_string()))?;
        let source = HttpPackageSource::new(config.timeout)
            .map_err(|e| MirrorError::Config(e.to_string()))?;
        Ok(Self::new(config, Arc::new(registry), Arc::new(source)))
    }

    /// Report progress events to `callback`.
    pub fn with_progress(mut self, callback: MirrorProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    /// The run configuration.
    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    /// The mirror store being written.
    pub fn store(&self) -> &MirrorStore {
        &self.store
    }

    /// Mirror every requirement for every configured platform.
    ///
    /// Returns a report even when providers fail; `Err` is reserved for
    /// invalid configuration and filesystem failures.
    pub async fn run(
        &self,
        requirements: &[ProviderRequirement],
        cancel: &CancellationToken,
    ) -> MirrorResult<MirrorReport> {
        if self.config.platforms.is_empty() {
            return Err(MirrorError::Config(
                "at least one target platform is required".to_string(),
            ));
        }

        let requirements = ProviderRequirement::merge_duplicates(requirements);
        let store = self.store.clone();
        blocking(move || store.prepare()).await?;

        info!(
            providers = requirements.len(),
            platforms = self.config.platforms.len(),
            policy = %self.config.policy,
            output = %self.store.root().display(),
            "Starting mirror run"
        );
        self.emit(MirrorEvent::RunStarted {
            providers: requirements.len(),
            platforms: self.config.platforms.len(),
        });

        let run_token = cancel.child_token();
        let downloads = Semaphore::new(self.config.parallel_downloads.max(1));

        let results = join_all(
            requirements
                .iter()
                .map(|req| self.mirror_provider(req, &downloads, &run_token)),
        )
        .await;

        let mut providers = Vec::with_capacity(results.len());
        let mut fatal = None;
        for result in results {
            match result {
                Ok(report) => providers.push(report),
                Err(e) => {
                    fatal.get_or_insert(e);
                }
            }
        }
        if let Some(e) = fatal {
            error!(error = %e, "Mirror run aborted");
            return Err(e.into());
        }

        let report = MirrorReport {
            policy: self.config.policy,
            providers,
            cancelled: cancel.is_cancelled(),
        };
        info!(
            succeeded = report.providers.iter().filter(|p| p.is_success()).count(),
            failed = report.failed_providers().count(),
            written = report.archives_written(),
            kept = report.archives_skipped(),
            "Mirror run finished"
        );
        Ok(report)
    }

    async fn mirror_provider(
        &self,
        requirement: &ProviderRequirement,
        downloads: &Semaphore,
        token: &CancellationToken,
    ) -> StoreResult<ProviderReport> {
        let address = &requirement.address;
        let report = |outcome: ProviderOutcome| ProviderReport {
            address: address.clone(),
            constraint: requirement.constraint.clone(),
            outcome,
        };

        let resolved = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            result = self.resolver.resolve(requirement, &self.config.platforms) => Some(result),
        };
        let resolution = match resolved {
            None => {
                self.finished(address, false);
                return Ok(report(ProviderOutcome::Cancelled));
            }
            Some(Err(e)) => {
                warn!(provider = %address, error = %e, "Resolution failed");
                self.finished(address, false);
                return Ok(report(ProviderOutcome::Unresolved(e)));
            }
            Some(Ok(resolution)) => resolution,
        };

        info!(
            provider = %address,
            version = %resolution.version,
            packages = resolution.packages.len(),
            omitted = resolution.omitted.len(),
            "Resolved provider"
        );
        self.emit(MirrorEvent::ProviderResolved {
            address: address.clone(),
            version: resolution.version.clone(),
            packages: resolution.packages.len(),
            omitted: resolution.omitted.clone(),
        });

        let settlement = self.settle_all(&resolution, downloads, token).await?;
        let Resolution {
            version,
            packages,
            omitted,
            ..
        } = resolution;

        if !settlement.is_complete() {
            warn!(
                provider = %address,
                version = %version,
                failed = settlement.failures.len(),
                "Archives failed, manifests withheld"
            );
            self.finished(address, false);
            return Ok(report(ProviderOutcome::Incomplete {
                version,
                settlement,
                omitted,
            }));
        }

        self.write_manifests(address, &version, &packages, token)
            .await?;
        info!(
            provider = %address,
            version = %version,
            written = settlement.written.len(),
            kept = settlement.skipped.len(),
            "Provider mirrored"
        );
        self.finished(address, true);
        Ok(report(ProviderOutcome::Mirrored {
            version,
            settlement,
            omitted,
        }))
    }

    /// Fan out every package of a resolution and fold the outcomes.
    async fn settle_all(
        &self,
        resolution: &Resolution,
        downloads: &Semaphore,
        token: &CancellationToken,
    ) -> StoreResult<Settlement> {
        let results = join_all(resolution.packages.iter().map(|package| {
            self.settle(
                &resolution.address,
                &resolution.version,
                package,
                downloads,
                token,
            )
        }))
        .await;

        let mut outcomes = Vec::with_capacity(results.len());
        let mut fatal = None;
        for (package, result) in resolution.packages.iter().zip(results) {
            match result {
                Ok(outcome) => outcomes.push((package.platform.clone(), outcome)),
                Err(e) => {
                    fatal.get_or_insert(e);
                }
            }
        }
        match fatal {
            Some(e) => Err(e),
            None => Ok(Settlement::fold(outcomes)),
        }
    }

    async fn settle(
        &self,
        address: &ProviderAddress,
        version: &Version,
        package: &PlatformPackage,
        downloads: &Semaphore,
        token: &CancellationToken,
    ) -> StoreResult<TripleOutcome> {
        let outcome = self
            .settle_package(address, version, package, downloads, token)
            .await?;
        self.emit(MirrorEvent::ArtifactSettled {
            address: address.clone(),
            platform: package.platform.clone(),
            outcome: outcome.label(),
        });
        Ok(outcome)
    }

    async fn settle_package(
        &self,
        address: &ProviderAddress,
        version: &Version,
        package: &PlatformPackage,
        downloads: &Semaphore,
        token: &CancellationToken,
    ) -> StoreResult<TripleOutcome> {
        if self.config.policy.reuses_existing() {
            let (store, a, v, p) = self.owned(address, version, package);
            let valid = blocking(move || Ok(store.has_valid_artifact(&a, &v, &p)))
                .await
                .unwrap_or(false);
            if valid {
                debug!(file = %package.filename, "Valid archive present, keeping");
                return Ok(TripleOutcome::Skipped);
            }
        }

        let _permit = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(TripleOutcome::Failed(MirrorError::Cancelled)),
            permit = downloads.acquire() => match permit {
                Ok(permit) => permit,
                Err(_) => return Ok(TripleOutcome::Failed(MirrorError::Cancelled)),
            },
        };

        let bytes = match self.fetcher.fetch(package, token).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(file = %package.filename, error = %e, "Archive failed");
                return Ok(TripleOutcome::Failed(e.into()));
            }
        };

        let size = bytes.len() as u64;
        let (store, a, v, p) = self.owned(address, version, package);
        if let Err(e) = blocking(move || store.write_artifact(&a, &v, &p, &bytes)).await {
            error!(file = %package.filename, error = %e, "Failed to write archive, cancelling run");
            token.cancel();
            return Err(e);
        }

        Ok(TripleOutcome::Written { bytes: size })
    }

    /// Version manifest first, then the index.
    async fn write_manifests(
        &self,
        address: &ProviderAddress,
        version: &Version,
        packages: &[PlatformPackage],
        token: &CancellationToken,
    ) -> StoreResult<()> {
        let overwrite = self.config.policy.manifest_overwrite();
        let store = self.store.clone();
        let a = address.clone();
        let v = version.clone();
        let packages = packages.to_vec();

        let result = blocking(move || {
            let version_outcome = store.write_version_manifest(&a, &v, &packages, overwrite)?;
            let index_outcome =
                store.write_index_manifest(&a, std::slice::from_ref(&v), overwrite)?;
            Ok((version_outcome, index_outcome))
        })
        .await;

        match result {
            Ok((version_outcome, index_outcome)) => {
                debug!(
                    provider = %address,
                    version_manifest = ?version_outcome,
                    index = ?index_outcome,
                    "Manifests settled"
                );
                Ok(())
            }
            Err(e) => {
                error!(provider = %address, error = %e, "Failed to write manifests, cancelling run");
                token.cancel();
                Err(e)
            }
        }
    }

    fn owned(
        &self,
        address: &ProviderAddress,
        version: &Version,
        package: &PlatformPackage,
    ) -> (MirrorStore, ProviderAddress, Version, PlatformPackage) {
        (
            self.store.clone(),
            address.clone(),
            version.clone(),
            package.clone(),
        )
    }

    fn finished(&self, address: &ProviderAddress, success: bool) {
        self.emit(MirrorEvent::ProviderFinished {
            address: address.clone(),
            success,
        });
    }

    fn emit(&self, event: MirrorEvent) {
        if let Some(callback) = &self.on_progress {
            callback(&event);
        }
    }
}

/// Run synchronous store work on the blocking pool.
async fn blocking<T, F>(work: F) -> StoreResult<T>
where
    F: FnOnce() -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .unwrap_or_else(|e| {
            Err(StoreError::TaskFailed {
                reason: e.to_string(),
            })
        })
}
