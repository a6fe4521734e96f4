//! Progress events emitted during a mirror run.

use semver::Version;

use crate::provider::{Platform, ProviderAddress};

/// Progress callback invoked from the reconciler's tasks.
///
/// Called concurrently from several providers; implementations must be cheap
/// and must not block.
pub type MirrorProgressCallback = Box<dyn Fn(&MirrorEvent) + Send + Sync>;

/// Something noteworthy happened during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorEvent {
    /// The run is starting with this many providers and platforms.
    RunStarted { providers: usize, platforms: usize },
    /// A provider resolved to a version with `packages` archives to settle.
    ProviderResolved {
        address: ProviderAddress,
        version: Version,
        packages: usize,
        omitted: Vec<Platform>,
    },
    /// One archive reached a terminal state.
    ArtifactSettled {
        address: ProviderAddress,
        platform: Platform,
        outcome: &'static str,
    },
    /// A provider finished; `success` is false if it failed in any way.
    ProviderFinished {
        address: ProviderAddress,
        success: bool,
    },
}
