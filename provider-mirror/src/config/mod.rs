//! Configuration for mirror runs.
//!
//! - [`MirrorConfig`]: the resolved settings a [`Reconciler`](crate::reconcile::Reconciler) runs with
//! - [`ConfigFile`]: optional user defaults from `~/.provider-mirror/config.ini`
//! - [`parse_requirements`] / [`load_requirements`]: INI requirements files
//!
//! Precedence is command-line flags, then the config file, then built-in
//! defaults.

mod file;
mod requirements;

pub use file::{ConfigFile, DownloadSettings, LoggingSettings};
pub use requirements::{load_requirements, parse_requirements};

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::fetch::RetryPolicy;
use crate::provider::Platform;
use crate::reconcile::MirrorPolicy;

/// Default number of concurrent downloads.
pub const DEFAULT_PARALLEL_DOWNLOADS: usize = 4;

/// Default HTTP timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Errors from loading configuration or requirements.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid INI.
    #[error("failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    /// A key holds a value of the wrong shape.
    #[error("invalid value for [{section}] {key}: {value:?} ({reason})")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// A requirement line names an invalid provider or constraint.
    #[error("invalid requirement {entry:?}: {reason}")]
    InvalidRequirement { entry: String, reason: String },
}

/// Settings for one mirror run.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Root directory of the mirror.
    pub output_dir: PathBuf,

    /// Target platforms; every provider is mirrored for each of them.
    pub platforms: Vec<Platform>,

    /// Keep or replace existing archives.
    pub policy: MirrorPolicy,

    /// Maximum concurrent archive downloads across the run.
    pub parallel_downloads: usize,

    /// HTTP request timeout for registry and download calls.
    pub timeout: Duration,

    /// Retry policy for transient download failures.
    pub retry: RetryPolicy,
}

impl MirrorConfig {
    /// Create a configuration writing to `output_dir`, with defaults for
    /// everything else and no platforms.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            platforms: Vec::new(),
            policy: MirrorPolicy::default(),
            parallel_downloads: DEFAULT_PARALLEL_DOWNLOADS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
        }
    }

    /// Set the mirror policy.
    pub fn with_policy(mut self, policy: MirrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the target platforms. Duplicates are dropped, order is kept.
    pub fn with_platforms(mut self, platforms: impl IntoIterator<Item = Platform>) -> Self {
        self.platforms.clear();
        for platform in platforms {
            if !self.platforms.contains(&platform) {
                self.platforms.push(platform);
            }
        }
        self
    }

    /// Set the maximum concurrent downloads (at least 1).
    pub fn with_parallel_downloads(mut self, parallel: usize) -> Self {
        self.parallel_downloads = parallel.max(1);
        self
    }

    /// Set the HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
