//! Per-triple outcomes and their per-provider fold.

use crate::error::MirrorError;
use crate::provider::Platform;

/// Terminal state of one (provider, version, platform) unit of work.
#[derive(Debug)]
pub enum TripleOutcome {
    /// Keep mode found a valid archive; nothing was fetched or written.
    Skipped,
    /// The archive was fetched, verified and written.
    Written { bytes: u64 },
    /// The archive could not be mirrored.
    Failed(MirrorError),
}

impl TripleOutcome {
    /// Short label used in progress events and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Written { .. } => "written",
            Self::Failed(_) => "failed",
        }
    }
}

/// A platform whose archive failed, with the reason.
#[derive(Debug)]
pub struct PlatformFailure {
    pub platform: Platform,
    pub error: MirrorError,
}

/// Every triple of one provider, folded.
#[derive(Debug, Default)]
pub struct Settlement {
    pub written: Vec<Platform>,
    pub skipped: Vec<Platform>,
    pub failures: Vec<PlatformFailure>,
    pub bytes_written: u64,
}

impl Settlement {
    /// Fold `(platform, outcome)` pairs.
    pub fn fold(outcomes: impl IntoIterator<Item = (Platform, TripleOutcome)>) -> Self {
        outcomes
            .into_iter()
            .fold(Self::default(), |mut acc, (platform, outcome)| {
                match outcome {
                    TripleOutcome::Skipped => acc.skipped.push(platform),
                    TripleOutcome::Written { bytes } => {
                        acc.bytes_written += bytes;
                        acc.written.push(platform);
                    }
                    TripleOutcome::Failed(error) => {
                        acc.failures.push(PlatformFailure { platform, error })
                    }
                }
                acc
            })
    }

    /// Whether every triple reached Skipped or Written.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}
