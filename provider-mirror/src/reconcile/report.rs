//! Run summary.

use std::fmt;

use semver::Version;

use super::outcome::{PlatformFailure, Settlement};
use super::policy::MirrorPolicy;
use crate::provider::{Platform, ProviderAddress, VersionConstraint};
use crate::resolver::ResolveError;

/// What happened to one provider.
#[derive(Debug)]
pub enum ProviderOutcome {
    /// Every requested archive is present and both manifests were written.
    Mirrored {
        version: Version,
        settlement: Settlement,
        omitted: Vec<Platform>,
    },
    /// At least one archive failed; manifests were withheld.
    Incomplete {
        version: Version,
        settlement: Settlement,
        omitted: Vec<Platform>,
    },
    /// The provider could not be resolved.
    Unresolved(ResolveError),
    /// The run was cancelled before the provider resolved.
    Cancelled,
}

/// Outcome for one requested provider.
#[derive(Debug)]
pub struct ProviderReport {
    pub address: ProviderAddress,
    pub constraint: VersionConstraint,
    pub outcome: ProviderOutcome,
}

impl ProviderReport {
    /// Whether the provider was fully mirrored.
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ProviderOutcome::Mirrored { .. })
    }

    /// The resolved version, if resolution succeeded.
    pub fn version(&self) -> Option<&Version> {
        match &self.outcome {
            ProviderOutcome::Mirrored { version, .. }
            | ProviderOutcome::Incomplete { version, .. } => Some(version),
            _ => None,
        }
    }

    /// The settled archives, if resolution succeeded.
    pub fn settlement(&self) -> Option<&Settlement> {
        match &self.outcome {
            ProviderOutcome::Mirrored { settlement, .. }
            | ProviderOutcome::Incomplete { settlement, .. } => Some(settlement),
            _ => None,
        }
    }

    /// Requested platforms the resolved version has no build for.
    pub fn omitted(&self) -> &[Platform] {
        match &self.outcome {
            ProviderOutcome::Mirrored { omitted, .. }
            | ProviderOutcome::Incomplete { omitted, .. } => omitted,
            _ => &[],
        }
    }

    /// Per-platform failures (empty unless the outcome is `Incomplete`).
    pub fn failures(&self) -> &[PlatformFailure] {
        match &self.outcome {
            ProviderOutcome::Incomplete { settlement, .. } => &settlement.failures,
            _ => &[],
        }
    }
}

/// Result of a complete mirror run.
#[derive(Debug)]
pub struct MirrorReport {
    pub policy: MirrorPolicy,
    pub providers: Vec<ProviderReport>,
    /// The run's cancellation token fired before the run finished.
    pub cancelled: bool,
}

impl MirrorReport {
    /// True when every provider was fully mirrored.
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.providers.iter().all(ProviderReport::is_success)
    }

    /// Providers that did not fully mirror.
    pub fn failed_providers(&self) -> impl Iterator<Item = &ProviderReport> {
        self.providers.iter().filter(|p| !p.is_success())
    }

    /// Total archives written across all providers.
    pub fn archives_written(&self) -> usize {
        self.settlements().map(|s| s.written.len()).sum()
    }

    /// Total archives left in place by keep mode.
    pub fn archives_skipped(&self) -> usize {
        self.settlements().map(|s| s.skipped.len()).sum()
    }

    /// Total bytes written.
    pub fn bytes_written(&self) -> u64 {
        self.settlements().map(|s| s.bytes_written).sum()
    }

    fn settlements(&self) -> impl Iterator<Item = &Settlement> {
        self.providers.iter().filter_map(ProviderReport::settlement)
    }
}

impl fmt::Display for MirrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let succeeded = self.providers.iter().filter(|p| p.is_success()).count();
        writeln!(
            f,
            "Mirrored {} of {} provider(s) ({} mode): {} archive(s) written, {} kept",
            succeeded,
            self.providers.len(),
            self.policy,
            self.archives_written(),
            self.archives_skipped()
        )?;
        if self.cancelled {
            writeln!(f, "Run was cancelled")?;
        }

        for report in self.failed_providers() {
            match &report.outcome {
                ProviderOutcome::Unresolved(e) => writeln!(f, "  {}: {}", report.address, e)?,
                ProviderOutcome::Cancelled => writeln!(f, "  {}: cancelled", report.address)?,
                ProviderOutcome::Incomplete { version, .. } => {
                    for failure in report.failures() {
                        writeln!(
                            f,
                            "  {} {} {}: {}",
                            report.address, version, failure.platform, failure.error
                        )?;
                    }
                }
                ProviderOutcome::Mirrored { .. } => {}
            }
        }

        for report in &self.providers {
            let omitted = report.omitted();
            if let (Some(version), false) = (report.version(), omitted.is_empty()) {
                let names: Vec<String> = omitted.iter().map(ToString::to_string).collect();
                writeln!(
                    f,
                    "  {} {}: no build for {}",
                    report.address,
                    version,
                    names.join(", ")
                )?;
            }
        }
        Ok(())
    }
}
