//! Mirror reconciliation.
//!
//! Each (provider, version, platform) triple moves through:
//!
//! ```text
//! START → RESOLVED → SKIP                         (keep mode, valid archive present)
//!                  → FETCHING → VERIFIED → WRITTEN
//!                  → FETCHING → FAILED            (integrity, exhausted retries, cancelled)
//! ```
//!
//! Once every triple of a provider is terminal, and only if none failed, the
//! version manifest and then the index manifest are written. Manifests are
//! therefore never visible ahead of the archives they describe.

mod outcome;
mod policy;
mod progress;
mod reconciler;
mod report;

pub use outcome::{PlatformFailure, Settlement, TripleOutcome};
pub use policy::MirrorPolicy;
pub use progress::{MirrorEvent, MirrorProgressCallback};
pub use reconciler::Reconciler;
pub use report::{MirrorReport, ProviderOutcome, ProviderReport};
