//! Mirror update policy.

use std::fmt;

use crate::store::Overwrite;

/// How a run treats archives already present in the mirror.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MirrorPolicy {
    /// Re-download and rewrite every archive.
    #[default]
    Replace,
    /// Leave archives that already verify untouched; fetch only the rest.
    Keep,
}

impl MirrorPolicy {
    /// `Keep` when `keep` is set, `Replace` otherwise.
    pub fn from_keep_flag(keep: bool) -> Self {
        if keep {
            Self::Keep
        } else {
            Self::Replace
        }
    }

    /// Whether existing archives are checked before fetching.
    pub fn reuses_existing(self) -> bool {
        matches!(self, Self::Keep)
    }

    /// Overwrite mode for manifest writes under this policy.
    pub fn manifest_overwrite(self) -> Overwrite {
        match self {
            Self::Replace => Overwrite::Always,
            Self::Keep => Overwrite::IfChanged,
        }
    }
}

impl fmt::Display for MirrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Replace => write!(f, "replace"),
            Self::Keep => write!(f, "keep"),
        }
    }
}
