//! Requirements and resolved platform packages.

use std::fmt;
use std::str::FromStr;

use super::{Platform, ProviderAddress, ReferenceError, VersionConstraint};

/// A provider the caller wants mirrored, with its version constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRequirement {
    pub address: ProviderAddress,
    pub constraint: VersionConstraint,
}

impl ProviderRequirement {
    /// Create a requirement.
    pub fn new(address: ProviderAddress, constraint: VersionConstraint) -> Self {
        Self {
            address,
            constraint,
        }
    }

    /// Merge requirements naming the same provider.
    ///
    /// Constraints for a repeated address are intersected. Order of first
    /// appearance is preserved so runs are reproducible.
    pub fn merge_duplicates(requirements: &[ProviderRequirement]) -> Vec<ProviderRequirement> {
        let mut merged: Vec<ProviderRequirement> = Vec::with_capacity(requirements.len());
        for req in requirements {
            match merged.iter_mut().find(|m| m.address == req.address) {
                Some(existing) => {
                    existing.constraint = existing.constraint.intersect(&req.constraint);
                }
                None => merged.push(req.clone()),
            }
        }
        merged
    }
}

impl FromStr for ProviderRequirement {
    type Err = ReferenceError;

    /// Parse `[host/]namespace/type[=CONSTRAINT]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (address, constraint) = match s.split_once('=') {
            // `hashicorp/null>=1.0` has no separator; `hashicorp/null==1.0` keeps `=1.0`.
            Some((addr, rest)) if !addr.ends_with(is_operator_char) => (addr, rest),
            _ => match s.find(is_operator_char) {
                Some(idx) => s.split_at(idx),
                None => (s, ""),
            },
        };
        Ok(Self {
            address: address.trim().parse()?,
            constraint: constraint.parse()?,
        })
    }
}

fn is_operator_char(c: char) -> bool {
    matches!(c, '<' | '>' | '!' | '~')
}

impl fmt::Display for ProviderRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.address, self.constraint)
    }
}

/// One installable archive for one provider version on one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformPackage {
    pub platform: Platform,
    /// Deterministic archive filename (see [`super::archive_filename`]).
    pub filename: String,
    /// Lowercase hex SHA-256 of the archive bytes.
    pub checksum: String,
    pub download_url: String,
}

impl PlatformPackage {
    /// Manifest hash entry for this archive (`zh:` + SHA-256 of the zip).
    pub fn zip_hash(&self) -> String {
        format!("zh:{}", self.checksum.to_ascii_lowercase())
    }
}
