//! Target platforms.

use std::fmt;
use std::str::FromStr;

use super::ReferenceError;

/// An operating system / architecture pair, rendered as `os_arch`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Platform {
    os: String,
    arch: String,
}

impl Platform {
    /// Create a platform from its components.
    pub fn new(os: impl AsRef<str>, arch: impl AsRef<str>) -> Result<Self, ReferenceError> {
        let input = format!("{}_{}", os.as_ref(), arch.as_ref());
        let os = validate(&input, os.as_ref())?;
        let arch = validate(&input, arch.as_ref())?;
        Ok(Self { os, arch })
    }

    /// Operating system, e.g. `linux`.
    pub fn os(&self) -> &str {
        &self.os
    }

    /// Architecture, e.g. `amd64`.
    pub fn arch(&self) -> &str {
        &self.arch
    }
}

fn validate(input: &str, part: &str) -> Result<String, ReferenceError> {
    let valid = !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric());
    if !valid {
        return Err(ReferenceError::InvalidPlatform {
            input: input.to_string(),
        });
    }
    Ok(part.to_ascii_lowercase())
}

impl FromStr for Platform {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once('_') {
            Some((os, arch)) => Self::new(os, arch).map_err(|_| ReferenceError::InvalidPlatform {
                input: s.to_string(),
            }),
            None => Err(ReferenceError::InvalidPlatform {
                input: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.os, self.arch)
    }
}
