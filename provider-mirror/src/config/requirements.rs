//! Requirements files.
//!
//! ```ini
//! [providers]
//! hashicorp/null = 2.1.0
//! hashicorp/template = ~> 2.1
//! registry.example.com/acme/widget =
//! ```
//!
//! Keys are provider addresses, values are version constraints (empty means
//! any version). Other sections are ignored.

use std::path::Path;

use ini::Ini;

use super::ConfigError;
use crate::provider::{ProviderAddress, ProviderRequirement, VersionConstraint};

const PROVIDERS_SECTION: &str = "providers";

/// Read requirements from an INI file.
pub fn load_requirements(path: &Path) -> Result<Vec<ProviderRequirement>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_requirements(&text).map_err(|e| match e {
        ConfigError::Parse { reason, .. } => ConfigError::Parse {
            path: path.to_path_buf(),
            reason,
        },
        other => other,
    })
}

/// Parse requirements from INI text, in file order.
pub fn parse_requirements(text: &str) -> Result<Vec<ProviderRequirement>, ConfigError> {
    let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse {
        path: "<inline>".into(),
        reason: e.to_string(),
    })?;

    let Some(section) = ini.section(Some(PROVIDERS_SECTION)) else {
        return Ok(Vec::new());
    };

    section
        .iter()
        .map(|(key, value)| -> Result<ProviderRequirement, ConfigError> {
            let invalid = |reason: String| ConfigError::InvalidRequirement {
                entry: format!("{} = {}", key, value),
                reason,
            };
            let address: ProviderAddress = key.trim().parse().map_err(|e| invalid(format!("{}", e)))?;
            let constraint: VersionConstraint =
                value.trim().parse().map_err(|e| invalid(format!("{}", e)))?;
            Ok(ProviderRequirement::new(address, constraint))
        })
        .collect()
}
