//! Provider source addresses.

use std::fmt;
use std::str::FromStr;

use super::ReferenceError;

/// Registry host assumed when an address omits one.
pub const DEFAULT_REGISTRY_HOST: &str = "registry.terraform.io";

/// Identity of a provider: `host/namespace/type`.
///
/// All components are stored lowercase. The address maps one-to-one onto the
/// mirror directory `host/namespace/type/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderAddress {
    host: String,
    namespace: String,
    provider_type: String,
}

impl ProviderAddress {
    /// Create an address from its three components.
    ///
    /// # Errors
    ///
    /// Returns an error if any component is empty or contains characters
    /// that cannot appear in a single path segment.
    pub fn new(
        host: impl AsRef<str>,
        namespace: impl AsRef<str>,
        provider_type: impl AsRef<str>,
    ) -> Result<Self, ReferenceError> {
        let display = format!(
            "{}/{}/{}",
            host.as_ref(),
            namespace.as_ref(),
            provider_type.as_ref()
        );
        Ok(Self {
            host: validate_segment(&display, "host", host.as_ref())?,
            namespace: validate_segment(&display, "namespace", namespace.as_ref())?,
            provider_type: validate_segment(&display, "type", provider_type.as_ref())?,
        })
    }

    /// Registry hostname.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Namespace (organisation) segment.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Provider type, e.g. `null`.
    pub fn provider_type(&self) -> &str {
        &self.provider_type
    }

    /// Forward-slash relative directory for this provider inside a mirror.
    pub fn mirror_dir(&self) -> String {
        format!("{}/{}/{}", self.host, self.namespace, self.provider_type)
    }
}

fn validate_segment(input: &str, what: &str, segment: &str) -> Result<String, ReferenceError> {
    let segment = segment.trim();
    if segment.is_empty() {
        return Err(ReferenceError::InvalidAddress {
            input: input.to_string(),
            reason: format!("{} is empty", what),
        });
    }
    if segment == "." || segment == ".." {
        return Err(ReferenceError::InvalidAddress {
            input: input.to_string(),
            reason: format!("{} may not be {:?}", what, segment),
        });
    }
    let valid = segment
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'));
    if !valid {
        return Err(ReferenceError::InvalidAddress {
            input: input.to_string(),
            reason: format!("{} {:?} contains invalid characters", what, segment),
        });
    }
    Ok(segment.to_ascii_lowercase())
}

impl FromStr for ProviderAddress {
    type Err = ReferenceError;

    /// Parse `namespace/type` or `host/namespace/type`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('/').collect();
        match parts.as_slice() {
            [namespace, provider_type] => {
                Self::new(DEFAULT_REGISTRY_HOST, namespace, provider_type)
            }
            [host, namespace, provider_type] => Self::new(host, namespace, provider_type),
            _ => Err(ReferenceError::InvalidAddress {
                input: s.to_string(),
                reason: "expected [host/]namespace/type".to_string(),
            }),
        }
    }
}

impl fmt::Display for ProviderAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mirror_dir())
    }
}
