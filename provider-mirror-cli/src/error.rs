//! CLI error type.

use std::fmt;

use provider_mirror::config::ConfigError;
use provider_mirror::MirrorError;

/// Errors surfaced to the user by the CLI.
#[derive(Debug)]
pub enum CliError {
    /// Invalid or missing configuration.
    Config(String),
    /// Logging could not be set up.
    Logging(String),
    /// A requirements file could not be loaded.
    Requirements(ConfigError),
    /// The async runtime could not be started.
    Runtime(std::io::Error),
    /// The mirror run aborted.
    Mirror(MirrorError),
    /// The run finished but some providers were not mirrored.
    Incomplete { failed: usize, cancelled: bool },
    /// The mirror could not be audited.
    Audit(String),
    /// The audit found problems.
    AuditFailed { issues: usize },
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Logging(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Requirements(e) => write!(f, "Failed to load requirements: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::Mirror(e) => write!(f, "Mirror run failed: {}", e),
            CliError::Incomplete { failed, cancelled } => {
                if *cancelled {
                    write!(f, "Mirror run cancelled; {} provider(s) incomplete", failed)
                } else {
                    write!(f, "{} provider(s) failed to mirror", failed)
                }
            }
            CliError::Audit(msg) => write!(f, "Failed to audit mirror: {}", msg),
            CliError::AuditFailed { issues } => {
                write!(f, "Mirror has {} problem(s)", issues)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Requirements(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            CliError::Mirror(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomplete_display() {
        let err = CliError::Incomplete {
            failed: 2,
            cancelled: false,
        };
        assert_eq!(err.to_string(), "2 provider(s) failed to mirror");

        let err = CliError::Incomplete {
            failed: 1,
            cancelled: true,
        };
        assert!(err.to_string().contains("cancelled"));
    }

    #[test]
    fn test_mirror_error_source() {
        use std::error::Error;
        let err = CliError::Mirror(MirrorError::Cancelled);
        assert!(err.source().is_some());
        assert!(CliError::Config("x".to_string()).source().is_none());
    }
}
