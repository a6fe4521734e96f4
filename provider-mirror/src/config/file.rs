//! User configuration file (`~/.provider-mirror/config.ini`).
//!
//! ```ini
//! [download]
//! timeout = 300
//! parallel = 4
//! retries = 2
//!
//! [logging]
//! directory = /var/log/provider-mirror
//! ```
//!
//! Every key is optional. `retries` counts attempts after the first.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};

use super::{ConfigError, MirrorConfig};
use crate::fetch::RetryPolicy;

/// Directory under the home directory holding the config file.
const CONFIG_DIR: &str = ".provider-mirror";

/// Config file name.
const CONFIG_FILE: &str = "config.ini";

/// `[download]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSettings {
    pub timeout_secs: Option<u64>,
    pub parallel: Option<usize>,
    pub retries: Option<u32>,
}

/// `[logging]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingSettings {
    pub directory: Option<PathBuf>,
}

/// Parsed config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub download: DownloadSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// `~/.provider-mirror/config.ini`, if a home directory is known.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load the default config file; a missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load a specific config file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let ini = Ini::load_from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    /// Parse config file text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(section) = ini.section(Some("download")) {
            config.download.timeout_secs = parse_key(section, "download", "timeout")?;
            config.download.parallel = parse_key(section, "download", "parallel")?;
            config.download.retries = parse_key(section, "download", "retries")?;

            if config.download.parallel == Some(0) {
                return Err(invalid("download", "parallel", "0", "must be at least 1"));
            }
        }

        if let Some(section) = ini.section(Some("logging")) {
            config.logging.directory = section
                .get("directory")
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(expand_home);
        }

        Ok(config)
    }

    /// Overlay these settings onto `config`.
    pub fn apply(&self, mut config: MirrorConfig) -> MirrorConfig {
        if let Some(secs) = self.download.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(parallel) = self.download.parallel {
            config = config.with_parallel_downloads(parallel);
        }
        if let Some(retries) = self.download.retries {
            config = config.with_retry_policy(RetryPolicy::exponential(retries.saturating_add(1)));
        }
        config
    }
}

fn parse_key<T>(section: &Properties, name: &str, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match section.get(key).map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e: T::Err| invalid(name, key, raw, &e.to_string())),
    }
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Expand a leading `~/` to the home directory.
fn expand_home(value: &str) -> PathBuf {
    match (value.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(value),
    }
}
