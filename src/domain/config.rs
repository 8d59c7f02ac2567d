//! Config - Browser Configuration
//!
//! Persisted as TOML in the platform configuration directory. Every field has
//! a default so a partial or empty file is valid.

use crate::constants::{DEFAULT_DELIMITER, DEFAULT_PAGE_SIZE, INVOKE_TIMEOUT_SECS};
use crate::error::{Error, Result};
use crate::helpers::get_or_create_config_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE_NAME: &str = "keyspace-browser.toml";

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Key cache and tree settings
    pub keyspace: KeyspaceConfig,
    /// Bridge settings
    pub bridge: BridgeConfig,
    /// Logging settings
    pub log: LogConfig,
}

/// Key cache and tree settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyspaceConfig {
    /// Keys requested per SCAN page
    pub page_size: u32,
    /// Delimiter used to group keys into a tree
    pub delimiter: String,
}

impl Default for KeyspaceConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            delimiter: DEFAULT_DELIMITER.to_string(),
        }
    }
}

/// Bridge settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Seconds to wait for a reply, 0 waits forever
    pub invoke_timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            invoke_timeout_secs: INVOKE_TIMEOUT_SECS,
        }
    }
}

impl BridgeConfig {
    pub fn invoke_timeout(&self) -> Option<Duration> {
        (self.invoke_timeout_secs > 0).then(|| Duration::from_secs(self.invoke_timeout_secs))
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
    /// Directory for daily rolling log files; stdout only when unset
    pub directory: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

fn get_config_path() -> Result<PathBuf> {
    let config_dir = get_or_create_config_dir()?;
    let path = config_dir.join(CONFIG_FILE_NAME);
    if !path.exists() {
        std::fs::write(&path, "")?;
    }
    Ok(path)
}

impl BrowserConfig {
    /// Load from the default config file, creating it empty if missing.
    ///
    /// Returns the path that was read so the caller can report it once
    /// logging is up.
    pub fn try_load() -> Result<(Self, PathBuf)> {
        let path = get_config_path()?;
        let config = Self::load_from(&path)?;
        Ok((config, path))
    }

    /// Load from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let value = std::fs::read_to_string(path)?;
        Self::parse(&value)
    }

    /// Parse TOML text; blank text yields the defaults
    pub fn parse(value: &str) -> Result<Self> {
        if value.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Save to the default config file
    pub fn save(&self) -> Result<()> {
        let path = get_config_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let value = toml::to_string_pretty(self)?;
        std::fs::write(path, value)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.keyspace.page_size == 0 {
            return Err(Error::invalid("keyspace.page_size must be greater than 0"));
        }
        Ok(())
    }
}
