//! CLI configuration.
//!
//! Settings come from an optional TOML file (default `passvault.toml`) and
//! are then overridden by environment variables. A missing file is not an
//! error; a present but malformed one is.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "passvault.toml";

/// Environment variable overriding [`CliConfig::data_dir`].
pub const ENV_DATA_DIR: &str = "PASSVAULT_DATA_DIR";

/// Environment variable overriding [`CliConfig::log_level`].
pub const ENV_LOG_LEVEL: &str = "PASSVAULT_LOG_LEVEL";

/// Runtime settings for the `passvault` binary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    /// Directory holding `keychain.vault`.
    ///
    /// Default: **`data`**.
    pub data_dir: PathBuf,

    /// Default tracing filter when `RUST_LOG` is unset.
    ///
    /// Default: **`info`**.
    pub log_level: String,

    /// Whether loads pass the stored checksum as the trusted checksum.
    ///
    /// Default: **true**.
    pub verify_checksum: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            log_level: "info".into(),
            verify_checksum: true,
        }
    }
}

impl CliConfig {
    /// Read `path`, falling back to defaults if it does not exist.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    /// Apply overrides from `lookup` (normally the process environment).
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
        self
    }

    /// Load from `path` (or the default location) and apply env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or(Path::new(DEFAULT_CONFIG_PATH));
        Ok(Self::from_file(path)?.with_overrides(crate::helpers::env_non_empty))
    }
}
