//! Layered application configuration.
//!
//! Sources, lowest priority first:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. A TOML file: `--config <FILE>`, else `config.toml` in the platform
//!    config directory
//! 3. `STAGEDEDUPE_`-prefixed environment variables, `__` for nesting
//!    (e.g. `STAGEDEDUPE_ORACLE__URL`)
//! 4. Command-line flags, applied by the caller
//!
//! ```toml
//! similarity_threshold = 0.9
//! enable_content_scanning = true
//! storage_root = "/srv/uploads"
//!
//! [oracle]
//! url = "http://localhost:8001"
//! timeout_secs = 300
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::duplicates::{ScanOptions, DEFAULT_SIMILARITY_THRESHOLD};
use crate::scanner::WalkerConfig;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "STAGEDEDUPE_";
/// Oracle base URL when none is configured.
pub const DEFAULT_ORACLE_URL: &str = "http://localhost:8001";
/// Oracle request timeout when none is configured.
pub const DEFAULT_ORACLE_TIMEOUT_SECS: u64 = 300;

/// Similarity oracle settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Whether to contact the oracle at all
    pub enabled: bool,
    /// Base URL of the similarity service
    pub url: String,
    /// Overall request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: DEFAULT_ORACLE_URL.to_string(),
            timeout_secs: DEFAULT_ORACLE_TIMEOUT_SECS,
        }
    }
}

impl OracleConfig {
    /// Request timeout as a `Duration`.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Inclusive similarity bound for the perceptual and content stages
    pub similarity_threshold: f64,
    /// Run the exact-match stage
    pub enable_hash_scanning: bool,
    /// Run the perceptual stage
    pub enable_metadata_scanning: bool,
    /// Run the content stage
    pub enable_content_scanning: bool,
    /// Directory record names are resolved against for the oracle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_root: Option<PathBuf>,
    /// Follow symbolic links when scanning a directory
    pub follow_symlinks: bool,
    /// Skip hidden files and directories when scanning
    pub skip_hidden: bool,
    /// Similarity oracle settings
    pub oracle: OracleConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            enable_hash_scanning: true,
            enable_metadata_scanning: true,
            enable_content_scanning: true,
            storage_root: None,
            follow_symlinks: false,
            skip_hidden: false,
            oracle: OracleConfig::default(),
        }
    }
}

impl Config {
    /// The layered figment for `file` (or the default config file).
    #[must_use]
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        match file.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => {
                log::debug!("Reading configuration from {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
            None => log::debug!("No configuration directory available"),
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load the configuration. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is not valid TOML or a value has the
    /// wrong type.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::figment(file)
            .extract()
            .context("Failed to load configuration")
    }

    /// Write the configuration as TOML to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Platform-specific path of the default config file.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "stagededupe", "stagededupe")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Options for one scan.
    #[must_use]
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions::default()
            .with_hash_scanning(self.enable_hash_scanning)
            .with_metadata_scanning(self.enable_metadata_scanning)
            .with_content_scanning(self.enable_content_scanning)
            .with_similarity_threshold(self.similarity_threshold)
    }

    /// Directory walker settings.
    #[must_use]
    pub fn walker_config(&self) -> WalkerConfig {
        WalkerConfig {
            follow_symlinks: self.follow_symlinks,
            skip_hidden: self.skip_hidden,
            ..WalkerConfig::default()
        }
    }
}
