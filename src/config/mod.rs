//! Configuration for the package core.
//!
//! Configuration is an explicit value handed to the components at
//! construction; nothing reads process-wide state after startup.
//!
//! # Sources (later wins)
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. A TOML file: `--config <path>`, else `$SUBROUTE_PACKAGES_CONFIG`
//! 3. Environment overrides: `SUBROUTE_PACKAGES_SOURCE`,
//!    `SUBROUTE_PACKAGES_CACHE_DIR`
//!
//! # File Format
//!
//! ```toml
//! source = "https://api.nuget.org/v3/index.json"
//! cache_dir = "/var/cache/subroute/packages"
//! target_frameworks = [".NETFramework,Version=v4.5", ".NETFramework,Version=v4.0"]
//! request_timeout_secs = 30
//!
//! [retry]
//! max_attempts = 4
//! initial_delay_ms = 200
//! max_delay_ms = 5000
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::utils::RetryPolicy;

/// Public NuGet v3 service index.
pub const DEFAULT_SOURCE: &str = "https://api.nuget.org/v3/index.json";

/// Frameworks whose dependency groups are honored when `target_frameworks`
/// is absent from the configuration. An explicitly empty list honors every
/// group.
pub const DEFAULT_TARGET_FRAMEWORKS: &[&str] =
    &[".NETFramework,Version=v4.5", ".NETFramework,Version=v4.0"];

/// Environment variable naming a configuration file.
pub const CONFIG_ENV: &str = "SUBROUTE_PACKAGES_CONFIG";
/// Environment variable overriding [`Config::source`].
pub const SOURCE_ENV: &str = "SUBROUTE_PACKAGES_SOURCE";
/// Environment variable overriding [`Config::cache_dir`].
pub const CACHE_DIR_ENV: &str = "SUBROUTE_PACKAGES_CACHE_DIR";

/// Package core configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Gallery service index URL.
    pub source: String,

    /// Cache root. `None` means the platform cache directory
    /// (see [`default_cache_dir`]).
    pub cache_dir: Option<PathBuf>,

    /// Target frameworks whose dependency groups are followed. Groups without
    /// a target framework always apply; an empty list follows every group.
    pub target_frameworks: Vec<String>,

    /// Per-request timeout for gallery calls.
    pub request_timeout_secs: u64,

    /// User agent sent to the gallery.
    pub user_agent: String,

    /// Retry policy for transient gallery failures.
    pub retry: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE.to_string(),
            cache_dir: None,
            target_frameworks: DEFAULT_TARGET_FRAMEWORKS.iter().map(ToString::to_string).collect(),
            request_timeout_secs: 30,
            user_agent: concat!("subroute-packages/", env!("CARGO_PKG_VERSION")).to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl Config {
    /// Load configuration from an explicit file, the `SUBROUTE_PACKAGES_CONFIG`
    /// file, or defaults, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a named configuration file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse configuration from TOML text. Missing keys take default values.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed TOML or wrongly typed values.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(source) = std::env::var(SOURCE_ENV)
            && !source.trim().is_empty()
        {
            self.source = source;
        }
        if let Some(dir) = std::env::var_os(CACHE_DIR_ENV)
            && !dir.is_empty()
        {
            self.cache_dir = Some(PathBuf::from(dir));
        }
    }

    /// The cache root to use: the configured one or the platform default.
    ///
    /// # Errors
    ///
    /// Returns an error when no cache directory is configured and the
    /// platform cache directory cannot be determined.
    pub fn resolved_cache_dir(&self) -> Result<PathBuf> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_cache_dir(),
        }
    }
}

/// `<platform cache dir>/subroute/packages`, e.g. `~/.cache/subroute/packages`.
///
/// # Errors
///
/// Returns an error if the platform has no cache directory.
pub fn default_cache_dir() -> Result<PathBuf> {
    let base = dirs::cache_dir().context("Could not determine the platform cache directory")?;
    Ok(base.join("subroute").join("packages"))
}
