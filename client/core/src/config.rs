//! Configuration
//!
//! Loads the client configuration from a TOML file at
//! `~/.config/parley/parley.toml`, with environment-variable overrides.
//! The resolved [`Config`] is passed into components at construction time;
//! the core keeps no implicit global state.
//!
//! # Configuration Priority
//!
//! Values are resolved with the following priority (highest first):
//! 1. Environment variables (`PARLEY_BACKEND_URL`, `PARLEY_REQUEST_TIMEOUT_SECS`)
//! 2. TOML configuration file
//! 3. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [backend]
//! base_url = "http://localhost:8000"
//! request_timeout_secs = 120
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Backend base URL used when nothing is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Per-request timeout used when nothing is configured.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file
    #[error("Failed to read config file at {path}: {source}")]
    Read {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Backend section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendToml {
    /// Backend base URL
    pub base_url: Option<String>,

    /// Per-request timeout in seconds
    pub request_timeout_secs: Option<u64>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParleyToml {
    /// Backend configuration section
    pub backend: BackendToml,
}

/// Values taken from the environment, overriding the file
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// `PARLEY_BACKEND_URL`
    pub base_url: Option<String>,
    /// `PARLEY_REQUEST_TIMEOUT_SECS`
    pub request_timeout_secs: Option<u64>,
}

impl ConfigOverrides {
    /// Read overrides from the process environment
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("PARLEY_BACKEND_URL").ok(),
            request_timeout_secs: std::env::var("PARLEY_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }
}

/// Resolved backend connection settings
#[derive(Clone, Debug)]
pub struct BackendConfig {
    /// Backend base URL
    pub base_url: String,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

/// Resolved client configuration
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Backend connection settings
    pub backend: BackendConfig,
}

/// Default configuration file path (`~/.config/parley/parley.toml`)
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("parley").join("parley.toml"))
}

/// Load configuration from the default path, if present, plus environment
///
/// A missing file is not an error; defaults apply.
pub fn load_config() -> Result<Config, ConfigError> {
    let file = match default_config_path() {
        Some(path) if path.exists() => read_file(&path)?,
        _ => ParleyToml::default(),
    };
    Ok(resolve(&file, &ConfigOverrides::from_env()))
}

/// Load configuration from an explicit path plus environment
pub fn load_config_from_path(path: &Path) -> Result<Config, ConfigError> {
    let file = read_file(path)?;
    Ok(resolve(&file, &ConfigOverrides::from_env()))
}

/// Merge file values and overrides onto the defaults
#[must_use]
pub fn resolve(file: &ParleyToml, overrides: &ConfigOverrides) -> Config {
    let base_url = overrides
        .base_url
        .clone()
        .or_else(|| file.backend.base_url.clone())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    let request_timeout_secs = overrides
        .request_timeout_secs
        .or(file.backend.request_timeout_secs)
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

    Config {
        backend: BackendConfig {
            base_url,
            request_timeout: Duration::from_secs(request_timeout_secs),
        },
    }
}

fn read_file(path: &Path) -> Result<ParleyToml, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&text)?)
}
