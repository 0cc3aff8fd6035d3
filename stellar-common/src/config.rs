//! Configuration file resolution and loading
//!
//! Config file resolution follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Per-user config directory (`<config_dir>/stellar/<file_name>`)
//! 4. None (caller falls back to compiled defaults)
//!
//! A missing or unreadable config file is never fatal: the caller logs a
//! warning and starts with defaults.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory name used under the platform config directory
pub const CONFIG_DIR_NAME: &str = "stellar";

/// Logging configuration shared by Stellar binaries
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Resolve the config file path
///
/// Returns the first candidate that exists on disk. An explicitly requested
/// file (CLI or environment) that does not exist is reported and skipped.
pub fn resolve_config_path(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    file_name: &str,
) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        if path.exists() {
            return Some(path.to_path_buf());
        }
        warn!("Config file from command line not found: {}", path.display());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
        warn!("Config file from {} not found: {}", env_var_name, path.display());
    }

    // Priority 3: Per-user config directory
    let user_config = dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(file_name));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
        debug!("No user config at {}", path.display());
    }

    None
}

/// Load and deserialize a TOML file
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Load a TOML config, falling back to `T::default()` on any failure
///
/// Returns the config together with the path it was loaded from (None when
/// defaults were used).
pub fn load_or_default<T: DeserializeOwned + Default>(
    path: Option<&Path>,
) -> (T, Option<PathBuf>) {
    let Some(path) = path else {
        return (T::default(), None);
    };

    match load_toml(path) {
        Ok(config) => (config, Some(path.to_path_buf())),
        Err(e) => {
            warn!("{}; using built-in defaults", e);
            (T::default(), None)
        }
    }
}
