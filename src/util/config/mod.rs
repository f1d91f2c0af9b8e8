//! Engine configuration
//!
//! Configuration is optional; every field has a default. It can be loaded
//! from a RON file:
//!
//! ```text
//! (
//!     strict_keys: true,
//!     max_resumptions: 1024,
//!     trace_effects: false,
//! )
//! ```
//!
//! # Lookup order
//!
//! ```text
//! 1. Explicit path (CLI --config)
//! 2. RATCHET_CONFIG environment variable
//! 3. Default values
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "RATCHET_CONFIG";

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Reject duplicate sibling keys instead of matching them by position
    #[serde(default = "default_strict_keys")]
    pub strict_keys: bool,
    /// Body resumptions allowed per execution before it is stopped
    #[serde(default = "default_max_resumptions")]
    pub max_resumptions: usize,
    /// Log every host effect at TRACE level
    #[serde(default)]
    pub trace_effects: bool,
}

fn default_strict_keys() -> bool {
    true
}

fn default_max_resumptions() -> usize {
    1024
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strict_keys: true,
            max_resumptions: 1024,
            trace_effects: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ParseError(#[from] ron::error::SpannedError),

    #[error("Config serialize error: {0}")]
    SerializeError(#[from] ron::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl EngineConfig {
    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_resumptions == 0 {
            return Err(ConfigError::Invalid(
                "max_resumptions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse a config from RON text.
pub fn from_ron_str(content: &str) -> Result<EngineConfig, ConfigError> {
    let config: EngineConfig = ron::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Load a config file.
pub fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    from_ron_str(&content)
}

/// Render a config as pretty RON.
pub fn to_ron_string(config: &EngineConfig) -> Result<String, ConfigError> {
    Ok(ron::ser::to_string_pretty(
        config,
        ron::ser::PrettyConfig::default(),
    )?)
}

/// Write a config file.
pub fn save_config(
    path: &Path,
    config: &EngineConfig,
) -> Result<(), ConfigError> {
    fs::write(path, to_ron_string(config)?)?;
    Ok(())
}

/// Path named by `RATCHET_CONFIG`, if set.
pub fn config_path_from_env() -> Option<PathBuf> {
    std::env::var_os(CONFIG_ENV).map(PathBuf::from)
}

/// Load the config named by `RATCHET_CONFIG`, or the defaults.
pub fn load_default_config() -> Result<EngineConfig, ConfigError> {
    match config_path_from_env() {
        Some(path) => load_config(&path),
        None => Ok(EngineConfig::default()),
    }
}
