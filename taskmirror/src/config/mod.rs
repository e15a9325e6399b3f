//! Configuration for the synchronization engine.
//!
//! Layered with the following priority (highest first):
//! 1. Values set programmatically on [`SyncConfig`]
//! 2. TOML config file (`~/.config/taskmirror/config.toml`)
//! 3. Compiled defaults
//!
//! A missing config file at the default path is not an error (defaults are
//! used). An explicit path that doesn't exist is an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

/// Top-level TOML config file structure (all fields optional for partial
/// overrides).
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    sync: SyncFileConfig,
}

/// `[sync]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SyncFileConfig {
    freshness_max_age_secs: Option<u64>,
    event_buffer: Option<usize>,
}

/// Resolved engine configuration with all fields populated.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How old a cached snapshot may be and still be served without a
    /// remote refetch.
    pub freshness_max_age: Duration,
    /// Capacity of each subscriber's event channel. A subscriber that falls
    /// further behind than this starts losing events (with a warning).
    /// Clamped to a minimum of 1: replaying the last event to a new
    /// subscriber needs one free slot.
    pub event_buffer: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            freshness_max_age: Duration::from_secs(5 * 60),
            event_buffer: 64,
        }
    }
}

impl SyncConfig {
    /// Loads configuration from an explicit path, or from the default path
    /// when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an explicitly given file cannot be read,
    /// or if the file contents are not valid TOML.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| {
                    ConfigError::ReadFile {
                        path: path.to_path_buf(),
                        source,
                    }
                })?;
                Self::from_toml_str(&raw)
            }
            None => match default_config_path() {
                Some(path) if path.exists() => Self::load(Some(&path)),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Parses a TOML document over the compiled defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ParseToml`] on invalid TOML.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(raw)?;
        let defaults = Self::default();
        Ok(Self {
            freshness_max_age: file
                .sync
                .freshness_max_age_secs
                .map_or(defaults.freshness_max_age, Duration::from_secs),
            event_buffer: file
                .sync
                .event_buffer
                .unwrap_or(defaults.event_buffer)
                .max(1),
        })
    }
}

/// Default config file path: `~/.config/taskmirror/config.toml`.
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("taskmirror").join("config.toml"))
}
