//! Database configuration.
//!
//! Controls how fresh databases are initialised and how they are saved.
//! Usually read from a `keeprs.toml` file.

use crate::format::{FormatVersion, StreamConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Errors reading or writing a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to access config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Database configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Marker written to `Meta/Generator` before every save.
    #[serde(default = "default_generator")]
    pub generator: String,
    /// Whether new databases start with the recycle bin enabled.
    #[serde(default = "default_recycle_bin_enabled")]
    pub recycle_bin_enabled: bool,
    /// Version used when saving a database that was never loaded.
    #[serde(default)]
    pub default_version: FormatVersion,
    /// Initial name of new databases.
    #[serde(default)]
    pub name: Option<String>,
    /// Initial description of new databases.
    #[serde(default)]
    pub description: Option<String>,
}

fn default_generator() -> String {
    "keeprs-dom".to_string()
}

fn default_recycle_bin_enabled() -> bool {
    true
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            generator: default_generator(),
            recycle_bin_enabled: default_recycle_bin_enabled(),
            default_version: FormatVersion::default(),
            name: None,
            description: None,
        }
    }
}

impl DatabaseConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml(&contents)?;
        tracing::info!("Loaded config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Save configuration as TOML, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let io_error = |source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(io_error)
    }

    /// Stream settings for databases that were not loaded from a stream.
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig::new(self.default_version)
    }
}
