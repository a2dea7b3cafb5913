//! CLI configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/eversity/config.toml` by default:
//!
//! ```toml
//! [registry]
//! degraded_after = 3
//! default_deadline_ms = 30000
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```

use std::path::{Path, PathBuf};

use eversity_core::{TracingConfig, TracingError, TracingOutputFormat};
use eversity_providers::{ConfigError, RegistryConfig};
use serde::{Deserialize, Serialize};

/// Configuration for the eversity CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Provider registry settings.
    pub registry: RegistryConfig,

    /// Log output settings.
    pub logging: LoggingSettings,
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default level when `RUST_LOG` is not set.
    pub level: String,

    pub format: TracingOutputFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: TracingOutputFormat::Compact,
        }
    }
}

impl LoggingSettings {
    /// Builds the tracing setup; `--debug` wins over the configured level.
    pub fn tracing_config(&self, debug: bool) -> Result<TracingConfig, TracingError> {
        if debug {
            return Ok(TracingConfig::cli_debug().with_format(self.format));
        }
        TracingConfig::default()
            .with_format(self.format)
            .with_level_name(&self.level)
    }
}

impl CliConfig {
    /// Loads configuration from the default path, or the defaults when
    /// no file exists there.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the registry or the logger cannot use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.registry.validate()?;
        self.logging
            .tracing_config(false)
            .map_err(|err| ConfigError::Invalid(format!("logging.level: {err}")))?;
        Ok(())
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("eversity")
    }
}
