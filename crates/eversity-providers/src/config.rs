//! Registry configuration.
//!
//! Read from the `[registry]` section of a TOML file:
//!
//! ```toml
//! [registry]
//! degraded_after = 3
//! default_deadline_ms = 30000
//! start_deadline_ms = 10000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Registry configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Consecutive `Unavailable` failures before a provider is degraded.
    pub degraded_after: u32,

    /// Deadline for calls that do not pass one.
    #[serde(rename = "default_deadline_ms", with = "millis")]
    pub default_deadline: Duration,

    /// Deadline for each provider's start hook.
    #[serde(rename = "start_deadline_ms", with = "millis")]
    pub start_deadline: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            degraded_after: 3,
            default_deadline: Duration::from_secs(30),
            start_deadline: Duration::from_secs(10),
        }
    }
}

impl RegistryConfig {
    /// Builder: set the degradation threshold.
    pub fn with_degraded_after(mut self, failures: u32) -> Self {
        self.degraded_after = failures;
        self
    }

    /// Builder: set the default call deadline.
    pub fn with_default_deadline(mut self, deadline: Duration) -> Self {
        self.default_deadline = deadline;
        self
    }

    /// Builder: set the start hook deadline.
    pub fn with_start_deadline(mut self, deadline: Duration) -> Self {
        self.start_deadline = deadline;
        self
    }

    /// Rejects values the registry cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.degraded_after == 0 {
            return Err(ConfigError::Invalid(
                "registry.degraded_after must be at least 1".into(),
            ));
        }
        if self.default_deadline.is_zero() {
            return Err(ConfigError::Invalid(
                "registry.default_deadline_ms must be positive".into(),
            ));
        }
        if self.start_deadline.is_zero() {
            return Err(ConfigError::Invalid(
                "registry.start_deadline_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Parses the `[registry]` section of a TOML document.
    ///
    /// A missing section yields the defaults.
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        #[derive(Deserialize)]
        struct Document {
            #[serde(default)]
            registry: RegistryConfig,
        }

        let document: Document = toml::from_str(input)?;
        document.registry.validate()?;
        Ok(document.registry)
    }

    /// Loads the `[registry]` section from a file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RegistryConfig::default();
        assert_eq!(config.degraded_after, 3);
        assert_eq!(config.default_deadline, Duration::from_secs(30));
        assert_eq!(config.start_deadline, Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_partial_section() {
        let config = RegistryConfig::from_toml(
            r#"
            [registry]
            default_deadline_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.degraded_after, 3);
        assert_eq!(config.default_deadline, Duration::from_millis(250));
    }

    #[test]
    fn missing_section_uses_defaults() {
        let config = RegistryConfig::from_toml("[logging]\nlevel = \"info\"\n").unwrap();
        assert_eq!(config, RegistryConfig::default());
    }

    #[test]
    fn rejects_zero_values() {
        for input in [
            "[registry]\ndegraded_after = 0\n",
            "[registry]\ndefault_deadline_ms = 0\n",
            "[registry]\nstart_deadline_ms = 0\n",
        ] {
            assert!(matches!(
                RegistryConfig::from_toml(input),
                Err(ConfigError::Invalid(_))
            ));
        }
    }

    #[test]
    fn rejects_wrong_types() {
        assert!(matches!(
            RegistryConfig::from_toml("[registry]\ndegraded_after = \"three\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[registry]\ndegraded_after = 5\n").unwrap();
        assert_eq!(RegistryConfig::load_from(&path).unwrap().degraded_after, 5);

        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            RegistryConfig::load_from(&missing),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn builders() {
        let config = RegistryConfig::default()
            .with_degraded_after(1)
            .with_default_deadline(Duration::from_millis(50))
            .with_start_deadline(Duration::from_millis(20));
        assert_eq!(config.degraded_after, 1);
        assert_eq!(config.default_deadline, Duration::from_millis(50));
        assert_eq!(config.start_deadline, Duration::from_millis(20));
    }
}
