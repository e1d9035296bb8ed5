use std::{fs, num::NonZeroUsize, path::Path, path::PathBuf};

use serde::Deserialize;
use shared_logging::LogLevel;

use crate::{
    error::ConfigError, models::ModelKind, registry::DEFAULT_ID_PREFIX,
    telemetry::EnsembleTelemetry,
};

/// Settings for building registries and their coordinators.
#[derive(Debug, Clone, Deserialize)]
pub struct EnsembleConfig {
    /// Capacity given to coordinators when the caller does not pick one.
    #[serde(default = "default_capacity")]
    pub default_capacity: usize,
    /// Prefix of issued controller identifiers.
    #[serde(default = "default_prefix")]
    pub id_prefix: String,
    /// Model family produced by the default factory.
    #[serde(default)]
    pub model: ModelKind,
    /// Logging sinks.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging section of the configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// JSON-lines log file; nothing is written when absent.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Minimum level written.
    #[serde(default)]
    pub level: LogLevel,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            default_capacity: default_capacity(),
            id_prefix: default_prefix(),
            model: ModelKind::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl EnsembleConfig {
    /// Loads and validates configuration from a TOML file.
    ///
    /// A relative log path is resolved against the file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&raw)?;
        if let (Some(log_path), Some(dir)) = (config.logging.path.as_mut(), path.parent()) {
            if log_path.is_relative() {
                *log_path = dir.join(&*log_path);
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the registry cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_capacity == 0 {
            return Err(ConfigError::InvalidCapacity);
        }
        Ok(())
    }

    /// Default capacity as a non-zero count.
    pub fn capacity(&self) -> Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(self.default_capacity).ok_or(ConfigError::InvalidCapacity)
    }

    /// Builds telemetry from the logging section.
    pub fn telemetry(&self, module: &str) -> anyhow::Result<EnsembleTelemetry> {
        let mut builder = EnsembleTelemetry::builder(module).min_level(self.logging.level);
        if let Some(path) = &self.logging.path {
            builder = builder.log_path(path);
        }
        builder.build()
    }
}

const fn default_capacity() -> usize {
    3
}

fn default_prefix() -> String {
    DEFAULT_ID_PREFIX.to_string()
}
