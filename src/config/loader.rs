//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config file failed: {0}")]
    Io(#[source] std::io::Error),

    #[error("config file is not valid TOML: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("invalid configuration: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: ServiceConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Where the service reads its configuration from.
///
/// Re-read on every reload, so edits to the file take effect on the next
/// restart. Command-line overrides are applied after each read.
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    path: Option<PathBuf>,
    bind_override: Option<String>,
}

impl ConfigSource {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            bind_override: None,
        }
    }

    /// Force a bind address regardless of what the file says.
    pub fn with_bind_override(mut self, bind_address: Option<String>) -> Self {
        self.bind_override = bind_address;
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Produce the current configuration.
    pub fn load(&self) -> Result<ServiceConfig, ConfigError> {
        let mut config = match &self.path {
            Some(path) => load_config(path)?,
            None => ServiceConfig::default(),
        };

        if let Some(bind) = &self.bind_override {
            config.server.bind_address = bind.clone();
            validate_config(&config).map_err(ConfigError::Validation)?;
        }

        Ok(config)
    }
}
