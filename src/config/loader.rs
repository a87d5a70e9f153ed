//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{GlobalSettings, SiteSettings};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read settings file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing settings file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Parse global settings without semantic validation.
pub fn parse_settings(path: &Path) -> Result<GlobalSettings, ConfigError> {
    let content = read(path)?;
    serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Load and validate global settings from a YAML file.
pub fn load_config(path: &Path) -> Result<GlobalSettings, ConfigError> {
    let settings = parse_settings(path)?;

    validate_config(&settings).map_err(ConfigError::Validation)?;

    Ok(settings)
}

/// Load a host's `site.yaml`.
pub fn load_site_settings(path: &Path) -> Result<SiteSettings, ConfigError> {
    let content = read(path)?;
    if content.trim().is_empty() {
        return Ok(SiteSettings::default());
    }
    serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}
