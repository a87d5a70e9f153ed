//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that every host points at an existing directory
//! - Check that the server section describes a transport this build provides
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GlobalSettings → Result<(), Vec<ValidationError>>
//! - Runs before settings are accepted into the system

use std::path::PathBuf;

use thiserror::Error;

use crate::config::schema::{GlobalSettings, ServerType};

/// A single semantic problem found in the global settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing 'hosts' entry")]
    NoHosts,

    #[error("host {name} points to {path:?}, which does not exist")]
    MissingRoot { name: String, path: PathBuf },

    #[error("host {name} does not point to a directory ({path:?})")]
    NotADirectory { name: String, path: PathBuf },

    #[error("server port must be non-zero when no socket is configured")]
    InvalidPort,

    #[error("server type 'fastcgi' is not supported by this build")]
    UnsupportedTransport,
}

/// Check the host table only. Used by registry rebuilds, which ignore the
/// server section.
pub fn validate_hosts(settings: &GlobalSettings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if settings.hosts.is_empty() {
        errors.push(ValidationError::NoHosts);
    }

    for (name, path) in &settings.hosts {
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => errors.push(ValidationError::NotADirectory {
                name: name.clone(),
                path: path.clone(),
            }),
            Err(_) => errors.push(ValidationError::MissingRoot {
                name: name.clone(),
                path: path.clone(),
            }),
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Validate the whole settings document.
pub fn validate_config(settings: &GlobalSettings) -> Result<(), Vec<ValidationError>> {
    let mut errors = validate_hosts(settings).err().unwrap_or_default();

    if settings.server.kind == ServerType::FastCgi {
        errors.push(ValidationError::UnsupportedTransport);
    }
    if settings.server.socket.is_none() && settings.server.port == 0 {
        errors.push(ValidationError::InvalidPort);
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
