//! Configuration schema definitions.
//!
//! This module defines the global settings structure for the server and the
//! open per-host settings document. All types derive Serde traits for
//! deserialization from YAML files.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

/// Name of the fallback route used when nothing else matches.
pub const DEFAULT_HOST: &str = "default";

/// Root configuration for the server process.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GlobalSettings {
    /// Route name -> document root directory.
    pub hosts: BTreeMap<String, PathBuf>,

    /// Listener configuration (transport, bind address, socket).
    pub server: ServerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Transport used to talk to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServerType {
    /// Plain HTTP server.
    #[default]
    Standalone,
    /// FastCGI responder behind a front web server.
    FastCgi,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Transport type.
    #[serde(rename = "type")]
    pub kind: ServerType,

    /// Interface to bind when no socket is given.
    pub bind: String,

    /// TCP port to bind when no socket is given.
    pub port: u16,

    /// Unix socket path. Takes precedence over bind/port.
    pub socket: Option<PathBuf>,
}

impl ServerConfig {
    /// TCP address in `bind:port` form.
    pub fn tcp_address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            kind: ServerType::Standalone,
            bind: "127.0.0.1".to_string(),
            port: 9000,
            socket: None,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9100".to_string(),
        }
    }
}

/// Per-host settings loaded from `site.yaml`.
///
/// The document is open-ended: the server reads a handful of keys and hands
/// the whole tree to templates as `site`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteSettings(Value);

impl SiteSettings {
    /// Wrap an already parsed YAML document.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Look up a nested value by its key path.
    pub fn get(&self, path: &[&str]) -> Option<&Value> {
        path.iter()
            .try_fold(&self.0, |node, key| node.as_mapping()?.get(*key))
    }

    /// Look up a nested string, treating blank strings as absent.
    pub fn get_str(&self, path: &[&str]) -> Option<&str> {
        self.get(path)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// The raw document.
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}
