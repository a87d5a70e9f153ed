//! Host registry and request routing.
//!
//! # Responsibilities
//! - Hold the active route table behind an atomic pointer
//! - Select the host for a request (longest key, then most segments, then
//!   lexicographically smallest key), falling back to `default`
//! - Rebuild the whole table from new global settings
//!
//! # Design Decisions
//! - A route table is immutable; rebuilds construct a new one and swap
//! - A rebuild either fully succeeds or leaves the live table untouched
//! - Old hosts are closed only after the new table is visible

use std::sync::Arc;

use arc_swap::ArcSwap;
use thiserror::Error;

use crate::config::schema::{GlobalSettings, DEFAULT_HOST};
use crate::config::validation::{validate_hosts, ValidationError};
use crate::host::{Host, HostError};
use crate::observability::metrics;
use crate::routing::matcher::{compile, Matcher, RouteTarget};

/// Error type for registry rebuilds.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid hosts: {}", join_errors(.0))]
    Invalid(Vec<ValidationError>),

    #[error("could not start host {name}: {source}")]
    Host {
        name: String,
        #[source]
        source: HostError,
    },
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug)]
struct RouteEntry {
    key: String,
    segments: usize,
    matcher: Box<dyn Matcher>,
    host: Arc<Host>,
}

/// Immutable mapping from route keys to hosts.
#[derive(Debug, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
    default: Option<Arc<Host>>,
}

impl RouteTable {
    /// Build a table from `(key, host)` pairs in configuration order.
    pub fn new(hosts: Vec<(String, Arc<Host>)>) -> Self {
        let mut table = Self::default();
        for (key, host) in hosts {
            match compile(&key) {
                Some(matcher) => table.entries.push(RouteEntry {
                    segments: key.matches('/').count(),
                    key,
                    matcher,
                    host,
                }),
                None => table.default = Some(host),
            }
        }
        table
    }

    /// Host for a request, or the default host when no key matches.
    pub fn lookup(&self, target: &RouteTarget) -> Option<&Arc<Host>> {
        self.entries
            .iter()
            .filter_map(|entry| entry.matcher.match_len(target).map(|len| (len, entry)))
            .max_by(|(a_len, a), (b_len, b)| {
                a_len
                    .cmp(b_len)
                    .then(a.segments.cmp(&b.segments))
                    .then_with(|| b.key.cmp(&a.key))
            })
            .map(|(_, entry)| &entry.host)
            .or(self.default.as_ref())
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Every host in the table.
    pub fn hosts(&self) -> impl Iterator<Item = &Arc<Host>> {
        self.entries.iter().map(|e| &e.host).chain(self.default.iter())
    }
}

/// The set of active hosts.
#[derive(Debug, Default)]
pub struct HostRegistry {
    table: ArcSwap<RouteTable>,
}

impl HostRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the host serving a request.
    pub fn route(&self, host_header: Option<&str>, path: &str) -> Option<Arc<Host>> {
        let target = RouteTarget::new(host_header, path);
        self.table.load().lookup(&target).cloned()
    }

    /// Current hosts.
    pub fn hosts(&self) -> Vec<Arc<Host>> {
        self.table.load().hosts().cloned().collect()
    }

    /// Replace all hosts with the ones named in `settings`.
    ///
    /// Every host is validated and opened before anything becomes visible.
    /// On failure the hosts opened so far are closed and the live table is
    /// left as it was. Must be called from within a Tokio runtime.
    pub fn rebuild(&self, settings: &GlobalSettings) -> Result<(), RegistryError> {
        let result = self.try_rebuild(settings);
        metrics::record_rebuild(result.is_ok());
        result
    }

    fn try_rebuild(&self, settings: &GlobalSettings) -> Result<(), RegistryError> {
        validate_hosts(settings).map_err(RegistryError::Invalid)?;

        let mut opened: Vec<(String, Arc<Host>)> = Vec::with_capacity(settings.hosts.len());
        for (name, root) in &settings.hosts {
            match Host::open(name, root) {
                Ok(host) => opened.push((name.clone(), host)),
                Err(source) => {
                    tracing::error!(host = %name, error = %source, "Could not start host");
                    for (_, host) in &opened {
                        host.close();
                    }
                    return Err(RegistryError::Host {
                        name: name.clone(),
                        source,
                    });
                }
            }
        }

        let table = RouteTable::new(opened);
        if !table.has_default() {
            tracing::warn!("No \"{}\" host configured; unmatched requests will fail", DEFAULT_HOST);
        }

        let previous = self.table.swap(Arc::new(table));
        for host in previous.hosts() {
            host.close();
        }
        tracing::info!(hosts = settings.hosts.len(), "Host registry rebuilt");
        Ok(())
    }

    /// Stop watching every host.
    pub fn close(&self) {
        for host in self.table.load().hosts() {
            host.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::*;

    fn site(dir: &Path, marker: &str) {
        fs::create_dir_all(dir.join("templates")).unwrap();
        fs::write(dir.join("site.yaml"), "").unwrap();
        fs::write(dir.join("templates/index.tpl"), marker).unwrap();
    }

    fn build_table(keys: &[&str]) -> (tempfile::TempDir, RouteTable) {
        let dir = tempfile::tempdir().unwrap();
        let mut hosts = Vec::new();
        for (i, key) in keys.iter().enumerate() {
            let root = dir.path().join(i.to_string());
            site(&root, key);
            hosts.push((key.to_string(), Host::load(key, &root).unwrap()));
        }
        (dir, RouteTable::new(hosts))
    }

    fn routed(table: &RouteTable, host: &str, path: &str) -> Option<String> {
        table
            .lookup(&RouteTarget::new(Some(host), path))
            .map(|h| h.name().to_string())
    }

    #[test]
    fn test_longest_prefix() {
        let (_dir, table) = build_table(&["default", "/blog"]);
        assert_eq!(routed(&table, "x", "/blog/post1").as_deref(), Some("/blog"));
        assert_eq!(routed(&table, "x", "/other").as_deref(), Some("default"));
        assert_eq!(routed(&table, "x", "/blogger").as_deref(), Some("default"));
    }

    #[test]
    fn test_host_keys() {
        let (_dir, table) = build_table(&["default", "example.com", "example.com/blog", "/docs"]);
        assert_eq!(routed(&table, "example.com:8080", "/").as_deref(), Some("example.com"));
        assert_eq!(routed(&table, "example.com", "/blog/a").as_deref(), Some("example.com/blog"));
        assert_eq!(routed(&table, "other.org", "/docs/a").as_deref(), Some("/docs"));
        assert_eq!(routed(&table, "other.org", "/").as_deref(), Some("default"));
    }

    #[test]
    fn test_equal_length_prefers_more_segments() {
        let (_dir, table) = build_table(&["example.com", "/abcdefghij"]);
        assert_eq!(routed(&table, "example.com", "/abcdefghij/x").as_deref(), Some("/abcdefghij"));
        assert_eq!(routed(&table, "example.com", "/other").as_deref(), Some("example.com"));
    }

    #[test]
    fn test_no_default() {
        let (_dir, table) = build_table(&["/docs"]);
        assert!(routed(&table, "x", "/other").is_none());
        assert!(!table.has_default());
    }

    #[tokio::test]
    async fn test_rebuild_failure_keeps_registry() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good");
        site(&good, "good");

        let registry = HostRegistry::new();
        let mut settings = GlobalSettings::default();
        settings.hosts.insert("default".into(), good.clone());
        registry.rebuild(&settings).unwrap();

        let broken = dir.path().join("broken");
        fs::create_dir_all(&broken).unwrap();
        settings.hosts.insert("/broken".into(), broken);
        assert!(matches!(registry.rebuild(&settings), Err(RegistryError::Host { .. })));

        settings.hosts.insert("/missing".into(), dir.path().join("missing"));
        assert!(matches!(registry.rebuild(&settings), Err(RegistryError::Invalid(_))));

        let host = registry.route(Some("x"), "/broken/page").unwrap();
        assert_eq!(host.name(), "default");
        assert_eq!(registry.hosts().len(), 1);
    }
}
