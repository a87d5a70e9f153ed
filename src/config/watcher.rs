//! Global settings file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::parse_settings;
use crate::config::schema::GlobalSettings;

/// A watcher that monitors the global settings file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<GlobalSettings>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for parsed settings updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<GlobalSettings>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (Self {
            path: path.to_path_buf(),
            update_tx,
        }, update_rx)
    }

    /// Start watching the file in a background thread.
    ///
    /// The parent directory is watched so that editors replacing the file
    /// (write to temp + rename) keep triggering reloads.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();
        let file_name = self.path.file_name().map(ToOwned::to_owned);

        let mut watcher = RecommendedWatcher::new(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    let relevant = (event.kind.is_modify() || event.kind.is_create())
                        && event.paths.iter().any(|p| p.file_name() == file_name.as_deref());
                    if !relevant {
                        return;
                    }
                    tracing::info!(path = ?path, "Settings file change detected, reloading...");
                    match parse_settings(&path) {
                        Ok(settings) => {
                            let _ = tx.send(settings);
                        }
                        Err(e) => {
                            tracing::error!("Failed to reload settings: {}. Keeping current hosts.", e);
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            }
        }, Config::default().with_poll_interval(Duration::from_secs(2)))?;

        watcher.watch(watch_root(&self.path), RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Settings watcher started");
        Ok(watcher)
    }
}

fn watch_root(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
