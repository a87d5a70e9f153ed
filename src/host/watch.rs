//! Per-host file watching.
//!
//! The notify callback only forwards events into a channel. A Tokio task
//! drains the channel, classifies each event and runs the matching reload on
//! the blocking pool. The task holds a weak reference, so it ends once the
//! host is dropped or its watcher is released.
//!
//! A settings reload that moves the template directory or changes the
//! template extension re-points the watcher and reloads the templates.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::host::vhost::{Host, ReloadKind, SETTINGS_FILE};

/// Which reloads a batch of changed paths calls for.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Triggers {
    pub settings: bool,
    pub templates: bool,
}

impl Triggers {
    /// Classify the paths of one filesystem event.
    pub fn classify(paths: &[PathBuf], templates_dir: &Path, extension: &str) -> Self {
        let mut triggers = Self::default();
        for path in paths {
            if path.file_name() == Some(OsStr::new(SETTINGS_FILE)) {
                triggers.settings = true;
            } else if path.extension() == Some(OsStr::new(extension)) && path.parent() == Some(templates_dir) {
                triggers.templates = true;
            }
        }
        triggers
    }

    fn kinds(&self) -> impl Iterator<Item = ReloadKind> {
        let settings = self.settings.then_some(ReloadKind::Settings);
        let templates = self.templates.then_some(ReloadKind::Templates);
        settings.into_iter().chain(templates)
    }
}

/// Template files the watcher currently follows.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TemplateTarget {
    dir: PathBuf,
    extension: String,
}

impl TemplateTarget {
    fn of(host: &Host) -> Self {
        let state = host.snapshot();
        Self {
            dir: host.templates_dir(&state.settings),
            extension: Host::template_extension(&state.settings).to_string(),
        }
    }
}

/// Start watching `host`'s settings file and template directory.
pub fn spawn(host: &Arc<Host>) -> Result<RecommendedWatcher, notify::Error> {
    let mut target = TemplateTarget::of(host);

    let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            let _ = tx.send(event);
        }
        Err(e) => tracing::error!("Watch error: {:?}", e),
    })?;

    watcher.watch(host.document_root(), RecursiveMode::NonRecursive)?;
    watcher.watch(&target.dir, RecursiveMode::NonRecursive)?;

    let weak: Weak<Host> = Arc::downgrade(host);
    let name = host.name().to_string();
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)) {
                continue;
            }
            let triggers = Triggers::classify(&event.paths, &target.dir, &target.extension);
            for kind in triggers.kinds() {
                let Some(host) = weak.upgrade() else {
                    return;
                };
                tracing::info!(host = %name, kind = kind.as_str(), paths = ?event.paths, "Change detected, reloading");
                // Errors are logged by `reload`.
                let reloaded = {
                    let host = Arc::clone(&host);
                    tokio::task::spawn_blocking(move || host.reload(kind)).await
                };
                if kind == ReloadKind::Settings && matches!(reloaded, Ok(Ok(()))) {
                    retarget(host, &mut target).await;
                }
            }
        }
        tracing::debug!(host = %name, "Host watcher stopped");
    });

    Ok(watcher)
}

/// Follow a template directory or extension change made in the settings.
async fn retarget(host: Arc<Host>, target: &mut TemplateTarget) {
    let next = TemplateTarget::of(&host);
    if next == *target {
        return;
    }

    if next.dir != target.dir {
        let rewatched = host.with_watcher(|watcher| {
            let _ = watcher.unwatch(&target.dir);
            watcher.watch(&next.dir, RecursiveMode::NonRecursive)
        });
        if let Some(Err(e)) = rewatched {
            tracing::warn!(
                host = %host.name(),
                dir = ?next.dir,
                error = %e,
                "Cannot watch new template directory; restart to pick up template changes"
            );
        }
    }

    tracing::info!(host = %host.name(), dir = ?next.dir, extension = %next.extension, "Template location changed");
    *target = next;
    let _ = tokio::task::spawn_blocking(move || host.reload(ReloadKind::Templates)).await;
}
