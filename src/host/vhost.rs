//! Virtual host state and reload.
//!
//! A host owns one immutable [`HostState`] snapshot behind an [`ArcSwap`].
//! Requests take a clone of the snapshot pointer and render against it;
//! reloads parse into a fresh object and swap the pointer. Nothing inside a
//! snapshot is mutated after it is published.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use notify::RecommendedWatcher;
use thiserror::Error;

use crate::config::loader::{load_site_settings, ConfigError};
use crate::config::schema::SiteSettings;
use crate::observability::metrics;
use crate::template::{FunctionContext, TemplateError, TemplateStore};

/// Per-host settings file, relative to the document root.
pub const SETTINGS_FILE: &str = "site.yaml";

const CONTENT_DIRS: &[&str] = &["content", "markdown"];
const DEFAULT_WEBROOT: &str = "webroot";
const DEFAULT_TEMPLATES: &str = "templates";
const DEFAULT_TEMPLATE_EXTENSION: &str = "tpl";
const DEFAULT_SEARCH_INDEX: &str = "search.idx";

/// Error type for host creation and reload.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("error reading directory {path:?}: {source}")]
    Root {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0:?} is not a directory")]
    NotADirectory(PathBuf),

    #[error("could not load host settings: {0}")]
    Settings(#[from] ConfigError),

    #[error("could not load host templates: {0}")]
    Templates(#[from] TemplateError),

    #[error("could not watch host files: {0}")]
    Watch(#[from] notify::Error),
}

/// What a reload re-reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadKind {
    Settings,
    Templates,
}

impl ReloadKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Settings => "settings",
            Self::Templates => "templates",
        }
    }
}

/// One reload generation of a host: settings and templates that belong
/// together.
#[derive(Debug)]
pub struct HostState {
    pub settings: Arc<SiteSettings>,
    pub templates: Arc<TemplateStore>,
}

/// A configured virtual site.
pub struct Host {
    name: String,
    mount_path: String,
    document_root: PathBuf,
    state: ArcSwap<HostState>,
    generation: AtomicU64,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl Host {
    /// Create a host and load its settings and templates.
    ///
    /// The host is not watched; see [`Host::open`].
    pub fn load(name: &str, document_root: &Path) -> Result<Arc<Self>, HostError> {
        let metadata = fs::metadata(document_root).map_err(|source| HostError::Root {
            path: document_root.to_path_buf(),
            source,
        })?;
        if !metadata.is_dir() {
            return Err(HostError::NotADirectory(document_root.to_path_buf()));
        }

        let name = name.trim_end_matches('/').to_string();
        let mount_path = mount_path(&name);

        let settings = load_site_settings(&document_root.join(SETTINGS_FILE))?;
        let templates = load_templates(&name, &mount_path, document_root, &settings, 1)?;

        Ok(Arc::new(Self {
            name,
            mount_path,
            document_root: document_root.to_path_buf(),
            state: ArcSwap::from_pointee(HostState {
                settings: Arc::new(settings),
                templates: Arc::new(templates),
            }),
            generation: AtomicU64::new(1),
            watcher: Mutex::new(None),
        }))
    }

    /// Create a host and start watching its settings file and templates.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open(name: &str, document_root: &Path) -> Result<Arc<Self>, HostError> {
        let host = Self::load(name, document_root)?;
        let watcher = crate::host::watch::spawn(&host)?;
        if let Ok(mut slot) = host.watcher.lock() {
            *slot = Some(watcher);
        }
        tracing::info!(host = %host.name, root = ?host.document_root, "Routing host");
        Ok(host)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mount path without trailing slash, `""` for the root.
    pub fn mount_path(&self) -> &str {
        &self.mount_path
    }

    pub fn document_root(&self) -> &Path {
        &self.document_root
    }

    /// Current snapshot. Holding it pins one reload generation.
    pub fn snapshot(&self) -> Arc<HostState> {
        self.state.load_full()
    }

    /// Re-read settings or templates and publish the result.
    ///
    /// On failure the previous snapshot stays in effect.
    pub fn reload(&self, kind: ReloadKind) -> Result<(), HostError> {
        let result = match kind {
            ReloadKind::Settings => self.reload_settings(),
            ReloadKind::Templates => self.reload_templates(),
        };
        metrics::record_reload(&self.name, kind.as_str(), result.is_ok());
        match &result {
            Ok(()) => tracing::info!(host = %self.name, kind = kind.as_str(), "Host reloaded"),
            Err(e) => tracing::error!(host = %self.name, kind = kind.as_str(), error = %e, "Reload failed, keeping previous state"),
        }
        result
    }

    fn reload_settings(&self) -> Result<(), HostError> {
        let settings = Arc::new(load_site_settings(&self.document_root.join(SETTINGS_FILE))?);
        self.state.rcu(|current| HostState {
            settings: settings.clone(),
            templates: current.templates.clone(),
        });
        Ok(())
    }

    fn reload_templates(&self) -> Result<(), HostError> {
        let settings = self.snapshot().settings.clone();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let templates = Arc::new(load_templates(
            &self.name,
            &self.mount_path,
            &self.document_root,
            &settings,
            generation,
        )?);
        self.state.rcu(|current| HostState {
            settings: current.settings.clone(),
            templates: templates.clone(),
        });
        Ok(())
    }

    /// Run `f` on the host's watcher, if it is still watched.
    pub(crate) fn with_watcher<R>(&self, f: impl FnOnce(&mut RecommendedWatcher) -> R) -> Option<R> {
        let mut slot = self.watcher.lock().ok()?;
        slot.as_mut().map(f)
    }

    /// Stop watching the host's files. In-flight requests are unaffected.
    pub fn close(&self) {
        if let Ok(mut slot) = self.watcher.lock() {
            if slot.take().is_some() {
                tracing::debug!(host = %self.name, "Host watcher released");
            }
        }
    }

    /// Content directory: `content.markdown`, else the first existing of
    /// `content` and `markdown`.
    pub fn content_dir(&self, settings: &SiteSettings) -> Option<PathBuf> {
        match settings.get_str(&["content", "markdown"]) {
            Some(dir) => Some(self.document_root.join(dir)).filter(|p| p.is_dir()),
            None => CONTENT_DIRS
                .iter()
                .map(|dir| self.document_root.join(dir))
                .find(|p| p.is_dir()),
        }
    }

    /// Directory whose files are served verbatim.
    pub fn webroot_dir(&self, settings: &SiteSettings) -> PathBuf {
        self.document_root
            .join(settings.get_str(&["content", "webroot"]).unwrap_or(DEFAULT_WEBROOT))
    }

    /// Directory holding the template group.
    pub fn templates_dir(&self, settings: &SiteSettings) -> PathBuf {
        templates_dir(&self.document_root, settings)
    }

    /// File extension of templates, without the dot.
    pub fn template_extension(settings: &SiteSettings) -> &str {
        settings
            .get_str(&["content", "template_extension"])
            .map(|ext| ext.trim_start_matches('.'))
            .unwrap_or(DEFAULT_TEMPLATE_EXTENSION)
    }

    /// Location of the search index.
    pub fn search_index_path(&self, settings: &SiteSettings) -> Option<PathBuf> {
        match settings.get_str(&["searchindex"]) {
            Some(path) => Some(self.document_root.join(path)),
            None => self.content_dir(settings).map(|dir| dir.join(DEFAULT_SEARCH_INDEX)),
        }
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("name", &self.name)
            .field("mount_path", &self.mount_path)
            .field("document_root", &self.document_root)
            .finish()
    }
}

/// Mount path of a route name: everything from the first `/`, without the
/// trailing slash.
pub fn mount_path(name: &str) -> String {
    match name.find('/') {
        Some(index) => name[index..].trim_end_matches('/').to_string(),
        None => String::new(),
    }
}

fn templates_dir(document_root: &Path, settings: &SiteSettings) -> PathBuf {
    document_root.join(settings.get_str(&["content", "templates"]).unwrap_or(DEFAULT_TEMPLATES))
}

fn load_templates(
    name: &str,
    mount_path: &str,
    document_root: &Path,
    settings: &SiteSettings,
    generation: u64,
) -> Result<TemplateStore, TemplateError> {
    let directory = templates_dir(document_root, settings);
    let store = TemplateStore::load(
        &directory,
        Host::template_extension(settings),
        FunctionContext {
            mount_path: mount_path.to_string(),
            document_root: document_root.to_path_buf(),
        },
        generation,
    )?;
    tracing::info!(host = %name, directory = ?directory, templates = ?store.names(), "Loaded templates");
    Ok(store)
}
