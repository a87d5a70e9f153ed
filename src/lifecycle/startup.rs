//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate the global settings
//! - Initialize logging and metrics
//! - Build the host registry, optionally rebuilding search indexes first
//! - Watch the settings file and rebuild the registry on change
//! - Bind the listener and serve until a shutdown signal
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The listener binds last, so traffic only arrives once hosts are ready
//! - A failed live rebuild is logged and the previous hosts keep serving

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::config::loader::load_config;
use crate::config::watcher::ConfigWatcher;
use crate::config::{ConfigError, GlobalSettings};
use crate::host::{Host, HostError};
use crate::http::HttpServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::shutdown_signal;
use crate::net::{Listener, ListenerError};
use crate::observability::{logging, metrics};
use crate::routing::{HostRegistry, RegistryError};
use crate::search::{index_host, SearchError};

/// Error type for process startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("could not watch settings file: {0}")]
    Watch(#[from] notify::Error),

    #[error("host {name}: {source}")]
    Host {
        name: String,
        #[source]
        source: HostError,
    },

    #[error("indexing host {name}: {source}")]
    Search {
        name: String,
        #[source]
        source: SearchError,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Options of the `run` command.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub settings_path: PathBuf,
    /// Rebuild every host's search index before serving.
    pub index: bool,
}

/// Load the settings and set up logging from them.
fn prepare(settings_path: &Path) -> Result<GlobalSettings, StartupError> {
    let settings = load_config(settings_path)?;
    logging::init_tracing(&settings.observability.log_level);
    tracing::info!(
        settings = ?settings_path,
        hosts = settings.hosts.len(),
        "hostmark v{} starting",
        env!("CARGO_PKG_VERSION")
    );
    Ok(settings)
}

/// Serve all configured hosts until SIGINT or SIGTERM.
pub async fn run(options: RunOptions) -> Result<(), StartupError> {
    let settings = prepare(&options.settings_path)?;

    if settings.observability.metrics_enabled {
        match settings.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %settings.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let registry = Arc::new(HostRegistry::new());
    registry.rebuild(&settings)?;

    if options.index {
        for host in registry.hosts() {
            index(&host)?;
        }
    }

    let shutdown = Shutdown::new();

    let (watcher, updates) = ConfigWatcher::new(&options.settings_path);
    let _settings_watcher = watcher.run()?;
    let rebuild_task = tokio::spawn(apply_updates(registry.clone(), updates, shutdown.clone()));

    let listener = Listener::bind(&settings.server).await?;

    let signal = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal.trigger();
    });

    let served = HttpServer::new(registry.clone())
        .run(listener, shutdown.wait())
        .await;

    shutdown.trigger();
    let _ = rebuild_task.await;
    registry.close();

    served?;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Rebuild every host's search index and exit.
pub fn index_all(settings_path: &Path) -> Result<(), StartupError> {
    let settings = prepare(settings_path)?;

    for (name, root) in &settings.hosts {
        let host = Host::load(name, root).map_err(|source| StartupError::Host {
            name: name.clone(),
            source,
        })?;
        index(&host)?;
    }
    Ok(())
}

fn index(host: &Host) -> Result<(), StartupError> {
    index_host(host).map(|_| ()).map_err(|source| StartupError::Search {
        name: host.name().to_string(),
        source,
    })
}

/// Apply settings changes until shutdown.
async fn apply_updates(
    registry: Arc<HostRegistry>,
    mut updates: tokio::sync::mpsc::UnboundedReceiver<GlobalSettings>,
    shutdown: Shutdown,
) {
    let mut stop = shutdown.subscribe();
    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(settings) = update else { break };
                if let Err(e) = registry.rebuild(&settings) {
                    tracing::error!(error = %e, "Settings rebuild failed; keeping current hosts");
                }
            }
            _ = stop.recv() => break,
        }
    }
    tracing::debug!("Settings update task stopped");
}
