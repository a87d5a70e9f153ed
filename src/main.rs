//! hostmark
//!
//! Serves markdown and HTML content for several virtual hosts from one
//! process.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ net::listener ──▶ http::server ──▶ routing::HostRegistry
//!                                                              │ longest prefix
//!                                                              ▼
//!                                                        host::Host::handle
//!                                              ┌───────────────┼────────────────┐
//!                                              ▼               ▼                ▼
//!                                          webroot file   content file    content page
//!                                                                  resolve → frontmatter →
//!                                                                  markdown → template
//!
//!     settings.yaml ──▶ config::watcher ──▶ HostRegistry::rebuild
//!     site.yaml / templates ──▶ host::watch ──▶ Host::reload
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use hostmark::lifecycle::startup::{self, RunOptions};

#[derive(Parser)]
#[command(name = "hostmark")]
#[command(version, about = "Markdown/HTML content server for multiple virtual hosts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve all configured hosts
    Run {
        /// Global settings file
        #[arg(short, long, default_value = "./settings.yaml")]
        config: PathBuf,

        /// Rebuild search indexes before serving
        #[arg(short, long)]
        index: bool,
    },
    /// Rebuild the search index of every host and exit
    Index {
        /// Global settings file
        #[arg(short, long, default_value = "./settings.yaml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, index } => {
            startup::run(RunOptions {
                settings_path: config,
                index,
            })
            .await?;
        }
        Commands::Index { config } => {
            tokio::task::spawn_blocking(move || startup::index_all(&config)).await??;
        }
    }

    Ok(())
}
