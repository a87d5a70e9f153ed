//! Listener setup.
//!
//! # Responsibilities
//! - Bind the TCP address or unix socket named in the server section
//! - Remove a stale unix socket file left by a previous run
//! - Report the bound address

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;
use tokio::net::TcpListener;
#[cfg(unix)]
use tokio::net::UnixListener;

use crate::config::ServerConfig;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("invalid bind address {address}: {source}")]
    Address {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unix sockets are not supported on this platform")]
    UnixUnsupported,
}

/// A bound listener, ready to hand to the HTTP server.
#[derive(Debug)]
pub enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener, PathBuf),
}

impl Listener {
    /// Bind according to `config`. A socket path takes precedence over
    /// `bind`/`port`.
    pub async fn bind(config: &ServerConfig) -> Result<Self, ListenerError> {
        match &config.socket {
            Some(path) => Self::bind_unix(path.clone()),
            None => Self::bind_tcp(&config.tcp_address()).await,
        }
    }

    /// Bind a TCP address such as `127.0.0.1:9000`.
    pub async fn bind_tcp(address: &str) -> Result<Self, ListenerError> {
        let addr: SocketAddr = address.parse().map_err(|source| ListenerError::Address {
            address: address.to_string(),
            source,
        })?;
        let listener = TcpListener::bind(addr).await.map_err(|source| ListenerError::Bind {
            address: address.to_string(),
            source,
        })?;
        Ok(Self::Tcp(listener))
    }

    #[cfg(unix)]
    fn bind_unix(path: PathBuf) -> Result<Self, ListenerError> {
        let bind_error = |source| ListenerError::Bind {
            address: path.display().to_string(),
            source,
        };
        if path.exists() {
            std::fs::remove_file(&path).map_err(bind_error)?;
        }
        let listener = UnixListener::bind(&path).map_err(bind_error)?;
        Ok(Self::Unix(listener, path))
    }

    #[cfg(not(unix))]
    fn bind_unix(_path: PathBuf) -> Result<Self, ListenerError> {
        Err(ListenerError::UnixUnsupported)
    }

    /// Human readable local address.
    pub fn local_addr(&self) -> String {
        match self {
            Self::Tcp(listener) => listener
                .local_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| "unknown".to_string()),
            #[cfg(unix)]
            Self::Unix(_, path) => format!("unix:{}", path.display()),
        }
    }
}
