//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP / unix socket connection
//!     → server.rs (Axum setup, request ID, trace span)
//!     → routing::HostRegistry (pick the host)
//!     → host::handler (static file, content page or search)
//!     → access_log.rs (one CLF line per request)
//!     → Send to client
//! ```

pub mod access_log;
pub mod request;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
