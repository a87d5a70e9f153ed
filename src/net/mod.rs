//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ServerConfig (bind/port or socket)
//!     → listener.rs (TCP or unix domain socket)
//!     → Hand off to http::server
//! ```

pub mod listener;

pub use listener::{Listener, ListenerError};
