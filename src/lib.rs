//! hostmark: markdown and HTML content server for many virtual hosts.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod routing;

// Sites
pub mod content;
pub mod host;
pub mod search;
pub mod template;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::GlobalSettings;
pub use host::Host;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::HostRegistry;
