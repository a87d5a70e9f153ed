//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! settings.yaml (global)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GlobalSettings (validated, immutable)
//!     → routing::HostRegistry builds one Host per `hosts` entry
//!
//! site.yaml (per host)
//!     → loader.rs → SiteSettings snapshot inside the Host
//!
//! On change:
//!     watcher.rs detects change to settings.yaml
//!     → loader.rs parses new settings
//!     → HostRegistry::rebuild validates, builds, swaps
//! ```
//!
//! # Design Decisions
//! - Settings are immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::ConfigError;
pub use schema::GlobalSettings;
pub use schema::ObservabilityConfig;
pub use schema::ServerConfig;
pub use schema::ServerType;
pub use schema::SiteSettings;
