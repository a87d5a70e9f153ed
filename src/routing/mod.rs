//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (Host header, path)
//!     → router.rs (HostRegistry::route over the current RouteTable)
//!     → matcher.rs (boundary-aware prefix match per key)
//!     → Return: matched Host, the default host, or None
//!
//! Route Compilation (startup and every settings change):
//!     GlobalSettings.hosts
//!     → validate, open every Host
//!     → compile matchers
//!     → swap in as immutable RouteTable, close the previous hosts
//! ```
//!
//! # Design Decisions
//! - Route tables are immutable; rebuilds replace them whole
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same host

pub mod matcher;
pub mod router;

pub use router::{HostRegistry, RegistryError, RouteTable};
