//! Virtual host subsystem.
//!
//! # Data Flow
//! ```text
//! Request (routed here by routing::HostRegistry)
//!     → handler.rs (webroot, verbatim files, content resolution, /search)
//!     → page.rs (per-request Page → template context)
//!     → nav.rs (breadcrumb, menus, titles)
//!     → TemplateStore from the current HostState snapshot
//!
//! Filesystem event
//!     → watch.rs (classify: settings or templates)
//!     → vhost.rs Host::reload (load new object, swap pointer)
//! ```
//!
//! # Design Decisions
//! - Settings and templates live in one immutable snapshot per generation
//! - Requests hold an Arc to the snapshot; reloads never block them
//! - A failed reload leaves the previous snapshot in place

pub mod handler;
pub mod nav;
pub mod page;
pub mod vhost;
pub mod watch;

pub use vhost::{Host, HostError, HostState, ReloadKind, SETTINGS_FILE};
