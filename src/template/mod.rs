//! Template subsystem.
//!
//! # Data Flow
//! ```text
//! templates/*.tpl
//!     → store.rs (normalize deprecated syntax, parse into one group)
//!     → functions.rs (url, anchor, asset, include, getint, js, html)
//!     → TemplateStore (immutable, shared through the host snapshot)
//! ```
//!
//! # Design Decisions
//! - A group is built completely before it becomes visible
//! - `index.tpl` is mandatory; a group without it is rejected
//! - Output is HTML auto-escaped; rendered content is passed as safe strings

pub mod functions;
pub mod store;

pub use functions::FunctionContext;
pub use store::{TemplateError, TemplateStore, INDEX_TEMPLATE, SEARCH_TEMPLATE};
