//! Search subsystem.
//!
//! # Data Flow
//! ```text
//! hostmark index / run -i
//!     → index.rs (walk content dir, Indexer::add_document, finalize_and_write)
//!     → <content>/search.idx (JSON)
//!
//! GET /search?terms=...
//!     → bridge.rs (Searcher::search, errors become "no results")
//!     → host::handler renders the hits through the template group
//! ```

pub mod bridge;
pub mod index;

pub use bridge::{IndexDocument, Indexer, SearchError, SearchHit, Searcher};
pub use index::{index_content, index_host, SearchIndex};
