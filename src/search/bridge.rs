//! Boundary between request handling and the full-text index.
//!
//! The host never sees a search failure: every error is logged and turns
//! into an empty result list.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::content::html::escape_attr;
use crate::observability::metrics;
use crate::search::index::SearchIndex;
use crate::template::functions::asset_path;

/// Error type for index construction and queries.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("could not access search index {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed search index {path:?}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("search index {path:?} refers to document {document} for term {term:?}, but holds only {len}")]
    DanglingPosting {
        path: PathBuf,
        term: String,
        document: usize,
        len: usize,
    },

    #[error("host {0} has no content directory")]
    NoContent(String),
}

/// One search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
}

/// A document handed to an [`Indexer`].
#[derive(Debug, Clone)]
pub struct IndexDocument {
    pub url: String,
    pub title: String,
    pub text: String,
}

/// Query side of a full-text index.
pub trait Searcher {
    /// Best matches for `terms`, at most `max_results`, best first.
    fn search(&self, terms: &[String], max_results: usize) -> Result<Vec<SearchHit>, SearchError>;
}

/// Construction side of a full-text index.
pub trait Indexer {
    fn add_document(&mut self, document: IndexDocument) -> Result<(), SearchError>;

    /// Write the finished index to `path`.
    fn finalize_and_write(self, path: &Path) -> Result<(), SearchError>;
}

/// Run a query against the searcher returned by `open`.
///
/// Returns an empty list without opening anything when there are no terms
/// or `max_results` is zero.
pub fn search<S, F>(open: F, terms: &[String], max_results: usize) -> Vec<SearchHit>
where
    S: Searcher,
    F: FnOnce() -> Result<S, SearchError>,
{
    if terms.is_empty() || max_results == 0 {
        return Vec::new();
    }
    match open().and_then(|searcher| searcher.search(terms, max_results)) {
        Ok(hits) => {
            metrics::record_search(true);
            hits
        }
        Err(e) => {
            metrics::record_search(false);
            tracing::error!(error = %e, "Search failed");
            Vec::new()
        }
    }
}

/// Query the index file at `path`.
pub fn search_index(path: &Path, terms: &[String], max_results: usize) -> Vec<SearchHit> {
    search(|| SearchIndex::open(path), terms, max_results)
}

/// Result list rendered as page content.
pub fn results_html(mount_path: &str, terms: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "<h3>No results</h3>".to_string();
    }
    let mut html = format!("<h2>Search Results: \"{}\"</h2>\n<ul>\n", escape_attr(terms));
    for hit in hits {
        html.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>\n",
            escape_attr(&asset_path(mount_path, &hit.url)),
            escape_attr(&hit.title)
        ));
    }
    html.push_str("</ul>\n");
    html
}
