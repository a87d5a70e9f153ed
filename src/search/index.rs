//! Built-in full-text index stored as JSON.
//!
//! The index maps each term to the documents containing it and how often.
//! Queries rank documents by the number of distinct query terms they
//! contain, then by total occurrences.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::content::frontmatter;
use crate::host::nav::{humanize, strip_content_extension};
use crate::host::Host;
use crate::search::bridge::{IndexDocument, Indexer, SearchError, SearchHit, Searcher};

/// File types that are indexed.
pub const INDEXED_EXTENSIONS: &[&str] = &["md", "txt", "html"];

/// Terms never indexed.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it", "no", "not", "of",
    "on", "or", "such", "that", "the", "their", "then", "there", "these", "they", "this", "to", "was", "will", "with",
];

/// Terms shorter than this are ignored.
const MIN_TERM_LEN: usize = 2;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SearchIndex {
    documents: Vec<SearchHit>,
    /// term -> (document index, occurrences)
    terms: BTreeMap<String, Vec<(usize, u32)>>,
}

impl SearchIndex {
    /// Load an index written by [`Indexer::finalize_and_write`].
    pub fn open(path: &Path) -> Result<Self, SearchError> {
        let raw = fs::read(path).map_err(|source| SearchError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let index: Self = serde_json::from_slice(&raw).map_err(|source| SearchError::Format {
            path: path.to_path_buf(),
            source,
        })?;
        index.check_postings(path)?;
        Ok(index)
    }

    /// Every posting must point at a stored document.
    fn check_postings(&self, path: &Path) -> Result<(), SearchError> {
        for (term, postings) in &self.terms {
            if let Some(&(document, _)) = postings.iter().find(|(doc, _)| *doc >= self.documents.len()) {
                return Err(SearchError::DanglingPosting {
                    path: path.to_path_buf(),
                    term: term.clone(),
                    document,
                    len: self.documents.len(),
                });
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl Indexer for SearchIndex {
    fn add_document(&mut self, document: IndexDocument) -> Result<(), SearchError> {
        let id = self.documents.len();
        let mut counts: HashMap<String, u32> = HashMap::new();
        for term in tokenize(&document.text).chain(tokenize(&document.title)) {
            *counts.entry(term).or_default() += 1;
        }
        for (term, count) in counts {
            self.terms.entry(term).or_default().push((id, count));
        }
        self.documents.push(SearchHit {
            url: document.url,
            title: document.title,
        });
        Ok(())
    }

    fn finalize_and_write(mut self, path: &Path) -> Result<(), SearchError> {
        for postings in self.terms.values_mut() {
            postings.sort_unstable();
        }
        let json = serde_json::to_vec(&self).map_err(|source| SearchError::Format {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|source| SearchError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Searcher for SearchIndex {
    fn search(&self, terms: &[String], max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        // document -> (distinct terms matched, occurrences)
        let mut scores: HashMap<usize, (usize, u32)> = HashMap::new();
        let mut seen = Vec::new();
        for term in terms.iter().flat_map(|t| tokenize(t)) {
            if seen.contains(&term) {
                continue;
            }
            if let Some(postings) = self.terms.get(&term) {
                for &(doc, count) in postings {
                    let score = scores.entry(doc).or_default();
                    score.0 += 1;
                    score.1 += count;
                }
            }
            seen.push(term);
        }

        let mut ranked: Vec<(&SearchHit, (usize, u32))> = scores
            .into_iter()
            .filter_map(|(doc, score)| self.documents.get(doc).map(|hit| (hit, score)))
            .collect();
        ranked.sort_by(|(a_hit, a), (b_hit, b)| b.cmp(a).then_with(|| a_hit.url.cmp(&b_hit.url)));
        Ok(ranked
            .into_iter()
            .take(max_results)
            .map(|(hit, _)| hit.clone())
            .collect())
    }
}

/// Lowercased word terms of `text`, stop words removed.
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() >= MIN_TERM_LEN)
        .map(str::to_lowercase)
        .filter(|word| !STOP_WORDS.contains(&word.as_str()))
}

/// URL of a content file relative to the content root.
fn document_url(relative: &Path) -> String {
    let segments: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    let Some((file, dirs)) = segments.split_last() else {
        return "/".to_string();
    };
    let stem = strip_content_extension(file);
    let mut url = String::from("/");
    for dir in dirs {
        url.push_str(dir);
        url.push('/');
    }
    if stem != crate::content::resolve::INDEX_STEM {
        url.push_str(stem);
    }
    url
}

/// Title derived from a content file name.
fn document_title(relative: &Path) -> String {
    let file = relative
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    humanize(strip_content_extension(&file))
}

/// Index every content file under `content_dir` into `index_path`.
///
/// Returns the number of indexed documents.
pub fn index_content(content_dir: &Path, index_path: &Path) -> Result<usize, SearchError> {
    let mut index = SearchIndex::default();

    let walker = WalkDir::new(content_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with(['_', '.']));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        let path = entry.path();
        let indexed = path
            .extension()
            .is_some_and(|ext| INDEXED_EXTENSIONS.iter().any(|known| ext == *known));
        if !entry.file_type().is_file() || !indexed {
            continue;
        }

        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(path = ?path, error = %e, "Could not read file for indexing");
                continue;
            }
        };
        let body = frontmatter::extract(&raw).map_or(raw.as_slice(), |(_, body)| body);

        let relative = path.strip_prefix(content_dir).unwrap_or(path);
        let document = IndexDocument {
            url: document_url(relative),
            title: document_title(relative),
            text: String::from_utf8_lossy(body).into_owned(),
        };
        tracing::debug!(url = %document.url, title = %document.title, "Indexing");
        index.add_document(document)?;
    }

    let count = index.len();
    index.finalize_and_write(index_path)?;
    Ok(count)
}

/// Rebuild the search index of one host.
pub fn index_host(host: &Host) -> Result<usize, SearchError> {
    let state = host.snapshot();
    let content_dir = host
        .content_dir(&state.settings)
        .ok_or_else(|| SearchError::NoContent(host.name().to_string()))?;
    let index_path = host
        .search_index_path(&state.settings)
        .ok_or_else(|| SearchError::NoContent(host.name().to_string()))?;

    let count = index_content(&content_dir, &index_path)?;
    tracing::info!(host = %host.name(), index = ?index_path, documents = count, "Search index written");
    Ok(count)
}
