//! Mapping logical paths to files on disk.
//!
//! # Resolution order
//! 1. The candidate itself (directories win over extension guessing).
//! 2. For a directory, its `index` entry, resolved the same way.
//! 3. The candidate with each extension of [`EXTENSIONS`] appended, in order.

use std::ffi::OsString;
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};

/// Expected extensions. Elements on the left have precedence.
pub const EXTENSIONS: &[&str] = &[".md", ".html", ".txt", ".md.tpl", ".yaml"];

/// Stem looked up inside directories.
pub const INDEX_STEM: &str = "index";

/// How many nested `index` directories are followed before giving up.
const MAX_INDEX_DEPTH: usize = 8;

/// A path that exists on disk together with its metadata.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub path: PathBuf,
    pub metadata: Metadata,
}

impl Resolved {
    pub fn is_dir(&self) -> bool {
        self.metadata.is_dir()
    }
}

/// Resolve `candidate` to an existing file or directory.
///
/// With `descend` unset this is a plain stat. With `descend` set, directories
/// are searched for an index and missing paths are retried with each known
/// extension.
pub fn resolve(candidate: &Path, descend: bool) -> Option<Resolved> {
    resolve_bounded(&strip_trailing_separators(candidate), descend, 0)
}

fn resolve_bounded(candidate: &Path, descend: bool, depth: usize) -> Option<Resolved> {
    let metadata = match fs::metadata(candidate) {
        Ok(metadata) => metadata,
        Err(_) if descend => return guess_extension(candidate),
        Err(_) => return None,
    };

    if descend && metadata.is_dir() && depth < MAX_INDEX_DEPTH {
        if let Some(index) = resolve_bounded(&candidate.join(INDEX_STEM), true, depth + 1) {
            return Some(index);
        }
    }

    Some(Resolved {
        path: candidate.to_path_buf(),
        metadata,
    })
}

fn guess_extension(candidate: &Path) -> Option<Resolved> {
    EXTENSIONS.iter().find_map(|extension| {
        let mut guess = OsString::from(candidate.as_os_str());
        guess.push(extension);
        resolve_bounded(Path::new(&guess), false, MAX_INDEX_DEPTH)
    })
}

fn strip_trailing_separators(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    let trimmed = raw.trim_end_matches(std::path::MAIN_SEPARATOR);
    if trimmed.is_empty() {
        path.to_path_buf()
    } else {
        PathBuf::from(trimmed)
    }
}
