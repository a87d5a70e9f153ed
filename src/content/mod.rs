//! Content pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! URL path (host relative)
//!     → resolve.rs (stat, index descent, extension guessing)
//!     → file bytes
//!     → [*.tpl files: expanded through the host's template group]
//!     → frontmatter.rs (split metadata from body)
//!     → markdown.rs (HTML unless Raw or not *.md)
//!     → Document (handed to the template store)
//! ```
//!
//! # Design Decisions
//! - Resolution precedence is a fixed, ordered extension list
//! - Frontmatter style is decided once from the first line
//! - Failures come back as ContentError; the host decides what the client sees

pub mod frontmatter;
pub mod html;
pub mod markdown;
pub mod resolve;

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use frontmatter::{FrontMatter, FrontMatterError};
pub use markdown::{RenderOptions, TocEntry};
pub use resolve::{resolve, Resolved};

/// Extension of content files that are templates themselves.
pub const TEMPLATE_SUFFIX: &str = "tpl";

/// A content file after metadata extraction and body conversion.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub meta: FrontMatter,
    pub html: String,
    pub toc: Vec<TocEntry>,
}

/// Error type for reading content files.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("could not read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error reading frontmatter from {path:?}: {source}")]
    FrontMatter {
        path: PathBuf,
        #[source]
        source: FrontMatterError,
    },

    #[error("could not expand template content {path:?}: {source}")]
    Template {
        path: PathBuf,
        #[source]
        source: minijinja::Error,
    },
}

/// Read a content file and convert its body.
///
/// `defaults` is the metadata inherited from the directory; the file's own
/// frontmatter is layered over it. Files ending in `.tpl` are passed through
/// `expand` first and then handled as the name without that suffix.
pub fn read_document<F>(path: &Path, defaults: FrontMatter, expand: F) -> Result<Document, ContentError>
where
    F: FnOnce(&str) -> Result<String, minijinja::Error>,
{
    let bytes = fs::read(path).map_err(|source| ContentError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let (meta, body, logical) = if has_extension(path, TEMPLATE_SUFFIX) {
        let expanded = expand(&String::from_utf8_lossy(&bytes)).map_err(|source| ContentError::Template {
            path: path.to_path_buf(),
            source,
        })?;
        (defaults, expanded.into_bytes(), path.with_extension(""))
    } else {
        let (page, body) = frontmatter::extract(&bytes).map_err(|source| ContentError::FrontMatter {
            path: path.to_path_buf(),
            source,
        })?;
        (defaults.merged_with(page), body.to_vec(), path.to_path_buf())
    };

    Ok(convert(&logical, &body, meta))
}

/// Read only the metadata of a file, ignoring its body.
pub fn read_frontmatter(path: &Path) -> Result<FrontMatter, ContentError> {
    let bytes = fs::read(path).map_err(|source| ContentError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    frontmatter::extract(&bytes)
        .map(|(meta, _)| meta)
        .map_err(|source| ContentError::FrontMatter {
            path: path.to_path_buf(),
            source,
        })
}

fn convert(logical: &Path, body: &[u8], meta: FrontMatter) -> Document {
    let text = String::from_utf8_lossy(body);
    if has_extension(logical, markdown::MARKDOWN_EXTENSION) && !meta.is_raw() {
        let rendered = markdown::render(&text, RenderOptions { toc: meta.wants_toc() });
        Document {
            meta,
            html: rendered.html,
            toc: rendered.toc,
        }
    } else {
        Document {
            meta,
            html: text.into_owned(),
            toc: Vec::new(),
        }
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().is_some_and(|ext| ext == extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_expand(_: &str) -> Result<String, minijinja::Error> {
        panic!("template expansion not expected")
    }

    #[test]
    fn test_markdown_rendered() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("page.md");
        fs::write(&file, "# Hi\n").unwrap();

        let doc = read_document(&file, FrontMatter::default(), no_expand).unwrap();
        assert!(doc.html.contains("<h1 id=\"hi\">Hi</h1>"));
    }

    #[test]
    fn test_raw_bypasses_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("page.md");
        fs::write(&file, "---\nRaw: true\n---\n# Not a heading *really*\n").unwrap();

        let doc = read_document(&file, FrontMatter::default(), no_expand).unwrap();
        assert_eq!(doc.html, "# Not a heading *really*\n");
    }

    #[test]
    fn test_non_markdown_passthrough() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("page.html");
        fs::write(&file, "<p># literal</p>").unwrap();

        let doc = read_document(&file, FrontMatter::default(), no_expand).unwrap();
        assert_eq!(doc.html, "<p># literal</p>");
    }

    #[test]
    fn test_defaults_layered() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("page.md");
        fs::write(&file, "plain *md*\n").unwrap();

        let defaults = FrontMatter {
            raw: Some(true),
            ..FrontMatter::default()
        };
        let doc = read_document(&file, defaults, no_expand).unwrap();
        assert_eq!(doc.html, "plain *md*\n");
    }

    #[test]
    fn test_template_content_expanded_then_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("about.md.tpl");
        fs::write(&file, "# {{ name }}\n").unwrap();

        let doc = read_document(&file, FrontMatter::default(), |src| {
            Ok(src.replace("{{ name }}", "About"))
        })
        .unwrap();
        assert!(doc.html.contains("<h1 id=\"about\">About</h1>"));
    }

    #[test]
    fn test_unterminated_frontmatter_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("page.md");
        fs::write(&file, "---\nRaw: true\n").unwrap();

        let err = read_document(&file, FrontMatter::default(), no_expand).unwrap_err();
        assert!(matches!(err, ContentError::FrontMatter { .. }));
    }
}
