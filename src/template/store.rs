//! Named template groups.
//!
//! A group holds every template of one host, compiled into a single
//! minijinja environment so templates can include and extend each other.
//! Groups are immutable: a reload builds a new group and the host swaps
//! pointers.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use minijinja::{AutoEscape, Environment, Value};
use serde::Serialize;
use thiserror::Error;

use crate::template::functions::{self, FunctionContext};

/// Template every group must provide.
pub const INDEX_TEMPLATE: &str = "index.tpl";

/// Template used for search results when present.
pub const SEARCH_TEMPLATE: &str = "search.tpl";

/// Deprecated spellings and their replacements.
const DEPRECATED_SYNTAX: &[(&str, &str)] = &[
    ("{{ link", "{{ anchor"),
    ("{{link", "{{anchor"),
    ("jstext", "js"),
    ("htmltext", "html"),
    (".link", ".url"),
    (".text", ".name"),
];

/// Error type for template loading and rendering.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("error checking template directory {path:?}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not read template {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse template {name}: {source}")]
    Syntax {
        name: String,
        #[source]
        source: minijinja::Error,
    },

    #[error("default template {INDEX_TEMPLATE} not found in {0:?}")]
    MissingIndex(PathBuf),

    #[error("could not render template {name}: {source}")]
    Render {
        name: String,
        #[source]
        source: minijinja::Error,
    },
}

/// Rewrite deprecated tag spellings. Applying it twice changes nothing.
pub fn normalize_syntax(source: &str) -> String {
    DEPRECATED_SYNTAX
        .iter()
        .fold(source.to_string(), |s, (old, new)| s.replace(old, new))
}

/// One complete, immutable set of parsed templates.
pub struct TemplateStore {
    env: Environment<'static>,
    names: Vec<String>,
    generation: u64,
}

impl TemplateStore {
    /// Parse every `*.<extension>` file in `directory`.
    ///
    /// Fails if any template does not parse or if [`INDEX_TEMPLATE`] is
    /// missing. A failed load never yields a partial group.
    pub fn load(
        directory: &Path,
        extension: &str,
        ctx: FunctionContext,
        generation: u64,
    ) -> Result<Self, TemplateError> {
        let entries = fs::read_dir(directory).map_err(|source| TemplateError::Directory {
            path: directory.to_path_buf(),
            source,
        })?;

        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        functions::register(&mut env, Arc::new(ctx));

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| TemplateError::Directory {
                path: directory.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if !path.is_file() || path.extension().map_or(true, |ext| ext != extension) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let source = fs::read_to_string(&path).map_err(|source| TemplateError::Read {
                path: path.clone(),
                source,
            })?;
            env.add_template_owned(name.clone(), normalize_syntax(&source))
                .map_err(|source| TemplateError::Syntax {
                    name: name.clone(),
                    source,
                })?;
            tracing::debug!(template = %name, "Parsed template");
            names.push(name);
        }

        if !names.iter().any(|n| n == INDEX_TEMPLATE) {
            return Err(TemplateError::MissingIndex(directory.to_path_buf()));
        }
        names.sort();

        Ok(Self {
            env,
            names,
            generation,
        })
    }

    /// Whether the group contains `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Reload counter of the host at the time this group was built.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Render a template of the group.
    pub fn render<S: Serialize>(&self, name: &str, ctx: S) -> Result<String, TemplateError> {
        let template = self.env.get_template(name).map_err(|source| TemplateError::Render {
            name: name.to_string(),
            source,
        })?;
        template.render(ctx).map_err(|source| TemplateError::Render {
            name: name.to_string(),
            source,
        })
    }

    /// Render an ad hoc template with the group's function set.
    pub fn render_str(&self, source: &str, ctx: Value) -> Result<String, minijinja::Error> {
        self.env.render_str(source, ctx)
    }
}

impl std::fmt::Debug for TemplateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateStore")
            .field("names", &self.names)
            .field("generation", &self.generation)
            .finish()
    }
}
