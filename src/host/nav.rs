//! Navigation helpers: breadcrumbs, menus and titles derived from paths.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::content::resolve::{EXTENSIONS, INDEX_STEM};

static CAMEL_BOUNDARY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([a-z0-9])([A-Z])").unwrap());

/// A labelled link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavLink {
    pub name: String,
    pub url: String,
}

/// Strip a known content extension from a file name.
pub fn strip_content_extension(name: &str) -> &str {
    EXTENSIONS
        .iter()
        .find_map(|ext| name.strip_suffix(ext))
        .unwrap_or(name)
}

/// Human readable title from a file stem: separators become spaces,
/// camelCase words are split, the first letter is capitalized.
pub fn humanize(stem: &str) -> String {
    let spaced = stem.replace(['-', '_'], " ");
    let spaced = CAMEL_BOUNDARY.replace_all(&spaced, "$1 $2");
    let words: Vec<&str> = spaced.split_whitespace().collect();
    let mut title = words.join(" ");
    if let Some(first) = title.chars().next() {
        let upper: String = first.to_uppercase().collect();
        title.replace_range(..first.len_utf8(), &upper);
    }
    title
}

/// One link per segment of `relative` (host-relative, `/`-separated),
/// starting at the mount root.
pub fn breadcrumb(mount_path: &str, relative: &str, home: &str) -> Vec<NavLink> {
    let mut links = vec![NavLink {
        name: home.to_string(),
        url: format!("{mount_path}/"),
    }];
    let segments: Vec<&str> = relative.split('/').filter(|s| !s.is_empty()).collect();
    let mut url = mount_path.to_string();
    for (i, segment) in segments.iter().enumerate() {
        url.push('/');
        url.push_str(segment);
        let is_last = i + 1 == segments.len();
        links.push(NavLink {
            name: humanize(strip_content_extension(segment)),
            url: if is_last { url.clone() } else { format!("{url}/") },
        });
    }
    links
}

/// Visible entries of `dir`, linked under `url_base` (host-relative,
/// ending in `/`).
///
/// Hidden are names starting with `_` or `.`, index files, `hidden` file
/// names and files without a content extension. Directories get a trailing
/// `/`; extensions are stripped.
pub fn menu(dir: &Path, mount_path: &str, url_base: &str, hidden: &[&str]) -> Vec<NavLink> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut links: Vec<(bool, String)> = Vec::new();
    for entry in entries.flatten() {
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if file_name.starts_with(['_', '.']) || hidden.contains(&file_name.as_str()) {
            continue;
        }
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_dir {
            links.push((true, file_name));
            continue;
        }
        let stem = strip_content_extension(&file_name);
        if stem == file_name || stem == INDEX_STEM {
            continue;
        }
        links.push((false, stem.to_string()));
    }
    links.sort();
    links.dedup();

    links
        .into_iter()
        .map(|(is_dir, stem)| NavLink {
            name: humanize(&stem),
            url: format!(
                "{}{}{}{}",
                mount_path,
                url_base,
                stem,
                if is_dir { "/" } else { "" }
            ),
        })
        .collect()
}
