//! Functions available inside every host template.
//!
//! | name      | purpose                                             |
//! |-----------|-----------------------------------------------------|
//! | `url`     | protocol-relative URL on the requested host         |
//! | `anchor`  | `<a>` element, `target="_blank"` for external links |
//! | `asset`   | path under the host's mount point                   |
//! | `include` | raw contents of a file below the document root     |
//! | `getint`  | integer coercion, zero on failure                   |
//! | `js`      | mark a string as safe script text                   |
//! | `html`    | mark a string as safe HTML                          |

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, LazyLock};

use minijinja::{Environment, State, Value};
use regex::Regex;

use crate::content::html::escape_attr;

/// Context variable holding the `Host` header of the current request.
pub const REQUEST_HOST_VAR: &str = "request_host";

static EXTERNAL_LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9]+://").unwrap());

/// Host data the template functions need.
#[derive(Debug, Clone, Default)]
pub struct FunctionContext {
    /// Mount path of the host, without trailing slash (`""` for root).
    pub mount_path: String,
    /// Directory `include` reads from.
    pub document_root: PathBuf,
}

/// Whether `url` points outside this server.
pub fn is_external(url: &str) -> bool {
    EXTERNAL_LINK.is_match(url)
}

/// Prefix `url` with the mount path unless it is external.
pub fn asset_path(mount_path: &str, url: &str) -> String {
    if is_external(url) {
        return url.to_string();
    }
    let url = url.trim_start_matches('/');
    let mount = mount_path.trim_matches('/');
    if mount.is_empty() {
        format!("/{url}")
    } else {
        format!("/{mount}/{url}")
    }
}

/// Protocol-relative URL for `url` on `host`, unless `url` is external.
pub fn absolute_url(host: &str, url: &str) -> String {
    if is_external(url) {
        return url.to_string();
    }
    format!("//{}/{}", host, url.trim_start_matches('/'))
}

/// Build an `<a>` element.
pub fn anchor_html(mount_path: &str, url: &str, text: &str) -> String {
    let path = asset_path(mount_path, url);
    let href = escape_attr(&path);
    if is_external(url) {
        format!(r#"<a target="_blank" href="{href}">{text}</a>"#)
    } else {
        format!(r#"<a href="{href}">{text}</a>"#)
    }
}

/// Coerce a template value to an integer.
///
/// Integers and floats convert (floats truncate), numeric strings parse,
/// anything else is zero.
pub fn get_int(value: &Value) -> i64 {
    if let Some(n) = value.as_i64() {
        return n;
    }
    if let Some(s) = value.as_str() {
        return s.trim().parse().unwrap_or(0);
    }
    f64::try_from(value.clone()).map_or(0, |f| f as i64)
}

/// Read a file below `root`, logging and returning an empty string on failure.
pub fn include_file(root: &Path, relative: &str) -> String {
    let relative = Path::new(relative.trim_start_matches('/'));
    if relative.components().any(|c| matches!(c, Component::ParentDir)) {
        tracing::error!(path = ?relative, "Refusing to include file outside the document root");
        return String::new();
    }
    let file = root.join(relative);
    match fs::read_to_string(&file) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::error!(path = ?file, error = %e, "Could not read included file");
            String::new()
        }
    }
}

/// Register the function set on `env`.
pub fn register(env: &mut Environment<'static>, ctx: Arc<FunctionContext>) {
    env.add_function("url", url);

    let anchor_ctx = ctx.clone();
    env.add_function("anchor", move |url: &str, text: &str| -> Value {
        Value::from_safe_string(anchor_html(&anchor_ctx.mount_path, url, text))
    });

    let asset_ctx = ctx.clone();
    env.add_function("asset", move |url: &str| -> Value {
        Value::from_safe_string(escape_attr(&asset_path(&asset_ctx.mount_path, url)).into_owned())
    });

    env.add_function("include", move |file: &str| -> Value {
        Value::from_safe_string(include_file(&ctx.document_root, file))
    });

    env.add_function("getint", getint);
    env.add_function("js", safe);
    env.add_function("html", safe);
}

fn url(state: &State, url: &str) -> Value {
    let host = state
        .lookup(REQUEST_HOST_VAR)
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    Value::from_safe_string(escape_attr(&absolute_url(&host, url)).into_owned())
}

fn getint(value: Value) -> i64 {
    get_int(&value)
}

fn safe(text: &str) -> Value {
    Value::from_safe_string(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_detection() {
        assert!(is_external("https://example.com"));
        assert!(is_external("ftp://files"));
        assert!(!is_external("/docs/page"));
        assert!(!is_external("mailto:someone@example.com"));
    }

    #[test]
    fn test_asset_path() {
        assert_eq!(asset_path("", "/css/site.css"), "/css/site.css");
        assert_eq!(asset_path("/blog", "css/site.css"), "/blog/css/site.css");
        assert_eq!(asset_path("/blog", "http://cdn/x.css"), "http://cdn/x.css");
    }

    #[test]
    fn test_absolute_url() {
        assert_eq!(absolute_url("example.com", "/about"), "//example.com/about");
        assert_eq!(absolute_url("example.com", "https://x.org"), "https://x.org");
    }

    #[test]
    fn test_anchor() {
        assert_eq!(anchor_html("", "/a", "A"), r#"<a href="/a">A</a>"#);
        assert_eq!(
            anchor_html("/m", "https://x.org", "X"),
            r#"<a target="_blank" href="https://x.org">X</a>"#
        );
    }

    #[test]
    fn test_get_int() {
        assert_eq!(get_int(&Value::from(3.9)), 3);
        assert_eq!(get_int(&Value::from("42")), 42);
        assert_eq!(get_int(&Value::from("x")), 0);
        assert_eq!(get_int(&Value::from(7)), 7);
    }

    #[test]
    fn test_include() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("snippet.html"), "<b>hi</b>").unwrap();

        assert_eq!(include_file(dir.path(), "/snippet.html"), "<b>hi</b>");
        assert_eq!(include_file(dir.path(), "missing.html"), "");
        assert_eq!(include_file(dir.path(), "../etc/passwd"), "");
    }

    #[test]
    fn test_functions_in_templates() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = Environment::new();
        register(
            &mut env,
            Arc::new(FunctionContext {
                mount_path: "/docs".to_string(),
                document_root: dir.path().to_path_buf(),
            }),
        );

        fs::write(dir.path().join("nav.html"), "<nav></nav>").unwrap();
        env.set_auto_escape_callback(|_| minijinja::AutoEscape::Html);

        let out = env
            .render_str(
                r#"{{ url("/a") }}|{{ asset("b.css") }}|{{ anchor("/c", "C") }}|{{ getint("5") + 1 }}|{{ include("nav.html") }}"#,
                minijinja::context! { request_host => "example.com" },
            )
            .unwrap();
        assert_eq!(out, r#"//example.com/a|/docs/b.css|<a href="/docs/c">C</a>|6|<nav></nav>"#);
    }
}
