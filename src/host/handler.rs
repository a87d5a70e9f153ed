//! Request handling for one host.
//!
//! # Order of attempts
//! 1. A file under the webroot directory, served verbatim.
//! 2. A non-markdown file under the content directory, served verbatim.
//! 3. Content resolution: redirects, frontmatter, markdown, template.
//! 4. `/search` when nothing resolved there.
//! 5. Not found.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use percent_encoding::percent_decode_str;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::content::{self, Document, FrontMatter, Resolved};
use crate::host::nav::{self, strip_content_extension};
use crate::host::page::{content_context, parse_query, Page, Query};
use crate::host::vhost::{Host, HostState};
use crate::http::access_log::{self, RequestLine};
use crate::observability::metrics;
use crate::search::bridge;
use crate::template::{INDEX_TEMPLATE, SEARCH_TEMPLATE};

/// Reserved path dispatched to the search bridge.
pub const SEARCH_PATH: &str = "/search";

/// Maximum number of search hits rendered.
pub const MAX_SEARCH_RESULTS: usize = 20;

const DEFAULTS_FILE: &str = "_defaults";
const HEADER_FILE: &str = "_header";
const FOOTER_FILE: &str = "_footer";
const VERBATIM_EXCLUDED: &[&str] = &["md", "tpl"];

/// A response and its body size when known.
type Served = (Response, Option<u64>);

/// The parts of a request page rendering needs, owned so rendering can move
/// to the blocking pool.
#[derive(Debug, Clone)]
struct PageRequest {
    path: String,
    query_string: Option<String>,
    query: Query,
    host: String,
}

impl PageRequest {
    fn from_request(req: &Request<Body>) -> Self {
        let host = req
            .headers()
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .or_else(|| req.uri().host())
            .unwrap_or_default()
            .to_string();
        Self {
            path: req.uri().path().to_string(),
            query_string: req.uri().query().map(str::to_string),
            query: parse_query(req.uri().query()),
            host,
        }
    }

    fn with_query(&self, path: &str) -> String {
        match &self.query_string {
            Some(q) => format!("{path}?{q}"),
            None => path.to_string(),
        }
    }
}

impl Host {
    /// Serve one request and write its access log line.
    pub async fn handle(self: Arc<Self>, req: Request<Body>, client: Option<SocketAddr>) -> Response {
        let start = Instant::now();
        let line = RequestLine::from_request(&req);

        let (response, size) = self.respond(req).await;

        let status = response.status().as_u16();
        access_log::log(client, &line, status, size);
        metrics::record_request(self.name(), status, start);
        response
    }

    async fn respond(self: &Arc<Self>, req: Request<Body>) -> Served {
        let state = self.snapshot();
        let Some(relative) = self.relative_path(req.uri().path()) else {
            return self.not_found(req.uri().path());
        };

        let webroot_file = join_relative(&self.webroot_dir(&state.settings), &relative);
        if let Some(size) = file_size(&webroot_file) {
            return serve_file(&webroot_file, size, req).await;
        }

        let Some(content_dir) = self.content_dir(&state.settings) else {
            tracing::error!(host = %self.name(), "Content directory was not found");
            return plain(StatusCode::INTERNAL_SERVER_ERROR, "content directory was not found");
        };

        let direct = join_relative(&content_dir, &relative);
        if serves_verbatim(&direct) {
            if let Some(size) = file_size(&direct) {
                return serve_file(&direct, size, req).await;
            }
        }

        let request = PageRequest::from_request(&req);
        let host = Arc::clone(self);
        let rendered =
            tokio::task::spawn_blocking(move || host.render_content(&state, &content_dir, &relative, &request)).await;
        match rendered {
            Ok(served) => served,
            Err(e) => {
                tracing::error!(host = %self.name(), error = %e, "Rendering task failed");
                plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        }
    }

    /// Host relative path of a request path: percent-decoded, mount path
    /// stripped, trailing slashes removed. `None` for paths escaping the
    /// root.
    pub fn relative_path(&self, path: &str) -> Option<String> {
        let decoded = percent_decode_str(path).decode_utf8().ok()?;
        if decoded.contains('\0') || decoded.split('/').any(|segment| segment == "..") {
            return None;
        }
        let trimmed = decoded.trim_end_matches('/');
        let relative = match trimmed.strip_prefix(self.mount_path()) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
            _ => trimmed,
        };
        Some(relative.trim_end_matches('/').to_string())
    }

    fn render_content(&self, state: &HostState, content_dir: &Path, relative: &str, request: &PageRequest) -> Served {
        let candidate = join_relative(content_dir, relative);
        let Some(resolved) = content::resolve(&candidate, true) else {
            if relative == SEARCH_PATH {
                return self.render_search(state, content_dir, request);
            }
            return self.not_found(relative);
        };

        // Directories (even those rendered through their index) only with a
        // trailing slash, files only without.
        if !relative.is_empty() {
            let is_directory = candidate.is_dir();
            if !is_directory && request.path.ends_with('/') {
                let target = request.path.trim_end_matches('/');
                return redirect(&request.with_query(if target.is_empty() { "/" } else { target }));
            }
            if is_directory && !request.path.ends_with('/') {
                return redirect(&request.with_query(&format!("{}/", request.path)));
            }
        }

        let file_dir = match resolved.path.parent() {
            Some(parent) if !resolved.is_dir() => parent.to_path_buf(),
            _ => resolved.path.clone(),
        };
        let is_home = self.mount_path().trim_matches('/') == request.path.trim_matches('/');

        let defaults = self.directory_defaults(&file_dir);
        let expand = |source: &str| {
            state
                .templates
                .render_str(source, content_context(&request.host, &state.settings, &request.query))
        };
        let document = if resolved.is_dir() {
            Document {
                meta: defaults,
                ..Document::default()
            }
        } else {
            content::read_document(&resolved.path, defaults.clone(), expand).unwrap_or_else(|e| {
                tracing::error!(host = %self.name(), error = %e, "Could not read content");
                Document {
                    meta: defaults,
                    ..Document::default()
                }
            })
        };

        let template = document
            .meta
            .template
            .as_deref()
            .filter(|name| state.templates.contains(name))
            .unwrap_or(INDEX_TEMPLATE)
            .to_string();

        let mut page = self.base_page(state, content_dir, &file_dir, relative, request);
        page.title = self.page_title(state, content_dir, &resolved, is_home);
        page.is_home = is_home;
        page.file_path = resolved.path.display().to_string();
        page.content = document.html;
        page.toc = document.toc;
        page.data = document.meta.data;

        self.render_page(state, &template, &page)
    }

    fn render_search(&self, state: &HostState, content_dir: &Path, request: &PageRequest) -> Served {
        let terms: Vec<String> = request
            .query
            .get("terms")
            .into_iter()
            .flatten()
            .flat_map(|value| value.split_whitespace())
            .map(str::to_string)
            .collect();

        let hits = match self.search_index_path(&state.settings) {
            Some(index) => bridge::search_index(&index, &terms, MAX_SEARCH_RESULTS),
            None => Vec::new(),
        };
        let joined = terms.join(" ");

        let mut page = self.base_page(state, content_dir, content_dir, "", request);
        page.title = "Search".to_string();
        page.file_path = content_dir.display().to_string();
        page.content = bridge::results_html(self.mount_path(), &joined, &hits);
        page.search_terms = Some(joined);
        page.search_results = hits;

        let template = if state.templates.contains(SEARCH_TEMPLATE) {
            SEARCH_TEMPLATE
        } else {
            INDEX_TEMPLATE
        };
        self.render_page(state, template, &page)
    }

    fn render_page(&self, state: &HostState, template: &str, page: &Page) -> Served {
        match state.templates.render(template, page.to_context(&state.settings)) {
            Ok(body) => {
                let size = body.len() as u64;
                ((StatusCode::OK, Html(body)).into_response(), Some(size))
            }
            Err(e) => {
                tracing::error!(host = %self.name(), template = %template, error = %e, "Template execution failed");
                plain(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
            }
        }
    }

    /// Fields shared by content and search pages.
    fn base_page(
        &self,
        state: &HostState,
        content_dir: &Path,
        file_dir: &Path,
        relative: &str,
        request: &PageRequest,
    ) -> Page {
        let base_path = base_path(content_dir, file_dir);
        let hidden: Vec<String> = self
            .search_index_path(&state.settings)
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .into_iter()
            .collect();
        let hidden: Vec<&str> = hidden.iter().map(String::as_str).collect();

        Page {
            content_header: self.directory_part(state, file_dir, HEADER_FILE, request),
            content_footer: self.directory_part(state, file_dir, FOOTER_FILE, request),
            breadcrumb: nav::breadcrumb(self.mount_path(), relative, &home_title(state)),
            menu: nav::menu(content_dir, self.mount_path(), "/", &hidden),
            side_menu: nav::menu(file_dir, self.mount_path(), &base_path, &hidden),
            request_host: request.host.clone(),
            request_path: request.path.clone(),
            base_path,
            mount_path: self.mount_path().to_string(),
            host_name: self.name().to_string(),
            query: request.query.clone(),
            ..Page::default()
        }
    }

    /// Frontmatter of the directory's `_defaults` file.
    fn directory_defaults(&self, dir: &Path) -> FrontMatter {
        let Some(found) = content::resolve(&dir.join(DEFAULTS_FILE), true).filter(|r| !r.is_dir()) else {
            return FrontMatter::default();
        };
        content::read_frontmatter(&found.path).unwrap_or_else(|e| {
            tracing::error!(host = %self.name(), error = %e, "Could not read directory defaults");
            FrontMatter::default()
        })
    }

    /// Rendered `_header` or `_footer` of a directory, empty when absent.
    fn directory_part(&self, state: &HostState, dir: &Path, name: &str, request: &PageRequest) -> String {
        let Some(found) = content::resolve(&dir.join(name), true).filter(|r| !r.is_dir()) else {
            return String::new();
        };
        let expand = |source: &str| {
            state
                .templates
                .render_str(source, content_context(&request.host, &state.settings, &request.query))
        };
        match content::read_document(&found.path, FrontMatter::default(), expand) {
            Ok(document) => document.html,
            Err(e) => {
                tracing::error!(host = %self.name(), error = %e, "Could not read {}", name);
                String::new()
            }
        }
    }

    fn page_title(&self, state: &HostState, content_dir: &Path, resolved: &Resolved, is_home: bool) -> String {
        if is_home {
            return home_title(state);
        }
        let file_name = resolved
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = strip_content_extension(&file_name);
        if resolved.is_dir() || stem != content::resolve::INDEX_STEM {
            return nav::humanize(stem);
        }
        match resolved.path.parent() {
            Some(dir) if dir != content_dir => {
                nav::humanize(&dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default())
            }
            _ => home_title(state),
        }
    }

    fn not_found(&self, path: &str) -> Served {
        tracing::info!(host = %self.name(), path = %path, "Path not found");
        plain(StatusCode::NOT_FOUND, "Not found")
    }
}

fn home_title(state: &HostState) -> String {
    state.settings.get_str(&["title"]).unwrap_or("Home").to_string()
}

/// URL of a content directory relative to the mount point, with slashes on
/// both ends.
fn base_path(content_dir: &Path, dir: &Path) -> String {
    let relative = dir.strip_prefix(content_dir).unwrap_or(Path::new(""));
    let segments: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", segments.join("/"))
    }
}

fn join_relative(base: &Path, relative: &str) -> PathBuf {
    let relative = relative.trim_start_matches('/');
    if relative.is_empty() {
        base.to_path_buf()
    } else {
        base.join(relative)
    }
}

fn file_size(path: &Path) -> Option<u64> {
    fs::metadata(path).ok().filter(|m| m.is_file()).map(|m| m.len())
}

fn serves_verbatim(path: &Path) -> bool {
    path.extension()
        .map_or(true, |ext| !VERBATIM_EXCLUDED.iter().any(|excluded| ext == *excluded))
}

async fn serve_file(path: &Path, size: u64, req: Request<Body>) -> Served {
    match ServeFile::new(path).oneshot(req).await {
        Ok(response) => (response.map(Body::new), Some(size)),
        Err(never) => match never {},
    }
}

fn redirect(location: &str) -> Served {
    let body = "Moved Permanently";
    (
        (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location.to_string())], body).into_response(),
        Some(body.len() as u64),
    )
}

fn plain(status: StatusCode, message: &str) -> Served {
    ((status, message.to_string()).into_response(), Some(message.len() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(name: &str) -> (tempfile::TempDir, Arc<Host>) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("templates")).unwrap();
        fs::create_dir_all(dir.path().join("content")).unwrap();
        fs::write(dir.path().join("site.yaml"), "").unwrap();
        fs::write(dir.path().join("templates/index.tpl"), "{{ content }}").unwrap();
        let host = Host::load(name, dir.path()).unwrap();
        (dir, host)
    }

    #[test]
    fn test_relative_path() {
        let (_dir, host) = host("/blog");
        assert_eq!(host.relative_path("/blog/post%201/").as_deref(), Some("/post 1"));
        assert_eq!(host.relative_path("/blog").as_deref(), Some(""));
        assert_eq!(host.relative_path("/blogger").as_deref(), Some("/blogger"));
        assert_eq!(host.relative_path("/blog/../etc/passwd"), None);
        assert_eq!(host.relative_path("/blog/%2e%2e/x"), None);
    }

    #[test]
    fn test_base_path() {
        let root = Path::new("/site/content");
        assert_eq!(base_path(root, root), "/");
        assert_eq!(base_path(root, &root.join("guide/deep")), "/guide/deep/");
    }

    #[test]
    fn test_serves_verbatim() {
        assert!(serves_verbatim(Path::new("a.html")));
        assert!(serves_verbatim(Path::new("logo.png")));
        assert!(!serves_verbatim(Path::new("a.md")));
        assert!(!serves_verbatim(Path::new("a.md.tpl")));
    }

    #[tokio::test]
    async fn test_handle_renders_and_redirects() {
        let (dir, host) = host("default");
        fs::write(dir.path().join("content/page.md"), "# Page\n").unwrap();
        fs::create_dir_all(dir.path().join("content/guide")).unwrap();

        let req = Request::builder().uri("/page").body(Body::empty()).unwrap();
        let res = Arc::clone(&host).handle(req, None).await;
        assert_eq!(res.status(), StatusCode::OK);

        let req = Request::builder().uri("/page/").body(Body::empty()).unwrap();
        let res = Arc::clone(&host).handle(req, None).await;
        assert_eq!(res.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(res.headers()[header::LOCATION], "/page");

        let req = Request::builder().uri("/guide").body(Body::empty()).unwrap();
        let res = Arc::clone(&host).handle(req, None).await;
        assert_eq!(res.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(res.headers()[header::LOCATION], "/guide/");

        let req = Request::builder().uri("/missing").body(Body::empty()).unwrap();
        let res = Arc::clone(&host).handle(req, None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_template_execution_error_is_server_error() {
        let (dir, host) = host("default");
        fs::write(dir.path().join("templates/broken.tpl"), "{{ missing.field.deeper }}").unwrap();
        host.reload(crate::host::ReloadKind::Templates).unwrap();
        fs::write(dir.path().join("content/index.md"), "---\nTemplate: broken.tpl\n---\nx\n").unwrap();

        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let res = host.handle(req, None).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
