//! End-to-end serving tests over a real socket.

use reqwest::header::{HOST, LOCATION};
use reqwest::StatusCode;

use hostmark::search::index_host;

mod common;

use common::{site, write, TestServer};

const PAGE_TEMPLATE: &str = "{% if is_home %}HOME {% endif %}[{{ title }}]{{ content }}";

#[tokio::test]
async fn test_home_page_renders_markdown() {
    let dir = tempfile::tempdir().unwrap();
    let root = site(dir.path(), PAGE_TEMPLATE);
    let server = TestServer::start(&[("default", root)]).await;

    let res = server.client().get(server.url("/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
    let body = res.text().await.unwrap();
    assert!(body.starts_with("HOME "));
    assert!(body.contains("<h1 id=\"hi\">Hi</h1>"));
}

#[tokio::test]
async fn test_pages_and_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let root = site(dir.path(), PAGE_TEMPLATE);
    write(&root, "content/getting-started.md", "Read *this*.\n");
    let server = TestServer::start(&[("default", root)]).await;
    let client = server.client();

    let res = client.get(server.url("/getting-started")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.text().await.unwrap();
    assert!(!body.contains("HOME"));
    assert!(body.contains("[Getting started]"));
    assert!(body.contains("<em>this</em>"));

    let res = client.get(server.url("/nothing-here")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client.get(server.url("/../site.yaml")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_trailing_slash_redirects() {
    let dir = tempfile::tempdir().unwrap();
    let root = site(dir.path(), PAGE_TEMPLATE);
    write(&root, "content/about.md", "about\n");
    write(&root, "content/guide/index.md", "# Guide\n");
    let server = TestServer::start(&[("default", root)]).await;
    let client = server.client();

    let res = client.get(server.url("/about/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(res.headers()[LOCATION], "/about");

    let res = client.get(server.url("/guide?x=1")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(res.headers()[LOCATION], "/guide/?x=1");

    let res = client.get(server.url("/guide/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.text().await.unwrap().contains("[Guide]"));
}

#[tokio::test]
async fn test_static_files() {
    let dir = tempfile::tempdir().unwrap();
    let root = site(dir.path(), PAGE_TEMPLATE);
    write(&root, "webroot/robots.txt", "User-agent: *\n");
    write(&root, "content/notes.txt", "plain notes\n");
    let server = TestServer::start(&[("default", root)]).await;
    let client = server.client();

    let res = client.get(server.url("/robots.txt")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "User-agent: *\n");

    let res = client.get(server.url("/notes.txt")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "plain notes\n");

    // Markdown sources are rendered, never served raw.
    let res = client.get(server.url("/index.md")).send().await.unwrap();
    assert!(!res.text().await.unwrap().starts_with("# Hi"));
}

#[tokio::test]
async fn test_longest_prefix_routing() {
    let dir = tempfile::tempdir().unwrap();
    let default = site(&dir.path().join("default"), "default:{{ mount_path }}");
    let blog = site(&dir.path().join("blog"), "blog:{{ mount_path }}");
    let example = site(&dir.path().join("example"), "example:{{ mount_path }}");
    let docs = site(&dir.path().join("docs"), "docs:{{ mount_path }}");

    let server = TestServer::start(&[
        ("default", default),
        ("/blog", blog),
        ("example.com", example),
        ("example.com/docs", docs),
    ])
    .await;
    let client = server.client();

    let get = |path: &str, host: Option<&str>| {
        let mut req = client.get(server.url(path));
        if let Some(host) = host {
            req = req.header(HOST, host);
        }
        async move { req.send().await.unwrap().text().await.unwrap() }
    };

    assert_eq!(get("/", None).await, "default:");
    assert_eq!(get("/blog/", None).await, "blog:/blog");
    assert!(get("/blogger", None).await.starts_with("default:"));
    assert_eq!(get("/", Some("example.com")).await, "example:");
    assert_eq!(get("/docs/", Some("EXAMPLE.com:8080")).await, "docs:/docs");
}

#[tokio::test]
async fn test_search_page() {
    let dir = tempfile::tempdir().unwrap();
    let root = site(dir.path(), PAGE_TEMPLATE);
    write(&root, "content/guide/install-notes.md", "# Install\n\nhello world\n");
    write(&root, "content/other.md", "nothing relevant\n");
    let server = TestServer::start(&[("default", root)]).await;

    for host in server.registry.hosts() {
        index_host(&host).unwrap();
    }

    let client = server.client();
    let res = client.get(server.url("/search?terms=hello")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.text().await.unwrap();
    assert!(body.contains("href=\"/guide/install-notes\""));
    assert!(body.contains("Install notes"));
    assert!(!body.contains("/other"));

    let res = client.get(server.url("/search?terms=zebra")).send().await.unwrap();
    assert!(res.text().await.unwrap().contains("<h3>No results</h3>"));
}

const PARTS_TEMPLATE: &str = "I[{{ content_header }}|{{ content }}|{{ content_footer }}]";

#[tokio::test]
async fn test_directory_defaults_header_and_footer() {
    let dir = tempfile::tempdir().unwrap();
    let root = site(dir.path(), PARTS_TEMPLATE);
    write(
        &root,
        "templates/doc.tpl",
        "D[{{ content_header }}|{{ content }}|{{ content_footer }}|{{ data.k }}]",
    );
    write(&root, "content/guide/_defaults.md", "---\nTemplate: doc.tpl\nData:\n  k: v\n---\n");
    write(&root, "content/guide/_header.md", "*head*\n");
    write(&root, "content/guide/_footer.html", "<i>foot</i>");
    write(&root, "content/guide/page.md", "body\n");
    let server = TestServer::start(&[("default", root)]).await;

    let res = server.client().get(server.url("/guide/page")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.text().await.unwrap(),
        "D[<p><em>head</em></p>\n|<p>body</p>\n|<i>foot</i>|v]"
    );
}

#[tokio::test]
async fn test_unterminated_frontmatter_serves_empty_page() {
    let dir = tempfile::tempdir().unwrap();
    let root = site(dir.path(), PARTS_TEMPLATE);
    write(&root, "templates/doc.tpl", "D[{{ content }}]");
    write(&root, "content/broken.md", "---\nTemplate: doc.tpl\nnever closed\n");
    let server = TestServer::start(&[("default", root)]).await;

    let res = server.client().get(server.url("/broken")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "I[||]");
}

#[tokio::test]
async fn test_template_override_and_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let root = site(dir.path(), PARTS_TEMPLATE);
    write(&root, "templates/doc.tpl", "D[{{ content }}]");
    write(&root, "content/chosen.md", "---\nTemplate: doc.tpl\n---\nchosen\n");
    write(&root, "content/fallback.md", "---\nTemplate: missing.tpl\n---\nfallback\n");
    let server = TestServer::start(&[("default", root)]).await;
    let client = server.client();

    let res = client.get(server.url("/chosen")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "D[<p>chosen</p>\n]");

    let res = client.get(server.url("/fallback")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "I[|<p>fallback</p>\n|]");
}
