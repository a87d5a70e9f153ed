//! Live reload tests: atomic template swaps, watcher driven reloads and
//! failed registry rebuilds.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};

use hostmark::config::GlobalSettings;
use hostmark::host::{Host, ReloadKind};

mod common;

use common::{site, write, TestServer};

/// Replace a file in one step so a reload never reads half of it.
fn replace(root: &Path, relative: &str, body: &str) {
    let target = root.join(relative);
    let staging = target.with_extension("staging");
    fs::write(&staging, body).unwrap();
    fs::rename(&staging, &target).unwrap();
}

fn write_generation(root: &Path, generation: u32) {
    replace(root, "templates/part.tpl", &generation.to_string());
    replace(
        root,
        "templates/index.tpl",
        &format!("{generation}|{{% include \"part.tpl\" %}}|{generation}"),
    );
}

async fn body_of(host: &Arc<Host>, path: &str) -> (StatusCode, String) {
    let req = Request::builder().uri(path).body(Body::empty()).unwrap();
    let res = Arc::clone(host).handle(req, None).await;
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_template_reload_is_atomic() {
    let dir = tempfile::tempdir().unwrap();
    let root = site(dir.path(), "");
    write(&root, "templates/part.tpl", "");
    write_generation(&root, 0);

    let host = Host::load("default", &root).unwrap();
    let done = Arc::new(AtomicBool::new(false));

    let reloader = {
        let host = Arc::clone(&host);
        let root = root.clone();
        let done = Arc::clone(&done);
        tokio::task::spawn_blocking(move || {
            for generation in 1..=30 {
                write_generation(&root, generation);
                host.reload(ReloadKind::Templates).unwrap();
            }
            done.store(true, Ordering::SeqCst);
        })
    };

    let mut readers = Vec::new();
    for _ in 0..8 {
        let host = Arc::clone(&host);
        let done = Arc::clone(&done);
        readers.push(tokio::spawn(async move {
            let mut seen = 0;
            while !done.load(Ordering::SeqCst) || seen == 0 {
                let (status, body) = body_of(&host, "/").await;
                assert_eq!(status, StatusCode::OK);
                let parts: Vec<&str> = body.split('|').collect();
                assert_eq!(parts.len(), 3, "unexpected body {body:?}");
                assert!(
                    parts.iter().all(|p| *p == parts[0]),
                    "mixed template generations in {body:?}"
                );
                seen += 1;
            }
            seen
        }));
    }

    reloader.await.unwrap();
    for reader in readers {
        assert!(reader.await.unwrap() > 0);
    }

    let (_, body) = body_of(&host, "/").await;
    assert_eq!(body, "30|30|30");
}

#[tokio::test]
async fn test_failed_template_reload_keeps_previous_group() {
    let dir = tempfile::tempdir().unwrap();
    let root = site(dir.path(), "good {{ content }}");
    let host = Host::load("default", &root).unwrap();

    write(&root, "templates/index.tpl", "{% if %}");
    assert!(host.reload(ReloadKind::Templates).is_err());

    let (status, body) = body_of(&host, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with("good "));
}

async fn wait_for_body(server: &TestServer, path: &str, expected: &str) {
    let client = server.client();
    let found = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if let Ok(res) = client.get(server.url(path)).send().await {
                if res.text().await.map(|b| b.contains(expected)).unwrap_or(false) {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;
    assert!(found.is_ok(), "{path} never contained {expected:?}");
}

#[tokio::test]
async fn test_watcher_reloads_templates_and_settings() {
    let dir = tempfile::tempdir().unwrap();
    let root = site(dir.path(), "v1 {{ site.title }}");
    write(&root, "site.yaml", "title: First\n");
    let server = TestServer::start(&[("default", root.clone())]).await;

    wait_for_body(&server, "/", "v1 First").await;

    replace(&root, "templates/index.tpl", "v2 {{ site.title }}");
    wait_for_body(&server, "/", "v2 First").await;

    replace(&root, "site.yaml", "title: Second\n");
    wait_for_body(&server, "/", "v2 Second").await;
}

#[tokio::test]
async fn test_failed_rebuild_keeps_serving_previous_hosts() {
    let dir = tempfile::tempdir().unwrap();
    let root = site(&dir.path().join("site"), "original");
    let server = TestServer::start(&[("default", root)]).await;

    let mut broken = GlobalSettings::default();
    broken.hosts.insert("default".into(), dir.path().join("does-not-exist"));
    assert!(server.registry.rebuild(&broken).is_err());

    let other = dir.path().join("other");
    fs::create_dir_all(&other).unwrap();
    // Present but without templates: opening the host fails.
    write(&other, "site.yaml", "");
    let mut no_templates = GlobalSettings::default();
    no_templates.hosts.insert("default".into(), other);
    assert!(server.registry.rebuild(&no_templates).is_err());

    let res = server.client().get(server.url("/")).send().await.unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "original");
}
