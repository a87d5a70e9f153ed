//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use hostmark::config::GlobalSettings;
use hostmark::http::HttpServer;
use hostmark::lifecycle::Shutdown;
use hostmark::net::Listener;
use hostmark::routing::HostRegistry;

/// Write `body` to `root/relative`, creating parent directories.
pub fn write(root: &Path, relative: &str, body: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

/// Create a minimal site: empty `site.yaml`, an `index.tpl` and a home page.
pub fn site(root: &Path, template: &str) -> PathBuf {
    write(root, "site.yaml", "");
    write(root, "templates/index.tpl", template);
    write(root, "content/index.md", "# Hi\n");
    root.to_path_buf()
}

/// A server running on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub registry: Arc<HostRegistry>,
    shutdown: Shutdown,
}

impl TestServer {
    pub async fn start(hosts: &[(&str, PathBuf)]) -> Self {
        let mut settings = GlobalSettings::default();
        for (name, root) in hosts {
            settings.hosts.insert(name.to_string(), root.clone());
        }

        let registry = Arc::new(HostRegistry::new());
        registry.rebuild(&settings).unwrap();

        let listener = Listener::bind_tcp("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().parse().unwrap();

        let shutdown = Shutdown::new();
        let server = HttpServer::new(registry.clone());
        let stop = shutdown.wait();
        tokio::spawn(async move {
            let _ = server.run(listener, stop).await;
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        Self { addr, registry, shutdown }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Client that reports redirects instead of following them.
    pub fn client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
        self.registry.close();
    }
}
