//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with a single catch-all handler
//! - Wire up middleware (request ID, tracing)
//! - Dispatch requests to the host matched by the registry
//! - Serve on TCP or a unix socket until shutdown

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::http::access_log::{self, RequestLine};
use crate::http::request::{request_id, MakeRequestUuid};
use crate::net::Listener;
use crate::observability::metrics;
use crate::routing::HostRegistry;

const NO_HOST_BODY: &str = "no host configured for this request";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<HostRegistry>,
}

/// HTTP front end for all configured hosts.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(registry: Arc<HostRegistry>) -> Self {
        let router = Self::build_router(AppState { registry });
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(dispatch)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                        tracing::info_span!(
                            "request",
                            method = %request.method(),
                            uri = %request.uri(),
                            request_id = %request_id(request),
                        )
                    }))
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// The router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` resolves, then finish in-flight requests.
    pub async fn run<F>(self, listener: Listener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!(address = %listener.local_addr(), "HTTP server starting");

        match listener {
            Listener::Tcp(listener) => {
                let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
                axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;
            }
            #[cfg(unix)]
            Listener::Unix(listener, path) => {
                axum::serve(listener, self.router.into_make_service())
                    .with_graceful_shutdown(shutdown)
                    .await?;
                let _ = std::fs::remove_file(path);
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Route the request to its host by Host header and path.
async fn dispatch(State(state): State<AppState>, request: Request<Body>) -> Response {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let host_header = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| request.uri().host())
        .map(str::to_string);

    match state.registry.route(host_header.as_deref(), request.uri().path()) {
        Some(host) => host.handle(request, client).await,
        None => {
            let start = Instant::now();
            tracing::error!(
                host = host_header.as_deref().unwrap_or("-"),
                path = %request.uri().path(),
                "No host matches request and no default host is configured"
            );
            let line = RequestLine::from_request(&request);
            let status = StatusCode::INTERNAL_SERVER_ERROR;
            access_log::log(client, &line, status.as_u16(), Some(NO_HOST_BODY.len() as u64));
            metrics::record_request("none", status.as_u16(), start);
            (status, NO_HOST_BODY).into_response()
        }
    }
}
