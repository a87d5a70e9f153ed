//! Access log in Common Log Format.
//!
//! ```text
//! 127.0.0.1 - - [18/Oct/2026:10:00:00 +0000] "GET /docs/ HTTP/1.1" 200 5120
//! ```
//!
//! Unknown client addresses and sizes are written as `-`.

use std::net::SocketAddr;

use axum::http::Request;
use chrono::{DateTime, Local, TimeZone};

use crate::observability::logging::ACCESS_TARGET;

const TIMESTAMP_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// The request line, captured before the request is consumed.
#[derive(Debug, Clone)]
pub struct RequestLine {
    pub method: String,
    pub uri: String,
    pub version: String,
}

impl RequestLine {
    pub fn from_request<B>(request: &Request<B>) -> Self {
        Self {
            method: request.method().to_string(),
            uri: request
                .uri()
                .path_and_query()
                .map(|pq| pq.to_string())
                .unwrap_or_else(|| request.uri().to_string()),
            version: format!("{:?}", request.version()),
        }
    }
}

/// Format one access log line.
pub fn format_line<Tz>(
    client: Option<SocketAddr>,
    line: &RequestLine,
    status: u16,
    size: Option<u64>,
    time: &DateTime<Tz>,
) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{} - - [{}] \"{} {} {}\" {} {}",
        client.map_or_else(|| "-".to_string(), |c| c.ip().to_string()),
        time.format(TIMESTAMP_FORMAT),
        line.method,
        line.uri,
        line.version,
        status,
        size.map_or_else(|| "-".to_string(), |s| s.to_string()),
    )
}

/// Emit the access log line for a finished request.
pub fn log(client: Option<SocketAddr>, line: &RequestLine, status: u16, size: Option<u64>) {
    tracing::info!(target: ACCESS_TARGET, "{}", format_line(client, line, status, size, &Local::now()));
}
