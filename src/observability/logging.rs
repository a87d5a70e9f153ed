//! Structured logging.
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies to this
//! crate and `tower_http`. Access log lines use the `access` target and can
//! be filtered separately (`RUST_LOG=access=off`).

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Target of the per-request access log events.
pub const ACCESS_TARGET: &str = "access";

/// Filter directives for a configured level.
pub fn default_directives(level: &str) -> String {
    format!("hostmark={level},tower_http={level},{ACCESS_TARGET}=info")
}

/// Install the global subscriber. Later calls are ignored.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
