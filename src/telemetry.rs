//! Telemetry initialization (tracing/tracing-subscriber).
//!
//! Behavior:
//! - LOG_LEVEL controls the filter (e.g. "debug" or full directives).
//! - LOG_FORMAT selects "pretty" (default) or "json" structured logs.
//!
//! Targets: "tutor" carries tutoring events (attempts, solved exercises,
//! answered questions); "javatutor_backend" carries server plumbing. Tower HTTP
//! TraceLayer adds per-request spans on top.

use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "info,tutor=debug,javatutor_backend=debug,tower_http=info,axum=info";

/// LOG_LEVEL if it parses, otherwise `DEFAULT_FILTER`.
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

pub fn init_tracing() {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => builder.json().init(),
        _ => builder.init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }
}
