use std::io;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "info,service=debug";

/// Initialize tracing subscriber with compact human-readable output.
/// - Respects `RUST_LOG` if set
/// - Falls back to `info,service=debug` so store mutations are visible
/// - Writes to stderr; stdout is reserved for command output
pub fn init_logging_default() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .with_writer(io::stderr)
        .try_init();
}

/// Initialize tracing subscriber with JSON structured output.
/// - Respects `RUST_LOG` if set, same fallback as the compact variant
/// - One JSON object per line for log shippers
pub fn init_logging_json() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .json()
        .with_writer(io::stderr)
        .try_init();
}

/// Pick the subscriber by name (`"json"` or anything else for compact).
pub fn init_logging_named(format: &str) {
    if format.eq_ignore_ascii_case("json") {
        init_logging_json();
    } else {
        init_logging_default();
    }
}
