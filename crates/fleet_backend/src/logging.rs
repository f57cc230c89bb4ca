//! Structured JSON logs on stderr.

use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVE: &str = "info";

/// Install the global subscriber. `RUST_LOG` overrides the default `info`
/// level. Calling this twice is harmless; the second call returns `false`.
pub fn init() -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_current_span(false)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
