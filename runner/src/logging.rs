//! Development-time tracing for debugging the runner.
//!
//! Tracing goes to stderr and is filtered by `RUST_LOG`. Phase progress,
//! agent output and summaries are user output and go through `io::display`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`; defaults to `warn` if unset.
///
/// # Example
/// ```bash
/// RUST_LOG=sprint_runner=debug sprint-runner auto
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
