//! Diagnostic tracing for the harness.
//!
//! Events go to stderr, filtered by `RUST_LOG`. Stdout carries only the
//! progress mirror of result rows, so `satbench > rows.txt` captures the
//! table without diagnostics mixed in.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber: `RUST_LOG` filter (default `warn`),
/// compact lines on stderr.
///
/// ```bash
/// RUST_LOG=satbench::schedule=debug satbench run -j 4
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
