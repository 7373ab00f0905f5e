//! Development-time tracing for debugging the loop.
//!
//! Diagnostics go to stderr and are controlled by `RUST_LOG`; they are not
//! part of product output. The attempt audit trail (`io/attempt_log`) is
//! always written regardless of this setting.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`; defaults to `warn` if unset. Output: stderr, compact.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
