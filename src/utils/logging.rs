//! Structured logging configuration.
//!
//! Thin setup over `tracing-subscriber`. The interceptor itself only ever
//! emits through the `tracing` macros; hosts that already install their own
//! subscriber can skip this module entirely.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Initialize logging with the `RUST_LOG` environment filter, defaulting to
/// `info` when unset. Safe to call more than once; later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

/// Initialize logging at a fixed level, ignoring the environment.
pub fn init_with_level(level: Level) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true)
        .try_init();
}
