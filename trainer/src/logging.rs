//! Diagnostic tracing for the engine and the CLI.
//!
//! Engine code only emits `tracing` events; installing a subscriber is left
//! to the binary. Session results are reported separately through
//! [`SessionReport`](crate::executor::SessionReport) and are unaffected by
//! `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a compact stderr subscriber filtered by `RUST_LOG`, or by
/// `default_filter` when the variable is unset or invalid.
///
/// # Example
/// ```bash
/// RUST_LOG=trainer=debug trainer simulate --trials 6
/// ```
pub fn init(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
