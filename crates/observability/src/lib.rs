//! Process-wide logging setup.

/// Tracing subscriber configuration (filters, JSON output).
pub mod tracing;

/// Install the process-wide tracing subscriber.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init();
}

/// Install the subscriber with `default` as the filter when `RUST_LOG` is unset.
pub fn init_with_filter(default: &str) {
    tracing::init_with_filter(default);
}
