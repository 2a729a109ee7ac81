//! Tracing and logging setup for the dashboard binary.

/// Initialize process-wide tracing.
///
/// `default_directive` applies when `RUST_LOG` is unset or invalid, e.g.
/// `"info"` or `"ironqueue_dashboard=debug"`. Calling this more than once is a
/// no-op.
pub fn init(default_directive: &str) {
    let _ = tracing::init(default_directive);
}

/// Tracing configuration (filters, layers).
pub mod tracing;
