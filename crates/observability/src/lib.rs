//! Tracing/logging setup shared by the binaries.

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use tracing::LogFormat;

/// Initialize process-wide tracing with the given filter and format.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init(filter: &str, format: LogFormat) {
    tracing::init(filter, format);
}
