//! Tracing setup shared by the service binaries.

/// Tracing configuration (filters, layers).
pub mod tracing;

/// Initialize process-wide tracing for `service`.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init(service: &'static str) {
    tracing::init(service);
}
