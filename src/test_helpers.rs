//! Shared test setup.

/// Install a tracing subscriber for test runs. Safe to call from every
/// test; only the first call wins. Filtering follows `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
