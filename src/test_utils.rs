use tracing_subscriber::EnvFilter;

/// Installs a test-friendly subscriber once per test binary. `RUST_LOG` overrides
/// the default filter.
pub fn trace_init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("aimd_token_bucket=debug"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
