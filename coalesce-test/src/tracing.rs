//! Log output for tests.

use tracing_subscriber::EnvFilter;

/// Install a test-friendly subscriber once per process.
///
/// Honours `RUST_LOG`; silent otherwise. Later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
