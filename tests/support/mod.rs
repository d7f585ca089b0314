// ABOUTME: Test support utilities.
// ABOUTME: Tracing setup and a scripted in-memory engine for integration tests.

use std::sync::Once;

// Each test binary only uses some of these helpers, so allow dead_code.
#[allow(dead_code)]
pub mod fake_runtime;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("cairn=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Whether a local engine is reachable, for tests that need a real one.
#[allow(dead_code)]
pub fn engine_available() -> bool {
    cairn::runtime::detect_local(None).is_ok()
}
