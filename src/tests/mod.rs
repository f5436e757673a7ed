//! End-to-end tests against the public engine facade.

use std::sync::Once;


static TRACING: Once = Once::new();

/// Route engine logs through the test harness. Filter with `RUST_LOG`, e.g.
/// `RUST_LOG=tabletalk_recommend=debug cargo test`.
pub(crate) fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
