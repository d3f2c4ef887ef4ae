pub mod builders;
pub mod fake_remote;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Wall-clock limit for [`with_timeout`]. Under a paused clock it is virtual
/// time, so tests that sleep through long budgets should not use it.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Install a per-test-captured subscriber once per test binary.
///
/// Filter from `RUST_LOG`, then `DAQCTL_LOG`, else `info`. Output only shows
/// for failing tests unless run with `--nocapture`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_from_env("DAQCTL_LOG"))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Await `f`, failing the test if it takes longer than [`TEST_TIMEOUT`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(TEST_TIMEOUT, f)
        .await
        .expect("test future did not complete in time")
}
