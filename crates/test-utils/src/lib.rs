//! Shared helpers for `wavedag` tests: plan builders, fake units and
//! tracing/timeout plumbing.

pub mod builders;
pub mod fake_units;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Upper bound for any single async test.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Install a test-friendly subscriber once per test binary.
///
/// Output goes through the test writer, so it only shows up for failing
/// tests (or with `-- --nocapture`). The filter is read from `WAVEDAG_LOG`,
/// falling back to `RUST_LOG` and then `info`:
///
/// `WAVEDAG_LOG=wavedag::engine=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = std::env::var(wavedag::logging::LOG_ENV)
            .ok()
            .and_then(|s| EnvFilter::try_new(s).ok())
            .or_else(|| EnvFilter::try_from_default_env().ok())
            .unwrap_or_else(|| EnvFilter::new("info"));

        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// Run a future, panicking if it takes longer than [`TEST_TIMEOUT`].
///
/// A hung orchestrator run (for example units that were expected to run
/// concurrently but did not) fails the test instead of blocking the suite.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(TEST_TIMEOUT, f)
        .await
        .unwrap_or_else(|_| panic!("test timed out after {}s", TEST_TIMEOUT.as_secs()))
}
