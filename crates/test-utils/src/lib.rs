//! Shared fixtures for the `seqrun` integration tests: workflow builders, a
//! scripted executor, log capture and a run deadline.

pub mod builders;
pub mod fake_executor;

use std::future::Future;
use std::time::Duration;

use seqrun::logging::{LOG_ENV, env_filter};
use tracing_subscriber::fmt;

pub use builders::{JobBuilder, WorkflowBuilder, foreach};
pub use fake_executor::ScriptedExecutor;

/// Longest any single test run may take.
pub const RUN_DEADLINE: Duration = Duration::from_secs(5);

/// Capture logs per test, filtered the same way the binary filters them
/// (`SEQRUN_LOG=debug cargo test`). Output only shows for failing tests.
pub fn init_tracing() {
    let env_value = std::env::var(LOG_ENV).ok();
    // Every test calls this; only the first install succeeds.
    let _ = fmt()
        .with_env_filter(env_filter(None, env_value.as_deref()))
        .with_test_writer()
        .try_init();
}

/// Await `f`, panicking if it outlives [`RUN_DEADLINE`]. A hung run means a
/// job waits on something that never settles.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(RUN_DEADLINE, f).await {
        Ok(value) => value,
        Err(_) => panic!("run did not finish within {RUN_DEADLINE:?}"),
    }
}
