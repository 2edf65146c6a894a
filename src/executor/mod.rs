//! Test execution engine
//!
//! Provides retry-wrapped test execution and sequential and parallel suite
//! runners on top of an injected [`HttpExecutor`].

mod parallel;
mod progress;
mod retry;
mod runner;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::RunError;
use crate::models::{Test, TestResult};

pub use progress::{ProgressCounter, ProgressObserver};
pub use retry::{calculate_delay, should_retry, RetryExecutor};
pub use runner::TestRunner;

/// Performs a single HTTP request for a test
///
/// Timeouts, connection failures and error statuses are reported inside the
/// returned [`TestResult`]. `Err` is reserved for configuration problems that
/// make the whole run meaningless, such as a test without a request.
#[async_trait]
pub trait HttpExecutor: Send + Sync {
    async fn execute(&self, cancel: &CancellationToken, test: &Test) -> Result<TestResult, RunError>;
}
