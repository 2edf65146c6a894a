//! Retry policy
//!
//! Wraps an [`HttpExecutor`] with per-test retries. Every attempt is
//! validated against the test's assertions, so an attempt whose response
//! fails an assertion counts as a failure even when the request itself
//! succeeded.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::HttpExecutor;
use crate::assertion::AssertionEngine;
use crate::error::RunError;
use crate::models::{Backoff, Test, TestResult};

/// Delay used when a test asks for retries without a delay
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Executes tests with retries and assertion validation
pub struct RetryExecutor {
    executor: Arc<dyn HttpExecutor>,
    engine: Arc<AssertionEngine>,
}

impl RetryExecutor {
    pub fn new(executor: Arc<dyn HttpExecutor>, engine: Arc<AssertionEngine>) -> Self {
        Self { executor, engine }
    }

    /// Same executor, different assertion engine
    pub fn with_engine(&self, engine: Arc<AssertionEngine>) -> Self {
        Self {
            executor: self.executor.clone(),
            engine,
        }
    }

    pub fn engine(&self) -> &AssertionEngine {
        &self.engine
    }

    /// Run `test` until it passes, retries are exhausted, or the last
    /// attempt is not eligible for retry.
    ///
    /// Cancellation during a backoff wait returns the last attempt marked
    /// as cancelled. Fatal executor errors are returned immediately.
    pub async fn execute_with_retry(
        &self,
        cancel: &CancellationToken,
        test: &Test,
    ) -> Result<TestResult, RunError> {
        let max_attempts = test.max_attempts();
        let mut attempt = 0;

        loop {
            let mut result = self.attempt(cancel, test).await?;
            result.attempts = attempt + 1;

            if result.success || result.is_cancelled() {
                return Ok(result);
            }

            if result.attempts >= max_attempts {
                if max_attempts > 1 {
                    debug!(
                        "{}: giving up after {} attempts",
                        test.name, result.attempts
                    );
                }
                return Ok(result);
            }

            if !should_retry(&result, &test.retry_on_status) {
                debug!(
                    "{}: status {:?} not eligible for retry",
                    test.name, result.status_code
                );
                return Ok(result);
            }

            let delay = calculate_delay(attempt, test.retry_delay, test.retry_backoff);
            info!(
                "{}: attempt {}/{} failed, retrying in {:?}",
                test.name, result.attempts, max_attempts, delay
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("{}: cancelled while waiting to retry", test.name);
                    result.cancel();
                    return Ok(result);
                }
                _ = tokio::time::sleep(delay) => {}
            }

            attempt += 1;
        }
    }

    /// One request followed by assertion validation
    async fn attempt(
        &self,
        cancel: &CancellationToken,
        test: &Test,
    ) -> Result<TestResult, RunError> {
        let mut result = self.executor.execute(cancel, test).await?;
        if result.error.is_none() {
            result.failures = self.engine.validate(&result, &test.assertions);
        }
        result.settle();
        Ok(result)
    }
}

/// Delay before retry number `attempt + 1`, counting from zero.
///
/// Exponential backoff doubles the initial delay per attempt, linear adds
/// it once per attempt. A zero initial delay is treated as one second.
pub fn calculate_delay(attempt: u32, initial: Duration, backoff: Backoff) -> Duration {
    let initial = if initial.is_zero() {
        DEFAULT_RETRY_DELAY
    } else {
        initial
    };

    match backoff {
        Backoff::Exponential => {
            let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
            initial.saturating_mul(factor)
        }
        Backoff::Linear => initial.saturating_mul(attempt.saturating_add(1)),
    }
}

/// Whether a failed attempt may be retried.
///
/// With an explicit status list only those statuses qualify; otherwise any
/// failure does.
pub fn should_retry(result: &TestResult, retry_on_status: &[u16]) -> bool {
    if retry_on_status.is_empty() {
        return !result.success;
    }
    result
        .status_code
        .is_some_and(|code| retry_on_status.contains(&code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecutionError;
    use crate::executor::testing::{ScriptedExecutor, Step};
    use crate::models::{Assertion, PreparedRequest};

    fn retry_executor(executor: Arc<ScriptedExecutor>) -> RetryExecutor {
        RetryExecutor::new(executor, Arc::new(AssertionEngine::new()))
    }

    fn test(name: &str) -> Test {
        Test::new(name, PreparedRequest::get("http://localhost/"))
            .assertion(Assertion::status("200"))
    }

    fn gaps(calls: &[tokio::time::Instant]) -> Vec<Duration> {
        calls.windows(2).map(|w| w[1] - w[0]).collect()
    }

    #[test]
    fn test_calculate_delay_exponential() {
        let base = Duration::from_millis(100);
        assert_eq!(calculate_delay(0, base, Backoff::Exponential), Duration::from_millis(100));
        assert_eq!(calculate_delay(1, base, Backoff::Exponential), Duration::from_millis(200));
        assert_eq!(calculate_delay(3, base, Backoff::Exponential), Duration::from_millis(800));
    }

    #[test]
    fn test_calculate_delay_linear() {
        let base = Duration::from_millis(100);
        assert_eq!(calculate_delay(0, base, Backoff::Linear), Duration::from_millis(100));
        assert_eq!(calculate_delay(1, base, Backoff::Linear), Duration::from_millis(200));
        assert_eq!(calculate_delay(2, base, Backoff::Linear), Duration::from_millis(300));
    }

    #[test]
    fn test_calculate_delay_defaults() {
        assert_eq!(calculate_delay(0, Duration::ZERO, Backoff::Exponential), Duration::from_secs(1));
        assert_eq!(calculate_delay(2, Duration::ZERO, Backoff::Linear), Duration::from_secs(3));
        assert_eq!(
            calculate_delay(0, Duration::from_secs(1), Backoff::parse("fibonacci")),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_calculate_delay_saturates() {
        let delay = calculate_delay(64, Duration::from_secs(1), Backoff::Exponential);
        assert!(delay >= Duration::from_secs(u32::MAX as u64));
    }

    #[test]
    fn test_should_retry() {
        let t = test("retry");
        let mut server_error = TestResult::response(t.clone(), 503, "");
        server_error.success = false;
        let mut not_found = TestResult::response(t.clone(), 404, "");
        not_found.success = false;
        let transport = TestResult::failed(t.clone(), ExecutionError::Connect("refused".into()));
        let ok = TestResult::response(t, 200, "");

        assert!(should_retry(&server_error, &[502, 503]));
        assert!(!should_retry(&not_found, &[502, 503]));
        assert!(!should_retry(&transport, &[502, 503]));

        assert!(should_retry(&not_found, &[]));
        assert!(should_retry(&transport, &[]));
        assert!(!should_retry(&ok, &[]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_exhausted() {
        let executor = Arc::new(ScriptedExecutor::new().script("flaky", vec![Step::Status(500)]));
        let retry = retry_executor(executor.clone());
        let test = test("flaky").with_retries(2);

        let result = retry
            .execute_with_retry(&CancellationToken::new(), &test)
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.status_code, Some(500));
        assert_eq!(result.attempts, 3);
        assert_eq!(result.failures.len(), 1);

        let calls = executor.calls("flaky");
        assert_eq!(calls.len(), 3);
        assert_eq!(gaps(&calls), vec![Duration::from_secs(1), Duration::from_secs(2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_on_status_then_success() {
        let executor = Arc::new(ScriptedExecutor::new().script(
            "recovering",
            vec![Step::Status(500), Step::Status(500), Step::Status(200)],
        ));
        let retry = retry_executor(executor.clone());
        let test = test("recovering")
            .with_retries(3)
            .with_retry_delay(Duration::from_millis(100))
            .retry_on([500, 502, 503]);

        let result = retry
            .execute_with_retry(&CancellationToken::new(), &test)
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.status_code, Some(200));
        assert_eq!(result.attempts, 3);

        let calls = executor.calls("recovering");
        assert_eq!(
            gaps(&calls),
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_linear_backoff() {
        let executor = Arc::new(ScriptedExecutor::new().script("linear", vec![Step::Status(503)]));
        let retry = retry_executor(executor.clone());
        let test = test("linear")
            .with_retries(3)
            .with_backoff(Backoff::Linear);

        retry
            .execute_with_retry(&CancellationToken::new(), &test)
            .await
            .unwrap();

        assert_eq!(
            gaps(&executor.calls("linear")),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(3)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_not_in_retry_list() {
        let executor = Arc::new(ScriptedExecutor::new().script("missing", vec![Step::Status(404)]));
        let retry = retry_executor(executor.clone());
        let test = test("missing").with_retries(3).retry_on([500]);

        let result = retry
            .execute_with_retry(&CancellationToken::new(), &test)
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.attempts, 1);
        assert_eq!(executor.calls("missing").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_is_retried() {
        let executor = Arc::new(ScriptedExecutor::new().script(
            "unreachable",
            vec![Step::Transport(ExecutionError::Connect("refused".into())), Step::Status(200)],
        ));
        let retry = retry_executor(executor.clone());
        let test = test("unreachable").with_retries(1);

        let result = retry
            .execute_with_retry(&CancellationToken::new(), &test)
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.error.is_none());
        assert_eq!(result.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_retries_single_attempt() {
        let executor = Arc::new(ScriptedExecutor::new().script("once", vec![Step::Status(500)]));
        let retry = retry_executor(executor.clone());

        let result = retry
            .execute_with_retry(&CancellationToken::new(), &test("once"))
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.attempts, 1);
        assert_eq!(executor.total_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_during_backoff() {
        let executor = Arc::new(ScriptedExecutor::new().script("slow", vec![Step::Status(500)]));
        let retry = retry_executor(executor.clone());
        let test = test("slow")
            .with_retries(5)
            .with_retry_delay(Duration::from_secs(10));
        let cancel = CancellationToken::new();

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                cancel.cancel();
            })
        };

        let result = retry.execute_with_retry(&cancel, &test).await.unwrap();
        canceller.await.unwrap();

        assert!(result.is_cancelled());
        assert!(!result.success);
        assert_eq!(result.status_code, Some(500));
        assert_eq!(executor.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_fatal_error_propagates() {
        let executor = Arc::new(ScriptedExecutor::new().script("broken", vec![Step::Fatal]));
        let retry = retry_executor(executor);

        let err = retry
            .execute_with_retry(&CancellationToken::new(), &test("broken").with_retries(3))
            .await
            .unwrap_err();

        assert!(matches!(err, RunError::MissingRequest(name) if name == "broken"));
    }
}
