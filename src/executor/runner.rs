//! Test suite runner
//!
//! Runs a suite either sequentially, preserving test order, or through the
//! parallel worker pool in `parallel.rs`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{HttpExecutor, ProgressObserver, RetryExecutor};
use crate::assertion::AssertionEngine;
use crate::config::{RunnerConfig, DEFAULT_CONCURRENCY};
use crate::error::RunError;
use crate::http::HttpClient;
use crate::models::{SuiteResult, TestSuite};
use crate::utils::Timer;

/// Default wait for in-flight results after cancellation
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Test runner for HTTP test suites
pub struct TestRunner {
    pub(super) retry: Arc<RetryExecutor>,
    pub(super) progress: Option<Arc<dyn ProgressObserver>>,
    pub(super) parallel: bool,
    pub(super) concurrency: usize,
    pub(super) fail_fast: bool,
    pub(super) drain_timeout: Duration,
}

impl TestRunner {
    /// Create a runner over `executor` with every built-in validator
    pub fn new(executor: Arc<dyn HttpExecutor>) -> Self {
        Self {
            retry: Arc::new(RetryExecutor::new(
                executor,
                Arc::new(AssertionEngine::new()),
            )),
            progress: None,
            parallel: false,
            concurrency: DEFAULT_CONCURRENCY,
            fail_fast: false,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    /// Create a runner backed by a reqwest client built from `config`
    pub fn from_config(config: &RunnerConfig) -> Result<Self, RunError> {
        let client = HttpClient::from_config(config)?;
        Ok(Self::new(Arc::new(client))
            .with_parallel(config.parallel)
            .with_concurrency(config.effective_concurrency())
            .with_fail_fast(config.fail_fast)
            .with_drain_timeout(config.drain_timeout()))
    }

    pub fn with_engine(mut self, engine: AssertionEngine) -> Self {
        self.retry = Arc::new(self.retry.with_engine(Arc::new(engine)));
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressObserver>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Worker count for parallel runs; zero falls back to the default
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = if concurrency == 0 {
            DEFAULT_CONCURRENCY
        } else {
            concurrency
        };
        self
    }

    /// Stop scheduling new tests after the first failure
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// Run the suite in the configured mode
    pub async fn run_suite(
        &self,
        cancel: &CancellationToken,
        suite: &TestSuite,
    ) -> Result<SuiteResult, RunError> {
        if self.parallel {
            self.run_parallel(cancel, suite).await
        } else {
            self.run(cancel, suite).await
        }
    }

    /// Run every test in order, one at a time.
    ///
    /// Stops before the next test once `cancel` fires and returns the
    /// results collected so far.
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        suite: &TestSuite,
    ) -> Result<SuiteResult, RunError> {
        info!(
            "Running {} tests sequentially{}",
            suite.len(),
            suite_label(suite)
        );

        let start_time = Utc::now();
        let timer = Timer::start("sequential run");
        let mut results = Vec::with_capacity(suite.len());

        for test in &suite.tests {
            if cancel.is_cancelled() {
                warn!(
                    "Run cancelled after {}/{} tests",
                    results.len(),
                    suite.len()
                );
                break;
            }

            debug!("Running {}", test);
            let result = self.retry.execute_with_retry(cancel, test).await?;
            info!("  {}", result);

            let failed = !result.success;
            results.push(result);
            if let Some(progress) = &self.progress {
                progress.increment();
            }

            if failed && self.fail_fast {
                info!("Fail-fast: stopping after failure in {}", test.name);
                break;
            }
        }

        timer.stop();
        let summary = SuiteResult::new(results, start_time, Utc::now());
        log_summary(&summary);
        Ok(summary)
    }
}

pub(super) fn suite_label(suite: &TestSuite) -> String {
    suite
        .name
        .as_deref()
        .map(|name| format!(" for {name}"))
        .unwrap_or_default()
}

pub(super) fn log_summary(summary: &SuiteResult) {
    info!(
        "Suite completed in {}ms - Pass: {}/{} ({:.1}%)",
        summary.total_time.as_millis(),
        summary.passed_tests,
        summary.total_tests,
        summary.pass_rate()
    );
}
