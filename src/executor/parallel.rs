//! Parallel test execution
//!
//! A fixed pool of workers pulls tests from a shared queue. Results arrive
//! in completion order. With fail-fast enabled the first failed result
//! cancels the run: queued tests are never started, in-flight tests see the
//! cancellation, and the collector keeps whatever arrives within the drain
//! timeout.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::runner::{log_summary, suite_label};
use super::{ProgressObserver, RetryExecutor, TestRunner};
use crate::error::RunError;
use crate::models::{SuiteResult, Test, TestResult, TestSuite};
use crate::utils::Timer;

type Outcome = Result<TestResult, RunError>;

/// State shared by every worker of one run
struct WorkerContext {
    jobs: Mutex<mpsc::Receiver<Test>>,
    results: mpsc::Sender<Outcome>,
    retry: Arc<RetryExecutor>,
    progress: Option<Arc<dyn ProgressObserver>>,
    cancel: CancellationToken,
    fail_fast: bool,
}

impl TestRunner {
    /// Run the suite on a pool of `concurrency` workers.
    ///
    /// The returned results are in completion order and may be partial when
    /// the run was cancelled or stopped by fail-fast. A fatal error from any
    /// worker cancels the run and is returned instead of a summary.
    pub async fn run_parallel(
        &self,
        cancel: &CancellationToken,
        suite: &TestSuite,
    ) -> Result<SuiteResult, RunError> {
        let start_time = Utc::now();
        let total = suite.len();
        if total == 0 {
            return Ok(SuiteResult::new(Vec::new(), start_time, Utc::now()));
        }

        let workers = self.concurrency.max(1).min(total);
        let buffer = total.min(self.concurrency.max(1) * 2);
        info!(
            "Running {} tests in parallel (max {} concurrent){}",
            total,
            workers,
            suite_label(suite)
        );

        let timer = Timer::start("parallel run");
        let run_cancel = cancel.child_token();
        let (job_tx, job_rx) = mpsc::channel::<Test>(buffer);
        let (result_tx, mut result_rx) = mpsc::channel::<Outcome>(buffer);

        let context = Arc::new(WorkerContext {
            jobs: Mutex::new(job_rx),
            results: result_tx,
            retry: self.retry.clone(),
            progress: self.progress.clone(),
            cancel: run_cancel.clone(),
            fail_fast: self.fail_fast,
        });

        let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(workers + 1);
        handles.push(tokio::spawn(feed(
            suite.tests.clone(),
            job_tx,
            run_cancel.clone(),
        )));
        for id in 0..workers {
            handles.push(tokio::spawn(worker(id, context.clone())));
        }
        // Workers own the only senders now, so the channel closes when they exit.
        drop(context);

        let mut results = Vec::with_capacity(total);
        let mut fatal: Option<RunError> = None;
        let mut drain_deadline: Option<Instant> = None;

        loop {
            let outcome = match drain_deadline {
                None => tokio::select! {
                    outcome = result_rx.recv() => outcome,
                    _ = run_cancel.cancelled() => {
                        drain_deadline = Some(Instant::now() + self.drain_timeout);
                        continue;
                    }
                },
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, result_rx.recv()).await {
                        Ok(outcome) => outcome,
                        Err(_) => {
                            warn!(
                                "Drain timeout reached, dropping in-flight tests ({} of {} collected)",
                                results.len(),
                                total
                            );
                            break;
                        }
                    }
                }
            };

            match outcome {
                Some(Ok(result)) => results.push(result),
                Some(Err(err)) => {
                    warn!("Aborting run: {}", err);
                    run_cancel.cancel();
                    fatal.get_or_insert(err);
                }
                None => break,
            }
        }

        for handle in &handles {
            handle.abort();
        }
        for joined in join_all(handles).await {
            if let Err(err) = joined {
                if err.is_panic() {
                    fatal.get_or_insert(RunError::Worker(err.to_string()));
                }
            }
        }
        timer.stop();

        if let Some(err) = fatal {
            return Err(err);
        }

        let summary = SuiteResult::new(results, start_time, Utc::now());
        log_summary(&summary);
        Ok(summary)
    }
}

/// Enqueue tests until the queue is full of work or the run is cancelled
async fn feed(tests: Vec<Test>, jobs: mpsc::Sender<Test>, cancel: CancellationToken) {
    for test in tests {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sent = jobs.send(test) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }
}

async fn worker(id: usize, ctx: Arc<WorkerContext>) {
    loop {
        let next = {
            let mut jobs = ctx.jobs.lock().await;
            tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => None,
                test = jobs.recv() => test,
            }
        };
        let Some(test) = next else {
            break;
        };

        debug!("Worker {} picked up {}", id, test.name);
        let outcome = ctx.retry.execute_with_retry(&ctx.cancel, &test).await;

        let failed = match &outcome {
            Ok(result) => {
                debug!("  {}", result);
                !result.success
            }
            Err(_) => true,
        };
        let completed = outcome.is_ok();

        if ctx.results.send(outcome).await.is_err() {
            break;
        }
        if completed {
            if let Some(progress) = &ctx.progress {
                progress.increment();
            }
        }

        if failed && ctx.fail_fast && !ctx.cancel.is_cancelled() {
            info!("Fail-fast: {} failed, cancelling remaining tests", test.name);
            ctx.cancel.cancel();
        }
    }
    debug!("Worker {} finished", id);
}
