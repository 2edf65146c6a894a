//! reqcheck
//!
//! Execution engine for declarative HTTP test suites. Tests run sequentially
//! or on a bounded worker pool, with per-test retries, fail-fast
//! cancellation and assertions over status, body, JSON paths, headers and
//! response time.
//!
//! ```no_run
//! use reqcheck::{Assertion, PreparedRequest, RunnerConfig, Test, TestRunner, TestSuite};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let suite = TestSuite::new(vec![
//!     Test::new("health", PreparedRequest::get("http://localhost:8080/health"))
//!         .assertion(Assertion::status("200"))
//!         .assertion(Assertion::json_path(".status == 'ok'"))
//!         .with_retries(2),
//! ]);
//!
//! let runner = TestRunner::from_config(&RunnerConfig::default())?;
//! let summary = runner.run_suite(&CancellationToken::new(), &suite).await?;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```

pub mod assertion;
pub mod config;
pub mod error;
pub mod executor;
pub mod http;
pub mod models;
pub mod utils;

pub use assertion::{AssertionEngine, Validator};
pub use config::{EnvConfig, RunnerConfig};
pub use error::{ExecutionError, RunError};
pub use executor::{
    HttpExecutor, ProgressCounter, ProgressObserver, RetryExecutor, TestRunner,
};
pub use http::HttpClient;
pub use models::{
    Assertion, AssertionFailure, AssertionType, Backoff, PreparedRequest, ResponseHeaders,
    SuiteResult, Test, TestResult, TestSuite,
};
