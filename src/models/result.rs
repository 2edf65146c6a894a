//! Test result models
//!
//! Defines per-test results, response headers, and the suite summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use super::{AssertionFailure, PreparedRequest, Test};
use crate::error::ExecutionError;

/// Multi-valued response headers with case-insensitive names
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseHeaders(BTreeMap<String, Vec<String>>);

impl ResponseHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value, keeping earlier values for the same name
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        self.0
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.append(name, value);
        self
    }

    /// First value recorded for `name`
    pub fn first(&self, name: &str) -> Option<&str> {
        self.0
            .get(&name.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn get_all(&self, name: &str) -> &[String] {
        self.0
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }
}

/// Result of executing a single test, including every retry attempt
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestResult {
    pub test: Test,
    pub success: bool,
    /// `None` when no response was received
    pub status_code: Option<u16>,
    pub response_time: Duration,
    pub response_body: String,
    pub headers: ResponseHeaders,
    pub failures: Vec<AssertionFailure>,
    pub error: Option<ExecutionError>,
    pub prepared_request: Option<PreparedRequest>,
    /// Attempts made before this result was kept
    pub attempts: u32,
}

impl TestResult {
    /// Empty result for `test`, filled in by an executor
    pub fn new(test: Test) -> Self {
        Self {
            test,
            success: false,
            status_code: None,
            response_time: Duration::ZERO,
            response_body: String::new(),
            headers: ResponseHeaders::new(),
            failures: Vec::new(),
            error: None,
            prepared_request: None,
            attempts: 1,
        }
    }

    /// Result carrying a received response
    pub fn response(test: Test, status_code: u16, body: impl Into<String>) -> Self {
        let mut result = Self::new(test);
        result.status_code = Some(status_code);
        result.response_body = body.into();
        result.success = true;
        result
    }

    /// Result for a request that produced no response
    pub fn failed(test: Test, error: ExecutionError) -> Self {
        let mut result = Self::new(test);
        result.error = Some(error);
        result
    }

    pub fn with_headers(mut self, headers: ResponseHeaders) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_response_time(mut self, response_time: Duration) -> Self {
        self.response_time = response_time;
        self
    }

    pub fn name(&self) -> &str {
        &self.test.name
    }

    /// Recompute `success` from failures and error
    pub fn settle(&mut self) {
        self.success = self.failures.is_empty() && self.error.is_none();
    }

    /// Mark the result as interrupted by cancellation
    pub fn cancel(&mut self) {
        self.error = Some(ExecutionError::Cancelled);
        self.success = false;
    }

    pub fn is_cancelled(&self) -> bool {
        self.error.as_ref().is_some_and(ExecutionError::is_cancelled)
    }

    pub fn symbol(&self) -> &'static str {
        match (&self.error, self.success) {
            (_, true) => "✓",
            (Some(_), false) => "!",
            (None, false) => "✗",
        }
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}ms]",
            self.symbol(),
            self.test.name,
            self.response_time.as_millis()
        )?;
        if let Some(code) = self.status_code {
            write!(f, " {code}")?;
        }
        if let Some(err) = &self.error {
            write!(f, " - {err}")?;
        }
        for failure in &self.failures {
            write!(f, "\n    {}: {failure}", failure.kind)?;
        }
        Ok(())
    }
}

/// Summary of a suite run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuiteResult {
    pub results: Vec<TestResult>,
    pub total_tests: usize,
    pub passed_tests: usize,
    pub failed_tests: usize,
    pub total_time: Duration,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl SuiteResult {
    pub fn new(results: Vec<TestResult>, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        let total_tests = results.len();
        let passed_tests = results.iter().filter(|r| r.success).count();
        let failed_tests = total_tests - passed_tests;
        let total_time = (end_time - start_time).to_std().unwrap_or_default();

        Self {
            results,
            total_tests,
            passed_tests,
            failed_tests,
            total_time,
            start_time,
            end_time,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed_tests > 0
    }

    pub fn pass_rate(&self) -> f64 {
        if self.total_tests == 0 {
            0.0
        } else {
            (self.passed_tests as f64 / self.total_tests as f64) * 100.0
        }
    }

    pub fn is_all_passed(&self) -> bool {
        self.passed_tests == self.total_tests
    }

    pub fn find(&self, name: &str) -> Option<&TestResult> {
        self.results.iter().find(|r| r.test.name == name)
    }
}

impl fmt::Display for SuiteResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        for result in &self.results {
            writeln!(f, "  {result}")?;
        }
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(
            f,
            "Total: {} | Pass: {} | Fail: {}",
            self.total_tests, self.passed_tests, self.failed_tests
        )?;
        writeln!(
            f,
            "Pass Rate: {:.1}% | Duration: {}ms",
            self.pass_rate(),
            self.total_time.as_millis()
        )
    }
}
