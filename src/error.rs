//! Error types
//!
//! `RunError` aborts a whole run. `ExecutionError` is recorded on a single
//! test result and never stops the scheduler.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal errors returned from the runner and the executor
#[derive(Error, Debug)]
pub enum RunError {
    #[error("no request specification found for test '{0}'")]
    MissingRequest(String),

    #[error("invalid HTTP method '{method}' in test '{test}'")]
    InvalidMethod { test: String, method: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("worker task failed: {0}")]
    Worker(String),
}

/// Transport failures captured inside a test result
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ExecutionError {
    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("execution cancelled")]
    Cancelled,
}

impl ExecutionError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExecutionError::Cancelled)
    }
}
