//! Data models for HTTP test execution
//!
//! This module contains all data structures used throughout the engine.

mod assertion;
mod result;

pub use assertion::{Assertion, AssertionFailure, AssertionType};
pub use result::{ResponseHeaders, SuiteResult, TestResult};
pub use test::{Backoff, PreparedRequest, Test, TestSuite};
