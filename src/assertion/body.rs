//! Response body assertions

use super::Validator;
use crate::models::{Assertion, AssertionFailure, AssertionType, TestResult};

/// Bodies longer than this are cut in failure output
const MAX_ACTUAL_LEN: usize = 100;

/// Exact body match
#[derive(Debug, Default)]
pub struct BodyValidator;

impl Validator for BodyValidator {
    fn validate(&self, result: &TestResult, assertion: &Assertion) -> Option<AssertionFailure> {
        let expected = &assertion.value;
        let actual = &result.response_body;

        if actual == expected {
            return None;
        }

        Some(AssertionFailure::new(
            AssertionType::Body,
            expected.as_str(),
            truncate(actual, MAX_ACTUAL_LEN),
            "body mismatch: expected exact match",
        ))
    }
}

/// Substring match against the body
#[derive(Debug, Default)]
pub struct BodyContainsValidator;

impl Validator for BodyContainsValidator {
    fn validate(&self, result: &TestResult, assertion: &Assertion) -> Option<AssertionFailure> {
        let substring = &assertion.value;
        let actual = &result.response_body;

        if actual.contains(substring.as_str()) {
            return None;
        }

        Some(AssertionFailure::new(
            AssertionType::BodyContains,
            format!("body to contain: {substring:?}"),
            truncate(actual, MAX_ACTUAL_LEN),
            format!("body does not contain {substring:?}"),
        ))
    }
}

/// Limit `s` to `max_chars` characters, marking the cut with `...`
pub(crate) fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
