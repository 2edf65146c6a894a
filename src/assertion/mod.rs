//! Assertion engine
//!
//! Dispatches each assertion of a test to the validator registered for its
//! type and collects every failure. Validators are pure: the same result and
//! assertions always produce the same failures.

mod body;
mod header;
mod json_path;
mod operator;
mod status;
mod timing;

use std::collections::HashMap;

use crate::models::{Assertion, AssertionFailure, AssertionType, TestResult};

pub use body::{BodyContainsValidator, BodyValidator};
pub use header::HeaderValidator;
pub use json_path::JsonPathValidator;
pub use operator::CompareOp;
pub use status::StatusValidator;
pub use timing::{parse_duration, ResponseTimeValidator};

/// Evaluates one assertion against a response
pub trait Validator: Send + Sync {
    /// Returns `None` when the assertion holds.
    fn validate(&self, result: &TestResult, assertion: &Assertion) -> Option<AssertionFailure>;
}

/// Registry of validators keyed by assertion type
pub struct AssertionEngine {
    validators: HashMap<AssertionType, Box<dyn Validator>>,
}

impl AssertionEngine {
    /// Engine with a validator for every assertion type
    pub fn new() -> Self {
        Self::empty()
            .register(AssertionType::Status, StatusValidator)
            .register(AssertionType::Body, BodyValidator)
            .register(AssertionType::BodyContains, BodyContainsValidator)
            .register(AssertionType::JsonPath, JsonPathValidator)
            .register(AssertionType::Header, HeaderValidator)
            .register(AssertionType::ResponseTime, ResponseTimeValidator)
    }

    /// Engine without validators
    pub fn empty() -> Self {
        Self {
            validators: HashMap::new(),
        }
    }

    /// Register or replace the validator for `kind`
    pub fn register(mut self, kind: AssertionType, validator: impl Validator + 'static) -> Self {
        self.validators.insert(kind, Box::new(validator));
        self
    }

    pub fn supports(&self, kind: AssertionType) -> bool {
        self.validators.contains_key(&kind)
    }

    /// Check every assertion in order, without stopping at the first failure.
    pub fn validate(&self, result: &TestResult, assertions: &[Assertion]) -> Vec<AssertionFailure> {
        assertions
            .iter()
            .filter_map(|assertion| match self.validators.get(&assertion.kind) {
                Some(validator) => validator.validate(result, assertion),
                None => Some(AssertionFailure::message(
                    assertion.kind,
                    format!("unsupported assertion type: {}", assertion.kind),
                )),
            })
            .collect()
    }
}

impl Default for AssertionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AssertionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.validators.keys().map(AssertionType::name).collect();
        kinds.sort_unstable();
        f.debug_struct("AssertionEngine")
            .field("validators", &kinds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PreparedRequest, ResponseHeaders, Test};
    use std::time::Duration;

    fn result() -> TestResult {
        let test = Test::new("engine", PreparedRequest::get("http://localhost/users/1"));
        TestResult::response(test, 200, r#"{"id": 1, "name": "Alice", "active": true}"#)
            .with_headers(ResponseHeaders::new().with("Content-Type", "application/json"))
            .with_response_time(Duration::from_millis(120))
    }

    #[test]
    fn test_all_passing() {
        let assertions = vec![
            Assertion::status("200"),
            Assertion::body_contains("Alice"),
            Assertion::json_path(".id == 1"),
            Assertion::json_path(".active == true"),
            Assertion::header("Content-Type contains json"),
            Assertion::response_time("< 1s"),
        ];

        let failures = AssertionEngine::new().validate(&result(), &assertions);
        assert!(failures.is_empty(), "unexpected failures: {failures:?}");
    }

    #[test]
    fn test_collects_all_failures_in_order() {
        let assertions = vec![
            Assertion::status("201"),
            Assertion::body_contains("Alice"),
            Assertion::json_path(".name == 'Bob'"),
            Assertion::header("X-Foo == 'bar'"),
        ];

        let failures = AssertionEngine::new().validate(&result(), &assertions);
        let kinds: Vec<_> = failures.iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![
                AssertionType::Status,
                AssertionType::JsonPath,
                AssertionType::Header
            ]
        );
    }

    #[test]
    fn test_unsupported_type() {
        let engine = AssertionEngine::empty().register(AssertionType::Status, StatusValidator);
        assert!(engine.supports(AssertionType::Status));
        assert!(!engine.supports(AssertionType::Header));

        let failures = engine.validate(
            &result(),
            &[Assertion::status("200"), Assertion::header("X-Foo == 'bar'")],
        );
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].message, "unsupported assertion type: header");
    }

    #[test]
    fn test_validate_is_repeatable() {
        let engine = AssertionEngine::new();
        let assertions = vec![
            Assertion::status(">= 300"),
            Assertion::body("nope"),
            Assertion::response_time("< 1ms"),
        ];
        let result = result();

        let first = engine.validate(&result, &assertions);
        let second = engine.validate(&result, &assertions);
        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
    }

    #[test]
    fn test_no_assertions() {
        assert!(AssertionEngine::new().validate(&result(), &[]).is_empty());
    }
}
