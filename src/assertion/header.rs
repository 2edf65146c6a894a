//! Response header assertions
//!
//! Expressions take the form `<name> <op> <value>`, e.g.
//! `Content-Type contains json` or `X-RateLimit-Remaining > 0`.

use std::fmt;

use super::operator::{unquote, CompareOp};
use super::Validator;
use crate::models::{Assertion, AssertionFailure, AssertionType, TestResult};

/// Header comparison operator
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum HeaderOp {
    Contains,
    Compare(CompareOp),
}

impl HeaderOp {
    /// Longest token first so ` >= ` is tried before ` > `.
    const MATCH_ORDER: [HeaderOp; 7] = [
        HeaderOp::Contains,
        HeaderOp::Compare(CompareOp::Eq),
        HeaderOp::Compare(CompareOp::Ne),
        HeaderOp::Compare(CompareOp::Ge),
        HeaderOp::Compare(CompareOp::Le),
        HeaderOp::Compare(CompareOp::Gt),
        HeaderOp::Compare(CompareOp::Lt),
    ];

    fn symbol(&self) -> &'static str {
        match self {
            HeaderOp::Contains => "contains",
            HeaderOp::Compare(op) => op.symbol(),
        }
    }

    fn evaluate(&self, actual: &str, expected: &str) -> bool {
        match self {
            HeaderOp::Contains => actual.contains(expected),
            HeaderOp::Compare(op) if op.is_equality() => op.compare(actual, expected),
            HeaderOp::Compare(op) => match (actual.parse::<f64>(), expected.parse::<f64>()) {
                (Ok(a), Ok(e)) => op.compare(&a, &e),
                _ => op.compare(actual, expected),
            },
        }
    }
}

impl fmt::Display for HeaderOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Validates response header assertions
#[derive(Debug, Default)]
pub struct HeaderValidator;

impl Validator for HeaderValidator {
    fn validate(&self, result: &TestResult, assertion: &Assertion) -> Option<AssertionFailure> {
        let expr = assertion.value.trim();

        let Some((name, op, expected)) = parse_expression(expr) else {
            return Some(AssertionFailure::message(
                AssertionType::Header,
                format!("invalid expression: no valid operator found in expression: {expr}"),
            ));
        };

        let Some(actual) = result.headers.first(name) else {
            return Some(AssertionFailure::new(
                AssertionType::Header,
                format!("header {name:?} to exist"),
                "header not found",
                format!("header {name:?} not found in response"),
            ));
        };

        if op.evaluate(actual, expected) {
            return None;
        }

        Some(AssertionFailure::new(
            AssertionType::Header,
            format!("{name} {op} {expected}"),
            format!("{name} = {actual}"),
            format!("{name} {op} {expected} failed: got {actual}"),
        ))
    }
}

fn parse_expression(expr: &str) -> Option<(&str, HeaderOp, &str)> {
    HeaderOp::MATCH_ORDER.into_iter().find_map(|op| {
        let token = format!(" {} ", op.symbol());
        expr.find(&token).map(|idx| {
            let name = expr[..idx].trim();
            let value = unquote(expr[idx + token.len()..].trim());
            (name, op, value)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PreparedRequest, ResponseHeaders, Test};

    fn check(headers: ResponseHeaders, expr: &str) -> Option<AssertionFailure> {
        let test = Test::new("header", PreparedRequest::get("http://localhost/"));
        let result = TestResult::response(test, 200, "").with_headers(headers);
        HeaderValidator.validate(&result, &Assertion::header(expr))
    }

    fn json_headers() -> ResponseHeaders {
        ResponseHeaders::new().with("Content-Type", "application/json")
    }

    #[test]
    fn test_exact_match() {
        assert!(check(json_headers(), "Content-Type == 'application/json'").is_none());
        assert!(check(json_headers(), "content-type == \"application/json\"").is_none());
        assert!(check(json_headers(), "Content-Type != 'text/html'").is_none());
    }

    #[test]
    fn test_contains() {
        let headers = ResponseHeaders::new().with("Content-Type", "application/json; charset=utf-8");
        assert!(check(headers.clone(), "Content-Type contains json").is_none());
        assert!(check(headers, "Content-Type contains xml").is_some());
    }

    #[test]
    fn test_numeric_comparison() {
        let headers = ResponseHeaders::new().with("X-RateLimit-Remaining", "95");
        assert!(check(headers.clone(), "X-RateLimit-Remaining > 9").is_none());
        assert!(check(headers.clone(), "X-RateLimit-Remaining >= 95").is_none());
        assert!(check(headers.clone(), "X-RateLimit-Remaining <= 94.5").is_some());
        assert!(check(headers, "X-RateLimit-Remaining < 100").is_none());
    }

    #[test]
    fn test_string_fallback_comparison() {
        // Non-numeric values compare lexically
        let headers = ResponseHeaders::new().with("X-Version", "v2");
        assert!(check(headers.clone(), "X-Version > v1").is_none());
        assert!(check(headers, "X-Version < v10").is_some());
    }

    #[test]
    fn test_header_not_found() {
        let failure = check(json_headers(), "X-Foo == 'bar'").unwrap();
        assert_eq!(failure.actual, "header not found");
        assert_eq!(failure.message, "header \"X-Foo\" not found in response");

        let failure = check(json_headers(), "X-Foo != 'bar'").unwrap();
        assert_eq!(failure.actual, "header not found");
    }

    #[test]
    fn test_first_value_wins() {
        let headers = ResponseHeaders::new()
            .with("Set-Cookie", "session=abc")
            .with("Set-Cookie", "theme=dark");
        assert!(check(headers.clone(), "Set-Cookie contains session").is_none());
        assert!(check(headers, "Set-Cookie contains theme").is_some());
    }

    #[test]
    fn test_mismatch_details() {
        let failure = check(json_headers(), "Content-Type == 'text/html'").unwrap();
        assert_eq!(failure.expected, "Content-Type == text/html");
        assert_eq!(failure.actual, "Content-Type = application/json");
    }

    #[test]
    fn test_invalid_expression() {
        let failure = check(json_headers(), "Content-Type").unwrap();
        assert!(failure.message.starts_with("invalid expression"));
    }
}
