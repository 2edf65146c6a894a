//! Status code assertions
//!
//! Accepts a bare code (`200`) or a comparison expression such as
//! `>= 200 && < 300`, `== 200 || == 204` or `status != 500`.

use super::operator::CompareOp;
use super::Validator;
use crate::models::{Assertion, AssertionFailure, AssertionType, TestResult};

/// Tokens that mark a status value as an expression
const EXPRESSION_TOKENS: [&str; 8] = [">=", "<=", "!=", "==", ">", "<", "&&", "||"];

/// Validates HTTP status code assertions
#[derive(Debug, Default)]
pub struct StatusValidator;

impl Validator for StatusValidator {
    fn validate(&self, result: &TestResult, assertion: &Assertion) -> Option<AssertionFailure> {
        let expected = assertion.value.trim();
        let actual = i64::from(result.status_code.unwrap_or(0));

        if let Ok(code) = expected.parse::<i64>() {
            if actual == code {
                return None;
            }
            return Some(AssertionFailure::new(
                AssertionType::Status,
                expected,
                actual.to_string(),
                format!("expected status {expected}, got {actual}"),
            ));
        }

        if is_expression(expected) {
            match evaluate_expression(expected, actual) {
                Some(true) => return None,
                Some(false) => {
                    return Some(AssertionFailure::new(
                        AssertionType::Status,
                        expected,
                        actual.to_string(),
                        format!("status {actual} does not satisfy expression: {expected}"),
                    ))
                }
                None => {}
            }
        }

        Some(AssertionFailure::message(
            AssertionType::Status,
            format!("invalid status assertion format: {expected}"),
        ))
    }
}

fn is_expression(s: &str) -> bool {
    EXPRESSION_TOKENS.iter().any(|token| s.contains(token))
}

/// Connective joining the parts of a compound expression
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Connective {
    And,
    Or,
}

impl Connective {
    fn token(&self) -> &'static str {
        match self {
            Connective::And => "&&",
            Connective::Or => "||",
        }
    }

    /// The connective appearing first in `expr`, if any.
    fn first_in(expr: &str) -> Option<Self> {
        match (expr.find("&&"), expr.find("||")) {
            (Some(and), Some(or)) if or < and => Some(Connective::Or),
            (Some(_), _) => Some(Connective::And),
            (None, Some(_)) => Some(Connective::Or),
            (None, None) => None,
        }
    }
}

/// Evaluate a status expression against `actual`.
///
/// Returns `None` when any part is not a recognised comparison. Expressions
/// are split on the first connective only, so mixing `&&` and `||` leaves an
/// unparsable part.
pub(crate) fn evaluate_expression(expr: &str, actual: i64) -> Option<bool> {
    let expr = if expr.contains("status") {
        expr.replace("status", &actual.to_string())
    } else {
        expr.to_string()
    };

    let Some(connective) = Connective::first_in(&expr) else {
        return evaluate_single(&expr, actual);
    };

    let outcomes = expr
        .split(connective.token())
        .map(|part| evaluate_single(part, actual))
        .collect::<Option<Vec<bool>>>()?;

    Some(match connective {
        Connective::And => outcomes.iter().all(|ok| *ok),
        Connective::Or => outcomes.iter().any(|ok| *ok),
    })
}

/// Evaluate `<op> N` (actual on the left) or `N <op> N`.
fn evaluate_single(expr: &str, actual: i64) -> Option<bool> {
    let expr = expr.trim();

    if let Some((op, rest)) = CompareOp::strip_prefix(expr) {
        let right = parse_number(rest)?;
        return Some(op.compare(&actual, &right));
    }

    let split = expr
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(expr.len());
    let (left, rest) = expr.split_at(split);
    if left.is_empty() {
        return None;
    }
    let left = left.parse::<i64>().ok()?;
    let (op, rest) = CompareOp::strip_prefix(rest.trim_start())?;
    let right = parse_number(rest)?;
    Some(op.compare(&left, &right))
}

fn parse_number(s: &str) -> Option<i64> {
    let s = s.trim();
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PreparedRequest, Test};

    fn check(expected: &str, code: u16) -> Option<AssertionFailure> {
        let test = Test::new("status", PreparedRequest::get("http://localhost/"));
        let result = TestResult::response(test, code, "");
        StatusValidator.validate(&result, &Assertion::status(expected))
    }

    #[test]
    fn test_exact_match() {
        assert!(check("200", 200).is_none());
        assert!(check(" 200 ", 200).is_none());

        let failure = check("200", 404).unwrap();
        assert_eq!(failure.expected, "200");
        assert_eq!(failure.actual, "404");
        assert_eq!(failure.message, "expected status 200, got 404");
    }

    #[test]
    fn test_range_expressions() {
        let cases = [
            (">= 200", 201, true),
            (">= 200", 199, false),
            ("< 300", 201, true),
            ("< 300", 300, false),
            ("!= 500", 200, true),
            ("==404", 404, true),
            (">= 200 && < 300", 201, true),
            (">= 200 && < 300", 404, false),
            ("== 200 || == 204", 204, true),
            ("== 200 || == 204", 500, false),
        ];

        for (expr, code, pass) in cases {
            assert_eq!(check(expr, code).is_none(), pass, "{expr} against {code}");
        }
    }

    #[test]
    fn test_range_failure_message() {
        let failure = check(">= 200 && < 300", 404).unwrap();
        assert!(failure.message.contains("does not satisfy expression"));
        assert_eq!(failure.actual, "404");
    }

    #[test]
    fn test_status_keyword() {
        assert!(check("status >= 200 && status < 300", 250).is_none());
        assert!(check("status == 201", 200).is_some());
        assert!(check("200 <= status", 200).is_none());
    }

    #[test]
    fn test_explicit_operands() {
        assert_eq!(evaluate_expression("200 >= 200", 0), Some(true));
        assert_eq!(evaluate_expression("404 != 200", 0), Some(true));
        assert_eq!(evaluate_expression("301 < 300", 0), Some(false));
    }

    #[test]
    fn test_invalid_format() {
        let failure = check("ok", 200).unwrap();
        assert_eq!(failure.message, "invalid status assertion format: ok");

        let failure = check(">= abc", 200).unwrap();
        assert!(failure.message.starts_with("invalid status assertion format"));
    }

    #[test]
    fn test_first_connective_wins() {
        // Split on `&&` leaves `< 300 || == 404` as a single unparsable part
        assert_eq!(evaluate_expression(">= 200 && < 300 || == 404", 404), None);
        assert_eq!(Connective::first_in("== 1 || == 2 && == 3"), Some(Connective::Or));
    }

    #[test]
    fn test_missing_status_code() {
        let test = Test::new("down", PreparedRequest::get("http://localhost/"));
        let result = TestResult::new(test);
        let failure = StatusValidator
            .validate(&result, &Assertion::status("200"))
            .unwrap();
        assert_eq!(failure.actual, "0");
    }
}
