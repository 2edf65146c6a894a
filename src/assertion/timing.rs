//! Response time assertions
//!
//! Expressions are an operator followed by a duration, e.g. `< 500ms`,
//! `<=2s` or `> 0.5s`. Supported units are `ms`, `s`, `m` and `h`.

use std::time::Duration;

use super::operator::CompareOp;
use super::Validator;
use crate::models::{Assertion, AssertionFailure, AssertionType, TestResult};

/// Validates response time assertions
#[derive(Debug, Default)]
pub struct ResponseTimeValidator;

impl Validator for ResponseTimeValidator {
    fn validate(&self, result: &TestResult, assertion: &Assertion) -> Option<AssertionFailure> {
        let expr = assertion.value.trim();

        let Some((op, rest)) = CompareOp::strip_prefix(expr) else {
            return Some(AssertionFailure::message(
                AssertionType::ResponseTime,
                format!("invalid expression: no valid operator found in expression: {expr}"),
            ));
        };

        let literal = rest.trim();
        let limit = match parse_duration(literal) {
            Ok(limit) => limit,
            Err(reason) => {
                return Some(AssertionFailure::message(
                    AssertionType::ResponseTime,
                    format!("invalid duration {literal:?}: {reason}"),
                ))
            }
        };

        let actual = result.response_time;
        if op.compare(&actual, &limit) {
            return None;
        }

        Some(AssertionFailure::new(
            AssertionType::ResponseTime,
            format!("{op} {limit:?}"),
            format!("{actual:?}"),
            format!("response time {actual:?} does not satisfy {op} {limit:?}"),
        ))
    }
}

/// Parse `<number><unit>` where number may have a fractional part.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .ok_or_else(|| format!("missing time unit: {s}"))?;
    let (number, unit) = s.split_at(split);

    if !is_decimal(number) {
        return Err(format!("invalid duration format: {s}"));
    }
    let value: f64 = number
        .parse()
        .map_err(|_| format!("invalid duration format: {s}"))?;

    let seconds = match unit {
        "ms" => value / 1000.0,
        "s" => value,
        "m" => value * 60.0,
        "h" => value * 3600.0,
        other => return Err(format!("unknown time unit: {other}")),
    };

    Duration::try_from_secs_f64(seconds).map_err(|e| e.to_string())
}

/// Digits with at most one interior decimal point
fn is_decimal(s: &str) -> bool {
    let mut parts = s.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let fraction = parts.next();

    let digits = |p: &str| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit());
    digits(whole) && fraction.map_or(true, digits)
}
