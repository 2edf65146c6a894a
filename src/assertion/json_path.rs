//! JSON path assertions
//!
//! Expressions take the form `<path> <op> <value>`, e.g. `.data.id == 123`,
//! `.users[0].name == 'Alice'` or `.items.# > 0`. Paths use `.` separated
//! keys, `[n]` or bare numeric segments for array indices and `#` for the
//! length of an array. A `#` followed by more segments projects them over
//! the array, so `.users.#.age` yields the ages of all users.

use serde_json::Value;

use super::operator::{unquote, CompareOp};
use super::Validator;
use crate::models::{Assertion, AssertionFailure, AssertionType, TestResult};

/// Operators in match order; each must be surrounded by spaces
const OPERATORS: [CompareOp; 6] = [
    CompareOp::Eq,
    CompareOp::Ne,
    CompareOp::Ge,
    CompareOp::Le,
    CompareOp::Gt,
    CompareOp::Lt,
];

/// Validates JSON path assertions against the response body
#[derive(Debug, Default)]
pub struct JsonPathValidator;

impl Validator for JsonPathValidator {
    fn validate(&self, result: &TestResult, assertion: &Assertion) -> Option<AssertionFailure> {
        let expr = assertion.value.trim();

        let Some((path, op, expected)) = parse_expression(expr) else {
            return Some(AssertionFailure::message(
                AssertionType::JsonPath,
                format!("invalid expression: no valid operator found in expression: {expr}"),
            ));
        };

        let path = path.strip_prefix('.').unwrap_or(path);

        let Some(actual) = lookup_body(&result.response_body, path) else {
            return Some(AssertionFailure::new(
                AssertionType::JsonPath,
                format!("path {path:?} to exist"),
                "path does not exist",
                format!("JSON path {path:?} not found"),
            ));
        };

        if evaluate(&actual, op, expected) {
            return None;
        }

        let shown = display_value(&actual);
        Some(AssertionFailure::new(
            AssertionType::JsonPath,
            format!("{path} {op} {expected}"),
            format!("{path} = {shown}"),
            format!("{path} {op} {expected} failed: got {shown}"),
        ))
    }
}

/// Split an expression into path, operator and expected value.
fn parse_expression(expr: &str) -> Option<(&str, CompareOp, &str)> {
    OPERATORS.into_iter().find_map(|op| {
        let token = format!(" {} ", op.symbol());
        expr.find(&token).map(|idx| {
            let path = expr[..idx].trim();
            let value = expr[idx + token.len()..].trim();
            (path, op, value)
        })
    })
}

fn lookup_body(body: &str, path: &str) -> Option<Value> {
    let json: Value = serde_json::from_str(body).ok()?;
    lookup(&json, path)
}

/// Resolve `path` inside `json`. `None` means the path does not exist.
pub(crate) fn lookup(json: &Value, path: &str) -> Option<Value> {
    resolve(json, &split_segments(path))
}

fn resolve(json: &Value, segments: &[String]) -> Option<Value> {
    let mut current = json;

    for (pos, segment) in segments.iter().enumerate() {
        if segment == "#" {
            let items = current.as_array()?;
            let rest = &segments[pos + 1..];
            if rest.is_empty() {
                return Some(Value::from(items.len()));
            }
            // `items.#.field` collects `field` from every element that has it.
            let values: Vec<Value> = items.iter().filter_map(|item| resolve(item, rest)).collect();
            return if values.is_empty() {
                None
            } else {
                Some(Value::Array(values))
            };
        }

        let (key, indices) = parse_segment(segment)?;
        if !key.is_empty() {
            current = match current {
                Value::Object(map) => map.get(key)?,
                Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        for index in indices {
            current = current.as_array()?.get(index)?;
        }
    }

    Some(current.clone())
}

/// Split on `.` outside of brackets.
fn split_segments(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_bracket = false;

    for ch in path.chars() {
        match ch {
            '.' if !in_bracket => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            }
            '[' => {
                in_bracket = true;
                current.push(ch);
            }
            ']' => {
                in_bracket = false;
                current.push(ch);
            }
            _ => current.push(ch),
        }
    }

    if !current.is_empty() {
        segments.push(current);
    }

    segments
}

/// Parse `name[0][1]` into the key and its trailing indices.
fn parse_segment(segment: &str) -> Option<(&str, Vec<usize>)> {
    let Some(open) = segment.find('[') else {
        return Some((segment, Vec::new()));
    };

    let key = &segment[..open];
    let mut indices = Vec::new();
    let mut rest = &segment[open..];

    while !rest.is_empty() {
        let inner = rest.strip_prefix('[')?;
        let close = inner.find(']')?;
        indices.push(inner[..close].trim().parse::<usize>().ok()?);
        rest = &inner[close + 1..];
    }

    Some((key, indices))
}

fn evaluate(actual: &Value, op: CompareOp, expected: &str) -> bool {
    match actual {
        Value::String(s) => op.compare(s.as_str(), unquote(expected)),
        Value::Number(n) => match (n.as_f64(), expected.parse::<f64>()) {
            (Some(actual), Ok(expected)) => op.compare(&actual, &expected),
            _ => false,
        },
        Value::Bool(b) => {
            if !op.is_equality() {
                return false;
            }
            let expected = expected.trim().eq_ignore_ascii_case("true");
            op.compare(b, &expected)
        }
        Value::Null => {
            let is_null = expected.trim().eq_ignore_ascii_case("null");
            match op {
                CompareOp::Eq => is_null,
                CompareOp::Ne => !is_null,
                _ => false,
            }
        }
        Value::Array(_) | Value::Object(_) => {
            op.compare(actual.to_string().as_str(), unquote(expected))
        }
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PreparedRequest, Test};

    const BODY: &str = r#"{
        "url": "https://example.com/get",
        "headers": { "Host": "example.com" },
        "data": { "id": 123, "name": "test", "score": 4.5 },
        "active": true,
        "users": [ { "name": "Alice", "age": 30 }, { "name": "Bob", "age": 17 } ],
        "value": null
    }"#;

    fn check(body: &str, expr: &str) -> Option<AssertionFailure> {
        let test = Test::new("json", PreparedRequest::get("http://localhost/"));
        let result = TestResult::response(test, 200, body);
        JsonPathValidator.validate(&result, &Assertion::json_path(expr))
    }

    #[test]
    fn test_simple_paths() {
        let passing = [
            ".url == 'https://example.com/get'",
            ".headers != null",
            ".data.id == 123",
            ".data.name == 'test'",
            ".data.name == \"test\"",
            ".data.score >= 4.5",
            ".active == true",
            ".active != FALSE",
            ".users[0].name == 'Alice'",
            ".users.1.age < 18",
            ".users.# == 2",
        ];
        for expr in passing {
            assert!(check(BODY, expr).is_none(), "expected {expr} to pass");
        }
    }

    #[test]
    fn test_mismatch() {
        let failure = check(BODY, ".data.id == 124").unwrap();
        assert_eq!(failure.expected, "data.id == 124");
        assert_eq!(failure.actual, "data.id = 123");
        assert_eq!(failure.message, "data.id == 124 failed: got 123");
    }

    #[test]
    fn test_path_not_found() {
        let failure = check(BODY, ".data.missing == 1").unwrap();
        assert_eq!(failure.actual, "path does not exist");
        assert_eq!(failure.message, "JSON path \"data.missing\" not found");

        assert!(check(BODY, ".users[5].name == 'Eve'").is_some());
        assert!(check("not json", ".id == 1").is_some());
    }

    #[test]
    fn test_null_comparisons() {
        let body = r#"{"value": null}"#;
        assert!(check(body, ".value == null").is_none());
        assert!(check(body, ".value != null").is_some());
        assert!(check(body, ".value > null").is_some());
    }

    #[test]
    fn test_bool_rejects_ordering() {
        assert!(check(BODY, ".active > false").is_some());
    }

    #[test]
    fn test_string_ordering() {
        assert!(check(BODY, ".data.name > 'abc'").is_none());
        assert!(check(BODY, ".data.name <= 'tess'").is_some());
    }

    #[test]
    fn test_number_against_non_number() {
        assert!(check(BODY, ".data.id == abc").is_some());
    }

    #[test]
    fn test_invalid_expression() {
        let failure = check(BODY, ".data.id").unwrap();
        assert!(failure.message.starts_with("invalid expression"));
    }

    #[test]
    fn test_array_projection() {
        let body = r#"{"users":[{"age":30},{"age":17}]}"#;

        let failure = check(body, ".users.#.age == 2").unwrap();
        assert_eq!(failure.actual, "users.#.age = [30,17]");

        let failure = check(body, ".users.#.nonexistent == 2").unwrap();
        assert_eq!(failure.actual, "path does not exist");

        assert!(check(body, ".users.# == 2").is_none());
        assert!(check(body, ".users.#.age == '[30,17]'").is_none());
    }

    #[test]
    fn test_lookup_segments() {
        let json: Value = serde_json::from_str(r#"{"a": {"b": [[1, 2], [3]]}}"#).unwrap();
        assert_eq!(lookup(&json, "a.b[0][1]"), Some(Value::from(2)));
        assert_eq!(lookup(&json, "a.b.#"), Some(Value::from(2)));
        assert_eq!(lookup(&json, "a.b.#.#"), Some(serde_json::json!([2, 1])));
        assert_eq!(lookup(&json, "a.b.#.5"), None);
        assert_eq!(lookup(&json, "a.c"), None);
        assert_eq!(lookup(&json, ""), Some(json.clone()));
    }
}
