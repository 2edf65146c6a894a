//! Assertion models
//!
//! Typed checks applied to an HTTP response and the failures they report.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of check an assertion performs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionType {
    Status,
    Body,
    BodyContains,
    JsonPath,
    Header,
    ResponseTime,
}

impl AssertionType {
    pub fn name(&self) -> &'static str {
        match self {
            AssertionType::Status => "status",
            AssertionType::Body => "body",
            AssertionType::BodyContains => "body_contains",
            AssertionType::JsonPath => "json_path",
            AssertionType::Header => "header",
            AssertionType::ResponseTime => "response_time",
        }
    }

    pub fn all() -> Vec<AssertionType> {
        vec![
            AssertionType::Status,
            AssertionType::Body,
            AssertionType::BodyContains,
            AssertionType::JsonPath,
            AssertionType::Header,
            AssertionType::ResponseTime,
        ]
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim() {
            "status" => Some(AssertionType::Status),
            "body" => Some(AssertionType::Body),
            "body_contains" => Some(AssertionType::BodyContains),
            "json_path" => Some(AssertionType::JsonPath),
            "header" => Some(AssertionType::Header),
            "response_time" => Some(AssertionType::ResponseTime),
            _ => None,
        }
    }
}

impl fmt::Display for AssertionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A single typed check with a type-specific expression
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assertion {
    #[serde(rename = "type")]
    pub kind: AssertionType,
    pub value: String,
}

impl Assertion {
    pub fn new(kind: AssertionType, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    pub fn status(value: impl Into<String>) -> Self {
        Self::new(AssertionType::Status, value)
    }

    pub fn body(value: impl Into<String>) -> Self {
        Self::new(AssertionType::Body, value)
    }

    pub fn body_contains(value: impl Into<String>) -> Self {
        Self::new(AssertionType::BodyContains, value)
    }

    pub fn json_path(value: impl Into<String>) -> Self {
        Self::new(AssertionType::JsonPath, value)
    }

    pub fn header(value: impl Into<String>) -> Self {
        Self::new(AssertionType::Header, value)
    }

    pub fn response_time(value: impl Into<String>) -> Self {
        Self::new(AssertionType::ResponseTime, value)
    }
}

impl fmt::Display for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.value)
    }
}

/// A failed assertion with human readable details
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionFailure {
    pub kind: AssertionType,
    pub expected: String,
    pub actual: String,
    pub message: String,
}

impl AssertionFailure {
    pub fn new(
        kind: AssertionType,
        expected: impl Into<String>,
        actual: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            expected: expected.into(),
            actual: actual.into(),
            message: message.into(),
        }
    }

    /// Failure that only carries a message, e.g. for a malformed expression
    pub fn message(kind: AssertionType, message: impl Into<String>) -> Self {
        Self::new(kind, "", "", message)
    }
}

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.message.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "expected {}, got {}", self.expected, self.actual)
        }
    }
}
