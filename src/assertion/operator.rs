//! Comparison operators shared by the expression validators

use std::fmt;

/// Binary comparison operator
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl CompareOp {
    /// Two-character operators come first so `>=` is never read as `>`.
    pub const LONGEST_FIRST: [CompareOp; 6] = [
        CompareOp::Ge,
        CompareOp::Le,
        CompareOp::Eq,
        CompareOp::Ne,
        CompareOp::Gt,
        CompareOp::Lt,
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
        }
    }

    pub fn from_symbol(s: &str) -> Option<Self> {
        Self::LONGEST_FIRST
            .into_iter()
            .find(|op| op.symbol() == s)
    }

    /// Split a leading operator off `s`, returning the operator and the rest.
    pub fn strip_prefix(s: &str) -> Option<(Self, &str)> {
        Self::LONGEST_FIRST
            .into_iter()
            .find_map(|op| s.strip_prefix(op.symbol()).map(|rest| (op, rest)))
    }

    pub fn is_equality(&self) -> bool {
        matches!(self, CompareOp::Eq | CompareOp::Ne)
    }

    /// Apply the operator to two partially ordered values.
    pub fn compare<T: PartialOrd + ?Sized>(&self, left: &T, right: &T) -> bool {
        match self {
            CompareOp::Eq => left == right,
            CompareOp::Ne => left != right,
            CompareOp::Gt => left > right,
            CompareOp::Lt => left < right,
            CompareOp::Ge => left >= right,
            CompareOp::Le => left <= right,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Strip surrounding single and double quotes.
pub fn unquote(s: &str) -> &str {
    s.trim_matches(|c| c == '"' || c == '\'')
}
