//! Comparison expressions (spec.md §6): `"<OP> <N>"` where `OP ∈ {<, >}` and `N` is a
//! non-negative integer. Whitespace around `OP` is optional. An empty string means
//! "expression not set".

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A single `<` / `>` comparison against a non-negative integer, as used by the
/// `ModifiedLines` predicate's `additions` / `deletions` / `total` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonExpr {
    LessThan(u64),
    GreaterThan(u64),
}

impl ComparisonExpr {
    /// Evaluate this expression against an observed value.
    #[must_use]
    pub fn matches(self, value: u64) -> bool {
        match self {
            ComparisonExpr::LessThan(n) => value < n,
            ComparisonExpr::GreaterThan(n) => value > n,
        }
    }
}

impl fmt::Display for ComparisonExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonExpr::LessThan(n) => write!(f, "< {n}"),
            ComparisonExpr::GreaterThan(n) => write!(f, "> {n}"),
        }
    }
}

/// Parse error for a malformed comparison expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseComparisonExprError(pub String);

impl fmt::Display for ParseComparisonExprError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid comparison expression {:?}: expected \"< N\" or \"> N\"", self.0)
    }
}

impl std::error::Error for ParseComparisonExprError {}

impl FromStr for ComparisonExpr {
    type Err = ParseComparisonExprError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let mut chars = trimmed.chars();
        let op = chars.next().ok_or_else(|| ParseComparisonExprError(raw.to_string()))?;
        let n: u64 = chars
            .as_str()
            .trim()
            .parse()
            .map_err(|_| ParseComparisonExprError(raw.to_string()))?;
        match op {
            '<' => Ok(ComparisonExpr::LessThan(n)),
            '>' => Ok(ComparisonExpr::GreaterThan(n)),
            _ => Err(ParseComparisonExprError(raw.to_string())),
        }
    }
}

impl Serialize for ComparisonExpr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ComparisonExpr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// A comparison expression field that may be unset ("" / absent in YAML means
/// "expression not set", per spec.md §6).
pub type OptionalComparisonExpr = Option<ComparisonExpr>;
