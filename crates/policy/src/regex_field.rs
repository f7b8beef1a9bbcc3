//! A `Regex` newtype that (de)serializes from/to its source pattern, used by every
//! predicate and candidate-method field that takes a regex list. Compilation
//! happens at load time (spec.md §6: "Regex fields are compiled on load; a
//! compilation failure is a fatal config error"); matching is partial (the pattern
//! need not anchor).

use regex::Regex;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Deref;

/// A regex compiled once at policy-load time.
#[derive(Debug, Clone)]
pub struct CompiledRegex(Regex);

impl CompiledRegex {
    /// Compile `pattern`, surfacing a config-style error string on failure.
    pub fn compile(pattern: &str) -> Result<Self, String> {
        Regex::new(pattern).map(CompiledRegex).map_err(|e| format!("invalid regex {pattern:?}: {e}"))
    }

    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Deref for CompiledRegex {
    type Target = Regex;

    fn deref(&self) -> &Regex {
        &self.0
    }
}

impl PartialEq for CompiledRegex {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_str() == other.0.as_str()
    }
}

impl Eq for CompiledRegex {}

impl fmt::Display for CompiledRegex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl Serialize for CompiledRegex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0.as_str())
    }
}

impl<'de> Deserialize<'de> for CompiledRegex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let pattern = String::deserialize(deserializer)?;
        CompiledRegex::compile(&pattern).map_err(de::Error::custom)
    }
}
