//! Condition matching against a JSON value along a dotted field path.
//!
//! A [`CompiledCondition`] is built once per rule condition at load time.
//! Regex values are compiled up front; a pattern that does not compile is kept
//! as a test that never matches instead of failing the run.

use jsonsieve_rules::{Condition, ConditionType, FieldPath};
use log::warn;
use regex::Regex;
use serde_json::Value;

use crate::config::ArrayMatch;

/// A single pre-compiled value test.
#[derive(Debug, Clone)]
pub enum ValueTest {
    /// Exact string equality.
    Exact(String),
    /// String starts with prefix.
    Prefix(String),
    /// String ends with suffix.
    Suffix(String),
    /// Regex search. `None` if the pattern failed to compile.
    Regex(Option<Regex>),
}

impl ValueTest {
    pub fn matches(&self, s: &str) -> bool {
        match self {
            ValueTest::Exact(expected) => s == expected,
            ValueTest::Prefix(prefix) => s.starts_with(prefix.as_str()),
            ValueTest::Suffix(suffix) => s.ends_with(suffix.as_str()),
            ValueTest::Regex(re) => re.as_ref().is_some_and(|re| re.is_match(s)),
        }
    }
}

/// A selection condition ready for evaluation.
#[derive(Debug, Clone)]
pub struct CompiledCondition {
    pub kind: ConditionType,
    pub key: FieldPath,
    pub tests: Vec<ValueTest>,
    pub exclude: bool,
}

impl CompiledCondition {
    pub fn compile(condition: &Condition) -> Self {
        let tests = match condition.kind {
            ConditionType::Exist => Vec::new(),
            ConditionType::Match => condition.values.iter().cloned().map(ValueTest::Exact).collect(),
            ConditionType::Prefix => condition.values.iter().cloned().map(ValueTest::Prefix).collect(),
            ConditionType::Suffix => condition.values.iter().cloned().map(ValueTest::Suffix).collect(),
            ConditionType::Regex => condition
                .values
                .iter()
                .map(|pattern| match Regex::new(pattern) {
                    Ok(re) => ValueTest::Regex(Some(re)),
                    Err(e) => {
                        warn!(
                            "regex '{pattern}' on key '{}' does not compile and will never match: {e}",
                            condition.key
                        );
                        ValueTest::Regex(None)
                    }
                })
                .collect(),
        };

        CompiledCondition {
            kind: condition.kind,
            key: condition.key.clone(),
            tests,
            exclude: condition.exclude,
        }
    }

    /// Test a resolved string leaf. `Exist` holds for any string.
    pub fn test_str(&self, s: &str) -> bool {
        match self.kind {
            ConditionType::Exist => true,
            _ => self.tests.iter().any(|t| t.matches(s)),
        }
    }

    /// Evaluate the condition against a record, with `exclude` applied.
    pub fn evaluate(&self, record: &Value, array_match: ArrayMatch) -> bool {
        let found = path_matches(record, self.key.segments(), array_match, &|s| self.test_str(s));
        found != self.exclude
    }
}

/// Walk `value` along `path` and test the string reached once the path is
/// consumed.
///
/// Objects consume one segment per level. Arrays keep the same remaining path
/// and descend into their elements. Non-string leaves, missing keys, and paths
/// that end on a compound value never match.
pub fn path_matches(
    value: &Value,
    path: &[String],
    array_match: ArrayMatch,
    test: &dyn Fn(&str) -> bool,
) -> bool {
    match value {
        Value::Object(map) => {
            let Some((head, rest)) = path.split_first() else {
                return false;
            };
            match map.get(head) {
                Some(Value::String(s)) => rest.is_empty() && test(s),
                Some(next @ (Value::Object(_) | Value::Array(_))) => {
                    path_matches(next, rest, array_match, test)
                }
                _ => false,
            }
        }
        Value::Array(items) => match array_match {
            ArrayMatch::Any => items
                .iter()
                .any(|item| element_matches(item, path, array_match, test).unwrap_or(false)),
            ArrayMatch::First => items
                .iter()
                .find_map(|item| element_matches(item, path, array_match, test))
                .unwrap_or(false),
        },
        _ => false,
    }
}

/// Outcome for one array element, or `None` if the element is not a
/// candidate (a scalar that is not a string, or a string before the path is
/// consumed).
fn element_matches(
    item: &Value,
    path: &[String],
    array_match: ArrayMatch,
    test: &dyn Fn(&str) -> bool,
) -> Option<bool> {
    match item {
        Value::String(s) if path.is_empty() => Some(test(s)),
        Value::Object(_) | Value::Array(_) => Some(path_matches(item, path, array_match, test)),
        _ => None,
    }
}
