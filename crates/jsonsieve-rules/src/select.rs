//! Selection rules: route each record to the output of the first rule whose
//! conditions all hold.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RuleError};
use crate::loader::{RuleFormat, parse_raw, read_rule_file};
use crate::path::FieldPath;

// =============================================================================
// Types
// =============================================================================

/// How a condition tests the string found at its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionType {
    /// Exact string equality.
    Match,
    /// String starts with the value.
    Prefix,
    /// String ends with the value.
    Suffix,
    /// The key resolves to a string; values are ignored.
    Exist,
    /// String matches the value as a regular expression.
    Regex,
}

impl ConditionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionType::Match => "match",
            ConditionType::Prefix => "prefix",
            ConditionType::Suffix => "suffix",
            ConditionType::Exist => "exist",
            ConditionType::Regex => "regex",
        }
    }
}

impl FromStr for ConditionType {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "match" => Ok(ConditionType::Match),
            "prefix" => Ok(ConditionType::Prefix),
            "suffix" => Ok(ConditionType::Suffix),
            "exist" => Ok(ConditionType::Exist),
            "regex" => Ok(ConditionType::Regex),
            other => Err(RuleError::UnknownType {
                what: "condition",
                found: other.to_string(),
            }),
        }
    }
}

/// A single predicate of a selection rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub kind: ConditionType,
    pub key: FieldPath,
    pub values: Vec<String>,
    /// Invert the outcome of the test.
    pub exclude: bool,
}

/// A selection rule. All conditions must hold (AND).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectRule {
    pub position: i64,
    pub output: String,
    pub conditions: Vec<Condition>,
}

/// Selection rules sorted by ascending position.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SelectRuleSet {
    pub rules: Vec<SelectRule>,
}

impl SelectRuleSet {
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SelectRule> {
        self.rules.iter()
    }

    /// Distinct output labels in rule order.
    pub fn outputs(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for rule in &self.rules {
            if !seen.contains(&rule.output.as_str()) {
                seen.push(rule.output.as_str());
            }
        }
        seen
    }
}

// =============================================================================
// Raw file representation
// =============================================================================

#[derive(Debug, Deserialize)]
struct RawSelectRule {
    #[serde(default)]
    position: i64,
    #[serde(default)]
    output: String,
    #[serde(default)]
    conditions: Vec<RawCondition>,
}

#[derive(Debug, Deserialize)]
struct RawCondition {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    key: String,
    #[serde(default)]
    values: Vec<String>,
    #[serde(default)]
    exclude: bool,
}

// =============================================================================
// Loading
// =============================================================================

/// Read and validate a selection rule file.
pub fn load_select_rules(path: &Path) -> Result<SelectRuleSet> {
    let (text, format) = read_rule_file(path)?;
    parse_select_rules(&text, format)
}

/// Parse selection rules from text and sort them by position.
pub fn parse_select_rules(text: &str, format: RuleFormat) -> Result<SelectRuleSet> {
    let raw: Vec<RawSelectRule> = parse_raw(text, format)?;
    let mut rules = Vec::with_capacity(raw.len());
    for (index, r) in raw.into_iter().enumerate() {
        rules.push(convert_rule(index, r)?);
    }
    // Stable: equal positions keep file order.
    rules.sort_by_key(|r| r.position);
    Ok(SelectRuleSet { rules })
}

/// Whether `name` can be used as an output file name directly inside the
/// output directory: non-empty, no path separator, not `.` or `..`.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && name != "." && name != ".."
}

fn convert_rule(index: usize, raw: RawSelectRule) -> Result<SelectRule> {
    if raw.output.is_empty() {
        return Err(RuleError::InvalidRule {
            index,
            reason: "missing 'output'".to_string(),
        });
    }
    if !is_plain_file_name(&raw.output) {
        return Err(RuleError::InvalidRule {
            index,
            reason: format!("output '{}' must be a plain file name", raw.output),
        });
    }

    let conditions = raw
        .conditions
        .into_iter()
        .map(|c| {
            Ok(Condition {
                kind: c.kind.parse()?,
                key: FieldPath::parse(&c.key),
                values: c.values,
                exclude: c.exclude,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(SelectRule {
        position: raw.position,
        output: raw.output,
        conditions,
    })
}
