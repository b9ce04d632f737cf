//! Replacement rules: redact string fields in place, globally or at one path,
//! and rewrite timestamp fields with synthetic replay times.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RuleError};
use crate::loader::{RuleFormat, parse_raw, read_rule_file};
use crate::path::FieldPath;

// =============================================================================
// Types
// =============================================================================

/// What a replacement rule does to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReplaceKind {
    /// Substitute inside the single string at `field-name`.
    PerField,
    /// Substitute inside every string in the record.
    Global,
    /// Overwrite `field-name` with an interpolated replay timestamp.
    Timestamp,
}

impl ReplaceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplaceKind::PerField => "per-field",
            ReplaceKind::Global => "global",
            ReplaceKind::Timestamp => "timestamp",
        }
    }
}

impl FromStr for ReplaceKind {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "per-field" => Ok(ReplaceKind::PerField),
            "global" => Ok(ReplaceKind::Global),
            "timestamp" => Ok(ReplaceKind::Timestamp),
            other => Err(RuleError::UnknownType {
                what: "replacement",
                found: other.to_string(),
            }),
        }
    }
}

/// Replay window of a timestamp rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReplaySpec {
    /// Length of the window in milliseconds.
    pub duration_ms: i64,
    /// Number of records spread across the window.
    pub max_records: i64,
    /// Start of the window in epoch milliseconds. `None` means "now" at run start.
    pub start_ms: Option<f64>,
}

impl ReplaySpec {
    /// Milliseconds between two consecutive replayed records.
    pub fn step_ms(&self) -> f64 {
        self.duration_ms as f64 / self.max_records as f64
    }
}

/// A single replacement rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplaceRule {
    pub order: i64,
    pub kind: ReplaceKind,
    pub field: FieldPath,
    pub original: String,
    pub replacement: String,
    /// Present only for [`ReplaceKind::Timestamp`].
    pub replay: Option<ReplaySpec>,
}

/// Replacement rules sorted by ascending order. Every rule applies to every record.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplaceRuleSet {
    pub rules: Vec<ReplaceRule>,
}

impl ReplaceRuleSet {
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ReplaceRule> {
        self.rules.iter()
    }
}

// =============================================================================
// Raw file representation
// =============================================================================

#[derive(Debug, Deserialize)]
struct RawReplaceRule {
    #[serde(default)]
    order: i64,
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "field-name", default)]
    field_name: String,
    #[serde(default)]
    original: String,
    #[serde(default)]
    replacement: String,
    #[serde(default)]
    duration: i64,
    #[serde(rename = "max-records", default)]
    max_records: i64,
    #[serde(rename = "start-ms", default)]
    start_ms: f64,
}

// =============================================================================
// Loading
// =============================================================================

/// Read and validate a replacement rule file.
pub fn load_replace_rules(path: &Path) -> Result<ReplaceRuleSet> {
    let (text, format) = read_rule_file(path)?;
    parse_replace_rules(&text, format)
}

/// Parse replacement rules from text and sort them by order.
pub fn parse_replace_rules(text: &str, format: RuleFormat) -> Result<ReplaceRuleSet> {
    let raw: Vec<RawReplaceRule> = parse_raw(text, format)?;
    let mut rules = Vec::with_capacity(raw.len());
    for (index, r) in raw.into_iter().enumerate() {
        rules.push(convert_rule(index, r)?);
    }
    rules.sort_by_key(|r| r.order);
    Ok(ReplaceRuleSet { rules })
}

fn convert_rule(index: usize, raw: RawReplaceRule) -> Result<ReplaceRule> {
    let kind: ReplaceKind = raw.kind.parse()?;
    let invalid = |reason: String| RuleError::InvalidRule { index, reason };

    if kind != ReplaceKind::Global && raw.field_name.is_empty() {
        return Err(invalid(format!("'{}' rule requires 'field-name'", kind.as_str())));
    }

    let replay = if kind == ReplaceKind::Timestamp {
        if raw.duration <= 0 {
            return Err(invalid(format!("'duration' must be positive, got {}", raw.duration)));
        }
        if raw.max_records <= 0 {
            return Err(invalid(format!(
                "'max-records' must be positive, got {}",
                raw.max_records
            )));
        }
        if raw.start_ms < 0.0 || !raw.start_ms.is_finite() {
            return Err(invalid(format!("'start-ms' must be a non-negative epoch, got {}", raw.start_ms)));
        }
        Some(ReplaySpec {
            duration_ms: raw.duration,
            max_records: raw.max_records,
            start_ms: (raw.start_ms > 0.0).then_some(raw.start_ms),
        })
    } else {
        None
    };

    Ok(ReplaceRule {
        order: raw.order,
        kind,
        field: FieldPath::parse(&raw.field_name),
        original: raw.original,
        replacement: raw.replacement,
        replay,
    })
}
