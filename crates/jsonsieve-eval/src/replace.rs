//! In-place record rewriting with replacement rules.
//!
//! Every rule applies to every record, in rule order, so substitutions
//! compound. Field paths are walked with a borrowed suffix of the rule's
//! segments; the rule itself is never modified.

use jsonsieve_rules::{ReplaceKind, ReplaceRule, ReplaceRuleSet};
use serde_json::Value;

use crate::replay::ReplayClock;

/// What a compiled replacement rule does.
#[derive(Debug)]
pub enum Replacement {
    /// Substitute inside the string at `path` only.
    PerField {
        path: Vec<String>,
        original: String,
        replacement: String,
    },
    /// Substitute inside every string in the record.
    Global { original: String, replacement: String },
    /// Set the field at `path` to the next replay timestamp.
    Timestamp { path: Vec<String>, clock: ReplayClock },
}

/// A compiled replacement rule.
#[derive(Debug)]
pub struct CompiledReplaceRule {
    pub order: i64,
    pub replacement: Replacement,
}

impl CompiledReplaceRule {
    pub fn compile(rule: &ReplaceRule, now_ms: f64) -> Self {
        let replacement = match (rule.kind, rule.replay) {
            (ReplaceKind::Timestamp, Some(spec)) => Replacement::Timestamp {
                path: rule.field.segments().to_vec(),
                clock: ReplayClock::new(&spec, now_ms),
            },
            (ReplaceKind::Global, _) => Replacement::Global {
                original: rule.original.clone(),
                replacement: rule.replacement.clone(),
            },
            // A timestamp rule without a window cannot come out of the loader;
            // treat it as a plain field substitution.
            (ReplaceKind::PerField | ReplaceKind::Timestamp, _) => Replacement::PerField {
                path: rule.field.segments().to_vec(),
                original: rule.original.clone(),
                replacement: rule.replacement.clone(),
            },
        };
        CompiledReplaceRule {
            order: rule.order,
            replacement,
        }
    }

    pub fn apply(&self, record: &mut Value) {
        match &self.replacement {
            Replacement::PerField {
                path,
                original,
                replacement,
            } => replace_at_path(record, path, original, replacement),
            Replacement::Global {
                original,
                replacement,
            } => replace_everywhere(record, original, replacement),
            Replacement::Timestamp { path, clock } => stamp_at_path(record, path, clock),
        }
    }
}

/// Applies replacement rules to records.
///
/// Shared by all workers of a run; the only interior mutability is the
/// replay clock of each timestamp rule.
///
/// # Example
///
/// ```rust
/// use jsonsieve_rules::{RuleFormat, parse_replace_rules};
/// use jsonsieve_eval::ReplaceEngine;
/// use serde_json::json;
///
/// let rules = parse_replace_rules(r#"[
///     {"order": 1, "type": "global", "original": "acme", "replacement": "corp"},
///     {"order": 2, "type": "per-field", "field-name": "user.id",
///      "original": "howard", "replacement": "bob"}
/// ]"#, RuleFormat::Json).unwrap();
///
/// let engine = ReplaceEngine::new(&rules);
/// let mut record = json!({"user": {"id": "howard@acme.com"}, "note": "howard from acme"});
/// engine.apply(&mut record);
/// assert_eq!(record, json!({"user": {"id": "bob@corp.com"}, "note": "howard from corp"}));
/// ```
#[derive(Debug)]
pub struct ReplaceEngine {
    rules: Vec<CompiledReplaceRule>,
}

impl ReplaceEngine {
    /// Compile a rule set. Timestamp rules without `start-ms` start at the
    /// current wall-clock time.
    pub fn new(rules: &ReplaceRuleSet) -> Self {
        Self::with_clock_origin(rules, chrono::Utc::now().timestamp_millis() as f64)
    }

    /// Compile a rule set with an explicit fallback start time for replay clocks.
    pub fn with_clock_origin(rules: &ReplaceRuleSet, now_ms: f64) -> Self {
        ReplaceEngine {
            rules: rules
                .iter()
                .map(|rule| CompiledReplaceRule::compile(rule, now_ms))
                .collect(),
        }
    }

    /// Apply every rule, in order, to one record.
    pub fn apply(&self, record: &mut Value) {
        for rule in &self.rules {
            rule.apply(record);
        }
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn rules(&self) -> &[CompiledReplaceRule] {
        &self.rules
    }
}

// =============================================================================
// Tree walks
// =============================================================================

/// Substitute inside the string reached by consuming `path`. Missing keys and
/// paths that end on a non-string leave the record untouched.
fn replace_at_path(value: &mut Value, path: &[String], original: &str, replacement: &str) {
    match value {
        Value::Object(map) => {
            let Some((head, rest)) = path.split_first() else {
                return;
            };
            match map.get_mut(head) {
                Some(Value::String(s)) if rest.is_empty() => {
                    *s = s.replace(original, replacement);
                }
                Some(next) if next.is_object() || next.is_array() => {
                    replace_at_path(next, rest, original, replacement);
                }
                _ => {}
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut().filter(|v| v.is_object() || v.is_array()) {
                replace_at_path(item, path, original, replacement);
            }
        }
        _ => {}
    }
}

/// Substitute inside every string node of the tree.
fn replace_everywhere(value: &mut Value, original: &str, replacement: &str) {
    match value {
        Value::String(s) => *s = s.replace(original, replacement),
        Value::Object(map) => {
            for v in map.values_mut() {
                replace_everywhere(v, original, replacement);
            }
        }
        Value::Array(items) => {
            for v in items.iter_mut() {
                replace_everywhere(v, original, replacement);
            }
        }
        _ => {}
    }
}

/// Set the key named by the last segment of `path` to the next replay
/// timestamp, inserting it if absent. Every object reached through an array
/// advances the clock once.
fn stamp_at_path(value: &mut Value, path: &[String], clock: &ReplayClock) {
    match value {
        Value::Object(map) => match path {
            [] => {}
            [last] => {
                map.insert(last.clone(), Value::from(clock.advance()));
            }
            [head, rest @ ..] => {
                if let Some(next) = map.get_mut(head) {
                    stamp_at_path(next, rest, clock);
                }
            }
        },
        Value::Array(items) => {
            for item in items.iter_mut() {
                stamp_at_path(item, path, clock);
            }
        }
        _ => {}
    }
}
