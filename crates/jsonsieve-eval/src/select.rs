//! Record routing with selection rules.
//!
//! The `SelectEngine` holds compiled selection rules in position order and
//! returns the output label for each record: the first rule whose conditions
//! all hold, or the fallback label when none does.

use jsonsieve_rules::{SelectRule, SelectRuleSet};
use serde_json::Value;

use crate::config::{ArrayMatch, DEFAULT_LABEL, DROP_LABEL};
use crate::matcher::CompiledCondition;

/// A selection rule with compiled conditions.
#[derive(Debug, Clone)]
pub struct CompiledSelectRule {
    pub position: i64,
    pub output: String,
    pub conditions: Vec<CompiledCondition>,
}

impl CompiledSelectRule {
    pub fn compile(rule: &SelectRule) -> Self {
        CompiledSelectRule {
            position: rule.position,
            output: rule.output.clone(),
            conditions: rule.conditions.iter().map(CompiledCondition::compile).collect(),
        }
    }

    /// `true` iff every condition holds. A rule without conditions matches
    /// every record.
    pub fn matches(&self, record: &Value, array_match: ArrayMatch) -> bool {
        self.conditions.iter().all(|c| c.evaluate(record, array_match))
    }
}

/// Routes records to output labels.
///
/// # Example
///
/// ```rust
/// use jsonsieve_rules::{RuleFormat, parse_select_rules};
/// use jsonsieve_eval::SelectEngine;
/// use serde_json::json;
///
/// let rules = parse_select_rules(r#"[
///     {"position": 1, "output": "admins", "conditions": [
///         {"type": "match", "key": "role", "values": ["admin"], "exclude": false}
///     ]}
/// ]"#, RuleFormat::Json).unwrap();
///
/// let engine = SelectEngine::new(&rules);
/// assert_eq!(engine.route(&json!({"role": "admin", "name": "x"})), "admins");
/// assert_eq!(engine.route(&json!({"role": "user"})), "default");
/// ```
#[derive(Debug, Clone)]
pub struct SelectEngine {
    rules: Vec<CompiledSelectRule>,
    fallback: String,
    array_match: ArrayMatch,
}

impl SelectEngine {
    /// Compile a rule set. The rule set is already sorted by position.
    pub fn new(rules: &SelectRuleSet) -> Self {
        SelectEngine {
            rules: rules.iter().map(CompiledSelectRule::compile).collect(),
            fallback: DEFAULT_LABEL.to_string(),
            array_match: ArrayMatch::default(),
        }
    }

    pub fn with_fallback(mut self, label: impl Into<String>) -> Self {
        self.fallback = label.into();
        self
    }

    pub fn with_array_match(mut self, array_match: ArrayMatch) -> Self {
        self.array_match = array_match;
        self
    }

    /// Output label for a record.
    pub fn route(&self, record: &Value) -> &str {
        self.rules
            .iter()
            .find(|rule| rule.matches(record, self.array_match))
            .map_or(self.fallback.as_str(), |rule| rule.output.as_str())
    }

    /// Every label a record can be routed to, plus the reserved drop label.
    pub fn labels(&self) -> Vec<&str> {
        let mut labels = vec![self.fallback.as_str()];
        for label in std::iter::once(DROP_LABEL).chain(self.rules.iter().map(|r| r.output.as_str())) {
            if !labels.contains(&label) {
                labels.push(label);
            }
        }
        labels
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn rules(&self) -> &[CompiledSelectRule] {
        &self.rules
    }
}
