//! # jsonsieve-rules
//!
//! Rule files for the jsonsieve tools.
//!
//! Two rule families are supported, both stored as a JSON (or YAML) array of
//! rule objects and loaded once at startup:
//!
//! - **Selection rules** route a record to a named output. Rules are sorted by
//!   `position` and the first whose conditions all hold wins.
//! - **Replacement rules** rewrite records in place. Rules are sorted by
//!   `order` and all of them apply to every record.
//!
//! ## Quick Start
//!
//! ```rust
//! use jsonsieve_rules::{ConditionType, RuleFormat, parse_select_rules};
//!
//! let text = r#"[
//!     {"position": 1, "output": "admins", "conditions": [
//!         {"type": "match", "key": "role", "values": ["admin"], "exclude": false}
//!     ]}
//! ]"#;
//!
//! let rules = parse_select_rules(text, RuleFormat::Json).unwrap();
//! assert_eq!(rules.rules[0].output, "admins");
//! assert_eq!(rules.rules[0].conditions[0].kind, ConditionType::Match);
//! ```

pub mod error;
pub mod loader;
pub mod path;
pub mod replace;
pub mod select;

pub use error::{Result, RuleError};
pub use loader::RuleFormat;
pub use path::FieldPath;
pub use replace::{
    ReplaceKind, ReplaceRule, ReplaceRuleSet, ReplaySpec, load_replace_rules, parse_replace_rules,
};
pub use select::{
    Condition, ConditionType, SelectRule, SelectRuleSet, is_plain_file_name, load_select_rules,
    parse_select_rules,
};
