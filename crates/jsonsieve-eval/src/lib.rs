//! # jsonsieve-eval
//!
//! Rule evaluation and concurrent run drivers for line-delimited JSON.
//!
//! This crate consumes the rule sets produced by [`jsonsieve_rules`] and
//! applies them to records read from a file or a directory tree.
//!
//! ## Architecture
//!
//! - **Engines** (synchronous): [`SelectEngine`] routes a record to an output
//!   label, [`ReplaceEngine`] rewrites a record in place, [`flatten`] expands
//!   dotted keys. Rules are compiled once and shared by every worker.
//! - **Dispatcher**: walks the input tree on one coordinating thread and runs
//!   each work unit (a file or a line) on a blocking worker, with at most
//!   `concurrency` units in flight.
//! - **Runs**: [`SelectRun`], [`ReplaceRun`] and [`FlattenRun`] tie an engine,
//!   the dispatcher, and the output layout together.
//!
//! ## Quick Start
//!
//! ```rust
//! use jsonsieve_eval::SelectEngine;
//! use jsonsieve_rules::{RuleFormat, parse_select_rules};
//! use serde_json::json;
//!
//! let rules = parse_select_rules(
//!     r#"[{"position": 1, "output": "admins", "conditions": [
//!         {"type": "match", "key": "role", "values": ["admin"], "exclude": false}
//!     ]}]"#,
//!     RuleFormat::Json,
//! )
//! .unwrap();
//!
//! let engine = SelectEngine::new(&rules);
//! assert_eq!(engine.route(&json!({"role": "admin", "name": "x"})), "admins");
//! assert_eq!(engine.route(&json!({"role": "user"})), "default");
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod flatten;
pub mod matcher;
pub mod replace;
pub mod replay;
pub mod run;
pub mod select;

pub use config::{
    ArrayMatch, DEFAULT_CONCURRENCY, DEFAULT_LABEL, DROP_LABEL, InvalidRecordPolicy, ReplaceConfig,
    RunConfig, SelectConfig, mirror_path, normalize_path,
};
pub use dispatch::{
    DispatchCounters, DispatchReport, Dispatcher, Granularity, UnitProcessor, WorkUnit,
};
pub use error::{EvalError, Result};
pub use flatten::flatten;
pub use matcher::{CompiledCondition, ValueTest, path_matches};
pub use replace::{CompiledReplaceRule, ReplaceEngine, Replacement};
pub use replay::{ReplayClock, ReplayState};
pub use run::{FlattenRun, ReplaceRun, RunReport, SelectRun};
pub use select::{CompiledSelectRule, SelectEngine};
