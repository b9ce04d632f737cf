//! Evaluation and run-time error types.

use std::path::{Path, PathBuf};

use jsonsieve_rules::RuleError;
use thiserror::Error;

/// Errors that can occur while configuring or executing a run.
#[derive(Debug, Error)]
pub enum EvalError {
    /// The rule file could not be loaded.
    #[error("rule error: {0}")]
    Rules(#[from] RuleError),

    /// Missing paths, zero concurrency, and similar setup mistakes.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A file or directory could not be read, created, or written.
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record is not valid JSON.
    #[error("{} is not in valid JSON format: {source}", describe_location(path, line))]
    InvalidRecord {
        path: PathBuf,
        line: Option<usize>,
        #[source]
        source: serde_json::Error,
    },

    /// A record that must be an object (flattening) is some other JSON value.
    #[error("{} is not a JSON object", describe_location(path, line))]
    NotAnObject { path: PathBuf, line: Option<usize> },

    /// The input tree could not be walked.
    #[error("failed to walk the input tree: {0}")]
    Walk(#[from] walkdir::Error),

    /// A processed record could not be serialized.
    #[error("JSON serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A worker or the coordinating task died.
    #[error("worker failure: {0}")]
    Worker(String),
}

impl EvalError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        EvalError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

fn describe_location(path: &Path, line: &Option<usize>) -> String {
    match line {
        Some(n) => format!("line {n} of '{}'", path.display()),
        None => format!("file '{}'", path.display()),
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, EvalError>;
