use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading or validating a rule file.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("cannot read rule file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("rule file must be a JSON array of rule objects: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rule file must be a YAML sequence of rule mappings: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unknown {what} type '{found}'")]
    UnknownType { what: &'static str, found: String },

    #[error("invalid rule #{index}: {reason}")]
    InvalidRule { index: usize, reason: String },
}

pub type Result<T> = std::result::Result<T, RuleError>;
