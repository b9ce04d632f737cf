//! Rule-file reading shared by selection and replacement rules.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{Result, RuleError};

/// Serialization format of a rule file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleFormat {
    Json,
    Yaml,
}

impl RuleFormat {
    /// Pick the format from a file extension. Anything that is not
    /// `.yml`/`.yaml` is read as JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yml" | "yaml") => RuleFormat::Yaml,
            _ => RuleFormat::Json,
        }
    }
}

/// Read a rule file into its text and detected format.
pub(crate) fn read_rule_file(path: &Path) -> Result<(String, RuleFormat)> {
    let text = std::fs::read_to_string(path).map_err(|source| RuleError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok((text, RuleFormat::from_path(path)))
}

/// Deserialize the top-level array of raw rule objects.
pub(crate) fn parse_raw<T: DeserializeOwned>(text: &str, format: RuleFormat) -> Result<Vec<T>> {
    match format {
        RuleFormat::Json => Ok(serde_json::from_str(text)?),
        RuleFormat::Yaml => Ok(serde_yaml::from_str(text)?),
    }
}
