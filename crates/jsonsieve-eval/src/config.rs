//! Run configuration and input/output path handling.

use std::path::{Component, Path, PathBuf};

use crate::error::{EvalError, Result};

/// Output label for records that match no selection rule.
pub const DEFAULT_LABEL: &str = "default";

/// Reserved output label that is always created next to [`DEFAULT_LABEL`].
pub const DROP_LABEL: &str = "drop";

/// Number of concurrently running workers when none is configured.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// What to do with a record that is not valid JSON.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InvalidRecordPolicy {
    /// Stop the whole run on the first invalid record.
    #[default]
    Abort,
    /// Log a warning and continue with the next record.
    Skip,
}

/// How a field path is resolved when it runs into an array of values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArrayMatch {
    /// Every element is tried in order; the first match wins.
    #[default]
    Any,
    /// The first string element (once the path is consumed) or the first
    /// compound element decides, matching or not.
    First,
}

/// Settings shared by every run mode.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Input file or directory, lexically normalized.
    pub input: PathBuf,
    /// Output file or directory, lexically normalized.
    pub output: PathBuf,
    /// Maximum number of units processed at the same time.
    ///
    /// Default: 10. A value of 1 serializes execution.
    pub concurrency: usize,
    pub invalid_records: InvalidRecordPolicy,
}

impl RunConfig {
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        RunConfig {
            input: normalize_path(input.as_ref()),
            output: normalize_path(output.as_ref()),
            concurrency: DEFAULT_CONCURRENCY,
            invalid_records: InvalidRecordPolicy::default(),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_invalid_records(mut self, policy: InvalidRecordPolicy) -> Self {
        self.invalid_records = policy;
        self
    }

    /// Check the configuration before any output is created.
    pub fn validate(&self) -> Result<()> {
        if self.input.as_os_str().is_empty() || self.output.as_os_str().is_empty() {
            return Err(EvalError::InvalidConfig(
                "input and output paths must be specified".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(EvalError::InvalidConfig(
                "maximum number of workers must be greater than 0".to_string(),
            ));
        }
        let meta = std::fs::metadata(&self.input).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EvalError::InvalidConfig(format!(
                    "input path '{}' not found",
                    self.input.display()
                ))
            } else {
                EvalError::io(&self.input, e)
            }
        })?;
        if meta.is_dir() {
            let input = std::fs::canonicalize(&self.input).map_err(|e| EvalError::io(&self.input, e))?;
            let output = resolve_path(&self.output).map_err(|e| EvalError::io(&self.output, e))?;
            if output.starts_with(&input) {
                return Err(EvalError::InvalidConfig(format!(
                    "output path '{}' must not be inside input directory '{}'",
                    self.output.display(),
                    self.input.display()
                )));
            }
        }
        Ok(())
    }

    /// Output location for one discovered input file.
    pub fn output_path_for(&self, input_file: &Path) -> Result<PathBuf> {
        mirror_path(&self.input, &self.output, input_file)
    }
}

/// Settings for routing records to per-label output files.
#[derive(Debug, Clone)]
pub struct SelectConfig {
    pub run: RunConfig,
    pub array_match: ArrayMatch,
    /// Label used when no rule matches. Default: [`DEFAULT_LABEL`].
    pub fallback_label: String,
}

impl SelectConfig {
    pub fn new(run: RunConfig) -> Self {
        SelectConfig {
            run,
            array_match: ArrayMatch::default(),
            fallback_label: DEFAULT_LABEL.to_string(),
        }
    }
}

/// Settings for rewriting records in place.
#[derive(Debug, Clone)]
pub struct ReplaceConfig {
    pub run: RunConfig,
    /// Treat each input file as one JSON value per line instead of a single
    /// JSON document.
    pub line_by_line: bool,
}

impl ReplaceConfig {
    pub fn new(run: RunConfig) -> Self {
        ReplaceConfig {
            run,
            line_by_line: false,
        }
    }
}

/// Lexically clean a path: drop `.` components and fold `..` into its parent
/// where possible. An empty result becomes `.`.
pub fn normalize_path(path: &Path) -> PathBuf {
    if path.as_os_str().is_empty() {
        return PathBuf::new();
    }

    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }

    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().collect()
}

/// Absolute, symlink-free form of a path that may not exist yet: the longest
/// existing ancestor is canonicalized and the missing tail appended to it.
fn resolve_path(path: &Path) -> std::io::Result<PathBuf> {
    let absolute = normalize_path(&std::path::absolute(path)?);
    for ancestor in absolute.ancestors() {
        if let Ok(existing) = std::fs::canonicalize(ancestor) {
            let tail = absolute.strip_prefix(ancestor).unwrap_or(Path::new(""));
            return Ok(existing.join(tail));
        }
    }
    Ok(absolute)
}

/// Map `file` under `input_root` to the same relative location under
/// `output_root`. A file that is the input root itself maps to the output root.
pub fn mirror_path(input_root: &Path, output_root: &Path, file: &Path) -> Result<PathBuf> {
    let rel = file.strip_prefix(input_root).map_err(|_| {
        EvalError::InvalidConfig(format!(
            "'{}' is not under input root '{}'",
            file.display(),
            input_root.display()
        ))
    })?;
    if rel.as_os_str().is_empty() {
        Ok(output_root.to_path_buf())
    } else {
        Ok(output_root.join(rel))
    }
}
