//! Run drivers: each mode wires a rule engine into the [`Dispatcher`].
//!
//! [`Dispatcher`]: crate::dispatch::Dispatcher

mod flatten;
mod replace;
mod select;

pub use flatten::FlattenRun;
pub use replace::ReplaceRun;
pub use select::SelectRun;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use log::warn;
use serde_json::Value;

use crate::config::InvalidRecordPolicy;
use crate::dispatch::DispatchReport;
use crate::error::{EvalError, Result};

/// Summary of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Records (selection) or files (replacement, flattening) processed.
    pub units: u64,
    /// Invalid records skipped under [`InvalidRecordPolicy::Skip`].
    pub skipped: u64,
    pub elapsed: Duration,
}

impl RunReport {
    pub(crate) fn new(dispatch: DispatchReport, skipped: u64) -> Self {
        RunReport {
            units: dispatch.units,
            skipped,
            elapsed: dispatch.elapsed,
        }
    }
}

/// Parses records and applies the invalid-record policy.
#[derive(Debug)]
pub(crate) struct RecordParser {
    policy: InvalidRecordPolicy,
    skipped: AtomicU64,
}

impl RecordParser {
    pub(crate) fn new(policy: InvalidRecordPolicy) -> Self {
        RecordParser {
            policy,
            skipped: AtomicU64::new(0),
        }
    }

    /// `Ok(None)` means the record was invalid and skipped. Bytes that are
    /// not UTF-8 fail like any other malformed JSON.
    pub(crate) fn parse(&self, bytes: &[u8], path: &Path, line: Option<usize>) -> Result<Option<Value>> {
        match serde_json::from_slice(bytes) {
            Ok(value) => Ok(Some(value)),
            Err(source) => self
                .reject(EvalError::InvalidRecord {
                    path: path.to_path_buf(),
                    line,
                    source,
                })
                .map(|()| None),
        }
    }

    /// Either fail with `err` or count it as skipped, depending on the policy.
    pub(crate) fn reject(&self, err: EvalError) -> Result<()> {
        match self.policy {
            InvalidRecordPolicy::Abort => Err(err),
            InvalidRecordPolicy::Skip => {
                warn!("skipping record: {err}");
                self.skipped.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
        }
    }

    pub(crate) fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }
}

/// Create `path` for writing, creating missing parent directories first.
/// Concurrent creation of the same directory is not an error.
pub(crate) fn create_output_file(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| EvalError::io(parent, e))?;
    }
    let file = File::create(path).map_err(|e| EvalError::io(path, e))?;
    Ok(BufWriter::new(file))
}

pub(crate) fn write_line(out: &mut impl Write, bytes: &[u8], path: &Path) -> Result<()> {
    out.write_all(bytes)
        .and_then(|()| out.write_all(b"\n"))
        .map_err(|e| EvalError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_policy_returns_error() {
        let parser = RecordParser::new(InvalidRecordPolicy::Abort);
        let err = parser.parse(b"{nope", Path::new("in.json"), Some(4)).unwrap_err();
        assert!(err.to_string().contains("line 4 of 'in.json'"), "{err}");
        assert_eq!(parser.skipped(), 0);
    }

    #[test]
    fn test_skip_policy_counts() {
        let parser = RecordParser::new(InvalidRecordPolicy::Skip);
        assert!(parser.parse(b"{nope", Path::new("in.json"), Some(1)).unwrap().is_none());
        assert!(parser.parse(b"[1", Path::new("in.json"), None).unwrap().is_none());
        assert!(parser.parse(b"{\"a\":\"\xff\"}", Path::new("in.json"), Some(2)).unwrap().is_none());
        assert_eq!(parser.parse(b"{\"a\":1}", Path::new("in.json"), Some(3)).unwrap(), Some(serde_json::json!({"a": 1})));
        assert_eq!(parser.skipped(), 3);
    }

    #[test]
    fn test_create_output_file_makes_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/c.json");
        let mut out = create_output_file(&path).unwrap();
        write_line(&mut out, b"{}", &path).unwrap();
        drop(out);
        assert_eq!(std::fs::read_to_string(path).unwrap(), "{}\n");
    }
}
