use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use jsonsieve_rules::ReplaceRuleSet;
use log::{debug, info};

use super::{RecordParser, RunReport, create_output_file, write_line};
use crate::config::ReplaceConfig;
use crate::dispatch::{Dispatcher, Granularity, UnitProcessor, WorkUnit};
use crate::error::{EvalError, Result};
use crate::replace::ReplaceEngine;

struct ReplaceProcessor {
    engine: ReplaceEngine,
    input_root: PathBuf,
    output_root: PathBuf,
    line_by_line: bool,
    parser: RecordParser,
}

impl ReplaceProcessor {
    /// One JSON value per non-empty line, each rewritten on its own line.
    fn rewrite_lines(&self, path: &Path, input: &[u8], out: &mut impl Write, target: &Path) -> Result<()> {
        for (index, line) in input.split(|b| *b == b'\n').enumerate() {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.is_empty() {
                continue;
            }
            let Some(mut record) = self.parser.parse(line, path, Some(index + 1))? else {
                continue;
            };
            self.engine.apply(&mut record);
            write_line(out, &serde_json::to_vec(&record)?, target)?;
        }
        Ok(())
    }

    /// The whole file is one JSON document. A file holding nothing but
    /// whitespace has no document and yields an empty output file.
    fn rewrite_document(&self, path: &Path, input: &[u8], out: &mut impl Write, target: &Path) -> Result<()> {
        if input.trim_ascii().is_empty() {
            debug!("{} is empty, nothing to rewrite", path.display());
            return Ok(());
        }
        let Some(mut record) = self.parser.parse(input, path, None)? else {
            return Ok(());
        };
        self.engine.apply(&mut record);
        serde_json::to_writer(&mut *out, &record).map_err(|e| match e.io_error_kind() {
            Some(kind) => EvalError::io(target, kind.into()),
            None => EvalError::Serialize(e),
        })
    }
}

impl UnitProcessor for ReplaceProcessor {
    fn granularity(&self) -> Granularity {
        Granularity::File
    }

    fn process(&self, unit: WorkUnit) -> Result<()> {
        let WorkUnit::File { path } = unit else {
            return Err(EvalError::Worker("replacement expects file units".to_string()));
        };
        let input = std::fs::read(&path).map_err(|e| EvalError::io(&path, e))?;
        let target = crate::config::mirror_path(&self.input_root, &self.output_root, &path)?;
        debug!("rewriting {} -> {}", path.display(), target.display());

        let mut out = create_output_file(&target)?;
        if self.line_by_line {
            self.rewrite_lines(&path, &input, &mut out, &target)?;
        } else {
            self.rewrite_document(&path, &input, &mut out, &target)?;
        }
        out.flush().map_err(|e| EvalError::io(&target, e))
    }
}

/// Rewrites every input file to its mirrored location under the output root.
pub struct ReplaceRun {
    config: ReplaceConfig,
    engine: ReplaceEngine,
}

impl ReplaceRun {
    pub fn new(config: ReplaceConfig, rules: &ReplaceRuleSet) -> Result<Self> {
        config.run.validate()?;
        Ok(ReplaceRun {
            config,
            engine: ReplaceEngine::new(rules),
        })
    }

    /// Use a fixed origin for timestamp rules that carry no start time.
    pub fn with_clock_origin(config: ReplaceConfig, rules: &ReplaceRuleSet, now_ms: f64) -> Result<Self> {
        config.run.validate()?;
        Ok(ReplaceRun {
            config,
            engine: ReplaceEngine::with_clock_origin(rules, now_ms),
        })
    }

    pub fn engine(&self) -> &ReplaceEngine {
        &self.engine
    }

    pub async fn execute(self) -> Result<RunReport> {
        let ReplaceRun { config, engine } = self;
        let dispatcher = Dispatcher::new(config.run.concurrency)?;

        info!(
            "rewriting {} into {} with {} rule(s){}",
            config.run.input.display(),
            config.run.output.display(),
            engine.rule_count(),
            if config.line_by_line { ", line by line" } else { "" }
        );

        let processor = Arc::new(ReplaceProcessor {
            engine,
            input_root: config.run.input.clone(),
            output_root: config.run.output.clone(),
            line_by_line: config.line_by_line,
            parser: RecordParser::new(config.run.invalid_records),
        });
        let dispatched = dispatcher.run(&config.run.input, Arc::clone(&processor)).await?;
        Ok(RunReport::new(dispatched, processor.parser.skipped()))
    }
}
