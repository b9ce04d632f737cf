use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use jsonsieve_rules::{SelectRuleSet, is_plain_file_name};
use log::{debug, info, warn};

use super::{RecordParser, RunReport, create_output_file, write_line};
use crate::config::SelectConfig;
use crate::dispatch::{Dispatcher, Granularity, UnitProcessor, WorkUnit};
use crate::error::{EvalError, Result};
use crate::select::SelectEngine;

/// One long-lived output file per label, shared by every worker.
struct OutputFile {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

struct SelectProcessor {
    engine: SelectEngine,
    outputs: HashMap<String, OutputFile>,
    parser: RecordParser,
}

impl SelectProcessor {
    fn flush(&self) -> Result<()> {
        for output in self.outputs.values() {
            let mut writer = output.writer.lock().unwrap_or_else(PoisonError::into_inner);
            writer.flush().map_err(|e| EvalError::io(&output.path, e))?;
        }
        Ok(())
    }
}

impl UnitProcessor for SelectProcessor {
    fn granularity(&self) -> Granularity {
        Granularity::Line
    }

    fn process(&self, unit: WorkUnit) -> Result<()> {
        let WorkUnit::Line { path, line, bytes } = unit else {
            return Err(EvalError::Worker("selection expects line units".to_string()));
        };
        let Some(record) = self.parser.parse(&bytes, &path, Some(line))? else {
            return Ok(());
        };

        let label = self.engine.route(&record);
        let output = self.outputs.get(label).ok_or_else(|| {
            EvalError::Worker(format!("no output file for label '{label}'"))
        })?;

        // The whole line goes out under one lock so records never interleave.
        let mut writer = output.writer.lock().unwrap_or_else(PoisonError::into_inner);
        write_line(&mut *writer, &bytes, &output.path)
    }
}

/// Routes every input record, verbatim, to the output file of its label.
pub struct SelectRun {
    config: SelectConfig,
    engine: SelectEngine,
}

impl SelectRun {
    pub fn new(config: SelectConfig, rules: &SelectRuleSet) -> Result<Self> {
        config.run.validate()?;
        if !is_plain_file_name(&config.fallback_label) {
            return Err(EvalError::InvalidConfig(format!(
                "fallback label '{}' must be a plain file name",
                config.fallback_label
            )));
        }
        let engine = SelectEngine::new(rules)
            .with_fallback(config.fallback_label.clone())
            .with_array_match(config.array_match);
        Ok(SelectRun { config, engine })
    }

    pub fn engine(&self) -> &SelectEngine {
        &self.engine
    }

    /// Create every label's output file, then dispatch one unit per record.
    pub async fn execute(self) -> Result<RunReport> {
        let SelectRun { config, engine } = self;
        let dispatcher = Dispatcher::new(config.run.concurrency)?;

        let out_dir = &config.run.output;
        std::fs::create_dir_all(out_dir).map_err(|e| EvalError::io(out_dir, e))?;

        let mut outputs = HashMap::new();
        for label in engine.labels() {
            let path = out_dir.join(label);
            debug!("creating output file {}", path.display());
            let writer = Mutex::new(create_output_file(&path)?);
            outputs.insert(label.to_string(), OutputFile { path, writer });
        }

        let processor = Arc::new(SelectProcessor {
            engine,
            outputs,
            parser: RecordParser::new(config.run.invalid_records),
        });

        info!(
            "selecting records from {} into {} with {} rule(s)",
            config.run.input.display(),
            out_dir.display(),
            processor.engine.rule_count()
        );
        let dispatched = match dispatcher.run(&config.run.input, Arc::clone(&processor)).await {
            Ok(dispatched) => dispatched,
            Err(err) => {
                // The dispatch error is the cause; a failing flush is secondary.
                if let Err(flush_err) = processor.flush() {
                    warn!("flushing output files after a failed run: {flush_err}");
                }
                return Err(err);
            }
        };
        processor.flush()?;

        Ok(RunReport::new(dispatched, processor.parser.skipped()))
    }
}
