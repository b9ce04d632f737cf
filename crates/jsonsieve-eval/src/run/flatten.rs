use std::io::{BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info};
use serde_json::Value;

use super::{RecordParser, RunReport, create_output_file, write_line};
use crate::config::RunConfig;
use crate::dispatch::{Dispatcher, Granularity, UnitProcessor, WorkUnit, byte_lines};
use crate::error::{EvalError, Result};
use crate::flatten::flatten;

struct FlattenProcessor {
    input_root: PathBuf,
    output_root: PathBuf,
    parser: RecordParser,
}

impl UnitProcessor for FlattenProcessor {
    fn granularity(&self) -> Granularity {
        Granularity::File
    }

    fn process(&self, unit: WorkUnit) -> Result<()> {
        let WorkUnit::File { path } = unit else {
            return Err(EvalError::Worker("flattening expects file units".to_string()));
        };
        let target = crate::config::mirror_path(&self.input_root, &self.output_root, &path)?;
        debug!("flattening {} -> {}", path.display(), target.display());

        let input = std::fs::File::open(&path).map_err(|e| EvalError::io(&path, e))?;
        let mut out = create_output_file(&target)?;

        for (index, line) in byte_lines(BufReader::new(input)).enumerate() {
            let bytes = line.map_err(|e| EvalError::io(&path, e))?;
            if bytes.is_empty() {
                continue;
            }
            let line_no = Some(index + 1);
            let object = match self.parser.parse(&bytes, &path, line_no)? {
                Some(Value::Object(map)) => map,
                Some(_) => {
                    self.parser.reject(EvalError::NotAnObject {
                        path: path.clone(),
                        line: line_no,
                    })?;
                    continue;
                }
                None => continue,
            };
            let flat = Value::Object(flatten(object));
            write_line(&mut out, &serde_json::to_vec(&flat)?, &target)?;
        }
        out.flush().map_err(|e| EvalError::io(&target, e))
    }
}

/// Expands dotted keys of every line-delimited object into nested objects.
pub struct FlattenRun {
    config: RunConfig,
}

impl FlattenRun {
    pub fn new(config: RunConfig) -> Result<Self> {
        config.validate()?;
        Ok(FlattenRun { config })
    }

    pub async fn execute(self) -> Result<RunReport> {
        let config = self.config;
        let dispatcher = Dispatcher::new(config.concurrency)?;
        info!(
            "flattening {} into {}",
            config.input.display(),
            config.output.display()
        );

        let processor = Arc::new(FlattenProcessor {
            input_root: config.input.clone(),
            output_root: config.output.clone(),
            parser: RecordParser::new(config.invalid_records),
        });
        let dispatched = dispatcher.run(&config.input, Arc::clone(&processor)).await?;
        Ok(RunReport::new(dispatched, processor.parser.skipped()))
    }
}
