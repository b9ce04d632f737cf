#![allow(dead_code)]

use std::path::{Path, PathBuf};

use jsonsieve_rules::{
    ReplaceRuleSet, RuleFormat, SelectRuleSet, parse_replace_rules, parse_select_rules,
};
use serde_json::Value;
use tempfile::TempDir;

pub fn select_rules(json: &str) -> SelectRuleSet {
    parse_select_rules(json, RuleFormat::Json).unwrap()
}

pub fn replace_rules(json: &str) -> ReplaceRuleSet {
    parse_replace_rules(json, RuleFormat::Json).unwrap()
}

/// A scratch area with an `in/` tree and a sibling `out/` path.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new(files: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("in")).unwrap();
        let ws = Workspace { dir };
        for (name, body) in files {
            ws.write(name, body);
        }
        ws
    }

    pub fn write(&self, name: &str, body: &str) {
        let path = self.input().join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    pub fn input(&self) -> PathBuf {
        self.dir.path().join("in")
    }

    pub fn output(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    pub fn read_output(&self, name: &str) -> String {
        read(&self.output().join(name))
    }

    /// Non-empty lines of an output file, sorted (worker order is not fixed).
    pub fn output_lines(&self, name: &str) -> Vec<String> {
        let mut lines: Vec<String> = self
            .read_output(name)
            .lines()
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        lines.sort();
        lines
    }

    pub fn output_values(&self, name: &str) -> Vec<Value> {
        self.read_output(name)
            .lines()
            .filter(|l| !l.is_empty())
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }
}

pub fn read(path: &Path) -> String {
    std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
}
