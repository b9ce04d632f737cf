use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};
use jsonsieve_eval::{
    ArrayMatch, DEFAULT_CONCURRENCY, DEFAULT_LABEL, FlattenRun, InvalidRecordPolicy, ReplaceConfig,
    ReplaceRun, RunConfig, RunReport, SelectConfig, SelectRun,
};
use jsonsieve_rules::{
    ReplaceKind, ReplaceRuleSet, SelectRuleSet, load_replace_rules, load_select_rules,
};
use log::info;

#[derive(Parser)]
#[command(name = "jsonsieve")]
#[command(about = "Route, redact, and flatten line-delimited JSON records with declarative rules")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Route every record to the output file of the first matching rule
    ///
    /// The output path is a directory. It receives one file per rule output
    /// plus `default` (no rule matched) and `drop`. Records are copied
    /// verbatim, one per line.
    Select {
        #[command(flatten)]
        io: IoArgs,

        /// Selection rule file (JSON, or YAML with a .yml/.yaml extension)
        #[arg(short, long)]
        rules: PathBuf,

        /// Let the first candidate element of an array decide a condition
        /// instead of trying every element
        #[arg(long)]
        first_array_element: bool,

        /// Output label for records that match no rule
        #[arg(long, default_value = DEFAULT_LABEL)]
        fallback: String,
    },

    /// Rewrite fields of every record and write it to the mirrored output path
    Replace {
        #[command(flatten)]
        io: IoArgs,

        /// Replacement rule file (JSON, or YAML with a .yml/.yaml extension)
        #[arg(short, long)]
        rules: PathBuf,

        /// Treat each input file as one JSON value per line
        #[arg(short, long)]
        line_by_line: bool,
    },

    /// Expand dotted top-level keys of every record into nested objects
    Flatten {
        #[command(flatten)]
        io: IoArgs,
    },

    /// Load a rule file and report what it contains
    Check {
        /// Path to the rule file
        #[arg(short, long)]
        rules: PathBuf,

        /// Which rule family the file holds
        #[arg(short, long, value_enum)]
        kind: RuleKind,
    },
}

#[derive(Args)]
struct IoArgs {
    /// Input file or directory
    #[arg(short, long)]
    input: PathBuf,

    /// Output file or directory
    #[arg(short, long)]
    output: PathBuf,

    /// Maximum number of records or files processed at the same time
    #[arg(short = 'n', long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Log and skip records that are not valid JSON instead of aborting
    #[arg(long)]
    skip_invalid: bool,
}

impl IoArgs {
    fn run_config(&self) -> RunConfig {
        let policy = if self.skip_invalid {
            InvalidRecordPolicy::Skip
        } else {
            InvalidRecordPolicy::Abort
        };
        RunConfig::new(&self.input, &self.output)
            .with_concurrency(self.concurrency)
            .with_invalid_records(policy)
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum RuleKind {
    Select,
    Replace,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Select {
            io,
            rules,
            first_array_element,
            fallback,
        } => cmd_select(io, rules, first_array_element, fallback).await,
        Commands::Replace {
            io,
            rules,
            line_by_line,
        } => cmd_replace(io, rules, line_by_line).await,
        Commands::Flatten { io } => cmd_flatten(io).await,
        Commands::Check { rules, kind } => cmd_check(rules, kind),
    }
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

async fn cmd_select(io: IoArgs, rules_path: PathBuf, first_array_element: bool, fallback: String) {
    let rules = load_select(&rules_path);

    let mut config = SelectConfig::new(io.run_config());
    config.fallback_label = fallback;
    if first_array_element {
        config.array_match = ArrayMatch::First;
    }

    let run = SelectRun::new(config, &rules).unwrap_or_else(|e| fail(e));
    let report = run.execute().await.unwrap_or_else(|e| fail(e));
    print_summary(&report, "record(s)");
}

async fn cmd_replace(io: IoArgs, rules_path: PathBuf, line_by_line: bool) {
    let rules = load_replace(&rules_path);

    let mut config = ReplaceConfig::new(io.run_config());
    config.line_by_line = line_by_line;

    let run = ReplaceRun::new(config, &rules).unwrap_or_else(|e| fail(e));
    let report = run.execute().await.unwrap_or_else(|e| fail(e));
    print_summary(&report, "file(s)");
}

async fn cmd_flatten(io: IoArgs) {
    let run = FlattenRun::new(io.run_config()).unwrap_or_else(|e| fail(e));
    let report = run.execute().await.unwrap_or_else(|e| fail(e));
    print_summary(&report, "file(s)");
}

fn cmd_check(rules_path: PathBuf, kind: RuleKind) {
    match kind {
        RuleKind::Select => {
            let rules = load_select(&rules_path);
            println!(
                "Loaded {} selection rule(s) from {}",
                rules.len(),
                rules_path.display()
            );
            for rule in rules.iter() {
                println!(
                    "  position {:>4}  -> {:<20} {} condition(s)",
                    rule.position,
                    rule.output,
                    rule.conditions.len()
                );
            }
            println!("  Outputs: {}", rules.outputs().join(", "));
        }
        RuleKind::Replace => {
            let rules = load_replace(&rules_path);
            let count = |kind: ReplaceKind| rules.iter().filter(|r| r.kind == kind).count();
            println!(
                "Loaded {} replacement rule(s) from {}",
                rules.len(),
                rules_path.display()
            );
            println!("  Per-field: {}", count(ReplaceKind::PerField));
            println!("  Global:    {}", count(ReplaceKind::Global));
            println!("  Timestamp: {}", count(ReplaceKind::Timestamp));
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_select(path: &Path) -> SelectRuleSet {
    let rules = load_select_rules(path).unwrap_or_else(|e| {
        fail(format!("cannot load rules from {}: {e}", path.display()))
    });
    info!("loaded {} selection rule(s) from {}", rules.len(), path.display());
    rules
}

fn load_replace(path: &Path) -> ReplaceRuleSet {
    let rules = load_replace_rules(path).unwrap_or_else(|e| {
        fail(format!("cannot load rules from {}: {e}", path.display()))
    });
    info!("loaded {} replacement rule(s) from {}", rules.len(), path.display());
    rules
}

fn print_summary(report: &RunReport, unit: &str) {
    eprintln!(
        "Processed {} {unit} in {:.4} second(s)",
        report.units,
        report.elapsed.as_secs_f64()
    );
    if report.skipped > 0 {
        eprintln!("Skipped {} invalid record(s)", report.skipped);
    }
}

fn fail(err: impl Display) -> ! {
    eprintln!("Error: {err}");
    process::exit(1);
}
