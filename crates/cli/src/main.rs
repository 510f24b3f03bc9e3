//! `inquest`: rule-driven quality assurance for XML files.

mod output;

use clap::{Parser, Subcommand};
use inquest_core::{InspectOptions, Inspector, RuleSet};
use output::Format;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "inquest", version, about = "Validate XML files against declarative rule documents")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Inspect XML files against a rule document
    Inspect {
        /// XML file to inspect (repeatable)
        #[arg(short = 'x', long = "xml", required = true)]
        xml: Vec<PathBuf>,

        /// Rule document (JSON)
        #[arg(short, long)]
        rules: PathBuf,

        /// Where to write the report
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Report format
        #[arg(short, long, value_enum, default_value = "json")]
        format: Format,
    },
    /// Validate a rule document's structure without inspecting anything
    Validate {
        /// Rule document (JSON)
        #[arg(short, long)]
        rules: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, String> {
    match cli.command {
        Command::Inspect { xml, rules, output, format } => inspect(xml, rules, output, format),
        Command::Validate { rules } => validate(rules),
    }
}

fn inspect(
    xml: Vec<PathBuf>,
    rules: PathBuf,
    output: Option<PathBuf>,
    format: Format,
) -> Result<ExitCode, String> {
    let inspector = Inspector::new();
    let options = InspectOptions { xml_files: xml, rules_file: rules };
    let report = inspector.inspect(&options).map_err(|e| e.to_string())?;

    println!("Summary:");
    println!("  Total:   {}", report.summary.total);
    println!("  Passed:  {}", report.summary.passed);
    println!("  Failed:  {}", report.summary.failed);
    println!("  Missing: {}", report.summary.missing);

    if let Some(path) = output {
        output::write_report(&report, &path, format)
            .map_err(|e| format!("cannot write report to {}: {e}", path.display()))?;
        println!("Report written to {}", path.display());
    }

    Ok(if report.all_passed() {
        println!("All checks passed.");
        ExitCode::SUCCESS
    } else {
        println!("Issues found; see the report for details.");
        ExitCode::FAILURE
    })
}

fn validate(rules: PathBuf) -> Result<ExitCode, String> {
    let rule_set = Inspector::new()
        .load_rule_document(&rules)
        .map_err(|e| e.to_string())?;

    println!("Rule document is valid.");
    println!("  Rules: {}", rule_set.len());
    for (kind, count) in kind_counts(&rule_set) {
        println!("    {kind}: {count}");
    }
    Ok(ExitCode::SUCCESS)
}

fn kind_counts(rules: &RuleSet) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for rule in &rules.rules {
        *counts.entry(rule.kind.name()).or_insert(0) += 1;
    }
    counts
}
