//! The inspection pipeline: rule document in, report out.

use crate::engine;
use crate::loader::{self, LoadError};
use crate::report::{self, Report};
use crate::rules::RuleSet;
use crate::xml::XmlDocument;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that abort a whole inspection run (rule failures never do; they
/// become outcomes).
#[derive(Error, Debug)]
pub enum InspectError {
    #[error("failed to load rule document: {0}")]
    Load(#[from] LoadError),

    #[error("cannot read {path}: {source}")]
    Io { path: String, source: std::io::Error },

    #[error("invalid XML in {path}: {source}")]
    Xml { path: String, source: roxmltree::Error },
}

/// What to validate.
#[derive(Debug, Clone)]
pub struct InspectOptions {
    pub xml_files: Vec<PathBuf>,
    pub rules_file: PathBuf,
}

/// Ties the loader, rule engine, and report assembler together.
#[derive(Debug, Default)]
pub struct Inspector;

impl Inspector {
    pub fn new() -> Inspector {
        Inspector
    }

    /// Loads the rule document, validates every XML file against it, and
    /// assembles the report. Files are validated in parallel; outcomes keep
    /// input-file order, and rule-document order within each file.
    pub fn inspect(&self, options: &InspectOptions) -> Result<Report, InspectError> {
        let rules = self.load_rule_document(&options.rules_file)?;

        let per_file: Vec<Vec<_>> = options
            .xml_files
            .par_iter()
            .map(|path| validate_file(&rules, path))
            .collect::<Result<_, _>>()?;

        let results = per_file.into_iter().flatten().collect();
        Ok(report::assemble(
            results,
            options.xml_files.iter().map(|p| display(p)).collect(),
            vec![display(&options.rules_file)],
        ))
    }

    /// Parses and compiles a rule document without running anything;
    /// structure validation only.
    pub fn load_rule_document(&self, path: &Path) -> Result<RuleSet, InspectError> {
        let text = read(path)?;
        Ok(loader::parse_rules(&text)?)
    }
}

/// Each worker owns its document: the file is read and parsed here, the
/// borrowing XmlDocument lives only for this file's rules, and nothing is
/// shared mutably across threads.
fn validate_file(
    rules: &RuleSet,
    path: &PathBuf,
) -> Result<Vec<crate::rules::RuleOutcome>, InspectError> {
    let file_path = display(path);
    log::info!("validating {file_path}");
    let text = read(path)?;
    let doc = XmlDocument::parse(&text)
        .map_err(|source| InspectError::Xml { path: file_path.clone(), source })?;
    Ok(engine::run_rules(rules, doc.root(), &file_path))
}

fn read(path: &Path) -> Result<String, InspectError> {
    std::fs::read_to_string(path)
        .map_err(|source| InspectError::Io { path: display(path), source })
}

fn display(path: &Path) -> String {
    path.display().to_string()
}
