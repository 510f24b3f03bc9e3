//! Aggregation of rule outcomes into a serialisable report.

use crate::rules::{RuleOutcome, Status};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub missing: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Metadata {
    pub timestamp: String,
    pub xml_files: Vec<String>,
    pub rule_documents: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub summary: Summary,
    pub results: Vec<RuleOutcome>,
    pub metadata: Metadata,
}

impl Report {
    pub fn all_passed(&self) -> bool {
        self.summary.failed == 0 && self.summary.missing == 0
    }
}

/// Builds the report record. Each outcome counts once toward `total` and
/// once toward the bucket of its overall status; a nodeValidation outcome
/// contributes 1 regardless of how many nodes it covered.
pub fn assemble(
    results: Vec<RuleOutcome>,
    xml_files: Vec<String>,
    rule_documents: Vec<String>,
) -> Report {
    let summary = summarise(&results);
    Report {
        summary,
        results,
        metadata: Metadata {
            timestamp: chrono::Local::now().to_rfc3339(),
            xml_files,
            rule_documents,
        },
    }
}

fn summarise(results: &[RuleOutcome]) -> Summary {
    let bucket = |status: Status| results.iter().filter(|r| r.status == status).count();
    Summary {
        total: results.len(),
        passed: bucket(Status::Pass),
        failed: bucket(Status::Fail),
        missing: bucket(Status::Missing),
    }
}
