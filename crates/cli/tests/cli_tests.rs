//! End-to-end tests of the `inquest` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const RULES: &str = r#"{
    "validationSettings": [
        {
            "id": "has-items",
            "description": "at least one item",
            "type": "existence",
            "severity": "error",
            "expression": {"op": "count", "xpath": "//item"}
        }
    ]
}"#;

fn cmd() -> Command {
    Command::cargo_bin("inquest").unwrap()
}

#[test]
fn passing_inspection_exits_zero() {
    let dir = TempDir::new().unwrap();
    let rules = dir.path().join("rules.json");
    let xml = dir.path().join("data.xml");
    fs::write(&rules, RULES).unwrap();
    fs::write(&xml, "<root><item/></root>").unwrap();

    cmd()
        .arg("inspect")
        .arg("--xml")
        .arg(&xml)
        .arg("--rules")
        .arg(&rules)
        .assert()
        .success()
        .stdout(predicate::str::contains("Passed:  1"))
        .stdout(predicate::str::contains("All checks passed."));
}

#[test]
fn failing_inspection_exits_nonzero_and_writes_report() {
    let dir = TempDir::new().unwrap();
    let rules = dir.path().join("rules.json");
    let xml = dir.path().join("data.xml");
    let report = dir.path().join("out").join("report.json");
    fs::write(&rules, RULES).unwrap();
    fs::write(&xml, "<root/>").unwrap();

    cmd()
        .arg("inspect")
        .arg("--xml")
        .arg(&xml)
        .arg("--rules")
        .arg(&rules)
        .arg("--output")
        .arg(&report)
        .assert()
        .failure()
        .stdout(predicate::str::contains("Failed:  1"));

    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(written["summary"]["failed"], 1);
    assert_eq!(written["results"][0]["rule_id"], "has-items");
}

#[test]
fn html_report_is_written() {
    let dir = TempDir::new().unwrap();
    let rules = dir.path().join("rules.json");
    let xml = dir.path().join("data.xml");
    let report = dir.path().join("report.html");
    fs::write(&rules, RULES).unwrap();
    fs::write(&xml, "<root><item/></root>").unwrap();

    cmd()
        .arg("inspect")
        .arg("--xml")
        .arg(&xml)
        .arg("--rules")
        .arg(&rules)
        .arg("--output")
        .arg(&report)
        .arg("--format")
        .arg("html")
        .assert()
        .success();

    let html = fs::read_to_string(&report).unwrap();
    assert!(html.contains("<!DOCTYPE html>"));
    assert!(html.contains("has-items"));
}

#[test]
fn validate_reports_rule_counts() {
    let dir = TempDir::new().unwrap();
    let rules = dir.path().join("rules.json");
    fs::write(&rules, RULES).unwrap();

    cmd()
        .arg("validate")
        .arg("--rules")
        .arg(&rules)
        .assert()
        .success()
        .stdout(predicate::str::contains("Rules: 1"))
        .stdout(predicate::str::contains("existence: 1"));
}

#[test]
fn broken_rule_document_is_a_hard_error() {
    let dir = TempDir::new().unwrap();
    let rules = dir.path().join("rules.json");
    fs::write(&rules, "{not json").unwrap();

    cmd()
        .arg("validate")
        .arg("--rules")
        .arg(&rules)
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn missing_xml_argument_is_a_usage_error() {
    cmd().arg("inspect").assert().failure();
}
