//! Report writers: pretty JSON and a static HTML page.

use inquest_core::{Report, RuleOutcome, Status};
use std::fmt::Write as _;
use std::io;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    Json,
    Html,
}

/// Writes the report to `path`, creating parent directories as needed.
pub fn write_report(report: &Report, path: &Path, format: Format) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let content = match format {
        Format::Json => render_json(report)?,
        Format::Html => render_html(report),
    };
    std::fs::write(path, content)
}

pub fn render_json(report: &Report) -> io::Result<String> {
    serde_json::to_string_pretty(report).map_err(io::Error::other)
}

/// A self-contained HTML page: header, summary counts, then failed /
/// missing / passed sections.
pub fn render_html(report: &Report) -> String {
    let mut failed = Vec::new();
    let mut missing = Vec::new();
    let mut passed = Vec::new();
    for result in &report.results {
        match result.status {
            Status::Fail => failed.push(result),
            Status::Missing => missing.push(result),
            Status::Pass => passed.push(result),
        }
    }

    let mut html = String::new();
    html.push_str(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n\
         <title>XML Validation Report</title>\n<style>\n\
         body { font-family: sans-serif; margin: 20px; line-height: 1.5; }\n\
         .summary { background: #f5f5f5; padding: 12px; border-radius: 5px; }\n\
         .summary span { margin-right: 18px; font-weight: bold; }\n\
         .pass { color: #28a745; }\n\
         .fail { color: #dc3545; }\n\
         .missing { color: #b8860b; }\n\
         .result { border: 1px solid #ddd; border-radius: 4px; padding: 10px; margin: 8px 0; }\n\
         .result-fail { border-left: 4px solid #dc3545; }\n\
         .result-missing { border-left: 4px solid #b8860b; }\n\
         .result-pass { border-left: 4px solid #28a745; }\n\
         .rule-id { font-weight: bold; }\n\
         .file { color: #666; font-style: italic; }\n\
         table.nodes { border-collapse: collapse; margin-top: 6px; }\n\
         table.nodes td, table.nodes th { border: 1px solid #ccc; padding: 2px 8px; }\n\
         </style>\n</head>\n<body>\n",
    );

    let _ = write!(
        html,
        "<h1>XML Validation Report</h1>\n\
         <p>Generated: {}</p>\n<p>Files: {}</p>\n<p>Rule documents: {}</p>\n\
         <div class=\"summary\"><span>Total: {}</span>\
         <span class=\"pass\">Passed: {}</span>\
         <span class=\"fail\">Failed: {}</span>\
         <span class=\"missing\">Missing: {}</span></div>\n",
        escape(&report.metadata.timestamp),
        escape(&report.metadata.xml_files.join(", ")),
        escape(&report.metadata.rule_documents.join(", ")),
        report.summary.total,
        report.summary.passed,
        report.summary.failed,
        report.summary.missing,
    );

    section(&mut html, "Failed", "fail", &failed);
    section(&mut html, "Missing", "missing", &missing);
    section(&mut html, "Passed", "pass", &passed);

    html.push_str("</body>\n</html>\n");
    html
}

fn section(html: &mut String, title: &str, class: &str, results: &[&RuleOutcome]) {
    if results.is_empty() {
        return;
    }
    let _ = write!(html, "<h2 class=\"{class}\">{title} ({})</h2>\n", results.len());
    for result in results {
        let _ = write!(
            html,
            "<div class=\"result result-{class}\">\
             <div class=\"rule-id\">{}</div>\
             <div class=\"file\">{}</div>\
             <div>Expected: {}</div>\
             <div>Actual: {}</div>\
             <div>{}</div>",
            escape(&result.rule_id),
            escape(&result.file_path),
            escape(
                &result
                    .expected_value
                    .as_ref()
                    .map(|v| v.render())
                    .unwrap_or_else(|| "N/A".to_string())
            ),
            escape(&result.returned_value.render()),
            escape(&result.message),
        );
        if let Some(nodes) = &result.node_results {
            html.push_str(
                "<table class=\"nodes\"><tr><th>#</th><th>node</th>\
                 <th>actual</th><th>expected</th><th>status</th></tr>",
            );
            for node in nodes {
                let _ = write!(
                    html,
                    "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                    node.node_index,
                    escape(&node.node_xpath),
                    escape(&node.actual_value.render()),
                    escape(&node.expected_value.render()),
                    status_label(node.status),
                );
            }
            html.push_str("</table>");
        }
        html.push_str("</div>\n");
    }
}

fn status_label(status: Status) -> &'static str {
    match status {
        Status::Pass => "pass",
        Status::Fail => "fail",
        Status::Missing => "missing",
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use inquest_core::{report, Severity, Value};

    fn sample_report() -> Report {
        report::assemble(
            vec![RuleOutcome {
                rule_id: "check<1>".to_string(),
                file_path: "data.xml".to_string(),
                status: Status::Fail,
                returned_value: Value::Int(3),
                expected_value: Some(Value::Str("> 5".to_string())),
                message: "Failed: a & b".to_string(),
                severity: Severity::Error,
                node_results: None,
            }],
            vec!["data.xml".to_string()],
            vec!["rules.json".to_string()],
        )
    }

    #[test]
    fn html_escapes_user_text() {
        let html = render_html(&sample_report());
        assert!(html.contains("check&lt;1&gt;"));
        assert!(html.contains("Failed: a &amp; b"));
        assert!(!html.contains("check<1>"));
    }

    #[test]
    fn json_round_trips() {
        let json = render_json(&sample_report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["summary"]["failed"], 1);
        assert_eq!(value["results"][0]["rule_id"], "check<1>");
    }
}
