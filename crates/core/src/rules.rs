//! Compiled validation rules and their outcomes.

use crate::expr::Expr;
use crate::value::{DataType, Value};
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pass,
    Fail,
    Missing,
}

/// The six comparison operators shared by `comparison`,
/// `computedComparison`, and `nodeValidation` rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl CmpOp {
    pub fn parse(tag: &str) -> Option<CmpOp> {
        Some(match tag {
            "==" => CmpOp::Eq,
            "!=" => CmpOp::Ne,
            ">" => CmpOp::Gt,
            "<" => CmpOp::Lt,
            ">=" => CmpOp::Ge,
            "<=" => CmpOp::Le,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Gt => ">",
            CmpOp::Lt => "<",
            CmpOp::Ge => ">=",
            CmpOp::Le => "<=",
        }
    }
}

/// Gate that decides whether a rule applies to a document at all.
#[derive(Debug, Clone)]
pub enum Condition {
    Exists { xpath: String },
    AttributeEquals { xpath: String, attribute: String, value: String },
}

/// The comparison payload of a `computedComparison` rule.
#[derive(Debug, Clone)]
pub enum Comparison {
    Binary { operator: CmpOp, left: Expr, right: Expr },
    Between { left: Expr, lower: Expr, upper: Expr },
}

/// Expected value source for a `nodeValidation` rule: a fixed literal, or an
/// expression evaluated per node with the same rebound context.
#[derive(Debug, Clone)]
pub enum Expected {
    Literal(Value),
    Expression(Expr),
}

/// Kind-specific rule payload. Closed set; the engine dispatches with one
/// match.
#[derive(Debug, Clone)]
pub enum RuleKind {
    Existence {
        expression: Expr,
    },
    Pattern {
        expression: Expr,
        pattern: Regex,
    },
    Range {
        expression: Expr,
        min: Value,
        max: Value,
        data_type: DataType,
    },
    Comparison {
        expression: Expr,
        operator: CmpOp,
        value: Value,
    },
    ComputedComparison {
        comparison: Comparison,
    },
    NodeValidation {
        nodes_xpath: String,
        value_expression: Expr,
        operator: CmpOp,
        expected: Expected,
    },
}

impl RuleKind {
    pub fn name(&self) -> &'static str {
        match self {
            RuleKind::Existence { .. } => "existence",
            RuleKind::Pattern { .. } => "pattern",
            RuleKind::Range { .. } => "range",
            RuleKind::Comparison { .. } => "comparison",
            RuleKind::ComputedComparison { .. } => "computedComparison",
            RuleKind::NodeValidation { .. } => "nodeValidation",
        }
    }
}

/// A compiled validation rule. Built once by the loader, read-only after.
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub description: String,
    pub severity: Severity,
    pub conditions: Vec<Condition>,
    pub kind: RuleKind,
}

/// An entire compiled rule document, shareable by reference across workers.
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
}

impl RuleSet {
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Result of checking one selected node in a `nodeValidation` rule.
#[derive(Debug, Clone, Serialize)]
pub struct NodeOutcome {
    pub node_index: usize,
    /// Absolute indexed path of the node, for pinpointing failures.
    pub node_xpath: String,
    pub actual_value: Value,
    pub expected_value: Value,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Result of running one rule against one file.
#[derive(Debug, Clone, Serialize)]
pub struct RuleOutcome {
    pub rule_id: String,
    pub file_path: String,
    pub status: Status,
    pub returned_value: Value,
    pub expected_value: Option<Value>,
    pub message: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_results: Option<Vec<NodeOutcome>>,
}
