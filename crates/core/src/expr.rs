//! The DSL expression tree.
//!
//! Expressions are built once by the loader and never mutated. The operator
//! set is closed: evaluation is a single match over [`Op`], not a trait
//! hierarchy.

use crate::value::{DataType, Value};

/// Operator tags of the DSL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Literal,
    Value,
    Count,
    Sum,
    Average,
    Add,
    Subtract,
    Multiply,
    Divide,
    Concat,
    And,
    Or,
    Not,
    If,
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Map,
}

impl Op {
    pub fn parse(tag: &str) -> Option<Op> {
        Some(match tag {
            "literal" => Op::Literal,
            "value" => Op::Value,
            "count" => Op::Count,
            "sum" => Op::Sum,
            "average" => Op::Average,
            "add" => Op::Add,
            "subtract" => Op::Subtract,
            "multiply" => Op::Multiply,
            "divide" => Op::Divide,
            "concat" => Op::Concat,
            "and" => Op::And,
            "or" => Op::Or,
            "not" => Op::Not,
            "if" => Op::If,
            "==" => Op::Eq,
            "!=" => Op::Ne,
            ">" => Op::Gt,
            "<" => Op::Lt,
            ">=" => Op::Ge,
            "<=" => Op::Le,
            "map" => Op::Map,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Op::Literal => "literal",
            Op::Value => "value",
            Op::Count => "count",
            Op::Sum => "sum",
            Op::Average => "average",
            Op::Add => "add",
            Op::Subtract => "subtract",
            Op::Multiply => "multiply",
            Op::Divide => "divide",
            Op::Concat => "concat",
            Op::And => "and",
            Op::Or => "or",
            Op::Not => "not",
            Op::If => "if",
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::Gt => ">",
            Op::Lt => "<",
            Op::Ge => ">=",
            Op::Le => "<=",
            Op::Map => "map",
        }
    }

}

/// An argument slot: either a nested expression or an inline literal.
#[derive(Debug, Clone)]
pub enum Arg {
    Expr(Expr),
    Literal(Value),
}

/// One node of the expression tree. Which optional fields may be populated
/// is dictated by `op`; the loader enforces the combinations.
#[derive(Debug, Clone)]
pub struct Expr {
    pub op: Op,
    pub args: Vec<Arg>,
    /// Static XPath string. Mutually exclusive with `xpath_expression`.
    pub xpath: Option<String>,
    /// Expression producing the XPath string at evaluation time.
    pub xpath_expression: Option<Box<Expr>>,
    /// The per-node body of `map`.
    pub inner_expression: Option<Box<Expr>>,
    /// Payload of `literal`.
    pub literal_value: Option<Value>,
    /// Declared coercion for `value`/`literal` results.
    pub data_type: Option<DataType>,
}

impl Expr {
    pub fn new(op: Op) -> Expr {
        Expr {
            op,
            args: Vec::new(),
            xpath: None,
            xpath_expression: None,
            inner_expression: None,
            literal_value: None,
            data_type: None,
        }
    }

    /// A short human-readable label for diagnostics: the static XPath when
    /// there is one, `dynamic XPath` when computed, otherwise the operator.
    pub fn describe(&self) -> String {
        if let Some(xpath) = &self.xpath {
            xpath.clone()
        } else if self.xpath_expression.is_some() {
            "dynamic XPath".to_string()
        } else {
            format!("expression({})", self.op.as_str())
        }
    }
}
