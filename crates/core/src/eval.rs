//! The recursive DSL evaluator.
//!
//! `evaluate` walks an expression tree, threading an [`EvalContext`] by
//! value. XPath queries run against the context node, so `map` (and the
//! per-node validation driver in the rule engine) can rebind it and have
//! relative paths resolve per node. The walk is strictly sequential and
//! holds no state beyond the context it is handed.

use crate::expr::{Arg, Expr, Op};
use crate::value::{CoercionError, CompareError, DataType, Value};
use inquest_xpath1::{self as xpath, SourceNode, XPathError, XPathValue};
use std::cmp::Ordering;
use thiserror::Error;

/// Errors local to one expression evaluation. The rule engine recovers every
/// variant into a failed (or missing) outcome; none of them aborts the run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error(transparent)]
    XPath(#[from] XPathError),

    #[error(transparent)]
    Coercion(#[from] CoercionError),

    #[error(transparent)]
    Compare(#[from] CompareError),

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer arithmetic overflow")]
    Overflow,

    #[error("average of an empty selection (division by zero)")]
    EmptyAverage,

    #[error("'{op}' requires an XPath but carries neither 'xpath' nor 'xpath_expression'")]
    MissingXPath { op: &'static str },

    #[error("dynamic XPath evaluated to an empty string")]
    EmptyDynamicXPath,

    #[error("'{op}' expects {expected}")]
    BadArgs { op: &'static str, expected: &'static str },

    #[error("'{op}' selected a {got} where a node-set was required")]
    NotANodeSet { op: &'static str, got: &'static str },

    #[error("cannot sum non-numeric text '{text}'")]
    NonNumericNode { text: String },

    #[error("'sum' over arguments expects a list, got {got}")]
    NotAList { got: &'static str },
}

/// Evaluation state: the document root plus the current context node.
/// Copied, never shared; only `map` and per-node validation rebind `node`.
pub struct EvalContext<'a, N: SourceNode<'a>> {
    pub root: N,
    pub node: N,
    _marker: std::marker::PhantomData<&'a ()>,
}

impl<'a, N: SourceNode<'a>> Clone for EvalContext<'a, N> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<'a, N: SourceNode<'a>> Copy for EvalContext<'a, N> {}

impl<'a, N: SourceNode<'a>> EvalContext<'a, N> {
    pub fn new(root: N) -> Self {
        EvalContext { root, node: root, _marker: std::marker::PhantomData }
    }

    /// The same document with the context node rebound.
    pub fn with_node(&self, node: N) -> Self {
        EvalContext { root: self.root, node, _marker: std::marker::PhantomData }
    }
}

/// Evaluates `expr` in `ctx`, producing a [`Value`] or a recoverable error.
pub fn evaluate<'a, N>(expr: &Expr, ctx: EvalContext<'a, N>) -> Result<Value, EvalError>
where
    N: SourceNode<'a> + 'a,
{
    match expr.op {
        Op::Literal => op_literal(expr),
        Op::Value => op_value(expr, ctx),
        Op::Count => op_count(expr, ctx),
        Op::Sum => op_sum(expr, ctx).map(|(total, _)| total),
        Op::Average => op_average(expr, ctx),
        Op::Add | Op::Subtract | Op::Multiply | Op::Divide => op_arithmetic(expr, ctx),
        Op::Concat => op_concat(expr, ctx),
        Op::And => op_and(expr, ctx),
        Op::Or => op_or(expr, ctx),
        Op::Not => op_not(expr, ctx),
        Op::If => op_if(expr, ctx),
        Op::Eq | Op::Ne => op_equality(expr, ctx),
        Op::Gt | Op::Lt | Op::Ge | Op::Le => op_relational(expr, ctx),
        Op::Map => op_map(expr, ctx),
    }
}

fn eval_arg<'a, N>(arg: &Arg, ctx: EvalContext<'a, N>) -> Result<Value, EvalError>
where
    N: SourceNode<'a> + 'a,
{
    match arg {
        Arg::Expr(expr) => evaluate(expr, ctx),
        Arg::Literal(value) => Ok(value.clone()),
    }
}

/// Resolves the XPath string of an expression: the static `xpath` field, or
/// the rendered result of `xpath_expression` evaluated with the CURRENT
/// context node (which is what lets `map` bodies build node-relative paths).
fn xpath_string<'a, N>(expr: &Expr, ctx: EvalContext<'a, N>) -> Result<String, EvalError>
where
    N: SourceNode<'a> + 'a,
{
    if let Some(xpath) = &expr.xpath {
        return Ok(xpath.clone());
    }
    if let Some(dynamic) = &expr.xpath_expression {
        let rendered = evaluate(dynamic, ctx)?.render();
        if rendered.trim().is_empty() {
            return Err(EvalError::EmptyDynamicXPath);
        }
        log::debug!("dynamic XPath resolved to: {rendered}");
        return Ok(rendered);
    }
    Err(EvalError::MissingXPath { op: expr.op.as_str() })
}

fn query<'a, N>(expr: &Expr, ctx: EvalContext<'a, N>) -> Result<XPathValue<N>, EvalError>
where
    N: SourceNode<'a> + 'a,
{
    let xpath = xpath_string(expr, ctx)?;
    Ok(xpath::eval_str(&xpath, ctx.node, ctx.root)?)
}

fn query_nodes<'a, N>(expr: &Expr, ctx: EvalContext<'a, N>) -> Result<Vec<N>, EvalError>
where
    N: SourceNode<'a> + 'a,
{
    match query(expr, ctx)? {
        XPathValue::Nodes(nodes) => Ok(nodes),
        XPathValue::Str(_) => Err(EvalError::NotANodeSet { op: expr.op.as_str(), got: "string" }),
        XPathValue::Num(_) => Err(EvalError::NotANodeSet { op: expr.op.as_str(), got: "number" }),
        XPathValue::Bool(_) => {
            Err(EvalError::NotANodeSet { op: expr.op.as_str(), got: "boolean" })
        }
    }
}

fn coerce_hint(value: Value, hint: Option<DataType>) -> Result<Value, EvalError> {
    match hint {
        Some(ty) => Ok(value.coerce(ty)?),
        None => Ok(value),
    }
}

fn op_literal(expr: &Expr) -> Result<Value, EvalError> {
    let value = expr
        .literal_value
        .clone()
        .ok_or(EvalError::BadArgs { op: "literal", expected: "a 'literal_value'" })?;
    coerce_hint(value, expr.data_type)
}

/// First matching node (document order), as its trimmed string value, then
/// coerced by `data_type`. Scalar XPath results pass through. No match is
/// `Null`, not an error; the rule layer decides whether that means missing.
fn op_value<'a, N>(expr: &Expr, ctx: EvalContext<'a, N>) -> Result<Value, EvalError>
where
    N: SourceNode<'a> + 'a,
{
    let raw = match query(expr, ctx)? {
        XPathValue::Nodes(nodes) => match nodes.first() {
            Some(node) => Value::Str(node.string_value().trim().to_string()),
            None => return Ok(Value::Null),
        },
        XPathValue::Str(s) => Value::Str(s),
        XPathValue::Num(n) => Value::Dec(n),
        XPathValue::Bool(b) => Value::Bool(b),
    };
    coerce_hint(raw, expr.data_type)
}

fn op_count<'a, N>(expr: &Expr, ctx: EvalContext<'a, N>) -> Result<Value, EvalError>
where
    N: SourceNode<'a> + 'a,
{
    Ok(Value::Int(query_nodes(expr, ctx)?.len() as i64))
}

/// Shared by `sum` and `average`; returns the total plus the element count.
fn op_sum<'a, N>(expr: &Expr, ctx: EvalContext<'a, N>) -> Result<(Value, usize), EvalError>
where
    N: SourceNode<'a> + 'a,
{
    if expr.xpath.is_some() || expr.xpath_expression.is_some() {
        let nodes = query_nodes(expr, ctx)?;
        let mut total = 0.0;
        for node in &nodes {
            let text = node.string_value().trim().to_string();
            let n: f64 = text
                .parse()
                .map_err(|_| EvalError::NonNumericNode { text: text.clone() })?;
            total += n;
        }
        return Ok((Value::Dec(total), nodes.len()));
    }

    let [arg] = expr.args.as_slice() else {
        return Err(EvalError::BadArgs {
            op: expr.op.as_str(),
            expected: "an XPath or exactly one list-producing argument",
        });
    };
    let value = eval_arg(arg, ctx)?;
    let Value::List(items) = value else {
        return Err(EvalError::NotAList { got: value.type_name() });
    };

    let mut all_int = true;
    let mut int_total: i64 = 0;
    let mut total = 0.0;
    for item in &items {
        match item {
            Value::Int(n) => {
                total += *n as f64;
                if all_int {
                    int_total = int_total.checked_add(*n).ok_or(EvalError::Overflow)?;
                }
            }
            Value::Dec(n) => {
                total += n;
                all_int = false;
            }
            other => {
                return Err(EvalError::NonNumericNode { text: other.render() });
            }
        }
    }
    let value = if all_int && !items.is_empty() {
        Value::Int(int_total)
    } else {
        Value::Dec(total)
    };
    Ok((value, items.len()))
}

fn op_average<'a, N>(expr: &Expr, ctx: EvalContext<'a, N>) -> Result<Value, EvalError>
where
    N: SourceNode<'a> + 'a,
{
    let (total, count) = op_sum(expr, ctx)?;
    if count == 0 {
        return Err(EvalError::EmptyAverage);
    }
    let total = total.as_number().unwrap_or(0.0);
    Ok(Value::Dec(total / count as f64))
}

fn two_args<'a, N>(
    expr: &Expr,
    ctx: EvalContext<'a, N>,
    expected: &'static str,
) -> Result<(Value, Value), EvalError>
where
    N: SourceNode<'a> + 'a,
{
    let [lhs, rhs] = expr.args.as_slice() else {
        return Err(EvalError::BadArgs { op: expr.op.as_str(), expected });
    };
    Ok((eval_arg(lhs, ctx)?, eval_arg(rhs, ctx)?))
}

/// Binary numeric operators. Integer pairs stay integral (checked) except
/// for division, which always yields a decimal.
fn op_arithmetic<'a, N>(expr: &Expr, ctx: EvalContext<'a, N>) -> Result<Value, EvalError>
where
    N: SourceNode<'a> + 'a,
{
    let (lhs, rhs) = two_args(expr, ctx, "exactly two numeric arguments")?;

    if let (Value::Int(l), Value::Int(r)) = (&lhs, &rhs) {
        match expr.op {
            Op::Add => return l.checked_add(*r).map(Value::Int).ok_or(EvalError::Overflow),
            Op::Subtract => return l.checked_sub(*r).map(Value::Int).ok_or(EvalError::Overflow),
            Op::Multiply => return l.checked_mul(*r).map(Value::Int).ok_or(EvalError::Overflow),
            _ => {} // divide falls through to the decimal path
        }
    }

    let l = lhs.coerce(DataType::Decimal)?.as_number().unwrap_or(f64::NAN);
    let r = rhs.coerce(DataType::Decimal)?.as_number().unwrap_or(f64::NAN);
    let result = match expr.op {
        Op::Add => l + r,
        Op::Subtract => l - r,
        Op::Multiply => l * r,
        Op::Divide => {
            if r == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            l / r
        }
        _ => unreachable!("non-arithmetic op dispatched to op_arithmetic"),
    };
    Ok(Value::Dec(result))
}

fn op_concat<'a, N>(expr: &Expr, ctx: EvalContext<'a, N>) -> Result<Value, EvalError>
where
    N: SourceNode<'a> + 'a,
{
    let mut out = String::new();
    for arg in &expr.args {
        out.push_str(&eval_arg(arg, ctx)?.render());
    }
    Ok(Value::Str(out))
}

fn op_and<'a, N>(expr: &Expr, ctx: EvalContext<'a, N>) -> Result<Value, EvalError>
where
    N: SourceNode<'a> + 'a,
{
    for arg in &expr.args {
        if !eval_arg(arg, ctx)?.truthy() {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

fn op_or<'a, N>(expr: &Expr, ctx: EvalContext<'a, N>) -> Result<Value, EvalError>
where
    N: SourceNode<'a> + 'a,
{
    for arg in &expr.args {
        if eval_arg(arg, ctx)?.truthy() {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

fn op_not<'a, N>(expr: &Expr, ctx: EvalContext<'a, N>) -> Result<Value, EvalError>
where
    N: SourceNode<'a> + 'a,
{
    let [arg] = expr.args.as_slice() else {
        return Err(EvalError::BadArgs { op: "not", expected: "exactly one argument" });
    };
    Ok(Value::Bool(!eval_arg(arg, ctx)?.truthy()))
}

fn op_if<'a, N>(expr: &Expr, ctx: EvalContext<'a, N>) -> Result<Value, EvalError>
where
    N: SourceNode<'a> + 'a,
{
    let [cond, then_arg, else_arg] = expr.args.as_slice() else {
        return Err(EvalError::BadArgs {
            op: "if",
            expected: "exactly three arguments (condition, then, else)",
        });
    };
    // Only the taken branch is evaluated.
    if eval_arg(cond, ctx)?.truthy() {
        eval_arg(then_arg, ctx)
    } else {
        eval_arg(else_arg, ctx)
    }
}

fn op_equality<'a, N>(expr: &Expr, ctx: EvalContext<'a, N>) -> Result<Value, EvalError>
where
    N: SourceNode<'a> + 'a,
{
    let (lhs, rhs) = two_args(expr, ctx, "exactly two arguments")?;
    let equal = lhs == rhs;
    Ok(Value::Bool(if expr.op == Op::Eq { equal } else { !equal }))
}

fn op_relational<'a, N>(expr: &Expr, ctx: EvalContext<'a, N>) -> Result<Value, EvalError>
where
    N: SourceNode<'a> + 'a,
{
    let (lhs, rhs) = two_args(expr, ctx, "exactly two arguments")?;
    let ordering = lhs.compare(&rhs)?;
    let pass = match expr.op {
        Op::Gt => ordering == Ordering::Greater,
        Op::Lt => ordering == Ordering::Less,
        Op::Ge => ordering != Ordering::Less,
        Op::Le => ordering != Ordering::Greater,
        _ => unreachable!("non-relational op dispatched to op_relational"),
    };
    Ok(Value::Bool(pass))
}

/// Selects nodes, rebinds the context node per selected node (document
/// order), and collects the inner results. An inner failure propagates, so
/// the produced list length always equals the selection size.
fn op_map<'a, N>(expr: &Expr, ctx: EvalContext<'a, N>) -> Result<Value, EvalError>
where
    N: SourceNode<'a> + 'a,
{
    let inner = expr
        .inner_expression
        .as_deref()
        .ok_or(EvalError::BadArgs { op: "map", expected: "an 'inner_expression'" })?;

    let nodes = query_nodes(expr, ctx)?;
    log::debug!("map selected {} node(s)", nodes.len());

    let mut results = Vec::with_capacity(nodes.len());
    for node in nodes {
        results.push(evaluate(inner, ctx.with_node(node))?);
    }
    Ok(Value::List(results))
}
