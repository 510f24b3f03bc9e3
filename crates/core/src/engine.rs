//! The rule engine: runs compiled rules against one document.
//!
//! Every evaluation error is recovered locally into a failed outcome; a rule
//! can never abort the run. A `Null` result where a concrete value is
//! required becomes status `missing`, so reports can tell absent data from
//! wrong data.

use crate::eval::{evaluate, EvalContext, EvalError};
use crate::expr::Expr;
use crate::rules::{
    CmpOp, Comparison, Condition, Expected, NodeOutcome, Rule, RuleKind, RuleOutcome, RuleSet,
    Status,
};
use crate::value::{DataType, Value};
use inquest_xpath1::{absolute_path, eval_str, SourceNode, XPathValue};
use std::cmp::Ordering;

/// Runs every rule of `rules` against the document rooted at `root`, in
/// rule-document order. Rules whose conditions do not hold are skipped and
/// produce no outcome.
pub fn run_rules<'a, N>(rules: &RuleSet, root: N, file_path: &str) -> Vec<RuleOutcome>
where
    N: SourceNode<'a> + 'a,
{
    rules
        .rules
        .iter()
        .filter_map(|rule| evaluate_rule(rule, root, file_path))
        .collect()
}

/// Runs a single rule; `None` when its conditions gate it out.
pub fn evaluate_rule<'a, N>(rule: &Rule, root: N, file_path: &str) -> Option<RuleOutcome>
where
    N: SourceNode<'a> + 'a,
{
    if !rule.conditions.iter().all(|c| condition_holds(c, root)) {
        log::debug!("rule '{}' skipped: conditions not met", rule.id);
        return None;
    }

    let ctx = EvalContext::new(root);
    let outcome = match &rule.kind {
        RuleKind::Existence { expression } => check_existence(rule, expression, ctx),
        RuleKind::Pattern { expression, pattern } => check_pattern(rule, expression, pattern, ctx),
        RuleKind::Range { expression, min, max, data_type } => {
            check_range(rule, expression, min, max, *data_type, ctx)
        }
        RuleKind::Comparison { expression, operator, value } => {
            check_comparison(rule, expression, *operator, value, ctx)
        }
        RuleKind::ComputedComparison { comparison } => {
            check_computed_comparison(rule, comparison, ctx)
        }
        RuleKind::NodeValidation { nodes_xpath, value_expression, operator, expected } => {
            check_node_validation(rule, nodes_xpath, value_expression, *operator, expected, ctx)
        }
    };

    Some(RuleOutcome {
        rule_id: rule.id.clone(),
        file_path: file_path.to_string(),
        severity: rule.severity,
        status: outcome.status,
        returned_value: outcome.returned,
        expected_value: outcome.expected,
        message: outcome.message,
        node_results: outcome.node_results,
    })
}

/// Kind-agnostic part of an outcome, before the rule/file envelope is added.
struct Checked {
    status: Status,
    returned: Value,
    expected: Option<Value>,
    message: String,
    node_results: Option<Vec<NodeOutcome>>,
}

impl Checked {
    fn verdict(rule: &Rule, passed: bool, returned: Value, expected: Value) -> Checked {
        Checked {
            status: if passed { Status::Pass } else { Status::Fail },
            returned,
            expected: Some(expected),
            message: if passed {
                rule.description.clone()
            } else {
                format!("Failed: {}", rule.description)
            },
            node_results: None,
        }
    }

    fn error(expected: Option<Value>, error: &EvalError) -> Checked {
        Checked {
            status: Status::Fail,
            returned: Value::Null,
            expected,
            message: format!("Evaluation failed: {error}"),
            node_results: None,
        }
    }

    fn missing(expected: Option<Value>, what: &str) -> Checked {
        Checked {
            status: Status::Missing,
            returned: Value::Null,
            expected,
            message: format!("Missing data: {what}"),
            node_results: None,
        }
    }
}

fn condition_holds<'a, N>(condition: &Condition, root: N) -> bool
where
    N: SourceNode<'a> + 'a,
{
    let result = match condition {
        Condition::Exists { xpath } => match eval_str(xpath, root, root) {
            Ok(XPathValue::Nodes(nodes)) => Ok(!nodes.is_empty()),
            Ok(_) => Ok(false),
            Err(e) => Err(e),
        },
        Condition::AttributeEquals { xpath, attribute, value } => {
            match eval_str(xpath, root, root) {
                Ok(XPathValue::Nodes(nodes)) => Ok(nodes.iter().any(|node| {
                    node.attributes().any(|attr| {
                        attr.name().is_some_and(|q| q.local == attribute)
                            && attr.string_value() == *value
                    })
                })),
                Ok(_) => Ok(false),
                Err(e) => Err(e),
            }
        }
    };
    match result {
        Ok(holds) => holds,
        Err(e) => {
            // An unevaluable condition counts as not satisfied.
            log::warn!("condition evaluation failed: {e}");
            false
        }
    }
}

fn check_existence<'a, N>(rule: &Rule, expression: &Expr, ctx: EvalContext<'a, N>) -> Checked
where
    N: SourceNode<'a> + 'a,
{
    let expected = Value::Str("truthy".to_string());
    match evaluate(expression, ctx) {
        Ok(value) => {
            let passed = value.truthy();
            Checked::verdict(rule, passed, value, expected)
        }
        Err(e) => Checked::error(Some(expected), &e),
    }
}

fn check_pattern<'a, N>(
    rule: &Rule,
    expression: &Expr,
    pattern: &regex::Regex,
    ctx: EvalContext<'a, N>,
) -> Checked
where
    N: SourceNode<'a> + 'a,
{
    let expected = Value::Str(pattern.as_str().to_string());
    match evaluate(expression, ctx) {
        Ok(Value::Null) => Checked::missing(Some(expected), &expression.describe()),
        Ok(value) => {
            let text = value.render();
            // Unanchored search: the pattern anchors only with explicit ^/$.
            let passed = pattern.is_match(&text);
            Checked::verdict(rule, passed, Value::Str(text), expected)
        }
        Err(e) => Checked::error(Some(expected), &e),
    }
}

fn check_range<'a, N>(
    rule: &Rule,
    expression: &Expr,
    min: &Value,
    max: &Value,
    data_type: DataType,
    ctx: EvalContext<'a, N>,
) -> Checked
where
    N: SourceNode<'a> + 'a,
{
    let expected = Value::Str(format!("between {} and {}", min.render(), max.render()));
    let actual = match evaluate(expression, ctx) {
        Ok(Value::Null) => return Checked::missing(Some(expected), &expression.describe()),
        Ok(value) => value,
        Err(e) => return Checked::error(Some(expected), &e),
    };
    let coerced = match actual.coerce(data_type) {
        Ok(value) => value,
        Err(e) => return Checked::error(Some(expected), &EvalError::from(e)),
    };
    let in_range = match (coerced.compare(min), coerced.compare(max)) {
        (Ok(low), Ok(high)) => low != Ordering::Less && high != Ordering::Greater,
        (Err(e), _) | (_, Err(e)) => {
            return Checked::error(Some(expected), &EvalError::from(e));
        }
    };
    Checked::verdict(rule, in_range, coerced, expected)
}

fn check_comparison<'a, N>(
    rule: &Rule,
    expression: &Expr,
    operator: CmpOp,
    value: &Value,
    ctx: EvalContext<'a, N>,
) -> Checked
where
    N: SourceNode<'a> + 'a,
{
    let expected = Value::Str(format!("{} {}", operator.as_str(), value.render()));
    let actual = match evaluate(expression, ctx) {
        Ok(Value::Null) => return Checked::missing(Some(expected), &expression.describe()),
        Ok(actual) => actual,
        Err(e) => return Checked::error(Some(expected), &e),
    };
    match apply_operator(operator, &actual, value) {
        Ok(passed) => Checked::verdict(rule, passed, actual, expected),
        Err(e) => Checked::error(Some(expected), &e),
    }
}

fn check_computed_comparison<'a, N>(
    rule: &Rule,
    comparison: &Comparison,
    ctx: EvalContext<'a, N>,
) -> Checked
where
    N: SourceNode<'a> + 'a,
{
    match comparison {
        Comparison::Binary { operator, left, right } => {
            let left_value = match evaluate(left, ctx) {
                Ok(Value::Null) => return Checked::missing(None, &left.describe()),
                Ok(value) => value,
                Err(e) => return Checked::error(None, &e),
            };
            let right_value = match evaluate(right, ctx) {
                Ok(Value::Null) => return Checked::missing(None, &right.describe()),
                Ok(value) => value,
                Err(e) => return Checked::error(None, &e),
            };
            let expected =
                Value::Str(format!("{} {}", operator.as_str(), right_value.render()));
            match apply_operator(*operator, &left_value, &right_value) {
                Ok(passed) => Checked::verdict(rule, passed, left_value, expected),
                Err(e) => Checked::error(Some(expected), &e),
            }
        }
        Comparison::Between { left, lower, upper } => {
            let left_value = match evaluate(left, ctx) {
                Ok(Value::Null) => return Checked::missing(None, &left.describe()),
                Ok(value) => value,
                Err(e) => return Checked::error(None, &e),
            };
            let lower_value = match evaluate(lower, ctx) {
                Ok(Value::Null) => return Checked::missing(None, &lower.describe()),
                Ok(value) => value,
                Err(e) => return Checked::error(None, &e),
            };
            let upper_value = match evaluate(upper, ctx) {
                Ok(Value::Null) => return Checked::missing(None, &upper.describe()),
                Ok(value) => value,
                Err(e) => return Checked::error(None, &e),
            };
            let expected = Value::Str(format!(
                "between {} and {}",
                lower_value.render(),
                upper_value.render()
            ));
            // Inclusive on both ends; a non-orderable left value fails.
            let in_range = match (left_value.compare(&lower_value), left_value.compare(&upper_value))
            {
                (Ok(low), Ok(high)) => low != Ordering::Less && high != Ordering::Greater,
                (Err(e), _) | (_, Err(e)) => {
                    return Checked::error(Some(expected), &EvalError::from(e));
                }
            };
            Checked::verdict(rule, in_range, left_value, expected)
        }
    }
}

fn check_node_validation<'a, N>(
    rule: &Rule,
    nodes_xpath: &str,
    value_expression: &Expr,
    operator: CmpOp,
    expected: &Expected,
    ctx: EvalContext<'a, N>,
) -> Checked
where
    N: SourceNode<'a> + 'a,
{
    let expected_literal = match expected {
        Expected::Literal(value) => Some(value.clone()),
        Expected::Expression(_) => None,
    };

    let nodes = match eval_str(nodes_xpath, ctx.root, ctx.root) {
        Ok(XPathValue::Nodes(nodes)) => nodes,
        Ok(_) => {
            return Checked::error(
                expected_literal,
                &EvalError::NotANodeSet { op: "nodeValidation", got: "scalar" },
            );
        }
        Err(e) => return Checked::error(expected_literal, &EvalError::from(e)),
    };

    log::debug!(
        "rule '{}': validating {} node(s) selected by {}",
        rule.id,
        nodes.len(),
        nodes_xpath
    );

    let mut node_results = Vec::with_capacity(nodes.len());
    let mut actuals = Vec::with_capacity(nodes.len());
    for (node_index, node) in nodes.into_iter().enumerate() {
        let node_ctx = ctx.with_node(node);
        let node_xpath = absolute_path(node);
        let result = check_one_node(value_expression, operator, expected, node_ctx);
        actuals.push(result.actual.clone());
        node_results.push(NodeOutcome {
            node_index,
            node_xpath,
            actual_value: result.actual,
            expected_value: result.expected,
            status: result.status,
            message: result.message,
        });
    }

    let failed = node_results.iter().filter(|r| r.status != Status::Pass).count();
    let passed = failed == 0;
    Checked {
        status: if passed { Status::Pass } else { Status::Fail },
        returned: Value::List(actuals),
        expected: expected_literal,
        message: if passed {
            rule.description.clone()
        } else {
            format!(
                "Failed: {} ({failed} of {} node(s) failed)",
                rule.description,
                node_results.len()
            )
        },
        node_results: Some(node_results),
    }
}

struct NodeChecked {
    status: Status,
    actual: Value,
    expected: Value,
    message: Option<String>,
}

fn check_one_node<'a, N>(
    value_expression: &Expr,
    operator: CmpOp,
    expected: &Expected,
    ctx: EvalContext<'a, N>,
) -> NodeChecked
where
    N: SourceNode<'a> + 'a,
{
    let expected_value = match expected {
        Expected::Literal(value) => value.clone(),
        Expected::Expression(expr) => match evaluate(expr, ctx) {
            Ok(value) => value,
            Err(e) => {
                return NodeChecked {
                    status: Status::Fail,
                    actual: Value::Null,
                    expected: Value::Null,
                    message: Some(format!("Expected-value evaluation failed: {e}")),
                };
            }
        },
    };

    let actual = match evaluate(value_expression, ctx) {
        Ok(Value::Null) => {
            return NodeChecked {
                status: Status::Missing,
                actual: Value::Null,
                expected: expected_value,
                message: Some("Missing data: no value at this node".to_string()),
            };
        }
        Ok(value) => value,
        Err(e) => {
            return NodeChecked {
                status: Status::Fail,
                actual: Value::Null,
                expected: expected_value,
                message: Some(format!("Evaluation failed: {e}")),
            };
        }
    };

    match apply_operator(operator, &actual, &expected_value) {
        Ok(true) => NodeChecked {
            status: Status::Pass,
            actual,
            expected: expected_value,
            message: None,
        },
        Ok(false) => NodeChecked {
            status: Status::Fail,
            actual: actual.clone(),
            expected: expected_value.clone(),
            message: Some(format!(
                "expected {} {}, got {}",
                operator.as_str(),
                expected_value.render(),
                actual.render()
            )),
        },
        Err(e) => NodeChecked {
            status: Status::Fail,
            actual,
            expected: expected_value,
            message: Some(format!("Evaluation failed: {e}")),
        },
    }
}

/// Applies one of the six comparison operators with the DSL's typed
/// semantics.
fn apply_operator(op: CmpOp, left: &Value, right: &Value) -> Result<bool, EvalError> {
    match op {
        CmpOp::Eq => Ok(left == right),
        CmpOp::Ne => Ok(left != right),
        _ => {
            let ordering = left.compare(right)?;
            Ok(match op {
                CmpOp::Gt => ordering == Ordering::Greater,
                CmpOp::Lt => ordering == Ordering::Less,
                CmpOp::Ge => ordering != Ordering::Less,
                CmpOp::Le => ordering != Ordering::Greater,
                CmpOp::Eq | CmpOp::Ne => unreachable!("handled above"),
            })
        }
    }
}
