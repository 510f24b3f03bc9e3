//! Rule-document loading: a serde pass into raw records, then a
//! compile/validate pass into the typed [`RuleSet`].
//!
//! Everything schema-shaped is rejected here, before any rule runs: unknown
//! rule types, unknown operators, fields a rule kind does not permit,
//! duplicate ids, malformed patterns and bounds, and expression trees that
//! carry both or neither of `xpath`/`xpath_expression` where one is needed.

use crate::expr::{Arg, Expr, Op};
use crate::rules::{
    CmpOp, Comparison, Condition, Expected, Rule, RuleKind, RuleSet, Severity,
};
use crate::value::{DataType, Value};
use serde::Deserialize;
use serde_json::Value as Json;
use std::collections::HashSet;
use thiserror::Error;

/// Guard against runaway nesting. JSON cannot express a cyclic expression
/// tree, so a depth bound is the structural-cycle check.
pub const MAX_EXPR_DEPTH: usize = 64;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("rule document does not match the schema: {0}")]
    Schema(#[from] serde_json::Error),

    #[error("duplicate rule id '{0}'")]
    DuplicateId(String),

    #[error("rule '{id}': {detail}")]
    Rule { id: String, detail: String },

    #[error("rule '{id}': invalid pattern: {source}")]
    Pattern { id: String, source: regex::Error },
}

/// Parses and compiles a rule document from JSON text.
pub fn parse_rules(text: &str) -> Result<RuleSet, LoadError> {
    let doc: Json = serde_json::from_str(text)?;
    load_rules(&doc)
}

/// Compiles an already-parsed rule document.
pub fn load_rules(doc: &Json) -> Result<RuleSet, LoadError> {
    let raw: RawDocument = serde_json::from_value(doc.clone())?;

    let mut seen = HashSet::new();
    let mut rules = Vec::with_capacity(raw.validation_settings.len());
    for raw_rule in raw.validation_settings {
        if !seen.insert(raw_rule.id.clone()) {
            return Err(LoadError::DuplicateId(raw_rule.id));
        }
        rules.push(compile_rule(raw_rule)?);
    }
    log::debug!("loaded {} validation rule(s)", rules.len());
    Ok(RuleSet { rules })
}

/// Compiles a single expression tree from its JSON form, outside any rule.
pub fn compile_expression(json: &Json) -> Result<Expr, LoadError> {
    let raw: RawExpr = serde_json::from_value(json.clone())?;
    compile_expr("<expression>", raw, 0)
}

// ---- raw serde records -------------------------------------------------

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct RawDocument {
    #[serde(rename = "validationSettings")]
    validation_settings: Vec<RawRule>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct RawRule {
    id: String,
    description: String,
    #[serde(rename = "type")]
    kind: String,
    severity: Severity,
    #[serde(default)]
    conditions: Option<Vec<RawCondition>>,
    #[serde(default)]
    expression: Option<RawExpr>,
    #[serde(default)]
    pattern: Option<String>,
    #[serde(default)]
    min_value: Option<Json>,
    #[serde(default)]
    max_value: Option<Json>,
    #[serde(default)]
    data_type: Option<DataType>,
    #[serde(default)]
    operator: Option<String>,
    #[serde(default)]
    value: Option<Json>,
    #[serde(default)]
    comparison: Option<RawComparison>,
    #[serde(default)]
    nodes_xpath: Option<String>,
    #[serde(default)]
    node_value_expression: Option<RawExpr>,
    #[serde(default)]
    expected_value_expression: Option<RawExpr>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct RawCondition {
    #[serde(rename = "type")]
    kind: String,
    xpath: String,
    #[serde(default)]
    attribute: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct RawComparison {
    operator: String,
    #[serde(default)]
    left_expression: Option<RawExpr>,
    #[serde(default)]
    right_expression: Option<RawExpr>,
    #[serde(default)]
    lower_expression: Option<RawExpr>,
    #[serde(default)]
    upper_expression: Option<RawExpr>,
}

/// Expression fields are snake_case, with the camelCase spellings of older
/// documents accepted as aliases.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
struct RawExpr {
    op: String,
    #[serde(default)]
    args: Option<Vec<RawArg>>,
    #[serde(default)]
    xpath: Option<String>,
    #[serde(default, alias = "xpathExpression")]
    xpath_expression: Option<Box<RawExpr>>,
    #[serde(default, alias = "expression")]
    inner_expression: Option<Box<RawExpr>>,
    #[serde(default, alias = "value")]
    literal_value: Option<Json>,
    #[serde(default, alias = "dataType")]
    data_type: Option<DataType>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
enum RawArg {
    Expr(RawExpr),
    Scalar(Json),
}

// ---- compilation -------------------------------------------------------

fn rule_error(id: &str, detail: impl Into<String>) -> LoadError {
    LoadError::Rule { id: id.to_string(), detail: detail.into() }
}

fn compile_rule(raw: RawRule) -> Result<Rule, LoadError> {
    let id = raw.id.clone();
    if id.trim().is_empty() {
        return Err(rule_error("", "rule id must be a non-empty string"));
    }
    if raw.description.trim().is_empty() {
        return Err(rule_error(&id, "rule description must be a non-empty string"));
    }

    // Reject fields the rule kind does not permit.
    let allowed: &[&str] = match raw.kind.as_str() {
        "existence" => &["expression"],
        "pattern" => &["expression", "pattern"],
        "range" => &["expression", "minValue", "maxValue", "dataType"],
        "comparison" => &["expression", "operator", "value"],
        "computedComparison" => &["comparison"],
        "nodeValidation" => &[
            "nodesXpath",
            "nodeValueExpression",
            "operator",
            "value",
            "expectedValueExpression",
        ],
        other => return Err(rule_error(&id, format!("unknown rule type '{other}'"))),
    };
    let present: &[(&str, bool)] = &[
        ("expression", raw.expression.is_some()),
        ("pattern", raw.pattern.is_some()),
        ("minValue", raw.min_value.is_some()),
        ("maxValue", raw.max_value.is_some()),
        ("dataType", raw.data_type.is_some()),
        ("operator", raw.operator.is_some()),
        ("value", raw.value.is_some()),
        ("comparison", raw.comparison.is_some()),
        ("nodesXpath", raw.nodes_xpath.is_some()),
        ("nodeValueExpression", raw.node_value_expression.is_some()),
        ("expectedValueExpression", raw.expected_value_expression.is_some()),
    ];
    for (field, is_present) in present {
        if *is_present && !allowed.contains(field) {
            return Err(rule_error(
                &id,
                format!("field '{field}' is not allowed for rule type '{}'", raw.kind),
            ));
        }
    }

    let conditions = raw
        .conditions
        .unwrap_or_default()
        .into_iter()
        .map(|c| compile_condition(&id, c))
        .collect::<Result<Vec<_>, _>>()?;

    let require_expr = |slot: Option<RawExpr>, field: &str| {
        slot.ok_or_else(|| rule_error(&id, format!("missing required field '{field}'")))
            .and_then(|raw| compile_expr(&id, raw, 0))
    };

    let kind = match raw.kind.as_str() {
        "existence" => RuleKind::Existence { expression: require_expr(raw.expression, "expression")? },
        "pattern" => {
            let expression = require_expr(raw.expression, "expression")?;
            let pattern_src = raw
                .pattern
                .ok_or_else(|| rule_error(&id, "missing required field 'pattern'"))?;
            let pattern = regex::Regex::new(&pattern_src)
                .map_err(|source| LoadError::Pattern { id: id.clone(), source })?;
            RuleKind::Pattern { expression, pattern }
        }
        "range" => {
            let expression = require_expr(raw.expression, "expression")?;
            let data_type = raw
                .data_type
                .ok_or_else(|| rule_error(&id, "missing required field 'dataType'"))?;
            let bound = |slot: Option<Json>, field: &str| {
                let json = slot
                    .ok_or_else(|| rule_error(&id, format!("missing required field '{field}'")))?;
                let value = json_to_value(&json)
                    .map_err(|detail| rule_error(&id, format!("{field}: {detail}")))?;
                value.coerce(data_type).map_err(|e| {
                    rule_error(&id, format!("{field} does not fit dataType: {e}"))
                })
            };
            let min = bound(raw.min_value, "minValue")?;
            let max = bound(raw.max_value, "maxValue")?;
            RuleKind::Range { expression, min, max, data_type }
        }
        "comparison" => {
            let expression = require_expr(raw.expression, "expression")?;
            let operator = compile_operator(&id, raw.operator)?;
            let value_json = raw
                .value
                .ok_or_else(|| rule_error(&id, "missing required field 'value'"))?;
            let value = json_to_value(&value_json)
                .map_err(|detail| rule_error(&id, format!("value: {detail}")))?;
            RuleKind::Comparison { expression, operator, value }
        }
        "computedComparison" => {
            let raw_cmp = raw
                .comparison
                .ok_or_else(|| rule_error(&id, "missing required field 'comparison'"))?;
            RuleKind::ComputedComparison { comparison: compile_comparison(&id, raw_cmp)? }
        }
        "nodeValidation" => {
            let nodes_xpath = raw
                .nodes_xpath
                .ok_or_else(|| rule_error(&id, "missing required field 'nodesXpath'"))?;
            let value_expression =
                require_expr(raw.node_value_expression, "nodeValueExpression")?;
            let operator = match raw.operator {
                Some(tag) => compile_operator(&id, Some(tag))?,
                None => CmpOp::Eq,
            };
            let expected = match (raw.value, raw.expected_value_expression) {
                (Some(json), None) => Expected::Literal(
                    json_to_value(&json)
                        .map_err(|detail| rule_error(&id, format!("value: {detail}")))?,
                ),
                (None, Some(raw_expr)) => {
                    Expected::Expression(compile_expr(&id, raw_expr, 0)?)
                }
                (Some(_), Some(_)) => {
                    return Err(rule_error(
                        &id,
                        "'value' and 'expectedValueExpression' are mutually exclusive",
                    ));
                }
                (None, None) => {
                    return Err(rule_error(
                        &id,
                        "exactly one of 'value' or 'expectedValueExpression' is required",
                    ));
                }
            };
            RuleKind::NodeValidation { nodes_xpath, value_expression, operator, expected }
        }
        _ => unreachable!("unknown kinds rejected above"),
    };

    Ok(Rule { id, description: raw.description, severity: raw.severity, conditions, kind })
}

fn compile_operator(id: &str, tag: Option<String>) -> Result<CmpOp, LoadError> {
    let tag = tag.ok_or_else(|| rule_error(id, "missing required field 'operator'"))?;
    CmpOp::parse(&tag).ok_or_else(|| rule_error(id, format!("unknown operator '{tag}'")))
}

fn compile_condition(id: &str, raw: RawCondition) -> Result<Condition, LoadError> {
    match raw.kind.as_str() {
        "exists" => Ok(Condition::Exists { xpath: raw.xpath }),
        "attributeEquals" => {
            let attribute = raw
                .attribute
                .ok_or_else(|| rule_error(id, "attributeEquals condition needs 'attribute'"))?;
            let value = raw
                .value
                .ok_or_else(|| rule_error(id, "attributeEquals condition needs 'value'"))?;
            Ok(Condition::AttributeEquals { xpath: raw.xpath, attribute, value })
        }
        other => Err(rule_error(id, format!("unknown condition type '{other}'"))),
    }
}

fn compile_comparison(id: &str, raw: RawComparison) -> Result<Comparison, LoadError> {
    let expr_slot = |slot: Option<RawExpr>, field: &str| {
        slot.ok_or_else(|| rule_error(id, format!("comparison needs '{field}'")))
            .and_then(|raw| compile_expr(id, raw, 0))
    };
    let forbid = |slot: &Option<RawExpr>, field: &str, operator: &str| {
        if slot.is_some() {
            Err(rule_error(
                id,
                format!("comparison field '{field}' is not allowed with operator '{operator}'"),
            ))
        } else {
            Ok(())
        }
    };

    if raw.operator == "between" {
        forbid(&raw.right_expression, "rightExpression", "between")?;
        Ok(Comparison::Between {
            left: expr_slot(raw.left_expression, "leftExpression")?,
            lower: expr_slot(raw.lower_expression, "lowerExpression")?,
            upper: expr_slot(raw.upper_expression, "upperExpression")?,
        })
    } else {
        let operator = CmpOp::parse(&raw.operator)
            .ok_or_else(|| rule_error(id, format!("unknown operator '{}'", raw.operator)))?;
        forbid(&raw.lower_expression, "lowerExpression", operator.as_str())?;
        forbid(&raw.upper_expression, "upperExpression", operator.as_str())?;
        Ok(Comparison::Binary {
            operator,
            left: expr_slot(raw.left_expression, "leftExpression")?,
            right: expr_slot(raw.right_expression, "rightExpression")?,
        })
    }
}

fn compile_expr(id: &str, raw: RawExpr, depth: usize) -> Result<Expr, LoadError> {
    if depth > MAX_EXPR_DEPTH {
        return Err(rule_error(
            id,
            format!("expression nesting exceeds {MAX_EXPR_DEPTH} levels"),
        ));
    }

    let op = Op::parse(&raw.op)
        .ok_or_else(|| rule_error(id, format!("unknown op '{}'", raw.op)))?;

    if raw.xpath.is_some() && raw.xpath_expression.is_some() {
        return Err(rule_error(
            id,
            format!("'{}' carries both 'xpath' and 'xpath_expression'", op.as_str()),
        ));
    }
    let has_xpath = raw.xpath.is_some() || raw.xpath_expression.is_some();
    let has_args = raw.args.is_some();

    // Field permissions per operator.
    match op {
        Op::Literal => {
            reject_field(id, op, "args", has_args)?;
            reject_field(id, op, "xpath", has_xpath)?;
            reject_field(id, op, "inner_expression", raw.inner_expression.is_some())?;
            if raw.literal_value.is_none() {
                return Err(rule_error(id, "'literal' requires 'literal_value'"));
            }
        }
        Op::Value => {
            reject_field(id, op, "args", has_args)?;
            reject_field(id, op, "inner_expression", raw.inner_expression.is_some())?;
            reject_field(id, op, "literal_value", raw.literal_value.is_some())?;
            require_xpath(id, op, has_xpath)?;
        }
        Op::Count => {
            reject_field(id, op, "args", has_args)?;
            reject_field(id, op, "inner_expression", raw.inner_expression.is_some())?;
            reject_field(id, op, "literal_value", raw.literal_value.is_some())?;
            reject_field(id, op, "data_type", raw.data_type.is_some())?;
            require_xpath(id, op, has_xpath)?;
        }
        Op::Sum | Op::Average => {
            reject_field(id, op, "inner_expression", raw.inner_expression.is_some())?;
            reject_field(id, op, "literal_value", raw.literal_value.is_some())?;
            reject_field(id, op, "data_type", raw.data_type.is_some())?;
            if has_xpath == has_args {
                return Err(rule_error(
                    id,
                    format!("'{}' requires an XPath or 'args', but not both", op.as_str()),
                ));
            }
            if has_args && raw.args.as_ref().map(Vec::len) != Some(1) {
                return Err(rule_error(
                    id,
                    format!("'{}' takes exactly one list-producing argument", op.as_str()),
                ));
            }
        }
        Op::Map => {
            reject_field(id, op, "args", has_args)?;
            reject_field(id, op, "literal_value", raw.literal_value.is_some())?;
            reject_field(id, op, "data_type", raw.data_type.is_some())?;
            require_xpath(id, op, has_xpath)?;
            if raw.inner_expression.is_none() {
                return Err(rule_error(id, "'map' requires 'inner_expression'"));
            }
        }
        _ => {
            // Pure argument operators.
            reject_field(id, op, "xpath", has_xpath)?;
            reject_field(id, op, "inner_expression", raw.inner_expression.is_some())?;
            reject_field(id, op, "literal_value", raw.literal_value.is_some())?;
            reject_field(id, op, "data_type", raw.data_type.is_some())?;
            let count = raw.args.as_ref().map(Vec::len).unwrap_or(0);
            let ok = match op {
                Op::Not => count == 1,
                Op::If => count == 3,
                Op::Add | Op::Subtract | Op::Multiply | Op::Divide => count == 2,
                Op::Eq | Op::Ne | Op::Gt | Op::Lt | Op::Ge | Op::Le => count == 2,
                // concat/and/or take any number, including zero.
                _ => has_args,
            };
            if !ok {
                return Err(rule_error(
                    id,
                    format!("'{}' has the wrong number of arguments ({count})", op.as_str()),
                ));
            }
        }
    }

    let args = raw
        .args
        .unwrap_or_default()
        .into_iter()
        .map(|arg| match arg {
            RawArg::Expr(inner) => compile_expr(id, inner, depth + 1).map(Arg::Expr),
            RawArg::Scalar(json) => json_to_value(&json)
                .map(Arg::Literal)
                .map_err(|detail| rule_error(id, format!("argument: {detail}"))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let literal_value = match raw.literal_value {
        Some(json) => Some(
            json_to_value(&json)
                .map_err(|detail| rule_error(id, format!("literal_value: {detail}")))?,
        ),
        None => None,
    };

    Ok(Expr {
        op,
        args,
        xpath: raw.xpath,
        xpath_expression: raw
            .xpath_expression
            .map(|inner| compile_expr(id, *inner, depth + 1).map(Box::new))
            .transpose()?,
        inner_expression: raw
            .inner_expression
            .map(|inner| compile_expr(id, *inner, depth + 1).map(Box::new))
            .transpose()?,
        literal_value,
        data_type: raw.data_type,
    })
}

fn reject_field(id: &str, op: Op, field: &str, present: bool) -> Result<(), LoadError> {
    if present {
        Err(rule_error(
            id,
            format!("field '{field}' is not allowed on '{}'", op.as_str()),
        ))
    } else {
        Ok(())
    }
}

fn require_xpath(id: &str, op: Op, has_xpath: bool) -> Result<(), LoadError> {
    if has_xpath {
        Ok(())
    } else {
        Err(rule_error(
            id,
            format!("'{}' requires 'xpath' or 'xpath_expression'", op.as_str()),
        ))
    }
}

/// Converts a JSON scalar (or array of scalars) into a DSL value.
fn json_to_value(json: &Json) -> Result<Value, String> {
    match json {
        Json::Null => Ok(Value::Null),
        Json::Bool(b) => Ok(Value::Bool(*b)),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Int(i))
            } else {
                Ok(Value::Dec(n.as_f64().ok_or("number out of range")?))
            }
        }
        Json::String(s) => Ok(Value::Str(s.clone())),
        Json::Array(items) => Ok(Value::List(
            items.iter().map(json_to_value).collect::<Result<_, _>>()?,
        )),
        Json::Object(_) => Err("objects are not valid literal values".to_string()),
    }
}
