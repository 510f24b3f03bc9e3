//! Evaluator behaviour over real XML documents: operator semantics, context
//! rebinding, dynamic XPath, and the boundary cases around empty selections.

use inquest_core::loader::compile_expression;
use inquest_core::{evaluate, EvalContext, EvalError, Value, XmlDocument};
use serde_json::json;

fn eval(xml: &str, expr_json: serde_json::Value) -> Result<Value, EvalError> {
    let expr = compile_expression(&expr_json).expect("expression should compile");
    let doc = XmlDocument::parse(xml).expect("xml should parse");
    evaluate(&expr, EvalContext::new(doc.root()))
}

const ORDERS: &str = r#"<orders region="west">
    <order total="120.5" status="open">first</order>
    <order total="80" status="closed">second</order>
    <order total="19.5" status="open">third</order>
</orders>"#;

#[test]
fn value_returns_first_match_in_document_order() {
    let got = eval(ORDERS, json!({"op": "value", "xpath": "//order/@status"})).unwrap();
    assert_eq!(got, Value::Str("open".into()));
}

#[test]
fn value_with_no_match_is_null() {
    let got = eval(ORDERS, json!({"op": "value", "xpath": "//missing"})).unwrap();
    assert_eq!(got, Value::Null);
}

#[test]
fn value_applies_data_type() {
    let got = eval(
        ORDERS,
        json!({"op": "value", "xpath": "//order[2]/@total", "data_type": "integer"}),
    )
    .unwrap();
    assert_eq!(got, Value::Int(80));

    let err = eval(
        ORDERS,
        json!({"op": "value", "xpath": "//order[1]/@total", "data_type": "integer"}),
    )
    .unwrap_err();
    assert!(matches!(err, EvalError::Coercion(_)));
}

#[test]
fn count_over_nodes_and_empty_sets() {
    assert_eq!(
        eval(ORDERS, json!({"op": "count", "xpath": "//order"})).unwrap(),
        Value::Int(3)
    );
    assert_eq!(
        eval(ORDERS, json!({"op": "count", "xpath": "//nothing"})).unwrap(),
        Value::Int(0)
    );
}

#[test]
fn sum_over_xpath_parses_node_text() {
    let got = eval(ORDERS, json!({"op": "sum", "xpath": "//order/@total"})).unwrap();
    assert_eq!(got, Value::Dec(220.0));

    // Empty selection sums to zero.
    let got = eval(ORDERS, json!({"op": "sum", "xpath": "//nothing/@x"})).unwrap();
    assert_eq!(got, Value::Dec(0.0));

    // Non-numeric node text fails with a diagnostic, not a silent zero.
    let err = eval(ORDERS, json!({"op": "sum", "xpath": "//order/@status"})).unwrap_err();
    assert!(matches!(err, EvalError::NonNumericNode { text } if text == "open"));
}

#[test]
fn average_fails_on_empty_selection() {
    let got = eval(ORDERS, json!({"op": "average", "xpath": "//order/@total"})).unwrap();
    assert!(matches!(got, Value::Dec(n) if (n - 220.0 / 3.0).abs() < 1e-9));

    let err = eval(ORDERS, json!({"op": "average", "xpath": "//nothing"})).unwrap_err();
    assert!(matches!(err, EvalError::EmptyAverage));
}

#[test]
fn arithmetic_type_rules() {
    // Int ∘ Int stays Int …
    let got = eval(ORDERS, json!({"op": "add", "args": [2, 3]})).unwrap();
    assert!(matches!(got, Value::Int(5)));
    let got = eval(ORDERS, json!({"op": "multiply", "args": [4, 5]})).unwrap();
    assert!(matches!(got, Value::Int(20)));

    // … except divide, which always yields a decimal.
    let got = eval(ORDERS, json!({"op": "divide", "args": [7, 2]})).unwrap();
    assert!(matches!(got, Value::Dec(n) if n == 3.5));

    // Mixed operands promote.
    let got = eval(ORDERS, json!({"op": "subtract", "args": [2.5, 1]})).unwrap();
    assert!(matches!(got, Value::Dec(n) if n == 1.5));
}

#[test]
fn division_by_zero_is_a_clean_failure() {
    let err = eval(ORDERS, json!({"op": "divide", "args": [1, 0]})).unwrap_err();
    assert!(matches!(err, EvalError::DivisionByZero));
}

#[test]
fn integer_overflow_is_a_clean_failure() {
    let err = eval(
        ORDERS,
        json!({"op": "add", "args": [i64::MAX, 1]}),
    )
    .unwrap_err();
    assert!(matches!(err, EvalError::Overflow));
}

#[test]
fn concat_renders_null_as_empty() {
    let got = eval(
        ORDERS,
        json!({"op": "concat", "args": [
            "region=",
            {"op": "value", "xpath": "/orders/@region"},
            "/",
            {"op": "value", "xpath": "//missing"}
        ]}),
    )
    .unwrap();
    assert_eq!(got, Value::Str("region=west/".into()));
}

#[test]
fn boolean_operators_short_circuit_over_truthiness() {
    // The second arg would fail (division by zero) if it were evaluated.
    let got = eval(
        ORDERS,
        json!({"op": "or", "args": [
            {"op": "count", "xpath": "//order"},
            {"op": "divide", "args": [1, 0]}
        ]}),
    )
    .unwrap();
    assert_eq!(got, Value::Bool(true));

    let got = eval(
        ORDERS,
        json!({"op": "and", "args": [
            {"op": "count", "xpath": "//missing"},
            {"op": "divide", "args": [1, 0]}
        ]}),
    )
    .unwrap();
    assert_eq!(got, Value::Bool(false));

    let got = eval(ORDERS, json!({"op": "not", "args": [{"op": "count", "xpath": "//missing"}]}))
        .unwrap();
    assert_eq!(got, Value::Bool(true));
}

#[test]
fn if_evaluates_only_the_taken_branch() {
    let got = eval(
        ORDERS,
        json!({"op": "if", "args": [
            {"op": "count", "xpath": "//order"},
            "some",
            {"op": "divide", "args": [1, 0]}
        ]}),
    )
    .unwrap();
    assert_eq!(got, Value::Str("some".into()));

    let got = eval(
        ORDERS,
        json!({"op": "if", "args": [
            {"op": "count", "xpath": "//missing"},
            {"op": "divide", "args": [1, 0]},
            "none"
        ]}),
    )
    .unwrap();
    assert_eq!(got, Value::Str("none".into()));
}

#[test]
fn comparisons_are_typed() {
    let got = eval(
        ORDERS,
        json!({"op": "==", "args": [
            {"op": "count", "xpath": "//order"},
            3.0
        ]}),
    )
    .unwrap();
    assert_eq!(got, Value::Bool(true));

    // String vs integer does not order.
    let err = eval(ORDERS, json!({"op": ">", "args": ["5", 3]})).unwrap_err();
    assert!(matches!(err, EvalError::Compare(_)));

    // Lexical ordering for string pairs.
    let got = eval(ORDERS, json!({"op": "<", "args": ["apple", "banana"]})).unwrap();
    assert_eq!(got, Value::Bool(true));
}

#[test]
fn map_rebinds_context_per_node() {
    let got = eval(
        ORDERS,
        json!({"op": "map", "xpath": "//order", "inner_expression":
            {"op": "value", "xpath": "@total", "data_type": "decimal"}}),
    )
    .unwrap();
    assert_eq!(
        got,
        Value::List(vec![Value::Dec(120.5), Value::Dec(80.0), Value::Dec(19.5)])
    );
}

#[test]
fn map_over_empty_selection_is_an_empty_list() {
    let got = eval(
        ORDERS,
        json!({"op": "map", "xpath": "//missing", "inner_expression": {"op": "value", "xpath": "@x"}}),
    )
    .unwrap();
    assert_eq!(got, Value::List(vec![]));
}

#[test]
fn map_length_always_equals_selection_size() {
    // Context discipline: same selection, one evaluation per node.
    let count = eval(ORDERS, json!({"op": "count", "xpath": "//order"})).unwrap();
    let mapped = eval(
        ORDERS,
        json!({"op": "map", "xpath": "//order", "inner_expression":
            {"op": "value", "xpath": "@status"}}),
    )
    .unwrap();
    let Value::List(items) = mapped else { panic!("expected list") };
    assert_eq!(Value::Int(items.len() as i64), count);
}

#[test]
fn map_inner_failure_propagates() {
    let err = eval(
        ORDERS,
        json!({"op": "map", "xpath": "//order", "inner_expression":
            {"op": "value", "xpath": "@status", "data_type": "decimal"}}),
    )
    .unwrap_err();
    assert!(matches!(err, EvalError::Coercion(_)));
}

#[test]
fn sum_over_map_list() {
    let got = eval(
        ORDERS,
        json!({"op": "sum", "args": [
            {"op": "map", "xpath": "//order", "inner_expression":
                {"op": "value", "xpath": "@total", "data_type": "decimal"}}
        ]}),
    )
    .unwrap();
    assert_eq!(got, Value::Dec(220.0));
}

#[test]
fn dynamic_xpath_uses_current_context() {
    // Scenario 2 from the acceptance set: the XPath string is assembled from
    // document data, then evaluated.
    let xml = r#"<root category="A"><Item type="A"/><Item type="A"/><Item type="B"/></root>"#;
    let got = eval(
        xml,
        json!({"op": "count", "xpath_expression":
            {"op": "concat", "args": [
                "//Item[@type='",
                {"op": "value", "xpath": "/root/@category"},
                "']"
            ]}}),
    )
    .unwrap();
    assert_eq!(got, Value::Int(2));
}

#[test]
fn dynamic_xpath_must_not_be_empty() {
    let err = eval(
        ORDERS,
        json!({"op": "count", "xpath_expression": {"op": "value", "xpath": "//missing"}}),
    )
    .unwrap_err();
    assert!(matches!(err, EvalError::EmptyDynamicXPath));
}

#[test]
fn xpath_syntax_error_surfaces() {
    let err = eval(ORDERS, json!({"op": "count", "xpath": "//order[" })).unwrap_err();
    assert!(matches!(err, EvalError::XPath(_)));
}

#[test]
fn count_of_scalar_xpath_result_is_an_error() {
    let err = eval(ORDERS, json!({"op": "count", "xpath": "count(//order)"})).unwrap_err();
    assert!(matches!(err, EvalError::NotANodeSet { .. }));
}

#[test]
fn value_accepts_scalar_xpath_results() {
    let got = eval(
        ORDERS,
        json!({"op": "value", "xpath": "count(//order)", "data_type": "integer"}),
    )
    .unwrap();
    assert_eq!(got, Value::Int(3));
}

#[test]
fn literal_with_data_type() {
    let got = eval(
        ORDERS,
        json!({"op": "literal", "literal_value": "2024-06-01", "data_type": "date"}),
    )
    .unwrap();
    assert!(matches!(got, Value::Date(_)));
}
