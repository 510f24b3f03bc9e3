//! Binary operator semantics over [`XPathValue`].

use crate::ast::BinOp;
use crate::engine::XPathValue;
use crate::error::XPathError;
use crate::source::SourceNode;

pub fn apply<'a, N: SourceNode<'a> + 'a>(
    op: BinOp,
    lhs: XPathValue<N>,
    rhs: XPathValue<N>,
) -> Result<XPathValue<N>, XPathError> {
    use BinOp::*;
    match op {
        Or => Ok(XPathValue::Bool(lhs.to_bool() || rhs.to_bool())),
        And => Ok(XPathValue::Bool(lhs.to_bool() && rhs.to_bool())),
        Eq => Ok(XPathValue::Bool(equals(&lhs, &rhs))),
        Ne => Ok(XPathValue::Bool(!equals(&lhs, &rhs))),
        Lt => Ok(XPathValue::Bool(lhs.to_number() < rhs.to_number())),
        Le => Ok(XPathValue::Bool(lhs.to_number() <= rhs.to_number())),
        Gt => Ok(XPathValue::Bool(lhs.to_number() > rhs.to_number())),
        Ge => Ok(XPathValue::Bool(lhs.to_number() >= rhs.to_number())),
        Add => Ok(XPathValue::Num(lhs.to_number() + rhs.to_number())),
        Sub => Ok(XPathValue::Num(lhs.to_number() - rhs.to_number())),
        Mul => Ok(XPathValue::Num(lhs.to_number() * rhs.to_number())),
        Div => Ok(XPathValue::Num(lhs.to_number() / rhs.to_number())),
        Mod => Ok(XPathValue::Num(lhs.to_number() % rhs.to_number())),
        Union => union(lhs, rhs),
    }
}

/// XPath 1.0 `=` semantics: node-set comparisons are existential over node
/// string values; scalar pairs compare numerically when either side is a
/// number, otherwise by string.
fn equals<'a, N: SourceNode<'a> + 'a>(lhs: &XPathValue<N>, rhs: &XPathValue<N>) -> bool {
    match (lhs, rhs) {
        (XPathValue::Nodes(left), XPathValue::Nodes(right)) => {
            let right_values: Vec<String> = right.iter().map(|n| n.string_value()).collect();
            left.iter()
                .any(|l| right_values.iter().any(|r| l.string_value() == *r))
        }
        // A boolean operand converts the node-set once, not per node.
        (XPathValue::Nodes(nodes), XPathValue::Bool(b))
        | (XPathValue::Bool(b), XPathValue::Nodes(nodes)) => *b == !nodes.is_empty(),
        (XPathValue::Nodes(nodes), scalar) | (scalar, XPathValue::Nodes(nodes)) => {
            nodes.iter().any(|node| scalar_equals_text(scalar, &node.string_value()))
        }
        (XPathValue::Num(l), XPathValue::Num(r)) => l == r,
        (XPathValue::Bool(l), XPathValue::Bool(r)) => l == r,
        (XPathValue::Num(n), other) | (other, XPathValue::Num(n)) => *n == other.to_number(),
        (XPathValue::Bool(b), other) | (other, XPathValue::Bool(b)) => *b == other.to_bool(),
        (XPathValue::Str(l), XPathValue::Str(r)) => l == r,
    }
}

fn scalar_equals_text<'a, N: SourceNode<'a> + 'a>(scalar: &XPathValue<N>, text: &str) -> bool {
    match scalar {
        XPathValue::Num(n) => text.trim().parse::<f64>().map(|v| v == *n).unwrap_or(false),
        XPathValue::Str(s) => s == text,
        XPathValue::Bool(_) | XPathValue::Nodes(_) => {
            unreachable!("handled by caller")
        }
    }
}

fn union<'a, N: SourceNode<'a> + 'a>(
    lhs: XPathValue<N>,
    rhs: XPathValue<N>,
) -> Result<XPathValue<N>, XPathError> {
    let (XPathValue::Nodes(mut left), XPathValue::Nodes(right)) = (lhs, rhs) else {
        return Err(XPathError::type_error(
            "both sides of '|' must be node-sets",
        ));
    };
    left.extend(right);
    left.sort_unstable();
    left.dedup();
    Ok(XPathValue::Nodes(left))
}
