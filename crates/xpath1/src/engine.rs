//! Evaluation of a parsed XPath expression against a [`SourceNode`] tree.

use crate::ast::{Axis, Expr, KindTest, NodeTest, Path, Step};
use crate::error::XPathError;
use crate::source::{NodeKind, SourceNode};
use crate::{axes, functions, operators};
use std::collections::HashSet;
use std::marker::PhantomData;

/// Result of evaluating an XPath expression.
#[derive(Debug, Clone)]
pub enum XPathValue<N> {
    /// Node-set in document order, without duplicates.
    Nodes(Vec<N>),
    Str(String),
    Num(f64),
    Bool(bool),
}

impl<'a, N: SourceNode<'a>> XPathValue<N> {
    /// XPath 1.0 `boolean()` coercion.
    pub fn to_bool(&self) -> bool {
        match self {
            XPathValue::Nodes(nodes) => !nodes.is_empty(),
            XPathValue::Str(s) => !s.is_empty(),
            XPathValue::Num(n) => *n != 0.0 && !n.is_nan(),
            XPathValue::Bool(b) => *b,
        }
    }

    /// XPath 1.0 `number()` coercion; unparseable input becomes NaN.
    pub fn to_number(&self) -> f64 {
        match self {
            XPathValue::Num(n) => *n,
            XPathValue::Str(s) => s.trim().parse().unwrap_or(f64::NAN),
            XPathValue::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            XPathValue::Nodes(nodes) => match nodes.first() {
                Some(node) => node.string_value().trim().parse().unwrap_or(f64::NAN),
                None => f64::NAN,
            },
        }
    }

    /// XPath 1.0 `string()` coercion: first node's string value for
    /// node-sets, shortest representation for numbers.
    pub fn to_text(&self) -> String {
        match self {
            XPathValue::Nodes(nodes) => nodes
                .first()
                .map(|n| n.string_value())
                .unwrap_or_default(),
            XPathValue::Str(s) => s.clone(),
            XPathValue::Num(n) => format_number(*n),
            XPathValue::Bool(b) => b.to_string(),
        }
    }
}

pub(crate) fn format_number(n: f64) -> String {
    if n == 0.0 {
        // Avoid "-0".
        "0".to_string()
    } else {
        format!("{n}")
    }
}

/// Evaluation state: context node, document root, and the 1-based
/// position/size of the context node within the node-set being filtered.
pub struct Context<'a, N: SourceNode<'a>> {
    pub node: N,
    pub root: N,
    pub position: usize,
    pub size: usize,
    _marker: PhantomData<&'a ()>,
}

impl<'a, N: SourceNode<'a>> Context<'a, N> {
    pub fn new(node: N, root: N) -> Self {
        Context { node, root, position: 1, size: 1, _marker: PhantomData }
    }

    fn at(&self, node: N, position: usize, size: usize) -> Self {
        Context { node, root: self.root, position, size, _marker: PhantomData }
    }
}

/// Parses and evaluates `xpath` with `node` as the context node.
pub fn eval_str<'a, N>(xpath: &str, node: N, root: N) -> Result<XPathValue<N>, XPathError>
where
    N: SourceNode<'a> + 'a,
{
    let expr = crate::parser::parse(xpath)?;
    evaluate(&expr, &Context::new(node, root))
}

/// Evaluates a parsed expression.
pub fn evaluate<'a, N>(expr: &Expr, ctx: &Context<'a, N>) -> Result<XPathValue<N>, XPathError>
where
    N: SourceNode<'a> + 'a,
{
    match expr {
        Expr::Literal(s) => Ok(XPathValue::Str(s.clone())),
        Expr::Number(n) => Ok(XPathValue::Num(*n)),
        Expr::Path(path) => Ok(XPathValue::Nodes(eval_path(path, ctx)?)),
        Expr::Call { name, args } => {
            let mut evaluated = Vec::with_capacity(args.len());
            for arg in args {
                evaluated.push(evaluate(arg, ctx)?);
            }
            functions::call(name, evaluated, ctx)
        }
        Expr::Binary { op, lhs, rhs } => {
            let lhs = evaluate(lhs, ctx)?;
            let rhs = evaluate(rhs, ctx)?;
            operators::apply(*op, lhs, rhs)
        }
        Expr::Negate(inner) => {
            let value = evaluate(inner, ctx)?;
            Ok(XPathValue::Num(-value.to_number()))
        }
    }
}

fn eval_path<'a, N>(path: &Path, ctx: &Context<'a, N>) -> Result<Vec<N>, XPathError>
where
    N: SourceNode<'a> + 'a,
{
    let mut current: Vec<N> = if let Some(start) = &path.start {
        match evaluate(start, ctx)? {
            XPathValue::Nodes(nodes) => nodes,
            // A non-node-set start makes the whole path empty.
            _ => return Ok(vec![]),
        }
    } else if path.absolute {
        vec![ctx.root]
    } else {
        vec![ctx.node]
    };

    for step in &path.steps {
        current = eval_step(step, &current, ctx)?;
    }

    // Multiple context nodes can interleave results; normalise to document
    // order without duplicates (SourceNode::Ord is document order).
    current.sort_unstable();
    current.dedup();
    Ok(current)
}

fn eval_step<'a, N>(step: &Step, input: &[N], ctx: &Context<'a, N>) -> Result<Vec<N>, XPathError>
where
    N: SourceNode<'a> + 'a,
{
    let mut seen = HashSet::new();
    let mut collected = Vec::new();
    for &node in input {
        collect_axis(step.axis, node, &mut seen, &mut collected);
    }

    let tested: Vec<N> = collected
        .into_iter()
        .filter(|node| test_node(node, &step.test, step.axis))
        .collect();

    apply_predicates(tested, &step.predicates, ctx)
}

fn collect_axis<'a, N>(axis: Axis, node: N, seen: &mut HashSet<N>, out: &mut Vec<N>)
where
    N: SourceNode<'a> + 'a,
{
    match axis {
        Axis::Child => axes::children(node, seen, out),
        Axis::Descendant => axes::descendants(node, seen, out),
        Axis::DescendantOrSelf => axes::descendants_or_self(node, seen, out),
        Axis::Attribute => axes::attributes(node, seen, out),
        Axis::Parent => axes::parent(node, seen, out),
        Axis::Ancestor => axes::ancestors(node, seen, out),
        Axis::SelfAxis => axes::self_node(node, seen, out),
        Axis::FollowingSibling => axes::following_siblings(node, seen, out),
        Axis::PrecedingSibling => axes::preceding_siblings(node, seen, out),
        Axis::Following => axes::following(node, seen, out),
        Axis::Preceding => axes::preceding(node, seen, out),
    }
}

fn test_node<'a, N>(node: &N, test: &NodeTest, axis: Axis) -> bool
where
    N: SourceNode<'a> + 'a,
{
    match test {
        NodeTest::Any => match axis {
            Axis::Attribute => node.kind() == NodeKind::Attribute,
            _ => node.kind() == NodeKind::Element,
        },
        NodeTest::Name(name) => node.name().is_some_and(|q| q.local == name),
        NodeTest::Kind(kind) => match kind {
            KindTest::Text => node.kind() == NodeKind::Text,
            KindTest::Comment => node.kind() == NodeKind::Comment,
            KindTest::Pi => node.kind() == NodeKind::ProcessingInstruction,
            KindTest::Node => true,
        },
    }
}

fn apply_predicates<'a, N>(
    nodes: Vec<N>,
    predicates: &[Expr],
    ctx: &Context<'a, N>,
) -> Result<Vec<N>, XPathError>
where
    N: SourceNode<'a> + 'a,
{
    let mut current = nodes;
    for predicate in predicates {
        let size = current.len();
        let mut kept = Vec::new();
        for (i, node) in current.iter().enumerate() {
            let sub = ctx.at(*node, i + 1, size);
            let result = evaluate(predicate, &sub)?;
            let keep = match result {
                // A bare number predicate selects by position.
                XPathValue::Num(n) => n as usize == i + 1,
                other => other.to_bool(),
            };
            if keep {
                kept.push(*node);
            }
        }
        current = kept;
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::fixture::{inventory, ArenaNode};

    fn nodes<'a>(value: XPathValue<ArenaNode<'a>>) -> Vec<usize> {
        match value {
            XPathValue::Nodes(nodes) => nodes.iter().map(|n| n.index).collect(),
            other => panic!("expected node-set, got {other:?}"),
        }
    }

    #[test]
    fn absolute_path() {
        let arena = inventory();
        let root = arena.root();
        let result = eval_str("/inventory/item", root, root).unwrap();
        assert_eq!(nodes(result), vec![3, 7]);
    }

    #[test]
    fn descendant_abbreviation() {
        let arena = inventory();
        let root = arena.root();
        let result = eval_str("//item", root, root).unwrap();
        assert_eq!(nodes(result), vec![3, 7]);
    }

    #[test]
    fn relative_path_uses_context_node() {
        let arena = inventory();
        let root = arena.root();
        let item = arena.node(3);
        let result = eval_str("@price", item, root).unwrap();
        assert_eq!(nodes(result), vec![5]);

        // Absolute paths ignore the context node.
        let result = eval_str("/inventory/note", item, root).unwrap();
        assert_eq!(nodes(result), vec![12]);
    }

    #[test]
    fn attribute_predicate() {
        let arena = inventory();
        let root = arena.root();
        let result = eval_str("//item[@sku = 'b2']", root, root).unwrap();
        assert_eq!(nodes(result), vec![7]);
    }

    #[test]
    fn positional_predicate_and_position_function() {
        let arena = inventory();
        let root = arena.root();
        assert_eq!(nodes(eval_str("//item[1]", root, root).unwrap()), vec![3]);
        assert_eq!(
            nodes(eval_str("//item[position() = 2]", root, root).unwrap()),
            vec![7]
        );
        assert_eq!(
            nodes(eval_str("//item[last()]", root, root).unwrap()),
            vec![7]
        );
    }

    #[test]
    fn numeric_comparison_predicate() {
        let arena = inventory();
        let root = arena.root();
        let result = eval_str("//item[@price > 50]", root, root).unwrap();
        assert_eq!(nodes(result), vec![7]);
    }

    #[test]
    fn union_is_document_ordered() {
        let arena = inventory();
        let root = arena.root();
        let result = eval_str("//note | //item", root, root).unwrap();
        assert_eq!(nodes(result), vec![3, 7, 12]);
    }

    #[test]
    fn arithmetic_and_functions() {
        let arena = inventory();
        let root = arena.root();
        let result = eval_str("count(//item) * 10", root, root).unwrap();
        assert!(matches!(result, XPathValue::Num(n) if n == 20.0));

        let result = eval_str("sum(//item/@price)", root, root).unwrap();
        assert!(matches!(result, XPathValue::Num(n) if n == 100.0));
    }

    #[test]
    fn string_functions_on_context() {
        let arena = inventory();
        let root = arena.root();
        let result = eval_str("concat(//item[1]/@sku, '-', //item[2]/@sku)", root, root).unwrap();
        assert!(matches!(result, XPathValue::Str(s) if s == "a1-b2"));

        let result = eval_str("contains(//note, 'stock')", root, root).unwrap();
        assert!(matches!(result, XPathValue::Bool(true)));
    }

    #[test]
    fn text_node_step() {
        let arena = inventory();
        let root = arena.root();
        let result = eval_str("//item/text()", root, root).unwrap();
        assert_eq!(nodes(result), vec![6, 10]);
    }

    #[test]
    fn dot_refers_to_context_node() {
        let arena = inventory();
        let root = arena.root();
        let item = arena.node(7);
        let result = eval_str(".", item, root).unwrap();
        assert_eq!(nodes(result), vec![7]);

        let result = eval_str("../note", item, root).unwrap();
        assert_eq!(nodes(result), vec![12]);
    }

    #[test]
    fn empty_selection_is_empty_not_error() {
        let arena = inventory();
        let root = arena.root();
        let result = eval_str("//missing", root, root).unwrap();
        assert_eq!(nodes(result), Vec::<usize>::new());
    }

    #[test]
    fn number_formatting_drops_trailing_zeros() {
        assert_eq!(format_number(600.0), "600");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(-0.0), "0");
    }
}
