//! Abstract syntax tree for XPath 1.0 expressions.

/// A parsed XPath expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(String),
    Number(f64),
    Path(Path),
    Call { name: String, args: Vec<Expr> },
    Binary { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Negate(Box<Expr>),
}

/// Binary operators, loosest-binding first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Union,
}

/// A location path: `/inventory/item[2]`, `.//note`, `(…)/step` etc.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    /// Expression the path continues from, for forms like `(…)/item`.
    /// `None` for plain paths starting at the root or the context node.
    pub start: Option<Box<Expr>>,
    /// True when the path is anchored at the document root. Ignored when
    /// `start` is present.
    pub absolute: bool,
    pub steps: Vec<Step>,
}

/// One location step: axis, node test, and zero or more predicates.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Expr>,
}

impl Step {
    /// `descendant-or-self::node()`, the expansion of `//`.
    pub fn any_descendant() -> Self {
        Step {
            axis: Axis::DescendantOrSelf,
            test: NodeTest::Kind(KindTest::Node),
            predicates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Attribute,
    Parent,
    Ancestor,
    SelfAxis,
    FollowingSibling,
    PrecedingSibling,
    Following,
    Preceding,
}

/// The test a step applies to nodes found along its axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    /// A name test (`item`, `ns:item`); matches on the local part.
    Name(String),
    /// The `*` wildcard: any element (any attribute on the attribute axis).
    Any,
    /// A kind test: `text()`, `node()`, `comment()`,
    /// `processing-instruction()`.
    Kind(KindTest),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindTest {
    Text,
    Node,
    Comment,
    Pi,
}
