//! `nom`-based grammar for XPath 1.0 expressions.
//!
//! Variable references (`$name`) are not supported; the rule DSL has no way
//! to bind them, so they are rejected at parse time.

use crate::ast::{Axis, BinOp, Expr, KindTest, NodeTest, Path, Step};
use crate::error::XPathError;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace0},
    combinator::{map, opt, peek, recognize},
    multi::{many0, separated_list0},
    number::complete::double,
    sequence::{delimited, pair, preceded, terminated},
};

/// Parses a complete XPath expression; trailing input is an error.
pub fn parse(input: &str) -> Result<Expr, XPathError> {
    match expression(input.trim()) {
        Ok(("", expr)) => Ok(expr),
        Ok((rest, _)) => Err(XPathError::Parse {
            expr: input.to_string(),
            detail: format!("unparsed trailing input: '{rest}'"),
        }),
        Err(e) => Err(XPathError::Parse {
            expr: input.to_string(),
            detail: e.to_string(),
        }),
    }
}

fn ws<'a, F, O, E>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
    E: nom::error::ParseError<&'a str>,
{
    delimited(multispace0, inner, multispace0)
}

/// Left-folds `sub (op sub)*` into a chain of binary nodes.
fn binary_chain<'a, F, G>(
    sub: F,
    op: G,
) -> impl FnMut(&'a str) -> IResult<&'a str, Expr>
where
    F: Parser<&'a str, Output = Expr, Error = nom::error::Error<&'a str>> + Clone,
    G: Parser<&'a str, Output = BinOp, Error = nom::error::Error<&'a str>> + Clone,
{
    move |input: &str| {
        let (input, first) = sub.clone().parse(input)?;
        let (input, rest) = many0(pair(ws(op.clone()), sub.clone())).parse(input)?;
        let folded = rest.into_iter().fold(first, |lhs, (op, rhs)| Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        });
        Ok((input, folded))
    }
}

// Precedence ladder, loosest first: or, and, =/!=, relational, +/-, */div/mod,
// unary minus, |, path. Operator parsers are named functions so that
// `binary_chain` gets `Clone` parsers for free.

fn expression(input: &str) -> IResult<&str, Expr> {
    binary_chain(and_expr, or_op)(input)
}

fn or_op(input: &str) -> IResult<&str, BinOp> {
    map(tag("or"), |_| BinOp::Or).parse(input)
}

fn and_expr(input: &str) -> IResult<&str, Expr> {
    binary_chain(equality_expr, and_op)(input)
}

fn and_op(input: &str) -> IResult<&str, BinOp> {
    map(tag("and"), |_| BinOp::And).parse(input)
}

fn equality_expr(input: &str) -> IResult<&str, Expr> {
    binary_chain(relational_expr, equality_op)(input)
}

fn equality_op(input: &str) -> IResult<&str, BinOp> {
    alt((
        map(tag("!="), |_| BinOp::Ne),
        map(tag("="), |_| BinOp::Eq),
    ))
    .parse(input)
}

fn relational_expr(input: &str) -> IResult<&str, Expr> {
    binary_chain(additive_expr, relational_op)(input)
}

// Entity spellings are tolerated so expressions lifted out of XML attributes
// keep working.
fn relational_op(input: &str) -> IResult<&str, BinOp> {
    alt((
        map(alt((tag("<="), tag("&lt;="))), |_| BinOp::Le),
        map(alt((tag(">="), tag("&gt;="))), |_| BinOp::Ge),
        map(alt((tag("<"), tag("&lt;"))), |_| BinOp::Lt),
        map(alt((tag(">"), tag("&gt;"))), |_| BinOp::Gt),
    ))
    .parse(input)
}

fn additive_expr(input: &str) -> IResult<&str, Expr> {
    binary_chain(multiplicative_expr, additive_op)(input)
}

fn additive_op(input: &str) -> IResult<&str, BinOp> {
    alt((
        map(char('+'), |_| BinOp::Add),
        map(char('-'), |_| BinOp::Sub),
    ))
    .parse(input)
}

fn multiplicative_expr(input: &str) -> IResult<&str, Expr> {
    binary_chain(unary_expr, multiplicative_op)(input)
}

fn multiplicative_op(input: &str) -> IResult<&str, BinOp> {
    alt((
        map(char('*'), |_| BinOp::Mul),
        map(tag("div"), |_| BinOp::Div),
        map(tag("mod"), |_| BinOp::Mod),
    ))
    .parse(input)
}

fn unary_expr(input: &str) -> IResult<&str, Expr> {
    let (rest, minus) = opt(ws(char('-'))).parse(input)?;
    let (rest, expr) = union_expr(rest)?;
    Ok((
        rest,
        if minus.is_some() {
            Expr::Negate(Box::new(expr))
        } else {
            expr
        },
    ))
}

fn union_expr(input: &str) -> IResult<&str, Expr> {
    binary_chain(path_expr, union_op)(input)
}

fn union_op(input: &str) -> IResult<&str, BinOp> {
    map(char('|'), |_| BinOp::Union).parse(input)
}

/// Handles the ambiguity between location paths and primary expressions that
/// may be continued by a path (`count(//a)` vs `count` as an element name).
fn path_expr(input: &str) -> IResult<&str, Expr> {
    let (rest, head) = alt((primary_expr, map(location_path, Expr::Path))).parse(input)?;
    let (rest, continuation) = many0(pair(alt((tag("//"), tag("/"))), step)).parse(rest)?;

    if continuation.is_empty() {
        return Ok((rest, head));
    }

    let (start, absolute, mut steps) = match head {
        Expr::Path(path) => (path.start, path.absolute, path.steps),
        other => (Some(Box::new(other)), false, Vec::new()),
    };
    push_steps(&mut steps, continuation);

    Ok((rest, Expr::Path(Path { start, absolute, steps })))
}

fn push_steps(steps: &mut Vec<Step>, continuation: Vec<(&str, Step)>) {
    for (sep, next) in continuation {
        if sep == "//" {
            steps.push(Step::any_descendant());
        }
        steps.push(next);
    }
}

fn primary_expr(input: &str) -> IResult<&str, Expr> {
    ws(alt((
        map(double, Expr::Number),
        map(string_literal, Expr::Literal),
        function_call,
        delimited(ws(char('(')), expression, ws(char(')'))),
    )))
    .parse(input)
}

fn string_literal(input: &str) -> IResult<&str, String> {
    map(
        alt((
            delimited(char('\''), take_while(|c| c != '\''), char('\'')),
            delimited(char('"'), take_while(|c| c != '"'), char('"')),
        )),
        str::to_string,
    )
    .parse(input)
}

fn nc_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_' || c == '-'),
    ))
    .parse(input)
}

fn q_name(input: &str) -> IResult<&str, String> {
    map(
        recognize(pair(nc_name, opt(pair(tag(":"), nc_name)))),
        str::to_string,
    )
    .parse(input)
}

fn kind_test(input: &str) -> IResult<&str, NodeTest> {
    map(
        terminated(
            alt((
                tag("text"),
                tag("node"),
                tag("comment"),
                tag("processing-instruction"),
            )),
            pair(ws(char('(')), ws(char(')'))),
        ),
        |kind: &str| match kind {
            "text" => NodeTest::Kind(KindTest::Text),
            "comment" => NodeTest::Kind(KindTest::Comment),
            "processing-instruction" => NodeTest::Kind(KindTest::Pi),
            _ => NodeTest::Kind(KindTest::Node),
        },
    )
    .parse(input)
}

fn node_test(input: &str) -> IResult<&str, NodeTest> {
    alt((
        map(tag("*"), |_| NodeTest::Any),
        kind_test,
        map(q_name, NodeTest::Name),
    ))
    .parse(input)
}

fn axis(input: &str) -> IResult<&str, Axis> {
    map(
        terminated(
            alt((
                tag("child"),
                tag("descendant-or-self"),
                tag("descendant"),
                tag("attribute"),
                tag("parent"),
                tag("ancestor"),
                tag("self"),
                tag("following-sibling"),
                tag("preceding-sibling"),
                tag("following"),
                tag("preceding"),
            )),
            tag("::"),
        ),
        |name| match name {
            "descendant-or-self" => Axis::DescendantOrSelf,
            "descendant" => Axis::Descendant,
            "attribute" => Axis::Attribute,
            "parent" => Axis::Parent,
            "ancestor" => Axis::Ancestor,
            "self" => Axis::SelfAxis,
            "following-sibling" => Axis::FollowingSibling,
            "preceding-sibling" => Axis::PrecedingSibling,
            "following" => Axis::Following,
            "preceding" => Axis::Preceding,
            _ => Axis::Child,
        },
    )
    .parse(input)
}

fn predicate(input: &str) -> IResult<&str, Expr> {
    delimited(ws(char('[')), expression, ws(char(']'))).parse(input)
}

fn step(input: &str) -> IResult<&str, Step> {
    let (rest, (axis, test)) = alt((
        // ".." before "." so the longer token wins.
        map(tag(".."), |_| (Axis::Parent, NodeTest::Kind(KindTest::Node))),
        map(tag("."), |_| (Axis::SelfAxis, NodeTest::Kind(KindTest::Node))),
        map(preceded(char('@'), node_test), |test| (Axis::Attribute, test)),
        map(pair(opt(axis), node_test), |(axis, test)| {
            (axis.unwrap_or(Axis::Child), test)
        }),
    ))
    .parse(input)?;
    let (rest, predicates) = many0(predicate).parse(rest)?;
    Ok((rest, Step { axis, test, predicates }))
}

fn location_path(input: &str) -> IResult<&str, Path> {
    let (rest, (absolute, mut steps)) =
        if let Ok((rest, _)) = tag::<&str, &str, nom::error::Error<&str>>("//")(input) {
            let (rest, first) = step(rest)?;
            (rest, (true, vec![Step::any_descendant(), first]))
        } else if let Ok((rest, _)) = tag::<&str, &str, nom::error::Error<&str>>("/")(input) {
            match step(rest) {
                Ok((rest, first)) => (rest, (true, vec![first])),
                // A path that is just "/" selects the root.
                Err(_) => (rest, (true, vec![])),
            }
        } else {
            let (rest, first) = step(input)?;
            (rest, (false, vec![first]))
        };

    let (rest, continuation) = many0(pair(alt((tag("//"), tag("/"))), step)).parse(rest)?;
    push_steps(&mut steps, continuation);

    Ok((rest, Path { start: None, absolute, steps }))
}

fn function_call(input: &str) -> IResult<&str, Expr> {
    // A function call is a QName followed by '('; the lookahead keeps plain
    // step names (`item` in `item/note`) out of this parser.
    let (rest, name) = q_name(input)?;
    let (rest, _) = peek(ws(char('('))).parse(rest)?;

    // Kind tests are handled by the step parser, not as calls.
    if matches!(name.as_str(), "text" | "node" | "comment" | "processing-instruction") {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Verify,
        )));
    }

    let (rest, _) = multispace0(rest)?;
    let (rest, args) = delimited(
        char('('),
        separated_list0(ws(char(',')), expression),
        char(')'),
    )
    .parse(rest)?;

    Ok((rest, Expr::Call { name, args }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name_step(name: &str) -> Step {
        Step {
            axis: Axis::Child,
            test: NodeTest::Name(name.into()),
            predicates: vec![],
        }
    }

    #[test]
    fn relative_path() {
        let expr = parse("item/note").unwrap();
        assert_eq!(
            expr,
            Expr::Path(Path {
                start: None,
                absolute: false,
                steps: vec![name_step("item"), name_step("note")],
            })
        );
    }

    #[test]
    fn double_slash_expands_to_descendant_or_self() {
        let expr = parse("//item").unwrap();
        let Expr::Path(path) = expr else { panic!("expected path") };
        assert!(path.absolute);
        assert_eq!(path.steps.len(), 2);
        assert_eq!(path.steps[0], Step::any_descendant());
        assert_eq!(path.steps[1], name_step("item"));
    }

    #[test]
    fn attribute_abbreviation() {
        let expr = parse("@sku").unwrap();
        let Expr::Path(path) = expr else { panic!("expected path") };
        assert_eq!(path.steps[0].axis, Axis::Attribute);
        assert_eq!(path.steps[0].test, NodeTest::Name("sku".into()));
    }

    #[test]
    fn dot_and_dotdot_steps() {
        let Expr::Path(path) = parse(".").unwrap() else { panic!() };
        assert_eq!(path.steps[0].axis, Axis::SelfAxis);
        assert_eq!(path.steps[0].test, NodeTest::Kind(KindTest::Node));

        let Expr::Path(path) = parse("../note").unwrap() else { panic!() };
        assert_eq!(path.steps[0].axis, Axis::Parent);
        assert_eq!(path.steps[1], name_step("note"));
    }

    #[test]
    fn predicate_with_attribute_equality() {
        let expr = parse("item[@sku = 'a1']").unwrap();
        let Expr::Path(path) = expr else { panic!("expected path") };
        assert_eq!(path.steps.len(), 1);
        let [predicate] = path.steps[0].predicates.as_slice() else {
            panic!("expected one predicate")
        };
        assert!(matches!(predicate, Expr::Binary { op: BinOp::Eq, .. }));
    }

    #[test]
    fn positional_predicate() {
        let expr = parse("item[2]").unwrap();
        let Expr::Path(path) = expr else { panic!("expected path") };
        assert_eq!(path.steps[0].predicates, vec![Expr::Number(2.0)]);
    }

    #[test]
    fn named_axis() {
        let Expr::Path(path) = parse("following-sibling::note").unwrap() else {
            panic!()
        };
        assert_eq!(path.steps[0].axis, Axis::FollowingSibling);
    }

    #[test]
    fn function_call_with_path_argument() {
        let expr = parse("count(//item)").unwrap();
        let Expr::Call { name, args } = expr else { panic!("expected call") };
        assert_eq!(name, "count");
        assert_eq!(args.len(), 1);
        assert!(matches!(args[0], Expr::Path(_)));
    }

    #[test]
    fn kind_test_is_not_a_function() {
        let Expr::Path(path) = parse("item/text()").unwrap() else { panic!() };
        assert_eq!(path.steps[1].test, NodeTest::Kind(KindTest::Text));
    }

    #[test]
    fn operator_precedence() {
        let expr = parse("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinOp::Add,
                lhs: Box::new(Expr::Number(1.0)),
                rhs: Box::new(Expr::Binary {
                    op: BinOp::Mul,
                    lhs: Box::new(Expr::Number(2.0)),
                    rhs: Box::new(Expr::Number(3.0)),
                }),
            }
        );
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let expr = parse("a = 1 or b = 2 and c = 3").unwrap();
        let Expr::Binary { op: BinOp::Or, rhs, .. } = expr else {
            panic!("expected or at the top")
        };
        assert!(matches!(*rhs, Expr::Binary { op: BinOp::And, .. }));
    }

    #[test]
    fn unary_minus() {
        assert_eq!(
            parse("-5").unwrap(),
            Expr::Negate(Box::new(Expr::Number(5.0)))
        );
    }

    #[test]
    fn entity_spelled_comparison() {
        let expr = parse("@price &gt;= 10").unwrap();
        assert!(matches!(expr, Expr::Binary { op: BinOp::Ge, .. }));
    }

    #[test]
    fn union_of_paths() {
        let expr = parse("//item | //note").unwrap();
        assert!(matches!(expr, Expr::Binary { op: BinOp::Union, .. }));
    }

    #[test]
    fn variables_are_rejected() {
        assert!(parse("$var/item").is_err());
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        assert!(parse("//item )").is_err());
    }
}
