//! The XPath 1.0 core function library.

use crate::engine::{Context, XPathValue};
use crate::error::XPathError;
use crate::source::SourceNode;

fn arity<T>(name: &str, args: &[T], expected: std::ops::RangeInclusive<usize>) -> Result<(), XPathError> {
    if expected.contains(&args.len()) {
        Ok(())
    } else {
        Err(XPathError::Function {
            name: name.to_string(),
            message: format!(
                "expected {}..={} arguments, got {}",
                expected.start(),
                expected.end(),
                args.len()
            ),
        })
    }
}

fn node_set_arg<'a, N: SourceNode<'a>>(
    name: &str,
    value: &XPathValue<N>,
) -> Result<Vec<N>, XPathError> {
    match value {
        XPathValue::Nodes(nodes) => Ok(nodes.clone()),
        _ => Err(XPathError::Function {
            name: name.to_string(),
            message: "argument must be a node-set".to_string(),
        }),
    }
}

/// Dispatches a call by name over already-evaluated arguments.
pub fn call<'a, N>(
    name: &str,
    args: Vec<XPathValue<N>>,
    ctx: &Context<'a, N>,
) -> Result<XPathValue<N>, XPathError>
where
    N: SourceNode<'a> + 'a,
{
    match name {
        // Node-set
        "count" => {
            arity(name, &args, 1..=1)?;
            Ok(XPathValue::Num(node_set_arg(name, &args[0])?.len() as f64))
        }
        "position" => {
            arity(name, &args, 0..=0)?;
            Ok(XPathValue::Num(ctx.position as f64))
        }
        "last" => {
            arity(name, &args, 0..=0)?;
            Ok(XPathValue::Num(ctx.size as f64))
        }
        "name" | "local-name" => {
            arity(name, &args, 0..=1)?;
            let node = match args.first() {
                Some(value) => node_set_arg(name, value)?.first().copied(),
                None => Some(ctx.node),
            };
            let text = node
                .and_then(|n| n.name())
                .map(|q| match (name, q.prefix) {
                    ("name", Some(prefix)) => format!("{prefix}:{}", q.local),
                    _ => q.local.to_string(),
                })
                .unwrap_or_default();
            Ok(XPathValue::Str(text))
        }

        // String
        "string" => {
            arity(name, &args, 0..=1)?;
            let text = match args.first() {
                Some(value) => value.to_text(),
                None => ctx.node.string_value(),
            };
            Ok(XPathValue::Str(text))
        }
        "concat" => {
            arity(name, &args, 2..=usize::MAX)?;
            Ok(XPathValue::Str(
                args.iter().map(XPathValue::to_text).collect(),
            ))
        }
        "starts-with" => {
            arity(name, &args, 2..=2)?;
            Ok(XPathValue::Bool(
                args[0].to_text().starts_with(&args[1].to_text()),
            ))
        }
        "contains" => {
            arity(name, &args, 2..=2)?;
            Ok(XPathValue::Bool(
                args[0].to_text().contains(&args[1].to_text()),
            ))
        }
        "substring-before" => {
            arity(name, &args, 2..=2)?;
            let haystack = args[0].to_text();
            let needle = args[1].to_text();
            let text = haystack
                .find(&needle)
                .map(|i| haystack[..i].to_string())
                .unwrap_or_default();
            Ok(XPathValue::Str(text))
        }
        "substring-after" => {
            arity(name, &args, 2..=2)?;
            let haystack = args[0].to_text();
            let needle = args[1].to_text();
            let text = haystack
                .find(&needle)
                .map(|i| haystack[i + needle.len()..].to_string())
                .unwrap_or_default();
            Ok(XPathValue::Str(text))
        }
        "substring" => {
            arity(name, &args, 2..=3)?;
            Ok(XPathValue::Str(substring(&args)))
        }
        "string-length" => {
            arity(name, &args, 0..=1)?;
            let text = match args.first() {
                Some(value) => value.to_text(),
                None => ctx.node.string_value(),
            };
            Ok(XPathValue::Num(text.chars().count() as f64))
        }
        "normalize-space" => {
            arity(name, &args, 0..=1)?;
            let text = match args.first() {
                Some(value) => value.to_text(),
                None => ctx.node.string_value(),
            };
            Ok(XPathValue::Str(
                text.split_whitespace().collect::<Vec<_>>().join(" "),
            ))
        }
        "translate" => {
            arity(name, &args, 3..=3)?;
            let from: Vec<char> = args[1].to_text().chars().collect();
            let to: Vec<char> = args[2].to_text().chars().collect();
            let text = args[0]
                .to_text()
                .chars()
                .filter_map(|c| match from.iter().position(|&f| f == c) {
                    Some(i) => to.get(i).copied(),
                    None => Some(c),
                })
                .collect();
            Ok(XPathValue::Str(text))
        }

        // Boolean
        "boolean" => {
            arity(name, &args, 1..=1)?;
            Ok(XPathValue::Bool(args[0].to_bool()))
        }
        "not" => {
            arity(name, &args, 1..=1)?;
            Ok(XPathValue::Bool(!args[0].to_bool()))
        }
        "true" => {
            arity(name, &args, 0..=0)?;
            Ok(XPathValue::Bool(true))
        }
        "false" => {
            arity(name, &args, 0..=0)?;
            Ok(XPathValue::Bool(false))
        }

        // Number
        "number" => {
            arity(name, &args, 0..=1)?;
            let n = match args.first() {
                Some(value) => value.to_number(),
                None => ctx
                    .node
                    .string_value()
                    .trim()
                    .parse()
                    .unwrap_or(f64::NAN),
            };
            Ok(XPathValue::Num(n))
        }
        "sum" => {
            arity(name, &args, 1..=1)?;
            let total = node_set_arg(name, &args[0])?
                .iter()
                .map(|n| n.string_value().trim().parse().unwrap_or(f64::NAN))
                .sum();
            Ok(XPathValue::Num(total))
        }
        "floor" => {
            arity(name, &args, 1..=1)?;
            Ok(XPathValue::Num(args[0].to_number().floor()))
        }
        "ceiling" => {
            arity(name, &args, 1..=1)?;
            Ok(XPathValue::Num(args[0].to_number().ceil()))
        }
        "round" => {
            arity(name, &args, 1..=1)?;
            // XPath round: floor(x + 0.5), so -0.5 rounds to 0.
            Ok(XPathValue::Num((args[0].to_number() + 0.5).floor()))
        }

        // Node-type names reach here when the parser is fed e.g. `node(1)`.
        "node" | "text" | "comment" | "processing-instruction" => Err(XPathError::Function {
            name: name.to_string(),
            message: "this is a node test, not a function".to_string(),
        }),
        other => Err(XPathError::UnknownFunction(other.to_string())),
    }
}

fn substring<'a, N: SourceNode<'a>>(args: &[XPathValue<N>]) -> String {
    let text: Vec<char> = args[0].to_text().chars().collect();
    let start = args[1].to_number();
    if !start.is_finite() {
        return String::new();
    }
    let start = (start + 0.5).floor() as i64; // 1-based
    let end = match args.get(2) {
        Some(len) => {
            let len = len.to_number();
            if !len.is_finite() {
                if len == f64::INFINITY {
                    i64::MAX
                } else {
                    return String::new();
                }
            } else {
                start + (len + 0.5).floor() as i64
            }
        }
        None => i64::MAX,
    };
    text.iter()
        .enumerate()
        .filter(|(i, _)| {
            let pos = *i as i64 + 1;
            pos >= start && pos < end
        })
        .map(|(_, c)| *c)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::eval_str;
    use crate::source::fixture::inventory;

    #[test]
    fn substring_follows_xpath_rounding() {
        let arena = inventory();
        let root = arena.root();
        let text = |xpath: &str| eval_str(xpath, root, root).unwrap().to_text();

        assert_eq!(text("substring('12345', 2, 3)"), "234");
        assert_eq!(text("substring('12345', 2)"), "2345");
        assert_eq!(text("substring('12345', 1.5, 2.6)"), "234");
        assert_eq!(text("substring('12345', 0, 3)"), "12");
    }

    #[test]
    fn string_helpers() {
        let arena = inventory();
        let root = arena.root();
        let text = |xpath: &str| eval_str(xpath, root, root).unwrap().to_text();

        assert_eq!(text("substring-before('a1-b2', '-')"), "a1");
        assert_eq!(text("substring-after('a1-b2', '-')"), "b2");
        assert_eq!(text("normalize-space('  low   stock ')"), "low stock");
        assert_eq!(text("translate('abc-12', 'abc-', 'ABC')"), "ABC12");
        assert_eq!(text("string-length('tea')"), "3");
    }

    #[test]
    fn numeric_helpers() {
        let arena = inventory();
        let root = arena.root();
        let num = |xpath: &str| eval_str(xpath, root, root).unwrap().to_number();

        assert_eq!(num("floor(1.9)"), 1.0);
        assert_eq!(num("ceiling(1.1)"), 2.0);
        assert_eq!(num("round(2.5)"), 3.0);
        assert_eq!(num("round(-0.5)"), 0.0);
        assert!(num("number('nope')").is_nan());
    }

    #[test]
    fn name_functions() {
        let arena = inventory();
        let root = arena.root();
        let text = |xpath: &str| eval_str(xpath, root, root).unwrap().to_text();

        assert_eq!(text("name(//item[1])"), "item");
        assert_eq!(text("local-name(//item/@sku)"), "sku");
    }

    #[test]
    fn unknown_function_is_an_error() {
        let arena = inventory();
        let root = arena.root();
        let err = eval_str("bogus(1)", root, root).unwrap_err();
        assert!(matches!(err, XPathError::UnknownFunction(name) if name == "bogus"));
    }
}
