//! Deterministic absolute paths for diagnostics.

use crate::source::{NodeKind, SourceNode};

/// Computes an indexed-step XPath that uniquely addresses `node` within its
/// document: `/inventory[1]/item[2]`, attributes as `…/item[2]/@sku`, text
/// nodes as `…/note[1]/text()[1]`. The root yields `/`.
pub fn absolute_path<'a, N: SourceNode<'a>>(node: N) -> String {
    match node.kind() {
        NodeKind::Root => "/".to_string(),
        NodeKind::Attribute => {
            let owner = node
                .parent()
                .map(absolute_path)
                .unwrap_or_else(|| "/".to_string());
            let name = node.name().map(|q| q.local).unwrap_or_default();
            if owner == "/" {
                format!("/@{name}")
            } else {
                format!("{owner}/@{name}")
            }
        }
        _ => {
            let mut steps = Vec::new();
            let mut cursor = Some(node);
            while let Some(current) = cursor {
                if current.kind() == NodeKind::Root {
                    break;
                }
                steps.push(step_for(current));
                cursor = current.parent();
            }
            steps.reverse();
            format!("/{}", steps.join("/"))
        }
    }
}

/// `name[i]` with `i` counting same-test siblings, 1-based.
fn step_for<'a, N: SourceNode<'a>>(node: N) -> String {
    let label = match node.kind() {
        NodeKind::Element => node
            .name()
            .map(|q| q.local.to_string())
            .unwrap_or_else(|| "*".to_string()),
        NodeKind::Text => "text()".to_string(),
        NodeKind::Comment => "comment()".to_string(),
        NodeKind::ProcessingInstruction => "processing-instruction()".to_string(),
        NodeKind::Root | NodeKind::Attribute => unreachable!("handled by caller"),
    };

    let index = match node.parent() {
        Some(parent) => {
            parent
                .children()
                .take_while(|sibling| *sibling != node)
                .filter(|sibling| same_test(*sibling, node))
                .count()
                + 1
        }
        None => 1,
    };

    format!("{label}[{index}]")
}

fn same_test<'a, N: SourceNode<'a>>(a: N, b: N) -> bool {
    a.kind() == b.kind()
        && match (a.name(), b.name()) {
            (Some(left), Some(right)) => left.local == right.local,
            (None, None) => true,
            _ => false,
        }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::fixture::inventory;

    #[test]
    fn element_paths_are_indexed() {
        let arena = inventory();
        assert_eq!(absolute_path(arena.node(1)), "/inventory[1]");
        assert_eq!(absolute_path(arena.node(3)), "/inventory[1]/item[1]");
        assert_eq!(absolute_path(arena.node(7)), "/inventory[1]/item[2]");
        assert_eq!(absolute_path(arena.node(12)), "/inventory[1]/note[1]");
    }

    #[test]
    fn attribute_and_text_paths() {
        let arena = inventory();
        assert_eq!(absolute_path(arena.node(9)), "/inventory[1]/item[2]/@price");
        assert_eq!(
            absolute_path(arena.node(13)),
            "/inventory[1]/note[1]/text()[1]"
        );
    }

    #[test]
    fn root_path() {
        let arena = inventory();
        assert_eq!(absolute_path(arena.root()), "/");
    }
}
