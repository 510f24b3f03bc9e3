//! Node collectors for each XPath axis.
//!
//! Every collector appends to `out` exactly once per distinct node, using
//! `seen` for de-duplication across multiple context nodes. Forward axes
//! emit in document order; reverse axes emit nearest-first (the order the
//! walk discovers them), which downstream code re-sorts when it matters.

use crate::source::SourceNode;
use std::collections::HashSet;

fn push<'a, N: SourceNode<'a>>(node: N, seen: &mut HashSet<N>, out: &mut Vec<N>) {
    if seen.insert(node) {
        out.push(node);
    }
}

pub fn self_node<'a, N: SourceNode<'a>>(node: N, seen: &mut HashSet<N>, out: &mut Vec<N>) {
    push(node, seen, out);
}

pub fn children<'a, N: SourceNode<'a>>(node: N, seen: &mut HashSet<N>, out: &mut Vec<N>) {
    for child in node.children() {
        push(child, seen, out);
    }
}

pub fn attributes<'a, N: SourceNode<'a>>(node: N, seen: &mut HashSet<N>, out: &mut Vec<N>) {
    for attr in node.attributes() {
        push(attr, seen, out);
    }
}

pub fn descendants<'a, N: SourceNode<'a>>(node: N, seen: &mut HashSet<N>, out: &mut Vec<N>) {
    for child in node.children() {
        push(child, seen, out);
        descendants(child, seen, out);
    }
}

pub fn descendants_or_self<'a, N: SourceNode<'a>>(
    node: N,
    seen: &mut HashSet<N>,
    out: &mut Vec<N>,
) {
    push(node, seen, out);
    descendants(node, seen, out);
}

pub fn parent<'a, N: SourceNode<'a>>(node: N, seen: &mut HashSet<N>, out: &mut Vec<N>) {
    if let Some(parent) = node.parent() {
        push(parent, seen, out);
    }
}

pub fn ancestors<'a, N: SourceNode<'a>>(node: N, seen: &mut HashSet<N>, out: &mut Vec<N>) {
    let mut cursor = node.parent();
    while let Some(ancestor) = cursor {
        push(ancestor, seen, out);
        cursor = ancestor.parent();
    }
}

pub fn following_siblings<'a, N: SourceNode<'a>>(
    node: N,
    seen: &mut HashSet<N>,
    out: &mut Vec<N>,
) {
    let Some(parent) = node.parent() else { return };
    let mut after = false;
    for sibling in parent.children() {
        if after {
            push(sibling, seen, out);
        }
        if sibling == node {
            after = true;
        }
    }
}

pub fn preceding_siblings<'a, N: SourceNode<'a>>(
    node: N,
    seen: &mut HashSet<N>,
    out: &mut Vec<N>,
) {
    let Some(parent) = node.parent() else { return };
    for sibling in parent.children() {
        if sibling == node {
            break;
        }
        push(sibling, seen, out);
    }
}

pub fn following<'a, N: SourceNode<'a>>(node: N, seen: &mut HashSet<N>, out: &mut Vec<N>) {
    let mut cursor = Some(node);
    while let Some(current) = cursor {
        let parent = current.parent();
        if let Some(parent) = parent {
            let mut after = false;
            for sibling in parent.children() {
                if after {
                    descendants_or_self(sibling, seen, out);
                }
                if sibling == current {
                    after = true;
                }
            }
        }
        cursor = parent;
    }
}

pub fn preceding<'a, N: SourceNode<'a>>(node: N, seen: &mut HashSet<N>, out: &mut Vec<N>) {
    let mut cursor = Some(node);
    while let Some(current) = cursor {
        let parent = current.parent();
        if let Some(parent) = parent {
            for sibling in parent.children() {
                if sibling == current {
                    break;
                }
                descendants_or_self(sibling, seen, out);
            }
        }
        cursor = parent;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::fixture::inventory;

    #[test]
    fn children_in_document_order() {
        let arena = inventory();
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        children(arena.node(1), &mut seen, &mut out);
        let indices: Vec<_> = out.iter().map(|n| n.index).collect();
        assert_eq!(indices, vec![3, 7, 11, 12]);
    }

    #[test]
    fn descendants_in_document_order() {
        let arena = inventory();
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        descendants(arena.root(), &mut seen, &mut out);
        let indices: Vec<_> = out.iter().map(|n| n.index).collect();
        assert_eq!(indices, vec![1, 3, 6, 7, 10, 11, 12, 13]);
    }

    #[test]
    fn ancestors_nearest_first() {
        let arena = inventory();
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        ancestors(arena.node(6), &mut seen, &mut out);
        let indices: Vec<_> = out.iter().map(|n| n.index).collect();
        assert_eq!(indices, vec![3, 1, 0]);
    }

    #[test]
    fn sibling_axes() {
        let arena = inventory();
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        following_siblings(arena.node(3), &mut seen, &mut out);
        let indices: Vec<_> = out.iter().map(|n| n.index).collect();
        assert_eq!(indices, vec![7, 11, 12]);

        seen.clear();
        out.clear();
        preceding_siblings(arena.node(12), &mut seen, &mut out);
        let indices: Vec<_> = out.iter().map(|n| n.index).collect();
        assert_eq!(indices, vec![3, 7, 11]);
    }

    #[test]
    fn following_covers_later_subtrees() {
        let arena = inventory();
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        following(arena.node(6), &mut seen, &mut out);
        let mut indices: Vec<_> = out.iter().map(|n| n.index).collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![7, 10, 11, 12, 13]);
    }
}
