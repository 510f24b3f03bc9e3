//! The abstraction over a navigable, read-only document tree.
//!
//! The engine never touches a concrete XML library; it is written entirely
//! against [`SourceNode`]. Any tree that can name its nodes and walk
//! parent/child/attribute links can be queried.

use std::hash::Hash;

/// A qualified node name: optional namespace prefix plus local part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeName<'a> {
    pub prefix: Option<&'a str>,
    pub local: &'a str,
}

/// Node classification, aligned with the XPath 1.0 data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Root,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
}

/// Contract for a node in a read-only hierarchical document.
///
/// `'a` is the lifetime of the underlying document (e.g. the XML text).
/// Nodes are cheap handles: `Copy`, with identity-based equality. `Ord` MUST
/// agree with document order; the engine relies on it to return node-sets in
/// document order.
pub trait SourceNode<'a>:
    std::fmt::Debug + Clone + Copy + PartialEq + Eq + Hash + PartialOrd + Ord
{
    fn kind(&self) -> NodeKind;

    /// The qualified name, or `None` for unnamed nodes (root, text, comment).
    /// For a processing instruction this is its target.
    fn name(&self) -> Option<NodeName<'a>>;

    /// The string value per the XPath 1.0 `string()` function: text content
    /// for text nodes, concatenated descendant text for elements and the
    /// root, the value for attributes, content for comments and PIs.
    fn string_value(&self) -> String;

    /// Attribute nodes of this node; empty for non-elements.
    fn attributes(&self) -> Box<dyn Iterator<Item = Self> + 'a>;

    /// Child nodes in document order; empty for leaves.
    fn children(&self) -> Box<dyn Iterator<Item = Self> + 'a>;

    /// Parent node; `None` for the root. An attribute's parent is its
    /// carrying element.
    fn parent(&self) -> Option<Self>;
}

/// In-memory arena tree used by the engine's own tests. Public so that
/// downstream crates can reuse it in theirs.
pub mod fixture {
    use super::*;
    use std::cmp::Ordering;
    use std::hash::Hasher;

    #[derive(Debug)]
    struct ArenaEntry<'a> {
        kind: NodeKind,
        name: Option<NodeName<'a>>,
        value: &'a str,
        parent: Option<usize>,
        children: Vec<usize>,
        attributes: Vec<usize>,
    }

    /// An arena of nodes; index order is document order.
    #[derive(Debug)]
    pub struct Arena<'a> {
        entries: Vec<ArenaEntry<'a>>,
    }

    #[derive(Debug, Clone, Copy)]
    pub struct ArenaNode<'a> {
        pub index: usize,
        arena: &'a Arena<'a>,
    }

    impl PartialEq for ArenaNode<'_> {
        fn eq(&self, other: &Self) -> bool {
            self.index == other.index
        }
    }
    impl Eq for ArenaNode<'_> {}
    impl PartialOrd for ArenaNode<'_> {
        fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
            Some(self.cmp(other))
        }
    }
    impl Ord for ArenaNode<'_> {
        fn cmp(&self, other: &Self) -> Ordering {
            self.index.cmp(&other.index)
        }
    }
    impl Hash for ArenaNode<'_> {
        fn hash<H: Hasher>(&self, state: &mut H) {
            self.index.hash(state);
        }
    }

    impl<'a> SourceNode<'a> for ArenaNode<'a> {
        fn kind(&self) -> NodeKind {
            self.arena.entries[self.index].kind
        }

        fn name(&self) -> Option<NodeName<'a>> {
            self.arena.entries[self.index].name
        }

        fn string_value(&self) -> String {
            let entry = &self.arena.entries[self.index];
            match entry.kind {
                NodeKind::Root | NodeKind::Element => {
                    let mut out = String::new();
                    collect_text(self.arena, self.index, &mut out);
                    out
                }
                _ => entry.value.to_string(),
            }
        }

        fn attributes(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
            let arena = self.arena;
            let ids = arena.entries[self.index].attributes.clone();
            Box::new(ids.into_iter().map(move |index| ArenaNode { index, arena }))
        }

        fn children(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
            let arena = self.arena;
            let ids = arena.entries[self.index].children.clone();
            Box::new(ids.into_iter().map(move |index| ArenaNode { index, arena }))
        }

        fn parent(&self) -> Option<Self> {
            self.arena.entries[self.index].parent.map(|index| ArenaNode {
                index,
                arena: self.arena,
            })
        }
    }

    fn collect_text(arena: &Arena<'_>, index: usize, out: &mut String) {
        for &child in &arena.entries[index].children {
            match arena.entries[child].kind {
                NodeKind::Text => out.push_str(arena.entries[child].value),
                NodeKind::Element => collect_text(arena, child, out),
                _ => {}
            }
        }
    }

    impl<'a> Arena<'a> {
        pub fn root(&'a self) -> ArenaNode<'a> {
            ArenaNode { index: 0, arena: self }
        }

        pub fn node(&'a self, index: usize) -> ArenaNode<'a> {
            ArenaNode { index, arena: self }
        }
    }

    /// Builds the shared test document:
    ///
    /// ```xml
    /// <inventory region="north">               <!-- 1, attr 2 -->
    ///   <item sku="a1" price="40">tea</item>   <!-- 3, attrs 4 5, text 6 -->
    ///   <item sku="b2" price="60">mint</item>  <!-- 7, attrs 8 9, text 10 -->
    ///   <!-- restock pending -->               <!-- 11 -->
    ///   <note>low stock</note>                 <!-- 12, text 13 -->
    /// </inventory>
    /// ```
    ///
    /// Index 0 is the document root above `<inventory>`.
    pub fn inventory() -> Arena<'static> {
        let el = |local| Some(NodeName { prefix: None, local });
        let entries = vec![
            // 0: root
            ArenaEntry { kind: NodeKind::Root, name: None, value: "", parent: None, children: vec![1], attributes: vec![] },
            // 1: inventory
            ArenaEntry { kind: NodeKind::Element, name: el("inventory"), value: "", parent: Some(0), children: vec![3, 7, 11, 12], attributes: vec![2] },
            // 2: @region
            ArenaEntry { kind: NodeKind::Attribute, name: el("region"), value: "north", parent: Some(1), children: vec![], attributes: vec![] },
            // 3: item[1]
            ArenaEntry { kind: NodeKind::Element, name: el("item"), value: "", parent: Some(1), children: vec![6], attributes: vec![4, 5] },
            // 4: @sku
            ArenaEntry { kind: NodeKind::Attribute, name: el("sku"), value: "a1", parent: Some(3), children: vec![], attributes: vec![] },
            // 5: @price
            ArenaEntry { kind: NodeKind::Attribute, name: el("price"), value: "40", parent: Some(3), children: vec![], attributes: vec![] },
            // 6: text "tea"
            ArenaEntry { kind: NodeKind::Text, name: None, value: "tea", parent: Some(3), children: vec![], attributes: vec![] },
            // 7: item[2]
            ArenaEntry { kind: NodeKind::Element, name: el("item"), value: "", parent: Some(1), children: vec![10], attributes: vec![8, 9] },
            // 8: @sku
            ArenaEntry { kind: NodeKind::Attribute, name: el("sku"), value: "b2", parent: Some(7), children: vec![], attributes: vec![] },
            // 9: @price
            ArenaEntry { kind: NodeKind::Attribute, name: el("price"), value: "60", parent: Some(7), children: vec![], attributes: vec![] },
            // 10: text "mint"
            ArenaEntry { kind: NodeKind::Text, name: None, value: "mint", parent: Some(7), children: vec![], attributes: vec![] },
            // 11: comment
            ArenaEntry { kind: NodeKind::Comment, name: None, value: " restock pending ", parent: Some(1), children: vec![], attributes: vec![] },
            // 12: note
            ArenaEntry { kind: NodeKind::Element, name: el("note"), value: "", parent: Some(1), children: vec![13], attributes: vec![] },
            // 13: text "low stock"
            ArenaEntry { kind: NodeKind::Text, name: None, value: "low stock", parent: Some(12), children: vec![], attributes: vec![] },
        ];
        Arena { entries }
    }

}
