//! XML documents as an XPath source tree, backed by roxmltree.
//!
//! roxmltree keeps attributes as data on elements rather than as navigable
//! nodes, so [`XmlNode`] wraps either a tree node or a `(parent, index)`
//! attribute reference to satisfy the [`SourceNode`] contract.

use inquest_xpath1::{NodeKind, NodeName, SourceNode};
use roxmltree::Node;
use std::hash::{Hash, Hasher};

/// A parsed XML document. Borrows the input text for its whole lifetime;
/// callers keep the text alive (and drop both together when the file's rules
/// have finished).
pub struct XmlDocument<'input> {
    doc: roxmltree::Document<'input>,
}

impl<'input> XmlDocument<'input> {
    pub fn parse(text: &'input str) -> Result<Self, roxmltree::Error> {
        let doc = roxmltree::Document::parse(text)?;
        Ok(XmlDocument { doc })
    }

    /// The document root (the node ABOVE the root element), which is the
    /// evaluation context every rule starts from.
    pub fn root(&self) -> XmlNode<'_, 'input> {
        XmlNode::Tree(self.doc.root())
    }
}

/// A handle into an [`XmlDocument`].
#[derive(Debug, Clone, Copy)]
pub enum XmlNode<'a, 'input> {
    /// Element, text, comment, PI, or the document root.
    Tree(Node<'a, 'input>),
    /// An attribute, addressed through its carrying element.
    Attr { parent: Node<'a, 'input>, index: usize },
}

impl PartialEq for XmlNode<'_, '_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (XmlNode::Tree(a), XmlNode::Tree(b)) => a.id() == b.id(),
            (
                XmlNode::Attr { parent: ap, index: ai },
                XmlNode::Attr { parent: bp, index: bi },
            ) => ap.id() == bp.id() && ai == bi,
            _ => false,
        }
    }
}

impl Eq for XmlNode<'_, '_> {}

impl PartialOrd for XmlNode<'_, '_> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Document order. An attribute sorts directly after its carrying element
/// and before that element's children only in the degenerate same-element
/// case; across elements, the carrying element's position decides.
impl Ord for XmlNode<'_, '_> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match (self, other) {
            (XmlNode::Tree(a), XmlNode::Tree(b)) => a.id().get().cmp(&b.id().get()),
            (
                XmlNode::Attr { parent: ap, index: ai },
                XmlNode::Attr { parent: bp, index: bi },
            ) => match ap.id().get().cmp(&bp.id().get()) {
                Ordering::Equal => ai.cmp(bi),
                unequal => unequal,
            },
            (XmlNode::Tree(node), XmlNode::Attr { parent, .. }) => {
                if node.id() == parent.id() {
                    Ordering::Less
                } else {
                    node.id().get().cmp(&parent.id().get())
                }
            }
            (XmlNode::Attr { parent, .. }, XmlNode::Tree(node)) => {
                if parent.id() == node.id() {
                    Ordering::Greater
                } else {
                    parent.id().get().cmp(&node.id().get())
                }
            }
        }
    }
}

impl Hash for XmlNode<'_, '_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            XmlNode::Tree(node) => {
                0u8.hash(state);
                node.id().hash(state);
            }
            XmlNode::Attr { parent, index } => {
                1u8.hash(state);
                parent.id().hash(state);
                index.hash(state);
            }
        }
    }
}

impl<'a> SourceNode<'a> for XmlNode<'a, 'a> {
    fn kind(&self) -> NodeKind {
        match self {
            XmlNode::Tree(node) => {
                if node.is_root() {
                    NodeKind::Root
                } else if node.is_element() {
                    NodeKind::Element
                } else if node.is_text() {
                    NodeKind::Text
                } else if node.is_comment() {
                    NodeKind::Comment
                } else if node.is_pi() {
                    NodeKind::ProcessingInstruction
                } else {
                    NodeKind::Element
                }
            }
            XmlNode::Attr { .. } => NodeKind::Attribute,
        }
    }

    fn name(&self) -> Option<NodeName<'a>> {
        match self {
            XmlNode::Tree(node) => {
                if node.is_element() {
                    Some(NodeName { prefix: None, local: node.tag_name().name() })
                } else if node.is_pi() {
                    node.pi().map(|pi| NodeName { prefix: None, local: pi.target })
                } else {
                    None
                }
            }
            XmlNode::Attr { parent, index } => parent.attributes().nth(*index).map(|attr| {
                let prefix =
                    if attr.namespace() == Some("http://www.w3.org/XML/1998/namespace") {
                        Some("xml")
                    } else {
                        None
                    };
                NodeName { prefix, local: attr.name() }
            }),
        }
    }

    fn string_value(&self) -> String {
        match self {
            XmlNode::Tree(node) => {
                if node.is_text() || node.is_comment() {
                    node.text().unwrap_or("").to_string()
                } else if node.is_element() || node.is_root() {
                    node.descendants()
                        .filter(|n| n.is_text())
                        .filter_map(|n| n.text())
                        .collect()
                } else if node.is_pi() {
                    node.pi().and_then(|pi| pi.value).unwrap_or("").to_string()
                } else {
                    String::new()
                }
            }
            XmlNode::Attr { parent, index } => parent
                .attributes()
                .nth(*index)
                .map(|attr| attr.value().to_string())
                .unwrap_or_default(),
        }
    }

    fn attributes(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
        match self {
            XmlNode::Tree(node) => {
                let parent = *node;
                let count = node.attributes().len();
                Box::new((0..count).map(move |index| XmlNode::Attr { parent, index }))
            }
            XmlNode::Attr { .. } => Box::new(std::iter::empty()),
        }
    }

    fn children(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
        match self {
            XmlNode::Tree(node) => Box::new(node.children().map(XmlNode::Tree)),
            XmlNode::Attr { .. } => Box::new(std::iter::empty()),
        }
    }

    fn parent(&self) -> Option<Self> {
        match self {
            XmlNode::Tree(node) => node.parent().map(XmlNode::Tree),
            XmlNode::Attr { parent, .. } => Some(XmlNode::Tree(*parent)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inquest_xpath1::{absolute_path, eval_str, XPathValue};

    #[test]
    fn attributes_are_navigable_nodes() {
        let xml = r#"<order id="77" state="open"><line n="1"/></order>"#;
        let doc = XmlDocument::parse(xml).unwrap();
        let root = doc.root();

        let order = root.children().find(|n| n.kind() == NodeKind::Element).unwrap();
        let attrs: Vec<_> = order.attributes().collect();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].name().unwrap().local, "id");
        assert_eq!(attrs[0].string_value(), "77");
        assert_eq!(attrs[1].string_value(), "open");
        assert_eq!(attrs[0].parent(), Some(order));
    }

    #[test]
    fn xpath_runs_against_the_adapter() {
        let xml = r#"<root><a v="1"/><a v="2"/><b v="9"/></root>"#;
        let doc = XmlDocument::parse(xml).unwrap();
        let root = doc.root();

        let XPathValue::Nodes(nodes) = eval_str("//a[@v = '2']", root, root).unwrap() else {
            panic!("expected nodes")
        };
        assert_eq!(nodes.len(), 1);
        assert_eq!(absolute_path(nodes[0]), "/root[1]/a[2]");

        let sum = eval_str("sum(//a/@v)", root, root).unwrap();
        assert!(matches!(sum, XPathValue::Num(n) if n == 3.0));
    }

    #[test]
    fn element_string_value_concatenates_text() {
        let xml = "<r><p>Hello <b>world</b></p></r>";
        let doc = XmlDocument::parse(xml).unwrap();
        let root = doc.root();
        let XPathValue::Nodes(nodes) = eval_str("//p", root, root).unwrap() else {
            panic!("expected nodes")
        };
        assert_eq!(nodes[0].string_value(), "Hello world");
    }
}
