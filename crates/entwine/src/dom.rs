//! A small in-memory document with a CSS-like selector language.
//!
//! Selectors are comma-separated compounds built from `*`, a tag name, `#id` and `.class`
//! parts, e.g. `*.b.a`, `div#main.x` or `span, .note`. Combinators are not supported.
//! Specificity is `(ids, classes, tags)`; a union takes the maximum of its parts.

use std::{
    cell::{Cell, RefCell},
    collections::BTreeSet,
    fmt,
    rc::Rc,
};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{Document, Element, Error, Result, Selector, Specificity};

/// Leading tag or universal part of a compound.
static HEAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\*|[A-Za-z][A-Za-z0-9-]*)?").expect("valid selector head pattern")
});

/// One `#id` or `.class` part.
static PART: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([#.])([A-Za-z_][A-Za-z0-9_-]*)").expect("valid selector part"));

/// Stable node identity within a [`Dom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeKey(pub u32);

/// Node payload.
struct NodeData {
    /// Identity.
    key: NodeKey,
    /// Tag name, lowercase.
    tag: String,
    /// Optional id attribute.
    id: Option<String>,
    /// Class names.
    classes: BTreeSet<String>,
}

/// A document node. Clones share the node.
#[derive(Clone)]
pub struct Node(Rc<NodeData>);

impl Node {
    /// Tag name.
    pub fn tag(&self) -> &str {
        &self.0.tag
    }

    /// Id attribute.
    pub fn id(&self) -> Option<&str> {
        self.0.id.as_deref()
    }

    /// Does the node carry `class`?
    pub fn has_class(&self, class: &str) -> bool {
        self.0.classes.contains(class)
    }

    /// Class names, sorted.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.0.classes.iter().map(String::as_str)
    }
}

impl Element for Node {
    type Key = NodeKey;

    fn key(&self) -> NodeKey {
        self.0.key
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.tag)?;
        if let Some(id) = &self.0.id {
            write!(f, "#{id}")?;
        }
        for class in &self.0.classes {
            write!(f, ".{class}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{self}>")
    }
}

/// Nodes in insertion (document) order.
#[derive(Default)]
pub struct Dom {
    /// All nodes.
    nodes: RefCell<Vec<Node>>,
    /// Next key to hand out.
    next_key: Cell<u32>,
}

impl Dom {
    /// An empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node.
    pub fn add(&self, tag: &str, id: Option<&str>, classes: &[&str]) -> Node {
        let key = NodeKey(self.next_key.get());
        self.next_key.set(key.0 + 1);
        let node = Node(Rc::new(NodeData {
            key,
            tag: tag.to_ascii_lowercase(),
            id: id.map(str::to_string),
            classes: classes.iter().map(|c| (*c).to_string()).collect(),
        }));
        self.nodes.borrow_mut().push(node.clone());
        node
    }

    /// Every node, in document order.
    pub fn nodes(&self) -> Vec<Node> {
        self.nodes.borrow().clone()
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    /// True when the document has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.borrow().is_empty()
    }
}

impl fmt::Debug for Dom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.nodes.borrow().iter()).finish()
    }
}

impl Document<Node> for Dom {
    fn parse(&self, text: &str) -> Result<Rc<dyn Selector<Node>>> {
        Ok(Rc::new(NodeSelector::parse(text)?))
    }

    fn query(&self, selector: &dyn Selector<Node>) -> Vec<Node> {
        self.nodes
            .borrow()
            .iter()
            .filter(|n| selector.matches(n))
            .cloned()
            .collect()
    }
}

/// A single compound such as `div#main.x`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Compound {
    /// Required tag; `None` for `*` or no tag.
    tag: Option<String>,
    /// Required ids.
    ids: Vec<String>,
    /// Required classes.
    classes: Vec<String>,
}

impl Compound {
    /// Parse one compound.
    fn parse(text: &str, full: &str) -> Result<Self> {
        if text.is_empty() {
            return Err(Error::selector(full, "empty compound"));
        }
        let head = HEAD.find(text).map_or("", |m| m.as_str());
        let tag = match head {
            "" | "*" => None,
            t => Some(t.to_ascii_lowercase()),
        };
        let mut out = Self {
            tag,
            ids: Vec::new(),
            classes: Vec::new(),
        };
        let mut rest = &text[head.len()..];
        while !rest.is_empty() {
            let Some(caps) = PART.captures(rest) else {
                return Err(Error::selector(full, format!("unexpected input at '{rest}'")));
            };
            let name = caps[2].to_string();
            if &caps[1] == "#" {
                out.ids.push(name);
            } else {
                out.classes.push(name);
            }
            rest = &rest[caps[0].len()..];
        }
        Ok(out)
    }

    /// Specificity of this compound.
    fn specificity(&self) -> Specificity {
        Specificity(
            u32::try_from(self.ids.len()).unwrap_or(u32::MAX),
            u32::try_from(self.classes.len()).unwrap_or(u32::MAX),
            u32::from(self.tag.is_some()),
        )
    }

    /// Does `node` satisfy every part?
    fn matches(&self, node: &Node) -> bool {
        self.tag.as_deref().is_none_or(|t| t == node.tag())
            && self.ids.iter().all(|id| node.id() == Some(id.as_str()))
            && self.classes.iter().all(|c| node.has_class(c))
    }
}

/// A parsed selector over [`Node`]s.
#[derive(Debug, Clone)]
pub struct NodeSelector {
    /// Text the selector was parsed from.
    source: String,
    /// Alternatives; a node matching any of them matches.
    parts: Vec<Compound>,
    /// Maximum specificity over the alternatives.
    specificity: Specificity,
}

impl NodeSelector {
    /// Parse selector text.
    pub fn parse(text: &str) -> Result<Self> {
        let parts = text
            .split(',')
            .map(|p| Compound::parse(p.trim(), text))
            .collect::<Result<Vec<_>>>()?;
        let specificity = parts
            .iter()
            .map(Compound::specificity)
            .max()
            .unwrap_or_default();
        Ok(Self {
            source: text.to_string(),
            parts,
            specificity,
        })
    }
}

impl Selector<Node> for NodeSelector {
    fn specificity(&self) -> Specificity {
        self.specificity
    }

    fn matches(&self, element: &Node) -> bool {
        self.parts.iter().any(|p| p.matches(element))
    }

    fn source(&self) -> &str {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Dom {
        let dom = Dom::new();
        dom.add("div", Some("main"), &["a", "b"]);
        dom.add("span", None, &["a"]);
        dom.add("P", None, &[]);
        dom
    }

    fn tags(nodes: &[Node]) -> Vec<String> {
        nodes.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn specificity_counts_ids_classes_tags() {
        let s = |t: &str| NodeSelector::parse(t).unwrap().specificity;
        assert_eq!(s("*"), Specificity(0, 0, 0));
        assert_eq!(s("*.a"), Specificity(0, 1, 0));
        assert_eq!(s("*.b.a"), Specificity(0, 2, 0));
        assert_eq!(s("div#main.x"), Specificity(1, 1, 1));
        assert_eq!(s("span, .a.b"), Specificity(0, 2, 0));
    }

    #[test]
    fn queries_follow_document_order() {
        let dom = doc();
        let q = |t: &str| tags(&dom.query(&NodeSelector::parse(t).unwrap()));
        assert_eq!(q("*.a"), vec!["div#main.a.b", "span.a"]);
        assert_eq!(q("*.b.a"), vec!["div#main.a.b"]);
        assert_eq!(q("p"), vec!["p"]);
        assert_eq!(q("#main, p"), vec!["div#main.a.b", "p"]);
        assert!(q("#nope").is_empty());
    }

    #[test]
    fn malformed_selectors_are_rejected() {
        for bad in ["", "div span", "div >p", ".a,", "#", "a..b"] {
            let err = NodeSelector::parse(bad).unwrap_err();
            assert!(matches!(err, Error::Selector { .. }), "{bad:?}");
        }
    }

    #[test]
    fn node_identity_survives_clones() {
        let dom = doc();
        let nodes = dom.nodes();
        let copy = nodes[1].clone();
        assert_eq!(copy.key(), nodes[1].key());
        assert_ne!(nodes[0].key(), nodes[1].key());
        assert_eq!(format!("{copy:?}"), "<span.a>");
    }
}
