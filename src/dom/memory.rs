//! MemoryDocument - arena-backed [`Document`] implementation.
//!
//! Nodes live in one `Vec` and are addressed by [`NodeId`]. Nothing is ever
//! freed: detached nodes stay valid, which keeps ids stable for the engine's
//! host → instance map.
//!
//! The cost is that memory only grows. Every assembly deep-copies its
//! template and every detach leaves the old subtree in the arena, so repeated
//! mount/unmount cycles grow the document for its whole lifetime. Long-running
//! hosts that churn components should plug in a [`Document`] that reclaims
//! detached nodes.

use super::markup::{self, Token};
use super::Document;
use crate::error::DocumentError;

/// Index of a node in a [`MemoryDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum NodeKind {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
        isolated_root: Option<NodeId>,
    },
    Text(String),
    Fragment,
    IsolatedRoot,
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// In-memory document tree.
#[derive(Debug)]
pub struct MemoryDocument {
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    /// Empty document with a fragment root.
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        doc.root = doc.alloc(NodeKind::Fragment);
        doc
    }

    /// Document whose root holds the parsed `markup`.
    pub fn from_markup(markup: &str) -> Result<Self, DocumentError> {
        let mut doc = Self::new();
        let root = doc.root;
        doc.parse_into(&root, markup)?;
        Ok(doc)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Parse `markup` and append the result to `parent`.
    pub fn parse_into(&mut self, parent: &NodeId, markup: &str) -> Result<(), DocumentError> {
        let fragment = self.parse_fragment(markup)?;
        self.append_child(parent, &fragment);
        Ok(())
    }

    /// Serialize `node`. Elements include their own tag; fragments and
    /// isolated roots serialize their children only.
    pub fn to_markup(&self, node: &NodeId) -> String {
        let mut out = String::new();
        self.write_markup(*node, &mut out);
        out
    }

    /// Serialize the children of `node`.
    pub fn inner_markup(&self, node: &NodeId) -> String {
        let mut out = String::new();
        for child in &self.data(*node).children {
            self.write_markup(*child, &mut out);
        }
        out
    }

    /// Nodes allocated so far, attached or not.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// First element in the whole light tree with tag `tag`.
    pub fn first_by_tag(&self, tag: &str) -> Option<NodeId> {
        self.elements_by_tag(&self.root, tag).into_iter().next()
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    fn data_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0]
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.data_mut(id).parent.take() {
            self.data_mut(parent).children.retain(|child| *child != id);
        }
    }

    fn push_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.data_mut(child).parent = Some(parent);
        self.data_mut(parent).children.push(child);
    }

    fn write_markup(&self, id: NodeId, out: &mut String) {
        let data = self.data(id);
        match &data.kind {
            NodeKind::Text(text) => {
                let raw = data
                    .parent
                    .and_then(|p| self.tag_name(&p))
                    .is_some_and(|tag| markup::is_raw_text(&tag));
                if raw {
                    out.push_str(text);
                } else {
                    out.push_str(&markup::escape_text(text));
                }
            }
            NodeKind::Fragment | NodeKind::IsolatedRoot => {
                for child in &data.children {
                    self.write_markup(*child, out);
                }
            }
            NodeKind::Element { tag, attributes, .. } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&markup::escape_attribute(value));
                    out.push('"');
                }
                out.push('>');
                if markup::is_void(tag) {
                    return;
                }
                for child in &data.children {
                    self.write_markup(*child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }

    fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let kind = match &self.data(id).kind {
            NodeKind::Element { tag, attributes, .. } => NodeKind::Element {
                tag: tag.clone(),
                attributes: attributes.clone(),
                isolated_root: None,
            },
            other => other.clone(),
        };
        let copy = self.alloc(kind);
        let children = self.data(id).children.clone();
        for child in children {
            let child_copy = self.clone_subtree(child);
            self.push_child(copy, child_copy);
        }
        copy
    }
}

impl Document for MemoryDocument {
    type Node = NodeId;

    fn parse_fragment(&mut self, markup: &str) -> Result<NodeId, DocumentError> {
        let tokens = markup::tokenize(markup)?;
        let fragment = self.alloc(NodeKind::Fragment);
        let mut open: Vec<(String, NodeId)> = Vec::new();

        for token in tokens {
            let parent = open.last().map_or(fragment, |(_, id)| *id);
            match token {
                Token::Text(text) => {
                    let node = self.alloc(NodeKind::Text(text));
                    self.push_child(parent, node);
                }
                Token::StartTag {
                    name,
                    attributes,
                    self_closing,
                } => {
                    let node = self.alloc(NodeKind::Element {
                        tag: name.clone(),
                        attributes,
                        isolated_root: None,
                    });
                    self.push_child(parent, node);
                    if !self_closing && !markup::is_void(&name) {
                        open.push((name, node));
                    }
                }
                Token::EndTag(name) => {
                    // Close up to the matching element; stray end tags are ignored
                    if let Some(index) = open.iter().rposition(|(tag, _)| *tag == name) {
                        open.truncate(index);
                    }
                }
            }
        }

        Ok(fragment)
    }

    fn deep_clone(&mut self, node: &NodeId) -> NodeId {
        self.clone_subtree(*node)
    }

    fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeKind::Element {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
            isolated_root: None,
        })
    }

    fn tag_name(&self, node: &NodeId) -> Option<String> {
        match &self.data(*node).kind {
            NodeKind::Element { tag, .. } => Some(tag.clone()),
            _ => None,
        }
    }

    fn is_text(&self, node: &NodeId) -> bool {
        matches!(self.data(*node).kind, NodeKind::Text(_))
    }

    fn children(&self, node: &NodeId) -> Vec<NodeId> {
        self.data(*node).children.clone()
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.data(*node).parent
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        match &self.data(*node).kind {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.clone()),
            _ => None,
        }
    }

    fn attributes(&self, node: &NodeId) -> Vec<(String, String)> {
        match &self.data(*node).kind {
            NodeKind::Element { attributes, .. } => attributes.clone(),
            _ => Vec::new(),
        }
    }

    fn set_attribute(&mut self, node: &NodeId, name: &str, value: &str) {
        if let NodeKind::Element { attributes, .. } = &mut self.data_mut(*node).kind {
            match attributes.iter_mut().find(|(key, _)| key == name) {
                Some((_, existing)) => *existing = value.to_string(),
                None => attributes.push((name.to_string(), value.to_string())),
            }
        }
    }

    fn text_content(&self, node: &NodeId) -> String {
        match &self.data(*node).kind {
            NodeKind::Text(text) => text.clone(),
            _ => self
                .data(*node)
                .children
                .iter()
                .map(|child| self.text_content(child))
                .collect(),
        }
    }

    fn set_text_content(&mut self, node: &NodeId, text: &str) {
        if let NodeKind::Text(existing) = &mut self.data_mut(*node).kind {
            *existing = text.to_string();
            return;
        }
        self.remove_children(node);
        if !text.is_empty() {
            let text_node = self.alloc(NodeKind::Text(text.to_string()));
            self.push_child(*node, text_node);
        }
    }

    fn append_child(&mut self, parent: &NodeId, child: &NodeId) {
        if matches!(self.data(*child).kind, NodeKind::Fragment) {
            for grandchild in self.data(*child).children.clone() {
                self.push_child(*parent, grandchild);
            }
        } else {
            self.push_child(*parent, *child);
        }
    }

    fn replace_node(&mut self, old: &NodeId, replacement: &NodeId) {
        let Some(parent) = self.data(*old).parent else {
            return;
        };
        self.detach(*replacement);
        let Some(index) = self.data(parent).children.iter().position(|c| c == old) else {
            return;
        };
        self.data_mut(parent).children[index] = *replacement;
        self.data_mut(*replacement).parent = Some(parent);
        self.data_mut(*old).parent = None;
    }

    fn remove_children(&mut self, node: &NodeId) {
        let children = std::mem::take(&mut self.data_mut(*node).children);
        for child in children {
            self.data_mut(child).parent = None;
        }
    }

    fn attach_isolated_root(&mut self, host: &NodeId) -> NodeId {
        if let Some(existing) = self.isolated_root(host) {
            return existing;
        }
        let root = self.alloc(NodeKind::IsolatedRoot);
        if let NodeKind::Element { isolated_root, .. } = &mut self.data_mut(*host).kind {
            *isolated_root = Some(root);
        }
        root
    }

    fn isolated_root(&self, host: &NodeId) -> Option<NodeId> {
        match &self.data(*host).kind {
            NodeKind::Element { isolated_root, .. } => *isolated_root,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_round_trip_markup() {
        let source = r#"<div class="card"><h1>Title</h1><br><slot name="footer"></slot></div>"#;
        let doc = MemoryDocument::from_markup(source).unwrap();
        assert_eq!(doc.inner_markup(&doc.root()), source);
    }

    #[test]
    fn test_unclosed_elements_close_at_end() {
        let doc = MemoryDocument::from_markup("<ul><li>a<li>b").unwrap();
        assert_eq!(doc.inner_markup(&doc.root()), "<ul><li>a<li>b</li></li></ul>");
    }

    #[test]
    fn test_deep_clone_is_independent() {
        let mut doc = MemoryDocument::new();
        let fragment = doc.parse_fragment("<p id=\"a\">x</p>").unwrap();
        let copy = doc.deep_clone(&fragment);

        let p = doc.children(&copy)[0];
        doc.set_attribute(&p, "id", "b");

        assert_eq!(doc.inner_markup(&fragment), "<p id=\"a\">x</p>");
        assert_eq!(doc.inner_markup(&copy), "<p id=\"b\">x</p>");
    }

    #[test]
    fn test_removed_nodes_are_not_reclaimed() {
        let mut doc = MemoryDocument::from_markup("<x-a></x-a>").unwrap();
        let host = doc.first_by_tag("x-a").unwrap();
        let template = doc.parse_fragment("<p>x</p>").unwrap();

        let copy = doc.deep_clone(&template);
        doc.append_child(&host, &copy);
        let before = doc.node_count();
        doc.remove_children(&host);

        assert_eq!(doc.node_count(), before);
        let copy = doc.deep_clone(&template);
        doc.append_child(&host, &copy);
        assert!(doc.node_count() > before);
        assert_eq!(doc.inner_markup(&host), "<p>x</p>");
    }

    #[test]
    fn test_append_fragment_moves_children() {
        let mut doc = MemoryDocument::new();
        let fragment = doc.parse_fragment("<a></a><b></b>").unwrap();
        let root = doc.root();
        doc.append_child(&root, &fragment);

        assert_eq!(doc.children(&fragment).len(), 0);
        assert_eq!(doc.inner_markup(&root), "<a></a><b></b>");
    }

    #[test]
    fn test_replace_node() {
        let mut doc = MemoryDocument::from_markup("<div><slot></slot><i></i></div>").unwrap();
        let slot = doc.first_by_tag("slot").unwrap();
        let span = doc.create_element("span");
        doc.replace_node(&slot, &span);

        assert_eq!(doc.inner_markup(&doc.root()), "<div><span></span><i></i></div>");
        assert_eq!(doc.parent(&slot), None);
    }

    #[test]
    fn test_find_by_attribute_is_preorder() {
        let doc =
            MemoryDocument::from_markup(r#"<div><p ref="x">1</p></div><p ref="x">2</p>"#).unwrap();
        let found = doc.find_by_attribute(&doc.root(), "ref", "x").unwrap();
        assert_eq!(doc.text_content(&found), "1");
    }

    #[test]
    fn test_isolated_root_is_not_a_child() {
        let mut doc = MemoryDocument::from_markup("<x-card></x-card>").unwrap();
        let host = doc.first_by_tag("x-card").unwrap();
        let shadow = doc.attach_isolated_root(&host);
        assert_eq!(doc.attach_isolated_root(&host), shadow);

        let inner = doc.create_element("b");
        doc.append_child(&shadow, &inner);

        assert!(doc.children(&host).is_empty());
        assert_eq!(doc.inner_markup(&shadow), "<b></b>");
    }

    #[test]
    fn test_script_text_serialized_raw() {
        let doc = MemoryDocument::from_markup("<script>a < b</script><p>a &lt; b</p>").unwrap();
        assert_eq!(
            doc.inner_markup(&doc.root()),
            "<script>a < b</script><p>a &lt; b</p>"
        );
    }
}
