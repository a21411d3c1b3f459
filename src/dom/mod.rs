//! Rendering substrate - the document tree components are assembled into.
//!
//! The engine never touches a concrete tree. It goes through [`Document`],
//! which covers exactly what assembly needs: parse a fetched fragment, clone
//! it, walk and rewire nodes, read and write attributes, and open an isolated
//! sub-root for components that do not share the global style cascade.
//!
//! [`MemoryDocument`] is a complete arena-backed implementation used for
//! server-side assembly and tests.

mod markup;
mod memory;

pub use markup::{Token, tokenize, VOID_ELEMENTS};
pub use memory::{MemoryDocument, NodeId};

use std::fmt;
use std::hash::Hash;

use crate::error::DocumentError;

/// Tree operations the component engine relies on.
///
/// Node handles are cheap, comparable and hashable. Detached nodes stay valid.
/// Whether their storage is ever reclaimed is up to the implementation;
/// [`MemoryDocument`] never reclaims it.
pub trait Document {
    type Node: Clone + Eq + Hash + fmt::Debug + 'static;

    /// Parse markup into a detached fragment node.
    fn parse_fragment(&mut self, markup: &str) -> Result<Self::Node, DocumentError>;

    /// Detached deep copy of `node` and its descendants.
    fn deep_clone(&mut self, node: &Self::Node) -> Self::Node;

    /// New detached element.
    fn create_element(&mut self, tag: &str) -> Self::Node;

    /// Lowercase tag name; `None` for text, fragments and isolated roots.
    fn tag_name(&self, node: &Self::Node) -> Option<String>;

    fn is_text(&self, node: &Self::Node) -> bool;

    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;

    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;

    /// Attributes in declaration order.
    fn attributes(&self, node: &Self::Node) -> Vec<(String, String)>;

    fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str);

    /// Concatenated text of the node and its descendants.
    fn text_content(&self, node: &Self::Node) -> String;

    /// Replace all children with a single text node.
    fn set_text_content(&mut self, node: &Self::Node, text: &str);

    /// Move `child` to the end of `parent`. Appending a fragment moves its
    /// children instead.
    fn append_child(&mut self, parent: &Self::Node, child: &Self::Node);

    /// Put `replacement` where `old` is; `old` becomes detached.
    fn replace_node(&mut self, old: &Self::Node, replacement: &Self::Node);

    fn remove_children(&mut self, node: &Self::Node);

    /// Isolated sub-root of `host`, created on first call.
    fn attach_isolated_root(&mut self, host: &Self::Node) -> Self::Node;

    fn isolated_root(&self, host: &Self::Node) -> Option<Self::Node>;

    /// Descendants of `node` in pre-order, excluding `node` itself.
    ///
    /// Isolated sub-roots are not entered.
    fn descendants(&self, node: &Self::Node) -> Vec<Self::Node> {
        let mut out = Vec::new();
        let mut stack: Vec<Self::Node> = self.children(node).into_iter().rev().collect();
        while let Some(next) = stack.pop() {
            stack.extend(self.children(&next).into_iter().rev());
            out.push(next);
        }
        out
    }

    /// First descendant (pre-order) whose attribute `name` equals `value`.
    fn find_by_attribute(&self, node: &Self::Node, name: &str, value: &str) -> Option<Self::Node> {
        self.descendants(node)
            .into_iter()
            .find(|candidate| self.attribute(candidate, name).as_deref() == Some(value))
    }

    /// Descendant elements with tag `tag`, pre-order.
    fn elements_by_tag(&self, node: &Self::Node, tag: &str) -> Vec<Self::Node> {
        self.descendants(node)
            .into_iter()
            .filter(|candidate| self.tag_name(candidate).as_deref() == Some(tag))
            .collect()
    }
}
