//! Tree Adapter: an owned, mutable document tree.
//!
//! html5ever does the hard work of turning malformed markup into a DOM; this
//! module imports that DOM into a flat arena ([`Tree`]) where every node has
//! a parent back-reference and can be renamed, detached, or unwrapped in
//! place. Detached nodes stay in the arena until the tree is dropped, which
//! happens at the end of each conversion, so [`NodeId`]s never dangle.
//!
//! ```text
//! markup ──▶ load (html5ever + RcDom) ──▶ Tree ──▶ passes ──▶ serialize
//! ```

mod load;
mod query;
mod serialize;
mod tag;

pub use query::{Step, TagPath};
pub use tag::Tag;

use crate::error::DocNormError;

/// Index of a node inside its [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// One `name="value"` pair on an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// Attribute map with case-insensitive unique keys.
///
/// Insertion order is kept so serialisation is stable; it carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: Vec<Attribute>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| a.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Set `name` to `value`, replacing an existing entry in place.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|a| a.name.eq_ignore_ascii_case(name))
        {
            Some(existing) => existing.value = value,
            None => self.entries.push(Attribute {
                name: name.to_string(),
                value,
            }),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let pos = self
            .entries
            .iter()
            .position(|a| a.name.eq_ignore_ascii_case(name))?;
        Some(self.entries.remove(pos).value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.entries.iter()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attrs = Attributes::new();
        for (k, v) in iter {
            let name: String = k.into();
            // First occurrence wins, as in the HTML tokenizer.
            if !attrs.contains(&name) {
                attrs.entries.push(Attribute {
                    name,
                    value: v.into(),
                });
            }
        }
        attrs
    }
}

/// An element: tag name plus attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: Attributes,
}

impl Element {
    pub fn tag(&self) -> Tag {
        Tag::from_name(&self.name)
    }
}

/// Payload of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Document,
    Doctype {
        name: String,
        public_id: String,
        system_id: String,
    },
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena-backed document tree, rooted at a `Document` node.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// An empty tree holding only the document node.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                data: NodeData::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// Parse markup with the tolerant html5ever parser.
    pub fn parse(markup: &[u8]) -> Result<Self, DocNormError> {
        load::parse(markup)
    }

    /// Serialise the attached tree back to markup.
    pub fn serialize(&self) -> String {
        serialize::serialize(self)
    }

    pub fn document(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of nodes ever allocated (attached or not).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    // ── Node creation ───────────────────────────────────────────────────

    fn alloc(&mut self, data: NodeData) -> NodeId {
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    pub fn create_element(&mut self, name: &str, attrs: Attributes) -> NodeId {
        self.alloc(NodeData::Element(Element {
            name: name.to_string(),
            attrs,
        }))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeData::Text(text.into()))
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeData::Comment(text.into()))
    }

    pub fn create_doctype(&mut self, name: &str, public_id: &str, system_id: &str) -> NodeId {
        self.alloc(NodeData::Doctype {
            name: name.to_string(),
            public_id: public_id.to_string(),
            system_id: system_id.to_string(),
        })
    }

    // ── Accessors ───────────────────────────────────────────────────────

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0].data
    }

    pub fn data_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0].data
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.0].data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[id.0].data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Tag of an element node; `None` for text, comments and the like.
    pub fn tag(&self, id: NodeId) -> Option<Tag> {
        self.element(id).map(Element::tag)
    }

    pub fn is_tag(&self, id: NodeId, tag: Tag) -> bool {
        self.tag(id) == Some(tag)
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|el| el.attrs.get(name))
    }

    pub fn has_attrs(&self, id: NodeId) -> bool {
        self.element(id).is_some_and(|el| !el.attrs.is_empty())
    }

    /// Element children only, in order.
    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| self.element(c).is_some())
    }

    /// First element child carrying `tag`.
    pub fn child_by_tag(&self, id: NodeId, tag: Tag) -> Option<NodeId> {
        self.element_children(id).find(|&c| self.is_tag(c, tag))
    }

    /// True when the node is reachable from the document node.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut cur = id;
        loop {
            if cur == self.document() {
                return true;
            }
            match self.parent(cur) {
                Some(p) => cur = p,
                None => return false,
            }
        }
    }

    /// Pre-order walk of the strict descendants of `id`.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        let mut stack: Vec<NodeId> = self.children(id).to_vec();
        stack.reverse();
        Descendants { tree: self, stack }
    }

    /// Concatenated text of every descendant text node.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for d in self.descendants(id) {
            if let NodeData::Text(t) = self.data(d) {
                out.push_str(t);
            }
        }
        out
    }

    // ── Mutation ────────────────────────────────────────────────────────

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        if let Some(el) = self.element_mut(id) {
            el.attrs.set(name, value);
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Option<String> {
        self.element_mut(id).and_then(|el| el.attrs.remove(name))
    }

    /// Change an element's tag name; attributes and children stay.
    pub fn rename(&mut self, id: NodeId, name: &str) {
        if let Some(el) = self.element_mut(id) {
            el.name = name.to_string();
        }
    }

    /// Detach `child` from wherever it is and append it to `parent`.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Detach `node` and insert it right before `reference` under the same parent.
    pub fn insert_before(&mut self, reference: NodeId, node: NodeId) {
        self.detach(node);
        let Some(parent) = self.parent(reference) else {
            return;
        };
        let pos = self.position(parent, reference);
        self.nodes[node.0].parent = Some(parent);
        self.nodes[parent.0].children.insert(pos, node);
    }

    /// Remove `node` from its parent. The node keeps its own subtree.
    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != node);
        }
    }

    /// Drop every child of `node`.
    pub fn clear_children(&mut self, node: NodeId) {
        let children = std::mem::take(&mut self.nodes[node.0].children);
        for c in children {
            self.nodes[c.0].parent = None;
        }
    }

    /// Replace the content of `node` with a single text node.
    pub fn set_text_content(&mut self, node: NodeId, text: &str) {
        self.clear_children(node);
        let t = self.create_text(text);
        self.append(node, t);
    }

    /// Put a text node where `node` was, discarding `node` and its subtree.
    pub fn replace_with_text(&mut self, node: NodeId, text: &str) {
        let t = self.create_text(text);
        self.insert_before(node, t);
        self.detach(node);
    }

    /// Unwrap `node`: its children take its place in the parent's child list.
    ///
    /// With `keep_style_on_parent`, the node's `style` attribute is copied
    /// onto the parent (overwriting any existing value) before the unwrap.
    pub fn replace_with_children(
        &mut self,
        node: NodeId,
        keep_style_on_parent: bool,
    ) -> Result<(), DocNormError> {
        let parent = self.parent(node).ok_or_else(|| DocNormError::MalformedTree {
            rule: "unwrap",
            detail: format!("node {} has no parent", node.0),
        })?;

        if keep_style_on_parent {
            if let Some(style) = self.attr(node, "style").map(str::to_string) {
                self.set_attr(parent, "style", style);
            }
        }

        let pos = self.position(parent, node);
        let children = std::mem::take(&mut self.nodes[node.0].children);
        for &c in &children {
            self.nodes[c.0].parent = Some(parent);
        }
        self.nodes[node.0].parent = None;

        let siblings = &mut self.nodes[parent.0].children;
        let tail = siblings.split_off(pos + 1);
        siblings.pop();
        siblings.extend(children);
        siblings.extend(tail);
        Ok(())
    }

    // Parent links and child lists are always updated together, so a
    // node is always found in its parent's child list.
    fn position(&self, parent: NodeId, child: NodeId) -> usize {
        self.nodes[parent.0]
            .children
            .iter()
            .position(|&c| c == child)
            .unwrap_or(0)
    }
}

/// Iterator returned by [`Tree::descendants`].
pub struct Descendants<'a> {
    tree: &'a Tree,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.tree.children(id).iter().rev().copied());
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn el(tree: &mut Tree, name: &str) -> NodeId {
        tree.create_element(name, Attributes::new())
    }

    #[test]
    fn attributes_are_case_insensitive_and_unique() {
        let mut attrs = Attributes::new();
        attrs.set("Style", "a: b;");
        attrs.set("style", "c: d;");
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs.get("STYLE"), Some("c: d;"));
        assert_eq!(attrs.remove("style").as_deref(), Some("c: d;"));
        assert!(attrs.is_empty());
    }

    #[test]
    fn from_iter_keeps_first_duplicate() {
        let attrs: Attributes = vec![("align", "left"), ("ALIGN", "right")]
            .into_iter()
            .collect();
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs.get("align"), Some("left"));
    }

    #[test]
    fn replace_with_children_promotes_in_place() {
        let mut tree = Tree::new();
        let body = el(&mut tree, "body");
        tree.append(tree.document(), body);
        let a = tree.create_text("a");
        let u = el(&mut tree, "u");
        let z = tree.create_text("z");
        tree.append(body, a);
        tree.append(body, u);
        tree.append(body, z);
        let x = tree.create_text("x");
        let y = el(&mut tree, "div");
        tree.append(u, x);
        tree.append(u, y);

        tree.replace_with_children(u, false).unwrap();

        assert_eq!(tree.children(body), &[a, x, y, z]);
        assert_eq!(tree.parent(y), Some(body));
        assert!(!tree.is_attached(u));
    }

    #[test]
    fn replace_with_children_copies_style() {
        let mut tree = Tree::new();
        let ul = el(&mut tree, "ul");
        tree.append(tree.document(), ul);
        let div = el(&mut tree, "div");
        tree.set_attr(div, "style", "color: red;");
        tree.append(ul, div);

        tree.replace_with_children(div, true).unwrap();
        assert_eq!(tree.attr(ul, "style"), Some("color: red;"));
    }

    #[test]
    fn replace_with_children_without_parent_is_an_error() {
        let mut tree = Tree::new();
        let orphan = el(&mut tree, "div");
        assert!(matches!(
            tree.replace_with_children(orphan, false),
            Err(DocNormError::MalformedTree { .. })
        ));
    }

    #[test]
    fn replace_with_text_keeps_position() {
        let mut tree = Tree::new();
        let body = el(&mut tree, "body");
        tree.append(tree.document(), body);
        let first = tree.create_text("1");
        let img = el(&mut tree, "img");
        let last = tree.create_text("3");
        tree.append(body, first);
        tree.append(body, img);
        tree.append(body, last);

        tree.replace_with_text(img, " ");

        assert_eq!(tree.children(body).len(), 3);
        assert_eq!(tree.text_content(body), "1 3");
    }

    #[test]
    fn descendants_are_preorder() {
        let mut tree = Tree::new();
        let html = el(&mut tree, "html");
        let head = el(&mut tree, "head");
        let body = el(&mut tree, "body");
        let p = el(&mut tree, "p");
        tree.append(tree.document(), html);
        tree.append(html, head);
        tree.append(html, body);
        tree.append(body, p);

        let order: Vec<NodeId> = tree.descendants(tree.document()).collect();
        assert_eq!(order, vec![html, head, body, p]);
    }

    #[test]
    fn insert_before_moves_node() {
        let mut tree = Tree::new();
        let body = el(&mut tree, "body");
        tree.append(tree.document(), body);
        let a = el(&mut tree, "a");
        let b = el(&mut tree, "b");
        tree.append(body, a);
        tree.append(body, b);
        tree.insert_before(a, b);
        assert_eq!(tree.children(body), &[b, a]);
    }
}
