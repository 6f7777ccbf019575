pub mod css;
pub mod guard;
pub mod parser;

use std::collections::{BTreeMap, HashSet};

use crate::dom::css::InlineStyle;

/// Handle to a node in a [`Document`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Document,
    Element,
    Text,
}

/// Arena-resident DOM node.
#[derive(Debug, Clone)]
pub struct DomNode {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    pub text: String,
    pub node_type: NodeType,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl DomNode {
    fn new(node_type: NodeType, tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: BTreeMap::new(),
            text: String::new(),
            node_type,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// A change to a watched node's `style` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub old_value: Option<String>,
}

/// Single-document DOM with parent links and style-attribute observation.
///
/// Nodes are never freed; a removed subtree stays in the arena detached from
/// the root, which is how a timer that still holds a `NodeId` can keep
/// reading it harmlessly.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<DomNode>,
    root: NodeId,
    style_watches: HashSet<NodeId>,
    pending_records: Vec<MutationRecord>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty document holding only the `#document` node.
    pub fn new() -> Self {
        Self {
            nodes: vec![DomNode::new(NodeType::Document, "#document")],
            root: NodeId(0),
            style_watches: HashSet::new(),
            pending_records: Vec::new(),
        }
    }

    /// Document with the usual `html`/`head`/`body` skeleton.
    pub fn with_skeleton() -> Self {
        let mut doc = Self::new();
        let html = doc.create_element("html");
        let head = doc.create_element("head");
        let body = doc.create_element("body");
        doc.append_child(doc.root, html);
        doc.append_child(html, head);
        doc.append_child(html, body);
        doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &DomNode {
        &self.nodes[id.0]
    }

    /// The `html` element, if any.
    pub fn document_element(&self) -> Option<NodeId> {
        self.node(self.root)
            .children
            .iter()
            .copied()
            .find(|&c| self.node(c).node_type == NodeType::Element)
    }

    pub fn head(&self) -> Option<NodeId> {
        self.document_element()
            .and_then(|html| self.first_child_by_tag(html, "head"))
    }

    pub fn body(&self) -> Option<NodeId> {
        self.document_element()
            .and_then(|html| self.first_child_by_tag(html, "body"))
    }

    fn first_child_by_tag(&self, parent: NodeId, tag: &str) -> Option<NodeId> {
        self.node(parent)
            .children
            .iter()
            .copied()
            .find(|&c| self.node(c).tag == tag)
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(DomNode::new(NodeType::Element, tag))
    }

    pub fn create_text(&mut self, content: impl Into<String>) -> NodeId {
        let mut node = DomNode::new(NodeType::Text, "");
        node.text = content.into();
        self.push(node)
    }

    fn push(&mut self, node: DomNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Insert `new` as the next sibling of `reference`. No-op when
    /// `reference` has no parent.
    pub fn insert_after(&mut self, reference: NodeId, new: NodeId) {
        let Some(parent) = self.node(reference).parent else {
            return;
        };
        self.detach(new);
        let siblings = &mut self.nodes[parent.0].children;
        let pos = siblings
            .iter()
            .position(|&c| c == reference)
            .map(|p| p + 1)
            .unwrap_or(siblings.len());
        siblings.insert(pos, new);
        self.nodes[new.0].parent = Some(parent);
    }

    /// Detach every child of `parent` and append `new` in their place.
    pub fn replace_children(&mut self, parent: NodeId, new: NodeId) {
        let old = std::mem::take(&mut self.nodes[parent.0].children);
        for child in old {
            self.nodes[child.0].parent = None;
        }
        self.append_child(parent, new);
    }

    /// Detach `node` (and its subtree) from the tree.
    pub fn remove(&mut self, node: NodeId) {
        self.detach(node);
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != node);
        }
    }

    /// Whether `node` is reachable from the document root.
    pub fn is_connected(&self, node: NodeId) -> bool {
        let mut cur = Some(node);
        while let Some(id) = cur {
            if id == self.root {
                return true;
            }
            cur = self.node(id).parent;
        }
        false
    }

    /// Ancestors of `node`, nearest first, excluding the `#document` node.
    pub fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cur = self.node(node).parent;
        while let Some(id) = cur {
            if id == self.root {
                break;
            }
            out.push(id);
            cur = self.node(id).parent;
        }
        out
    }

    /// Depth-first walk of the subtree under `node` (excluding `node`).
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.node(node).children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.node(id).children.iter().rev().copied());
        }
        out
    }

    /// First connected element whose `id` attribute equals `id`.
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|&n| self.node(n).attr("id") == Some(id))
    }

    /// Elements under the root carrying attribute `name`, in document order.
    pub fn elements_with_attr(&self, name: &str) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|&n| self.node(n).attributes.contains_key(name))
            .collect()
    }

    /// First descendant of `node` matching `tag` and `class`.
    pub fn query_tag_class(&self, node: NodeId, tag: &str, class: &str) -> Option<NodeId> {
        self.descendants(node).into_iter().find(|&n| {
            let el = self.node(n);
            el.tag == tag && el.has_class(class)
        })
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: impl Into<String>) {
        let value = value.into();
        let old = self.nodes[node.0]
            .attributes
            .insert(name.to_string(), value.clone());
        if name == "style" && old.as_deref() != Some(value.as_str()) {
            self.record_style_change(node, old);
        }
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) {
        let old = self.nodes[node.0].attributes.remove(name);
        if name == "style" && old.is_some() {
            self.record_style_change(node, old);
        }
    }

    pub fn style(&self, node: NodeId) -> InlineStyle {
        InlineStyle::parse(self.node(node).attr("style").unwrap_or(""))
    }

    pub fn style_property(&self, node: NodeId, prop: &str) -> Option<String> {
        self.style(node).get(prop).map(str::to_string)
    }

    pub fn set_style_property(&mut self, node: NodeId, prop: &str, value: &str) {
        let mut style = self.style(node);
        style.set(prop, value);
        self.set_attribute(node, "style", style.to_string());
    }

    /// Remove one inline declaration. Returns whether it was present.
    pub fn remove_style_property(&mut self, node: NodeId, prop: &str) -> bool {
        let mut style = self.style(node);
        if !style.remove(prop) {
            return false;
        }
        if style.is_empty() {
            self.remove_attribute(node, "style");
        } else {
            self.set_attribute(node, "style", style.to_string());
        }
        true
    }

    /// Start queuing mutation records for `node`'s `style` attribute.
    pub fn observe_style(&mut self, node: NodeId) {
        self.style_watches.insert(node);
    }

    pub fn unobserve_style(&mut self, node: NodeId) {
        self.style_watches.remove(&node);
    }

    pub fn is_style_observed(&self, node: NodeId) -> bool {
        self.style_watches.contains(&node)
    }

    fn record_style_change(&mut self, target: NodeId, old_value: Option<String>) {
        if self.style_watches.contains(&target) {
            self.pending_records.push(MutationRecord { target, old_value });
        }
    }

    /// Drain queued mutation records.
    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.pending_records)
    }

    /// Recursively count connected nodes
    pub fn node_count(&self) -> usize {
        1 + self.descendants(self.root).len()
    }
}
