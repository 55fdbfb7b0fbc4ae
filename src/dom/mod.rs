//! Scene document: a small arena DOM the export pipeline reads, clones and
//! mutates.
//!
//! Node ids are indices into the arena, so a cloned document keeps the same
//! ids as its source. Removing a node only detaches it; the slot stays in the
//! arena so stale ids never alias a different node.

mod parse;
pub mod style;

use std::sync::Arc;

use url::Url;

use crate::assets::ImageRegistry;
use crate::css::Declarations;

pub use style::ComputedStyle;

/// Handle to a node in a [`Document`] (and in every clone of it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Html,
    Svg,
}

#[derive(Debug, Clone)]
pub struct ElementData {
    tag: String,
    namespace: Namespace,
    attrs: Vec<(String, String)>,
    style: Declarations,
    rules: Declarations,
}

impl ElementData {
    fn new(tag: &str, namespace: Namespace) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            namespace,
            attrs: Vec::new(),
            style: Declarations::new(),
            rules: Declarations::new(),
        }
    }

    /// Lowercased tag name.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn is_svg(&self) -> bool {
        self.namespace == Namespace::Svg
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        if name.eq_ignore_ascii_case("style") {
            return None;
        }
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute. `style` is parsed into the inline declaration block.
    pub fn set_attr(&mut self, name: &str, value: &str) {
        if name.eq_ignore_ascii_case("style") {
            self.style = Declarations::parse(value);
            return;
        }
        match self.attrs.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            Some(slot) => slot.1 = value.to_string(),
            None => self.attrs.push((name.to_string(), value.to_string())),
        }
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    /// Inline `style` declarations.
    pub fn style(&self) -> &Declarations {
        &self.style
    }

    pub fn style_mut(&mut self) -> &mut Declarations {
        &mut self.style
    }

    /// Declarations contributed by matching stylesheet rules, in source order.
    pub fn rules(&self) -> &Declarations {
        &self.rules
    }
}

#[derive(Debug, Clone)]
pub enum NodeData {
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

impl Node {
    pub fn data(&self) -> &NodeData {
        &self.data
    }

    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(e) => Some(e),
            NodeData::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.data {
            NodeData::Text(t) => Some(t),
            NodeData::Element(_) => None,
        }
    }
}

/// A scene document.
///
/// Cloning is deep for the tree and shallow for decoded images, which live in
/// the shared [`ImageRegistry`].
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    base_url: Option<Url>,
    images: Arc<ImageRegistry>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty `<html><body></body></html>` document.
    pub fn new() -> Self {
        Self::with_base_url(None)
    }

    pub fn with_base_url(base_url: Option<Url>) -> Self {
        let images = Arc::new(ImageRegistry::new(base_url.clone()));
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            base_url,
            images,
        };
        doc.root = doc.create_element("html");
        let body = doc.create_element("body");
        doc.append_child(doc.root, body);
        doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// First `<body>` element, or the root when there is none.
    pub fn body(&self) -> NodeId {
        self.children(self.root)
            .iter()
            .copied()
            .find(|&c| self.element(c).is_some_and(|e| e.tag() == "body"))
            .unwrap_or(self.root)
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    pub fn images(&self) -> &Arc<ImageRegistry> {
        &self.images
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        self.node(id).and_then(Node::as_element)
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match self.nodes.get_mut(id.0).map(|n| &mut n.data) {
            Some(NodeData::Element(e)) => Some(e),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.create_element_ns(tag, Namespace::Html)
    }

    pub fn create_element_ns(&mut self, tag: &str, namespace: Namespace) -> NodeId {
        self.push(NodeData::Element(ElementData::new(tag, namespace)))
    }

    pub fn create_text_node(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Text(text.to_string()))
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            data,
        });
        id
    }

    /// Append `child` as the last child of `parent`, detaching it first.
    /// Appending a node under itself or its own descendant is ignored.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if self.node(parent).is_none() || self.node(child).is_none() {
            return;
        }
        if self.ancestors_inclusive(parent).any(|a| a == child) {
            return;
        }
        self.remove(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Detach `id` (and its subtree) from its parent.
    pub fn remove(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        self.nodes[parent.0].children.retain(|&c| c != id);
        self.nodes[id.0].parent = None;
    }

    fn ancestors_inclusive(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(id), move |&n| self.parent(n))
    }

    /// Whether `id` is reachable from the document root.
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.ancestors_inclusive(id).any(|a| a == self.root)
    }

    /// Preorder element descendants of `id`, excluding `id` itself.
    pub fn descendant_elements(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            if self.element(n).is_some() {
                out.push(n);
                stack.extend(self.children(n).iter().rev().copied());
            }
        }
        out
    }

    pub fn get_element_by_id(&self, element_id: &str) -> Option<NodeId> {
        std::iter::once(self.root)
            .chain(self.descendant_elements(self.root))
            .find(|&n| self.element(n).and_then(ElementData::id) == Some(element_id))
    }

    /// Element descendants of `root` (inclusive) with the given tag.
    pub fn elements_by_tag(&self, root: NodeId, tag: &str) -> Vec<NodeId> {
        std::iter::once(root)
            .chain(self.descendant_elements(root))
            .filter(|&n| self.element(n).is_some_and(|e| e.tag().eq_ignore_ascii_case(tag)))
            .collect()
    }

    pub fn text_content(&self, id: NodeId) -> String {
        match self.node(id).map(Node::data) {
            Some(NodeData::Text(t)) => t.clone(),
            Some(NodeData::Element(_)) => self
                .children(id)
                .iter()
                .map(|&c| self.text_content(c))
                .collect(),
            None => String::new(),
        }
    }

    /// Resolve a resource reference against the document base URL.
    pub fn resolve_url(&self, href: &str) -> String {
        let href = href.trim();
        match &self.base_url {
            Some(base) if !href.starts_with("data:") => base
                .join(href)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| href.to_string()),
            _ => href.to_string(),
        }
    }

    /// Resolved `src` of an `img` element.
    pub fn image_source(&self, id: NodeId) -> Option<String> {
        let el = self.element(id)?;
        let src = el.attr("src")?.trim();
        (!src.is_empty()).then(|| self.resolve_url(src))
    }

    /// Start loading every `img` under the root, like a browser does on insertion.
    pub fn request_images(&self) {
        for img in self.elements_by_tag(self.root, "img") {
            if let Some(src) = self.image_source(img) {
                self.images.request(&src);
            }
        }
    }

    pub fn computed_style(&self, id: NodeId) -> ComputedStyle<'_> {
        ComputedStyle::new(self, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_remove_and_lookup() {
        let mut doc = Document::new();
        let card = doc.create_element("div");
        doc.element_mut(card).unwrap().set_attr("id", "card");
        let body = doc.body();
        doc.append_child(body, card);
        let text = doc.create_text_node("hello");
        doc.append_child(card, text);

        assert_eq!(doc.get_element_by_id("card"), Some(card));
        assert_eq!(doc.text_content(card), "hello");
        assert!(doc.is_connected(text));

        doc.remove(card);
        assert_eq!(doc.get_element_by_id("card"), None);
        assert!(!doc.is_connected(text));
    }

    #[test]
    fn clone_keeps_ids_and_is_independent() {
        let mut doc = Document::new();
        let card = doc.create_element("div");
        doc.append_child(doc.body(), card);
        let mut copy = doc.clone();
        copy.element_mut(card).unwrap().style_mut().set("width", "10px", true);
        assert!(doc.element(card).unwrap().style().is_empty());
        assert_eq!(copy.element(card).unwrap().style().value("width"), Some("10px"));
    }

    #[test]
    fn refuses_cycles() {
        let mut doc = Document::new();
        let a = doc.create_element("div");
        let b = doc.create_element("div");
        doc.append_child(doc.body(), a);
        doc.append_child(a, b);
        doc.append_child(b, a);
        assert_eq!(doc.parent(a), Some(doc.body()));
    }

    #[test]
    fn style_attribute_feeds_inline_block() {
        let mut doc = Document::new();
        let el = doc.create_element("div");
        doc.element_mut(el).unwrap().set_attr("style", "color: red; width: 3px");
        let data = doc.element(el).unwrap();
        assert_eq!(data.style().value("width"), Some("3px"));
        assert_eq!(data.attr("style"), None);
    }
}
