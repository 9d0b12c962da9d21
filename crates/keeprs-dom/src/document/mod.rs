//! Mutable element tree backing the database model.
//!
//! Nodes live in an arena owned by the [`Document`] and are addressed by
//! [`NodeId`] handles. A handle stays valid for the lifetime of the document;
//! detaching a node only unlinks it from its parent, so a removed subtree can
//! still be inspected or re-attached.

mod xml;

pub use xml::{parse, write};

/// Errors raised by the document tree and its XML reader/writer.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("malformed xml: {0}")]
    Xml(String),
    #[error("cannot attach a node beneath itself")]
    Cycle,
}

/// Stable handle to a node inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Default)]
struct NodeData {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

/// An XML-like tree of named nodes with attributes, text and ordered children.
#[derive(Debug, Clone, Default)]
pub struct Document {
    nodes: Vec<NodeData>,
    root: Option<NodeId>,
}

impl Document {
    /// Create a document without a document element.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a document whose document element is named `name`.
    pub fn with_root(name: &str) -> Self {
        let mut doc = Self::new();
        let root = doc.create_element(name);
        doc.root = Some(root);
        doc
    }

    /// The outermost element, if any.
    pub fn document_element(&self) -> Option<NodeId> {
        self.root
    }

    /// Replace the document element. The previous one is left detached.
    pub fn set_document_element(&mut self, node: NodeId) {
        self.detach(node);
        self.root = Some(node);
    }

    /// Create a new parentless element.
    pub fn create_element(&mut self, name: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            name: name.to_string(),
            ..NodeData::default()
        });
        id
    }

    fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0]
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.node(id).name
    }

    /// Text content of a node. Elements with children carry no text.
    pub fn text(&self, id: NodeId) -> &str {
        &self.node(id).text
    }

    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        self.node_mut(id).text = text.into();
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.node(id)
            .attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        let value = value.into();
        let attributes = &mut self.node_mut(id).attributes;
        match attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value,
            None => attributes.push((name.to_string(), value)),
        }
    }

    pub fn attributes(&self, id: NodeId) -> impl Iterator<Item = (&str, &str)> {
        self.node(id)
            .attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Direct children named `name`, in document order.
    pub fn children_named<'a>(
        &'a self,
        id: NodeId,
        name: &'a str,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.children(id)
            .iter()
            .copied()
            .filter(move |&child| self.name(child) == name)
    }

    pub fn first_child_named(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.children_named(id, name).next()
    }

    /// Every node in the arena with the given name, attached or not.
    pub fn nodes_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = NodeId> + 'a {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, node)| node.name == name)
            .map(|(index, _)| NodeId(index))
    }

    /// All descendants of `id` in pre-order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Whether `ancestor` is `node` or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Whether the node is reachable from the document element.
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.root
            .is_some_and(|root| self.is_ancestor_or_self(root, id))
    }

    /// Append `child` as the last child of `parent`, moving it out of its
    /// current parent first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DocumentError> {
        let position = self.children(parent).len();
        self.insert_child(parent, position, child)
    }

    /// Insert `child` at `index` among the children of `parent`, moving it
    /// out of its current parent first. `index` is clamped to the child count.
    pub fn insert_child(
        &mut self,
        parent: NodeId,
        index: usize,
        child: NodeId,
    ) -> Result<(), DocumentError> {
        if self.is_ancestor_or_self(child, parent) || self.root == Some(child) {
            return Err(DocumentError::Cycle);
        }
        self.detach(child);
        let children = &mut self.node_mut(parent).children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.node_mut(child).parent = Some(parent);
        Ok(())
    }

    /// Unlink a node from its parent. Returns whether it had one.
    pub fn detach(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.node_mut(id).parent.take() else {
            return false;
        };
        self.node_mut(parent).children.retain(|&child| child != id);
        true
    }

    /// Remove a node from the tree. Handles to it and its descendants must
    /// no longer be used by wrappers.
    pub fn remove(&mut self, id: NodeId) -> bool {
        self.detach(id)
    }

    /// All nodes matching `path`.
    ///
    /// Paths are `/`-separated element names. A leading `/` anchors the path
    /// at the document element, a leading `//` matches the first name
    /// anywhere in the attached tree, otherwise the path is relative to
    /// `context`.
    pub fn find_all(&self, context: NodeId, path: &str) -> Vec<NodeId> {
        let (mut current, rest) = if let Some(rest) = path.strip_prefix("//") {
            let Some(root) = self.root else {
                return Vec::new();
            };
            let (first, rest) = split_first(rest);
            let matches: Vec<NodeId> = std::iter::once(root)
                .chain(self.descendants(root))
                .filter(|&id| self.name(id) == first)
                .collect();
            (matches, rest)
        } else if let Some(rest) = path.strip_prefix('/') {
            let Some(root) = self.root else {
                return Vec::new();
            };
            let (first, rest) = split_first(rest);
            let matches = if self.name(root) == first {
                vec![root]
            } else {
                Vec::new()
            };
            (matches, rest)
        } else {
            (vec![context], path)
        };

        for segment in rest.split('/').filter(|s| !s.is_empty() && *s != ".") {
            current = current
                .into_iter()
                .flat_map(|id| self.children_named(id, segment).collect::<Vec<_>>())
                .collect();
        }
        current
    }

    /// First node matching `path`, see [`Document::find_all`].
    pub fn find_first(&self, context: NodeId, path: &str) -> Option<NodeId> {
        self.find_all(context, path).into_iter().next()
    }
}

fn split_first(path: &str) -> (&str, &str) {
    path.split_once('/').unwrap_or((path, ""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Document, NodeId, NodeId) {
        let mut doc = Document::with_root("KeePassFile");
        let root = doc.document_element().unwrap();
        let meta = doc.create_element("Meta");
        doc.append_child(root, meta).unwrap();
        let name = doc.create_element("DatabaseName");
        doc.set_text(name, "Vault");
        doc.append_child(meta, name).unwrap();
        let group = doc.create_element("Group");
        let r = doc.create_element("Root");
        doc.append_child(root, r).unwrap();
        doc.append_child(r, group).unwrap();
        (doc, meta, group)
    }

    #[test]
    fn absolute_and_relative_paths() {
        let (doc, meta, group) = sample();
        let root = doc.document_element().unwrap();
        assert_eq!(doc.find_first(group, "/KeePassFile/Meta"), Some(meta));
        assert_eq!(doc.find_first(root, "Root/Group"), Some(group));
        assert_eq!(doc.find_first(root, "/Other/Meta"), None);
        let name = doc.find_first(meta, "DatabaseName").unwrap();
        assert_eq!(doc.text(name), "Vault");
    }

    #[test]
    fn descendant_path_finds_nested_nodes() {
        let (doc, _, _) = sample();
        let root = doc.document_element().unwrap();
        let found = doc.find_all(root, "//DatabaseName");
        assert_eq!(found.len(), 1);
        assert!(doc.find_first(root, "//Missing").is_none());
    }

    #[test]
    fn append_moves_instead_of_duplicating() {
        let (mut doc, meta, group) = sample();
        let child = doc.create_element("Entry");
        doc.append_child(group, child).unwrap();
        doc.append_child(meta, child).unwrap();
        assert!(doc.children(group).is_empty());
        assert_eq!(doc.parent(child), Some(meta));
        assert_eq!(doc.children_named(meta, "Entry").count(), 1);
    }

    #[test]
    fn cannot_attach_node_beneath_itself() {
        let (mut doc, _, group) = sample();
        let child = doc.create_element("Group");
        doc.append_child(group, child).unwrap();
        assert!(matches!(doc.append_child(child, group), Err(DocumentError::Cycle)));
        assert!(matches!(doc.append_child(group, group), Err(DocumentError::Cycle)));
    }

    #[test]
    fn detached_nodes_are_not_attached() {
        let (mut doc, _, group) = sample();
        let loose = doc.create_element("Group");
        assert!(!doc.is_attached(loose));
        assert!(doc.is_attached(group));
        assert!(doc.remove(group));
        assert!(!doc.is_attached(group));
        assert!(!doc.remove(group));
    }

    #[test]
    fn attributes_are_replaced_in_place() {
        let mut doc = Document::with_root("Value");
        let id = doc.document_element().unwrap();
        doc.set_attribute(id, "Protected", "True");
        doc.set_attribute(id, "Protected", "False");
        assert_eq!(doc.attribute(id, "Protected"), Some("False"));
        assert_eq!(doc.attributes(id).count(), 1);
        assert_eq!(doc.attribute(id, "Missing"), None);
    }
}
