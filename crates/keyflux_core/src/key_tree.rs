use std::collections::HashMap;

use crate::{FilteredView, KeyRecord};

pub type NodeId = usize;

/// Id of the synthetic root node. It has an empty path and is never a key.
pub const ROOT: NodeId = 0;

/// A path segment in the key tree.
///
/// A node is a folder when it has children and a key when it carries a
/// record. Both can be true at once when one key is a prefix of another
/// (`user` and `user:1`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTreeNode {
    /// Segment names from the root joined with the delimiter.
    pub path: String,
    /// Last segment of `path`.
    pub name: String,
    /// Metadata of the key whose full name equals `path`, if any.
    pub record: Option<KeyRecord>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    leaf_count: usize,
}

impl KeyTreeNode {
    fn new(path: String, name: String, parent: Option<NodeId>) -> Self {
        Self {
            path,
            name,
            record: None,
            parent,
            children: Vec::new(),
            leaf_count: 0,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.record.is_some()
    }

    pub fn is_folder(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child ids ordered by segment name.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Number of keys in this subtree, including this node if it is a key.
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }
}

/// Hierarchical index over a filtered view, derived by splitting key names
/// on a delimiter. Rebuilt from scratch whenever the view changes.
#[derive(Debug, Clone)]
pub struct KeyTree {
    delimiter: String,
    nodes: Vec<KeyTreeNode>,
    by_path: HashMap<String, NodeId>,
}

impl KeyTree {
    pub fn empty(delimiter: impl Into<String>) -> Self {
        Self {
            delimiter: delimiter.into(),
            nodes: vec![KeyTreeNode::new(String::new(), String::new(), None)],
            by_path: HashMap::new(),
        }
    }

    pub fn build(view: &FilteredView, delimiter: &str) -> Self {
        Self::from_records(view.records(), delimiter)
    }

    pub fn from_records(records: &[KeyRecord], delimiter: &str) -> Self {
        let mut tree = Self::empty(delimiter);

        for record in records {
            tree.insert(record);
        }

        tree.sort_children();
        tree.count_leaves();
        tree
    }

    fn insert(&mut self, record: &KeyRecord) {
        let segments: Vec<&str> = if self.delimiter.is_empty() {
            vec![record.key.as_str()]
        } else {
            record.key.split(self.delimiter.as_str()).collect()
        };

        let mut current = ROOT;
        let mut path = String::with_capacity(record.key.len());

        for (index, segment) in segments.iter().enumerate() {
            if index > 0 {
                path.push_str(&self.delimiter);
            }
            path.push_str(segment);

            current = match self.by_path.get(&path) {
                Some(&existing) => existing,
                None => self.push_child(current, &path, segment),
            };
        }

        // Last record written for an exact path wins.
        self.nodes[current].record = Some(record.clone());
    }

    fn push_child(&mut self, parent: NodeId, path: &str, name: &str) -> NodeId {
        let id = self.nodes.len();
        self.nodes
            .push(KeyTreeNode::new(path.to_string(), name.to_string(), Some(parent)));
        self.nodes[parent].children.push(id);
        self.by_path.insert(path.to_string(), id);
        id
    }

    fn sort_children(&mut self) {
        for id in 0..self.nodes.len() {
            let mut children = std::mem::take(&mut self.nodes[id].children);
            children.sort_by(|a, b| self.nodes[*a].name.cmp(&self.nodes[*b].name));
            self.nodes[id].children = children;
        }
    }

    // Children are always created after their parent, so a reverse sweep
    // sees every subtree total before it is added to the parent.
    fn count_leaves(&mut self) {
        for id in (0..self.nodes.len()).rev() {
            let node = &mut self.nodes[id];
            if node.record.is_some() {
                node.leaf_count += 1;
            }

            let count = node.leaf_count;
            if let Some(parent) = node.parent {
                self.nodes[parent].leaf_count += count;
            }
        }
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    pub fn root(&self) -> &KeyTreeNode {
        &self.nodes[ROOT]
    }

    pub fn node(&self, id: NodeId) -> Option<&KeyTreeNode> {
        self.nodes.get(id)
    }

    /// Looks up a node by its full path. The empty path is not the root.
    pub fn find(&self, path: &str) -> Option<&KeyTreeNode> {
        self.by_path.get(path).map(|&id| &self.nodes[id])
    }

    pub fn find_id(&self, path: &str) -> Option<NodeId> {
        self.by_path.get(path).copied()
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &KeyTreeNode> {
        self.nodes
            .get(id)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
            .iter()
            .map(|&child| &self.nodes[child])
    }

    pub fn leaf_count(&self, id: NodeId) -> usize {
        self.nodes.get(id).map_or(0, |node| node.leaf_count)
    }

    /// Number of nodes, excluding the root.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Depth-first walk in display order. The root is not visited; its
    /// children have depth 0.
    pub fn walk(&self, mut visit: impl FnMut(&KeyTreeNode, usize)) {
        let mut stack: Vec<(NodeId, usize)> = self.nodes[ROOT]
            .children
            .iter()
            .rev()
            .map(|&id| (id, 0))
            .collect();

        while let Some((id, depth)) = stack.pop() {
            let node = &self.nodes[id];
            visit(node, depth);
            stack.extend(node.children.iter().rev().map(|&child| (child, depth + 1)));
        }
    }
}
