use std::borrow::Borrow;
use std::fmt;

use rustc_hash::{FxBuildHasher, FxHashSet};
use smallvec::SmallVec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::TreeError;

/// Child indices from the root sequence down to a node.
pub type TreePath = SmallVec<[usize; 8]>;

/// Stable, opaque node identifier, unique across the whole forest.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Node variant tag, used where only the kind is needed (selection, proxy).
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "lowercase")
)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A collection; may hold other nodes.
    Container,
    /// A document; never has children.
    Leaf,
}

/// A tree node. Only containers carry a children sequence.
///
/// With the `serde` feature the node maps to the shape returned by a content
/// tree endpoint: `{"id": .., "label": .., "kind": "container", "children": [..]}`.
/// A leaf that arrives with a non-empty `children` list is rejected.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "WireNode", into = "WireNode")
)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Container {
        id: NodeId,
        label: String,
        children: Vec<Node>,
    },
    Leaf {
        id: NodeId,
        label: String,
    },
}

/// Wire shape of [`Node`]; leaves may carry a `children` key so that
/// a populated one can be reported instead of dropped.
#[cfg(feature = "serde")]
#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum WireNode {
    Container {
        id: NodeId,
        label: String,
        #[serde(default)]
        children: Vec<Node>,
    },
    Leaf {
        id: NodeId,
        label: String,
        #[serde(default, skip_serializing)]
        children: Vec<Node>,
    },
}

#[cfg(feature = "serde")]
impl TryFrom<WireNode> for Node {
    type Error = TreeError;

    fn try_from(node: WireNode) -> Result<Self, Self::Error> {
        match node {
            WireNode::Container {
                id,
                label,
                children,
            } => Ok(Self::Container {
                id,
                label,
                children,
            }),
            WireNode::Leaf { id, children, .. } if !children.is_empty() => {
                Err(TreeError::NotAContainer(id))
            }
            WireNode::Leaf { id, label, .. } => Ok(Self::Leaf { id, label }),
        }
    }
}

#[cfg(feature = "serde")]
impl From<Node> for WireNode {
    fn from(node: Node) -> Self {
        match node {
            Node::Container {
                id,
                label,
                children,
            } => Self::Container {
                id,
                label,
                children,
            },
            Node::Leaf { id, label } => Self::Leaf {
                id,
                label,
                children: Vec::new(),
            },
        }
    }
}

impl Node {
    pub fn container(
        id: impl Into<NodeId>,
        label: impl Into<String>,
        children: Vec<Self>,
    ) -> Self {
        Self::Container {
            id: id.into(),
            label: label.into(),
            children,
        }
    }

    pub fn leaf(id: impl Into<NodeId>, label: impl Into<String>) -> Self {
        Self::Leaf {
            id: id.into(),
            label: label.into(),
        }
    }

    pub const fn id(&self) -> &NodeId {
        match self {
            Self::Container { id, .. } | Self::Leaf { id, .. } => id,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Container { label, .. } | Self::Leaf { label, .. } => label,
        }
    }

    pub const fn kind(&self) -> NodeKind {
        match self {
            Self::Container { .. } => NodeKind::Container,
            Self::Leaf { .. } => NodeKind::Leaf,
        }
    }

    /// Returns the ordered children (always empty for a leaf).
    pub fn children(&self) -> &[Self] {
        match self {
            Self::Container { children, .. } => children,
            Self::Leaf { .. } => &[],
        }
    }

    const fn children_mut(&mut self) -> Option<&mut Vec<Self>> {
        match self {
            Self::Container { children, .. } => Some(children),
            Self::Leaf { .. } => None,
        }
    }

    const fn label_mut(&mut self) -> &mut String {
        match self {
            Self::Container { label, .. } | Self::Leaf { label, .. } => label,
        }
    }

    fn structurally_eq(&self, other: &Self) -> bool {
        self.id() == other.id()
            && self.kind() == other.kind()
            && siblings_structurally_eq(self.children(), other.children())
    }
}

fn siblings_structurally_eq(left: &[Node], right: &[Node]) -> bool {
    left.len() == right.len()
        && left
            .iter()
            .zip(right)
            .all(|(left, right)| left.structurally_eq(right))
}

/// Identifies a sibling group: the root sequence or one container's children.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum GroupKey {
    Root,
    Container(NodeId),
}

impl GroupKey {
    /// Returns the owning container id, or `None` for the root sequence.
    pub const fn parent(&self) -> Option<&NodeId> {
        match self {
            Self::Root => None,
            Self::Container(id) => Some(id),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str("<root>"),
            Self::Container(id) => write!(f, "{id}"),
        }
    }
}

/// Ordered forest of content nodes.
///
/// Construction rejects duplicate ids; after that the only mutation is a
/// reorder inside one sibling group, so the id set never changes.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "Vec<Node>", into = "Vec<Node>")
)]
#[derive(Clone, Debug, Default)]
pub struct Tree {
    roots: Vec<Node>,
    ids: FxHashSet<NodeId>,
}

impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        self.roots == other.roots
    }
}

impl Eq for Tree {}

impl Tree {
    /// Builds a tree from root nodes, rejecting duplicate ids.
    pub fn new(roots: Vec<Node>) -> Result<Self, TreeError> {
        let mut ids = FxHashSet::with_capacity_and_hasher(roots.len(), FxBuildHasher);
        let mut stack: Vec<&Node> = roots.iter().collect();
        while let Some(node) = stack.pop() {
            if !ids.insert(node.id().clone()) {
                return Err(TreeError::DuplicateId(node.id().clone()));
            }
            stack.extend(node.children());
        }
        Ok(Self { roots, ids })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn roots(&self) -> &[Node] {
        &self.roots
    }

    /// Total number of nodes in the forest.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Returns the index path from the root sequence to `id`.
    pub fn find_path(&self, id: &str) -> Result<TreePath, TreeError> {
        if !self.contains(id) {
            return Err(TreeError::NotFound(NodeId::from(id)));
        }
        let mut path = TreePath::new();
        if dfs_find_path(&self.roots, id, &mut path) {
            Ok(path)
        } else {
            Err(TreeError::NotFound(NodeId::from(id)))
        }
    }

    pub fn get_by_path(&self, path: &[usize]) -> Option<&Node> {
        let (first, rest) = path.split_first()?;
        let mut node = self.roots.get(*first)?;
        for &idx in rest {
            node = node.children().get(idx)?;
        }
        Some(node)
    }

    fn get_by_path_mut(&mut self, path: &[usize]) -> Option<&mut Node> {
        let (first, rest) = path.split_first()?;
        let mut node = self.roots.get_mut(*first)?;
        for &idx in rest {
            node = node.children_mut()?.get_mut(idx)?;
        }
        Some(node)
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        let path = self.find_path(id).ok()?;
        self.get_by_path(&path)
    }

    /// Resolves the sibling group that owns `id` and its index within it.
    pub fn sibling_position(&self, id: &str) -> Result<(GroupKey, usize), TreeError> {
        let path = self.find_path(id)?;
        let Some((&index, parent_path)) = path.split_last() else {
            return Err(TreeError::NotFound(NodeId::from(id)));
        };
        if parent_path.is_empty() {
            return Ok((GroupKey::Root, index));
        }
        let parent = self
            .get_by_path(parent_path)
            .ok_or_else(|| TreeError::NotFound(NodeId::from(id)))?;
        Ok((GroupKey::Container(parent.id().clone()), index))
    }

    /// Returns the ordered members of a sibling group.
    pub fn group(&self, key: &GroupKey) -> Result<&[Node], TreeError> {
        match key {
            GroupKey::Root => Ok(&self.roots),
            GroupKey::Container(id) => {
                let node = self
                    .get(id.as_str())
                    .ok_or_else(|| TreeError::NotFound(id.clone()))?;
                match node {
                    Node::Container { children, .. } => Ok(children),
                    Node::Leaf { .. } => Err(TreeError::NotAContainer(id.clone())),
                }
            }
        }
    }

    fn group_mut(&mut self, key: &GroupKey) -> Result<&mut Vec<Node>, TreeError> {
        match key {
            GroupKey::Root => Ok(&mut self.roots),
            GroupKey::Container(id) => {
                let path = self.find_path(id.as_str())?;
                let node = self
                    .get_by_path_mut(&path)
                    .ok_or_else(|| TreeError::NotFound(id.clone()))?;
                node.children_mut()
                    .ok_or_else(|| TreeError::NotAContainer(id.clone()))
            }
        }
    }

    /// Moves the node at `from` to `to` inside one sibling group.
    ///
    /// Both indices must be in bounds for the group; on error the tree is
    /// left unchanged.
    pub fn move_within_siblings(
        &mut self,
        group: &GroupKey,
        from: usize,
        to: usize,
    ) -> Result<(), TreeError> {
        let siblings = self.group_mut(group)?;
        let len = siblings.len();
        for index in [from, to] {
            if index >= len {
                return Err(TreeError::InvalidIndex {
                    group: group.clone(),
                    index,
                    len,
                });
            }
        }
        if from != to {
            let node = siblings.remove(from);
            siblings.insert(to, node);
        }
        Ok(())
    }

    /// Same as [`Tree::move_within_siblings`] but returns a new tree.
    pub fn moved_within_siblings(
        &self,
        group: &GroupKey,
        from: usize,
        to: usize,
    ) -> Result<Self, TreeError> {
        let mut next = self.clone();
        next.move_within_siblings(group, from, to)?;
        Ok(next)
    }

    /// Depth-first, pre-order traversal yielding `(depth, node)`.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            stack: self.roots.iter().rev().map(|node| (0, node)).collect(),
        }
    }

    pub fn container_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.iter()
            .filter(|(_, node)| node.kind() == NodeKind::Container)
            .map(|(_, node)| node.id())
    }

    /// Compares ids, kinds and child order; labels are ignored.
    pub fn structurally_eq(&self, other: &Self) -> bool {
        siblings_structurally_eq(&self.roots, &other.roots)
    }

    /// Copies labels from a structurally equal tree. Returns `true` if any
    /// label changed.
    pub(crate) fn refresh_labels_from(&mut self, other: &Self) -> bool {
        fn refresh(local: &mut [Node], incoming: &[Node]) -> bool {
            let mut changed = false;
            for (local, incoming) in local.iter_mut().zip(incoming) {
                if local.label() != incoming.label() {
                    *local.label_mut() = incoming.label().to_owned();
                    changed = true;
                }
                if let Some(children) = local.children_mut() {
                    changed |= refresh(children, incoming.children());
                }
            }
            changed
        }
        refresh(&mut self.roots, &other.roots)
    }
}

fn dfs_find_path(nodes: &[Node], target: &str, path: &mut TreePath) -> bool {
    for (idx, node) in nodes.iter().enumerate() {
        path.push(idx);
        if node.id().as_str() == target || dfs_find_path(node.children(), target, path) {
            return true;
        }
        path.pop();
    }
    false
}

impl TryFrom<Vec<Node>> for Tree {
    type Error = TreeError;

    fn try_from(roots: Vec<Node>) -> Result<Self, Self::Error> {
        Self::new(roots)
    }
}

impl From<Tree> for Vec<Node> {
    fn from(tree: Tree) -> Self {
        tree.roots
    }
}

/// Pre-order iterator over a [`Tree`].
pub struct Iter<'a> {
    stack: Vec<(u16, &'a Node)>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (u16, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, node) = self.stack.pop()?;
        let child_depth = depth.saturating_add(1);
        self.stack
            .extend(node.children().iter().rev().map(|child| (child_depth, child)));
        Some((depth, node))
    }
}
