use crate::drag::ReorderIntent;
use crate::model::{NodeId, NodeKind, Tree};

/// Receiver for the notifications the tree state emits to its host.
///
/// Persistence and navigation belong to the host: the state never awaits or
/// retries anything it reports here.
pub trait TreeListener {
    /// A drop reordered one sibling group. Called once per successful drop
    /// with the tree as it now stands locally.
    fn on_reorder_committed(&mut self, _tree: &Tree, _intent: &ReorderIntent) {}

    /// The operator asked for a new collection under `parent` (root if `None`).
    fn on_create_container(&mut self, _parent: Option<&NodeId>) {}

    /// A node was selected.
    fn on_select(&mut self, _id: &NodeId, _kind: NodeKind) {}
}

/// Discards every notification.
impl TreeListener for () {}

/// Owned copy of a notification, for hosts that drain them after the event loop tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeNotification {
    ReorderCommitted { tree: Tree, intent: ReorderIntent },
    CreateContainer { parent: Option<NodeId> },
    Select { id: NodeId, kind: NodeKind },
}

impl TreeListener for Vec<TreeNotification> {
    fn on_reorder_committed(&mut self, tree: &Tree, intent: &ReorderIntent) {
        self.push(TreeNotification::ReorderCommitted {
            tree: tree.clone(),
            intent: intent.clone(),
        });
    }

    fn on_create_container(&mut self, parent: Option<&NodeId>) {
        self.push(TreeNotification::CreateContainer {
            parent: parent.cloned(),
        });
    }

    fn on_select(&mut self, id: &NodeId, kind: NodeKind) {
        self.push(TreeNotification::Select {
            id: id.clone(),
            kind,
        });
    }
}
