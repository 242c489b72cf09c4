pub use crate::{
    CancelReason, ContentTreeState, ContentTreeStyle, ContentTreeView, DefaultLabel, DragConfig,
    DragProxy, DragSensor, DragSession, DropOutcome, DropTarget, GroupKey, Node, NodeId, NodeKind,
    ReorderIntent, SnapshotOutcome, Tree, TreeAction, TreeError, TreeEvent, TreeGlyphs,
    TreeLabelRenderer, TreeListener, TreeNotification, TreeRowContext, TreeScrollPolicy,
    ViewSnapshot, tree_label_line,
};

#[cfg(feature = "keymap")]
pub use crate::{KeymapProfile, TreeKeyBindings};
