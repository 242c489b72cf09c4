//! Reorderable content-directory tree for ratatui: collections (containers)
//! and documents (leaves) with drag-and-drop reordering among siblings.
//!
//! The crate is split into three layers:
//! - [`Tree`]: the ordered forest and its pure sibling-reorder operation.
//! - [`DragSession`]: the pick-up / hover / drop / cancel state machine and
//!   closest-center target resolution.
//! - [`ContentTreeState`] + [`ContentTreeView`]: local view state, pointer and
//!   keyboard plumbing, external snapshot reconciliation and rendering.
//!
//! Feature flags:
//! - `keymap`: crossterm-based key bindings and `ContentTreeState::handle_key*` /
//!   `handle_mouse` helpers.
//! - `serde`: serde support for [`Tree`], [`ReorderIntent`] and [`ViewSnapshot`].

mod action;
mod context;
mod drag;
mod error;
mod glyphs;
#[cfg(feature = "keymap")]
mod keymap;
mod listener;
mod model;
pub mod prelude;
mod state;
mod style;
mod widget;

pub use action::{TreeAction, TreeEvent};
pub use context::TreeRowContext;
pub use drag::{
    CancelReason, DragConfig, DragProxy, DragSensor, DragSession, DropOutcome, DropTarget,
    ReorderIntent, closest_center,
};
pub use error::TreeError;
pub use glyphs::{DefaultLabel, TreeGlyphs, TreeLabelRenderer, tree_label_line};
#[cfg(feature = "keymap")]
pub use keymap::{KeymapProfile, TreeKeyBindings};
pub use listener::{TreeListener, TreeNotification};
pub use model::{GroupKey, Iter as TreeIter, Node, NodeId, NodeKind, Tree, TreePath};
pub use state::{ContentTreeState, SnapshotOutcome, ViewSnapshot, VisibleNode};
pub use style::{ContentTreeStyle, TreeScrollPolicy};
pub use widget::ContentTreeView;
