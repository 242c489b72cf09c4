//! Reorder gesture tracking.
//!
//! A [`DragSession`] is either idle or dragging exactly one node. Pointer and
//! keyboard input move the "over" target; a drop resolves both ids to their
//! sibling groups and moves the active node inside its own group. Drops
//! across groups are rejected and leave the tree untouched.

use ratatui::layout::{Position, Rect};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::TreeError;
use crate::model::{GroupKey, NodeId, NodeKind, Tree};

/// Gesture configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DragConfig {
    /// Manhattan distance in cells a pressed pointer must travel before the
    /// press turns into a drag (default: 1). Releasing earlier is a click.
    pub threshold_cells: u16,
    /// Escape cancels an active drag (default: true).
    pub cancel_on_escape: bool,
    /// The pointer leaving the tree surface cancels an active drag (default: true).
    pub cancel_on_leave: bool,
    /// Losing terminal focus cancels an active drag (default: true).
    pub cancel_on_focus_loss: bool,
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            threshold_cells: 1,
            cancel_on_escape: true,
            cancel_on_leave: true,
            cancel_on_focus_loss: true,
        }
    }
}

impl DragConfig {
    #[must_use]
    pub const fn with_threshold(mut self, cells: u16) -> Self {
        self.threshold_cells = cells;
        self
    }

    #[must_use]
    pub const fn no_escape_cancel(mut self) -> Self {
        self.cancel_on_escape = false;
        self
    }

    #[must_use]
    pub const fn keep_on_leave(mut self) -> Self {
        self.cancel_on_leave = false;
        self
    }

    #[must_use]
    pub const fn keep_on_focus_loss(mut self) -> Self {
        self.cancel_on_focus_loss = false;
        self
    }
}

/// Why a session ended without a drop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelReason {
    Explicit,
    Escape,
    PointerLeft,
    FocusLost,
    /// A new snapshot no longer contains the dragged node.
    NodeRemoved,
}

/// Input device that started a drag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragSensor {
    /// Press and move; the session follows pointer events.
    Pointer,
    /// Keyboard or programmatic pick-up; pointer events are ignored.
    Keyboard,
}

/// A rendered row that can receive a drop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DropTarget {
    pub id: NodeId,
    pub area: Rect,
    pub depth: u16,
    /// Disabled targets are skipped by [`closest_center`]. Rows produced by
    /// the tree state are always enabled; hosts that build their own target
    /// lists (e.g. to lock some rows) clear it.
    pub enabled: bool,
}

/// Picks the enabled target at `depth` whose center is closest to `pointer`.
///
/// `targets` must be in document order; on equal distance the earlier target
/// wins.
pub fn closest_center(pointer: Position, depth: u16, targets: &[DropTarget]) -> Option<&NodeId> {
    // Doubled coordinates keep half-cell centers integral.
    let px = 2 * i64::from(pointer.x) + 1;
    let py = 2 * i64::from(pointer.y) + 1;
    targets
        .iter()
        .filter(|target| target.enabled && target.depth == depth)
        .min_by_key(|target| {
            let cx = 2 * i64::from(target.area.x) + i64::from(target.area.width);
            let cy = 2 * i64::from(target.area.y) + i64::from(target.area.height);
            (cx - px).pow(2) + (cy - py).pow(2)
        })
        .map(|target| &target.id)
}

/// The committed result of a drop: the new order of one sibling group.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReorderIntent {
    pub group: GroupKey,
    pub moved: NodeId,
    pub from: usize,
    pub to: usize,
    /// Sibling ids of `group` after the move.
    pub order: Vec<NodeId>,
}

/// Result of a drop attempt. Every variant except `NotDragging` ends the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DropOutcome {
    Moved(ReorderIntent),
    /// Dropped onto itself or onto no target.
    Unchanged,
    Rejected(TreeError),
    NotDragging,
}

/// Read-only floating preview of the dragged node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DragProxy<'a> {
    pub id: &'a NodeId,
    pub label: &'a str,
    pub kind: NodeKind,
    pub pointer: Option<Position>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct ActiveDrag {
    active: NodeId,
    sensor: DragSensor,
    pointer: Option<Position>,
    over: Option<NodeId>,
}

/// Two-state gesture machine: idle, or dragging one node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DragSession {
    active: Option<ActiveDrag>,
    last_cancel: Option<CancelReason>,
}

impl DragSession {
    pub const fn new() -> Self {
        Self {
            active: None,
            last_cancel: None,
        }
    }

    pub const fn is_dragging(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_id(&self) -> Option<&NodeId> {
        self.active.as_ref().map(|drag| &drag.active)
    }

    pub fn over_id(&self) -> Option<&NodeId> {
        self.active.as_ref().and_then(|drag| drag.over.as_ref())
    }

    pub fn pointer(&self) -> Option<Position> {
        self.active.as_ref().and_then(|drag| drag.pointer)
    }

    pub fn sensor(&self) -> Option<DragSensor> {
        self.active.as_ref().map(|drag| drag.sensor)
    }

    /// Reason the most recent session was cancelled; cleared by the next `begin`.
    pub const fn last_cancel(&self) -> Option<CancelReason> {
        self.last_cancel
    }

    /// Starts a keyboard (or programmatic) drag of `id`.
    pub fn begin(&mut self, tree: &Tree, id: &NodeId) -> bool {
        self.begin_with(tree, id, DragSensor::Keyboard)
    }

    /// Starts dragging `id` from `sensor`. Ignored while another drag is
    /// active or when `id` is not in `tree`.
    pub fn begin_with(&mut self, tree: &Tree, id: &NodeId, sensor: DragSensor) -> bool {
        if let Some(drag) = &self.active {
            log::debug!("drag begin on `{id}` ignored: `{}` already dragging", drag.active);
            return false;
        }
        if !tree.contains(id.as_str()) {
            log::warn!("drag begin ignored: {}", TreeError::NotFound(id.clone()));
            return false;
        }
        log::debug!("drag begin `{id}` ({sensor:?})");
        self.last_cancel = None;
        self.active = Some(ActiveDrag {
            active: id.clone(),
            sensor,
            pointer: None,
            over: Some(id.clone()),
        });
        true
    }

    /// Records the pointer and recomputes the target by closest center among
    /// targets at the active node's depth.
    pub fn drag_over(
        &mut self,
        pointer: Position,
        depth: u16,
        targets: &[DropTarget],
    ) -> Option<&NodeId> {
        let drag = self.active.as_mut()?;
        drag.pointer = Some(pointer);
        drag.over = closest_center(pointer, depth, targets).cloned();
        drag.over.as_ref()
    }

    /// Sets the target directly (keyboard-driven drag).
    pub fn retarget(&mut self, over: Option<NodeId>) -> bool {
        let Some(drag) = self.active.as_mut() else {
            return false;
        };
        drag.over = over;
        true
    }

    /// Drops onto the current "over" target.
    pub fn drop(&mut self, tree: &mut Tree) -> DropOutcome {
        match self.over_id().cloned() {
            Some(target) => self.drop_onto(tree, &target),
            None if self.is_dragging() => {
                self.active = None;
                log::debug!("drag dropped outside any target");
                DropOutcome::Unchanged
            }
            None => DropOutcome::NotDragging,
        }
    }

    /// Drops the active node onto `target` and returns to idle.
    pub fn drop_onto(&mut self, tree: &mut Tree, target: &NodeId) -> DropOutcome {
        let Some(drag) = self.active.take() else {
            return DropOutcome::NotDragging;
        };
        if drag.active == *target {
            log::debug!("drag `{target}` dropped onto itself");
            return DropOutcome::Unchanged;
        }
        match Self::apply_move(tree, &drag.active, target) {
            Ok(intent) => {
                log::debug!(
                    "drag `{}` moved {} -> {} in {}",
                    intent.moved,
                    intent.from,
                    intent.to,
                    intent.group
                );
                DropOutcome::Moved(intent)
            }
            Err(err) => {
                log::warn!("drop ignored: {err}");
                DropOutcome::Rejected(err)
            }
        }
    }

    fn apply_move(tree: &mut Tree, active: &NodeId, target: &NodeId) -> Result<ReorderIntent, TreeError> {
        let (group, from) = tree.sibling_position(active.as_str())?;
        let (target_group, to) = tree.sibling_position(target.as_str())?;
        if group != target_group {
            return Err(TreeError::CrossGroupDrop {
                active: active.clone(),
                target: target.clone(),
            });
        }
        tree.move_within_siblings(&group, from, to)?;
        let order = tree
            .group(&group)?
            .iter()
            .map(|node| node.id().clone())
            .collect();
        Ok(ReorderIntent {
            group,
            moved: active.clone(),
            from,
            to,
            order,
        })
    }

    /// Ends the session without touching the tree.
    pub fn cancel(&mut self, reason: CancelReason) -> bool {
        match self.active.take() {
            Some(drag) => {
                log::debug!("drag `{}` cancelled: {reason:?}", drag.active);
                self.last_cancel = Some(reason);
                true
            }
            None => false,
        }
    }

    /// Returns the floating preview for the dragged node.
    pub fn proxy<'a>(&'a self, tree: &'a Tree) -> Option<DragProxy<'a>> {
        let drag = self.active.as_ref()?;
        let node = tree.get(drag.active.as_str())?;
        Some(DragProxy {
            id: &drag.active,
            label: node.label(),
            kind: node.kind(),
            pointer: drag.pointer,
        })
    }
}
