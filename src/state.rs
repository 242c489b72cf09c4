use ratatui::layout::{Position, Rect};
use ratatui::widgets::TableState;
use rustc_hash::{FxBuildHasher, FxHashMap, FxHashSet};
use smallvec::SmallVec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "keymap")]
use crate::keymap::TreeKeyBindings;
#[cfg(feature = "keymap")]
use crossterm::event::{KeyCode, KeyEvent, MouseButton, MouseEvent, MouseEventKind};

use crate::action::{TreeAction, TreeEvent};
use crate::drag::{
    CancelReason, DragConfig, DragProxy, DragSensor, DragSession, DropOutcome, DropTarget,
};
use crate::error::TreeError;
use crate::listener::TreeListener;
use crate::model::{Node, NodeId, NodeKind, Tree};
use crate::style::TreeScrollPolicy;

/// A visible node row with metadata used for rendering, hit-testing and navigation.
#[derive(Clone, Debug)]
pub struct VisibleNode {
    pub(crate) id: NodeId,
    pub(crate) level: u16,
    pub(crate) parent: Option<NodeId>,
    pub(crate) kind: NodeKind,
    pub(crate) label: String,
    pub(crate) has_children: bool,
    pub(crate) is_tail_stack: SmallVec<[bool; 8]>,
}

impl VisibleNode {
    pub const fn id(&self) -> &NodeId {
        &self.id
    }

    pub const fn level(&self) -> u16 {
        self.level
    }

    pub const fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// What [`ContentTreeState::set_external_snapshot`] did with an incoming tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// Same structure and labels; nothing changed.
    Unchanged,
    /// Same structure; labels were updated in place.
    LabelsRefreshed,
    /// Different structure; local tree replaced.
    Replaced,
}

/// Where the last render put the rows, so pointer positions map back to nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct RowLayout {
    area: Rect,
    offset: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct PendingPress {
    id: NodeId,
    origin: Position,
}

/// Content tree state: the local forest, expansion, selection, cursor and the
/// drag session.
pub struct ContentTreeState {
    tree: Tree,
    list_state: TableState,
    expanded: FxHashSet<NodeId>,
    // Containers already seeded into `expanded`; unseen ones default to expanded.
    seen_containers: FxHashSet<NodeId>,
    selection: Option<(NodeId, NodeKind)>,
    // Cached visible rows to avoid recomputing DFS every render.
    visible_nodes: Vec<VisibleNode>,
    visible_index: FxHashMap<NodeId, usize>,
    dirty: bool,
    drag: DragSession,
    drag_config: DragConfig,
    press: Option<PendingPress>,
    layout: Option<RowLayout>,
    #[cfg(feature = "keymap")]
    keymap: TreeKeyBindings,
}

/// Snapshot of view state (expansion, selection, cursor) for persistence or restore.
///
/// With the `serde` feature enabled, this type derives `Serialize`/`Deserialize`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewSnapshot {
    /// Expanded container ids.
    pub expanded: Vec<NodeId>,
    /// Selected node, if any.
    pub selection: Option<(NodeId, NodeKind)>,
    /// Cursor row index in the visible list.
    pub cursor: Option<usize>,
    /// Scroll offset within the visible list.
    pub offset: usize,
}

impl Default for ContentTreeState {
    fn default() -> Self {
        Self::new(Tree::empty())
    }
}

impl ContentTreeState {
    /// Creates state for `tree` with every container expanded.
    pub fn new(tree: Tree) -> Self {
        Self::with_config(tree, DragConfig::default())
    }

    pub fn with_config(tree: Tree, drag_config: DragConfig) -> Self {
        let capacity = tree.len();
        let mut state = Self {
            tree,
            list_state: TableState::default(),
            expanded: FxHashSet::with_capacity_and_hasher(capacity, FxBuildHasher),
            seen_containers: FxHashSet::with_capacity_and_hasher(capacity, FxBuildHasher),
            selection: None,
            visible_nodes: Vec::with_capacity(capacity),
            visible_index: FxHashMap::with_capacity_and_hasher(capacity, FxBuildHasher),
            dirty: true,
            drag: DragSession::new(),
            drag_config,
            press: None,
            layout: None,
            #[cfg(feature = "keymap")]
            keymap: TreeKeyBindings::new(),
        };
        state.seed_new_containers();
        state
    }

    #[cfg(feature = "keymap")]
    /// Returns a mutable reference to the key binding set.
    pub const fn keymap_mut(&mut self) -> &mut TreeKeyBindings {
        &mut self.keymap
    }

    pub const fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn selection(&self) -> Option<(&NodeId, NodeKind)> {
        self.selection.as_ref().map(|(id, kind)| (id, *kind))
    }

    pub const fn drag(&self) -> &DragSession {
        &self.drag
    }

    pub const fn drag_config(&self) -> DragConfig {
        self.drag_config
    }

    pub const fn set_drag_config(&mut self, config: DragConfig) {
        self.drag_config = config;
    }

    pub(crate) const fn list_state(&self) -> &TableState {
        &self.list_state
    }

    pub(crate) const fn list_state_mut(&mut self) -> &mut TableState {
        &mut self.list_state
    }

    pub(crate) const fn record_layout(&mut self, area: Rect, offset: usize) {
        self.layout = Some(RowLayout { area, offset });
    }

    pub fn visible_nodes(&self) -> &[VisibleNode] {
        &self.visible_nodes
    }

    pub const fn visible_len(&self) -> usize {
        self.visible_nodes.len()
    }

    fn visible_index_of(&self, id: &NodeId) -> Option<usize> {
        self.visible_index.get(id).copied()
    }

    /// Returns whether a container is expanded. Leaves are never expanded.
    pub fn is_expanded(&self, id: &NodeId) -> bool {
        self.expanded.contains(id)
    }

    /// Captures expansion, selection and cursor.
    pub fn capture_view(&self) -> ViewSnapshot {
        let mut expanded: Vec<NodeId> = self.expanded.iter().cloned().collect();
        expanded.sort();
        ViewSnapshot {
            expanded,
            selection: self.selection.clone(),
            cursor: self.list_state.selected(),
            offset: self.list_state.offset(),
        }
    }

    /// Restores a previously captured view. Ids no longer in the tree are dropped;
    /// containers missing from `expanded` end up collapsed.
    pub fn restore_view(&mut self, snapshot: ViewSnapshot) {
        let tree = &self.tree;
        self.seen_containers = tree.container_ids().cloned().collect();
        self.expanded = snapshot
            .expanded
            .into_iter()
            .filter(|id| self.seen_containers.contains(id))
            .collect();
        self.selection = snapshot
            .selection
            .filter(|(id, _)| tree.contains(id.as_str()));
        *self.list_state.offset_mut() = snapshot.offset;
        self.list_state.select(snapshot.cursor);
        self.dirty = true;
    }

    /// Reconciles an externally fetched tree with local state.
    ///
    /// A structurally equal snapshot keeps the local order and only refreshes
    /// labels. A different one replaces the tree; expansion, selection, cursor
    /// and an in-flight drag are pruned to ids that still exist, and containers
    /// seen for the first time start expanded.
    pub fn set_external_snapshot(&mut self, tree: Tree) -> SnapshotOutcome {
        if self.tree.structurally_eq(&tree) {
            if self.tree.refresh_labels_from(&tree) {
                log::debug!("snapshot refreshed labels");
                self.dirty = true;
                return SnapshotOutcome::LabelsRefreshed;
            }
            return SnapshotOutcome::Unchanged;
        }

        self.ensure_visible_nodes();
        let cursor_id = self.cursor_id().cloned();
        self.tree = tree;
        log::debug!("snapshot replaced local tree ({} nodes)", self.tree.len());

        let tree = &self.tree;
        self.expanded.retain(|id| tree.contains(id.as_str()));
        self.seen_containers.retain(|id| tree.contains(id.as_str()));
        if self
            .selection
            .as_ref()
            .is_some_and(|(id, _)| !tree.contains(id.as_str()))
        {
            self.selection = None;
        }
        if self
            .press
            .as_ref()
            .is_some_and(|press| !tree.contains(press.id.as_str()))
        {
            self.press = None;
        }
        if self
            .drag
            .active_id()
            .is_some_and(|id| !tree.contains(id.as_str()))
        {
            self.drag.cancel(CancelReason::NodeRemoved);
        } else if self
            .drag
            .over_id()
            .is_some_and(|id| !tree.contains(id.as_str()))
        {
            self.drag.retarget(None);
        }
        self.seed_new_containers();

        self.dirty = true;
        self.ensure_visible_nodes();
        if let Some(id) = cursor_id {
            self.focus_cursor(&id);
        }
        SnapshotOutcome::Replaced
    }

    fn seed_new_containers(&mut self) {
        for id in self.tree.container_ids() {
            if self.seen_containers.insert(id.clone()) {
                self.expanded.insert(id.clone());
            }
        }
        self.dirty = true;
    }

    /// Flips expansion of a container. Leaves and unknown ids are ignored.
    pub fn toggle_expand(&mut self, id: &NodeId) -> bool {
        match self.tree.get(id.as_str()).map(Node::kind) {
            Some(NodeKind::Container) => {
                // First encounter counts as expanded.
                if self.seen_containers.insert(id.clone()) || self.expanded.contains(id) {
                    self.expanded.remove(id);
                } else {
                    self.expanded.insert(id.clone());
                }
                self.dirty = true;
                true
            }
            Some(NodeKind::Leaf) => false,
            None => {
                log::debug!("toggle ignored: {}", TreeError::NotFound(id.clone()));
                false
            }
        }
    }

    /// Sets expansion state for a container.
    pub fn set_expanded(&mut self, id: &NodeId, expand: bool) -> bool {
        match self.tree.get(id.as_str()).map(Node::kind) {
            Some(NodeKind::Container) => {
                self.seen_containers.insert(id.clone());
                if expand {
                    self.expanded.insert(id.clone());
                } else {
                    self.expanded.remove(id);
                }
                self.dirty = true;
                true
            }
            Some(NodeKind::Leaf) | None => false,
        }
    }

    /// Expands all containers in the tree.
    pub fn expand_all(&mut self) {
        let containers: Vec<NodeId> = self.tree.container_ids().cloned().collect();
        self.seen_containers.extend(containers.iter().cloned());
        self.expanded.extend(containers);
        self.dirty = true;
    }

    /// Collapses all containers.
    pub fn collapse_all(&mut self) {
        self.seen_containers
            .extend(self.tree.container_ids().cloned());
        self.expanded.clear();
        self.dirty = true;
    }

    /// Selects a node and notifies the listener. Selecting a container also
    /// toggles its expansion. Returns the node's kind.
    pub fn select<L: TreeListener>(
        &mut self,
        id: &NodeId,
        listener: &mut L,
    ) -> Result<NodeKind, TreeError> {
        let kind = self
            .tree
            .get(id.as_str())
            .map(Node::kind)
            .ok_or_else(|| TreeError::NotFound(id.clone()))?;
        self.selection = Some((id.clone(), kind));
        match kind {
            NodeKind::Container => {
                self.toggle_expand(id);
            }
            NodeKind::Leaf => {}
        }
        self.focus_cursor(id);
        listener.on_select(id, kind);
        Ok(kind)
    }

    /// Asks the host to create a collection under `parent` (root if `None`).
    pub fn request_create_container<L: TreeListener>(
        &self,
        parent: Option<&NodeId>,
        listener: &mut L,
    ) {
        listener.on_create_container(parent);
    }

    /// Starts dragging `id`. Ignored while another drag is in flight.
    pub fn begin_drag(&mut self, id: &NodeId) -> bool {
        self.press = None;
        self.drag.begin(&self.tree, id)
    }

    /// Drops the dragged node onto `target`; a successful move is reported
    /// through `on_reorder_committed`.
    pub fn drop_onto<L: TreeListener>(&mut self, target: &NodeId, listener: &mut L) -> DropOutcome {
        let outcome = self.drag.drop_onto(&mut self.tree, target);
        self.commit(outcome, listener)
    }

    /// Drops onto the current target.
    pub fn drop_current<L: TreeListener>(&mut self, listener: &mut L) -> DropOutcome {
        let outcome = self.drag.drop(&mut self.tree);
        self.commit(outcome, listener)
    }

    fn commit<L: TreeListener>(&mut self, outcome: DropOutcome, listener: &mut L) -> DropOutcome {
        if let DropOutcome::Moved(intent) = &outcome {
            self.dirty = true;
            self.focus_cursor(&intent.moved);
            listener.on_reorder_committed(&self.tree, intent);
        }
        outcome
    }

    pub fn cancel_drag(&mut self, reason: CancelReason) -> bool {
        self.drag.cancel(reason)
    }

    /// Cancels an in-flight drag when the surface loses focus (if configured).
    pub fn focus_lost(&mut self) -> bool {
        self.press = None;
        self.drag_config.cancel_on_focus_loss && self.drag.cancel(CancelReason::FocusLost)
    }

    /// Cancels an in-flight drag when the pointer leaves the surface (if configured).
    pub fn pointer_left(&mut self) -> bool {
        self.press = None;
        self.drag_config.cancel_on_leave && self.drag.cancel(CancelReason::PointerLeft)
    }

    pub fn drag_proxy(&self) -> Option<DragProxy<'_>> {
        self.drag.proxy(&self.tree)
    }

    /// Drop targets for the rows on screen, in document order. All are
    /// enabled; depth filtering and group checks narrow them further.
    pub fn drop_targets(&self) -> Vec<DropTarget> {
        let Some(layout) = self.layout else {
            return Vec::new();
        };
        self.visible_nodes
            .iter()
            .skip(layout.offset)
            .take(usize::from(layout.area.height))
            .zip(layout.area.rows())
            .map(|(node, row)| DropTarget {
                id: node.id.clone(),
                area: row,
                depth: node.level,
                enabled: true,
            })
            .collect()
    }

    fn hit_test(&self, pos: Position) -> Option<usize> {
        let layout = self.layout?;
        if !layout.area.contains(pos) {
            return None;
        }
        let idx = layout.offset + usize::from(pos.y - layout.area.y);
        (idx < self.visible_nodes.len()).then_some(idx)
    }

    fn is_outside_surface(&self, pos: Position) -> bool {
        self.layout.is_some_and(|layout| !layout.area.contains(pos))
    }

    fn active_depth(&self) -> Option<u16> {
        let active = self.drag.active_id()?;
        if let Some(idx) = self.visible_index_of(active) {
            return Some(self.visible_nodes[idx].level);
        }
        let path = self.tree.find_path(active.as_str()).ok()?;
        u16::try_from(path.len().saturating_sub(1)).ok()
    }

    /// Pointer pressed: moves the cursor to the row and arms a press that
    /// becomes a drag once the pointer travels past the threshold.
    pub fn pointer_down(&mut self, pos: Position) -> TreeEvent {
        self.ensure_visible_nodes();
        if self.drag.is_dragging() {
            return TreeEvent::Unhandled;
        }
        let Some(idx) = self.hit_test(pos) else {
            self.press = None;
            return TreeEvent::Unhandled;
        };
        self.list_state.select(Some(idx));
        self.press = Some(PendingPress {
            id: self.visible_nodes[idx].id.clone(),
            origin: pos,
        });
        TreeEvent::Handled
    }

    fn is_pointer_drag(&self) -> bool {
        self.drag.sensor() == Some(DragSensor::Pointer)
    }

    /// Pointer moved with the button held (or at all during a pointer drag).
    /// A keyboard drag ignores the pointer.
    pub fn pointer_move(&mut self, pos: Position) -> TreeEvent {
        self.ensure_visible_nodes();
        if self.drag.is_dragging() {
            if !self.is_pointer_drag() {
                return TreeEvent::Unhandled;
            }
            return self.track_pointer(pos);
        }
        let Some(press) = &self.press else {
            return TreeEvent::Unhandled;
        };
        let distance = press
            .origin
            .x
            .abs_diff(pos.x)
            .saturating_add(press.origin.y.abs_diff(pos.y));
        if distance < self.drag_config.threshold_cells {
            return TreeEvent::Unhandled;
        }
        let id = press.id.clone();
        self.press = None;
        if !self.drag.begin_with(&self.tree, &id, DragSensor::Pointer) {
            return TreeEvent::Unhandled;
        }
        self.track_pointer(pos)
    }

    fn track_pointer(&mut self, pos: Position) -> TreeEvent {
        if self.drag_config.cancel_on_leave && self.is_outside_surface(pos) {
            self.drag.cancel(CancelReason::PointerLeft);
            return TreeEvent::Handled;
        }
        let Some(depth) = self.active_depth() else {
            return TreeEvent::Unhandled;
        };
        let targets = self.drop_targets();
        let over = self.drag.drag_over(pos, depth, &targets).cloned();
        if let Some(over) = over {
            self.focus_cursor(&over);
        }
        TreeEvent::Handled
    }

    /// Pointer released: drops an active drag, or treats an unmoved press as
    /// a click that selects the row.
    pub fn pointer_up<L: TreeListener>(&mut self, pos: Position, listener: &mut L) -> TreeEvent {
        self.ensure_visible_nodes();
        let press = self.press.take();
        if self.drag.is_dragging() {
            if !self.is_pointer_drag() {
                return TreeEvent::Unhandled;
            }
            let _ = self.track_pointer(pos);
            if self.drag.is_dragging() {
                self.drop_current(listener);
            }
            return TreeEvent::Handled;
        }
        let Some(press) = press else {
            return TreeEvent::Unhandled;
        };
        match self.hit_test(pos) {
            Some(idx) if self.visible_nodes[idx].id == press.id => {
                match self.select(&press.id, listener) {
                    Ok(_) => TreeEvent::Handled,
                    Err(_) => TreeEvent::Unhandled,
                }
            }
            _ => TreeEvent::Unhandled,
        }
    }

    /// Moves the keyboard drop target to the previous/next sibling of the
    /// dragged node.
    fn step_drag_target(&mut self, forward: bool) -> bool {
        let Some(target) = self.next_drag_target(forward) else {
            return false;
        };
        self.drag.retarget(Some(target.clone()));
        self.focus_cursor(&target);
        true
    }

    fn next_drag_target(&self, forward: bool) -> Option<NodeId> {
        let active = self.drag.active_id()?;
        let (group, active_index) = self.tree.sibling_position(active.as_str()).ok()?;
        let siblings = self.tree.group(&group).ok()?;
        let current = self
            .drag
            .over_id()
            .and_then(|over| siblings.iter().position(|node| node.id() == over))
            .unwrap_or(active_index);
        let next = if forward {
            current + 1
        } else {
            current.checked_sub(1)?
        };
        siblings.get(next).map(|node| node.id().clone())
    }

    fn focus_cursor(&mut self, id: &NodeId) {
        self.ensure_visible_nodes();
        if let Some(idx) = self.visible_index_of(id) {
            self.list_state.select(Some(idx));
        }
    }

    /// Selects the first visible row.
    pub const fn select_first(&mut self) {
        self.list_state.select_first();
    }

    /// Selects the last visible row.
    pub const fn select_last(&mut self) {
        self.list_state.select_last();
    }

    /// Scrolls the view down by the given number of rows.
    pub fn scroll_down_by(&mut self, amount: u16) {
        self.list_state.scroll_down_by(amount);
    }

    /// Scrolls the view up by the given number of rows.
    pub fn scroll_up_by(&mut self, amount: u16) {
        self.list_state.scroll_up_by(amount);
    }

    /// Moves the cursor to the previous visible row.
    pub fn select_prev(&mut self) {
        if self.visible_nodes.is_empty() {
            self.list_state.select(None);
            return;
        }
        let selected = self.list_state.selected().unwrap_or(0);
        self.list_state.select(Some(selected.saturating_sub(1)));
    }

    /// Moves the cursor to the next visible row.
    pub fn select_next(&mut self) {
        if self.visible_nodes.is_empty() {
            self.list_state.select(None);
            return;
        }
        let selected = self.list_state.selected().unwrap_or(0);
        let new_selected = (selected + 1).min(self.visible_nodes.len().saturating_sub(1));
        self.list_state.select(Some(new_selected));
    }

    fn select_parent(&mut self) {
        let Some(parent_id) = self
            .list_state
            .selected()
            .and_then(|idx| self.visible_nodes.get(idx))
            .and_then(|node| node.parent.clone())
        else {
            return;
        };
        if let Some(parent_idx) = self.visible_index_of(&parent_id) {
            self.list_state.select(Some(parent_idx));
        }
    }

    /// Adjusts scroll offset so the cursor is within the viewport.
    pub fn ensure_selection_visible(&mut self, viewport_height: usize) {
        self.clamp_selection();
        let Some(selected) = self.list_state.selected() else {
            return;
        };
        let viewport_height = viewport_height.max(1);
        let offset = self.list_state.offset();
        if selected < offset {
            *self.list_state.offset_mut() = selected;
        } else if selected >= offset + viewport_height {
            *self.list_state.offset_mut() = selected + 1 - viewport_height;
        }
    }

    /// Adjusts cursor visibility according to the provided scroll policy.
    pub fn ensure_selection_visible_with_policy(
        &mut self,
        viewport_height: usize,
        policy: TreeScrollPolicy,
    ) {
        match policy {
            TreeScrollPolicy::KeepInView => self.ensure_selection_visible(viewport_height),
            TreeScrollPolicy::CenterOnSelect => {
                self.ensure_selection_visible_centered(viewport_height);
            }
        }
    }

    fn ensure_selection_visible_centered(&mut self, viewport_height: usize) {
        self.clamp_selection();
        let Some(selected) = self.list_state.selected() else {
            return;
        };
        let viewport_height = viewport_height.max(1);
        let total = self.visible_nodes.len();
        if total <= viewport_height {
            *self.list_state.offset_mut() = 0;
            return;
        }

        // Center the cursor, then clamp to the valid scroll range.
        let half = viewport_height / 2;
        let max_offset = total.saturating_sub(viewport_height);
        *self.list_state.offset_mut() = selected.saturating_sub(half).min(max_offset);
    }

    /// Returns the id under the cursor, if any.
    pub fn cursor_id(&self) -> Option<&NodeId> {
        self.cursor_node().map(|node| &node.id)
    }

    fn cursor_node(&self) -> Option<&VisibleNode> {
        self.list_state
            .selected()
            .and_then(|idx| self.visible_nodes.get(idx))
    }

    /// Handles a tree action and returns the resulting event.
    pub fn handle_action<C, L: TreeListener>(
        &mut self,
        action: TreeAction<C>,
        listener: &mut L,
    ) -> TreeEvent<C> {
        self.ensure_visible_nodes();
        let handled = |done: bool| {
            if done {
                TreeEvent::Handled
            } else {
                TreeEvent::Unhandled
            }
        };

        match action {
            TreeAction::Custom(_) => TreeEvent::Action(action),
            _ if action.is_drag_action() && !self.drag.is_dragging() => TreeEvent::Unhandled,
            TreeAction::CreateContainer => {
                self.request_create_container(None, listener);
                TreeEvent::Handled
            }
            TreeAction::CreateChildContainer => match self.cursor_node() {
                Some(node) if node.kind == NodeKind::Container => {
                    let parent = node.id.clone();
                    self.request_create_container(Some(&parent), listener);
                    TreeEvent::Handled
                }
                _ => TreeEvent::Unhandled,
            },
            TreeAction::ExpandAll => {
                self.expand_all();
                TreeEvent::Handled
            }
            TreeAction::CollapseAll => {
                self.collapse_all();
                TreeEvent::Handled
            }
            TreeAction::BeginDrag => {
                let Some(id) = self.cursor_id().cloned() else {
                    return TreeEvent::Unhandled;
                };
                handled(self.begin_drag(&id))
            }
            TreeAction::DragPrev => handled(self.step_drag_target(false)),
            TreeAction::DragNext => handled(self.step_drag_target(true)),
            TreeAction::Drop => {
                self.drop_current(listener);
                TreeEvent::Handled
            }
            TreeAction::CancelDrag => handled(self.cancel_drag(CancelReason::Explicit)),
            _ if self.visible_nodes.is_empty() => TreeEvent::Unhandled,
            TreeAction::SelectPrev => {
                self.select_prev();
                TreeEvent::Handled
            }
            TreeAction::SelectNext => {
                self.select_next();
                TreeEvent::Handled
            }
            TreeAction::SelectParent => {
                self.select_parent();
                TreeEvent::Handled
            }
            TreeAction::SelectFirst => {
                self.select_first();
                TreeEvent::Handled
            }
            TreeAction::SelectLast => {
                self.select_last();
                TreeEvent::Handled
            }
            TreeAction::Activate => {
                let Some(id) = self.cursor_id().cloned() else {
                    return TreeEvent::Unhandled;
                };
                handled(self.select(&id, listener).is_ok())
            }
            TreeAction::ToggleNode => {
                let Some(id) = self.cursor_id().cloned() else {
                    return TreeEvent::Unhandled;
                };
                handled(self.toggle_expand(&id))
            }
        }
    }

    #[cfg(feature = "keymap")]
    /// Resolves a key event into an action and handles it.
    pub fn handle_key<L: TreeListener>(&mut self, key: KeyEvent, listener: &mut L) -> TreeEvent<()> {
        let dragging = self.drag.is_dragging();
        let Some(action) = self.keymap.resolve(key, dragging) else {
            return TreeEvent::Unhandled;
        };
        self.handle_key_action(key, action, listener)
    }

    #[cfg(feature = "keymap")]
    /// Resolves a key event with a custom mapping and handles it.
    pub fn handle_key_with<C, F, L>(&mut self, key: KeyEvent, custom: F, listener: &mut L) -> TreeEvent<C>
    where
        F: Fn(KeyEvent) -> Option<C>,
        L: TreeListener,
    {
        let dragging = self.drag.is_dragging();
        let Some(action) = self.keymap.resolve_with(key, dragging, custom) else {
            return TreeEvent::Unhandled;
        };
        self.handle_key_action(key, action, listener)
    }

    #[cfg(feature = "keymap")]
    // Esc cancels with its own reason and honours `cancel_on_escape`.
    fn handle_key_action<C, L: TreeListener>(
        &mut self,
        key: KeyEvent,
        action: TreeAction<C>,
        listener: &mut L,
    ) -> TreeEvent<C> {
        if matches!(action, TreeAction::CancelDrag) && key.code == KeyCode::Esc {
            if !self.drag_config.cancel_on_escape {
                return TreeEvent::Unhandled;
            }
            return if self.cancel_drag(CancelReason::Escape) {
                TreeEvent::Handled
            } else {
                TreeEvent::Unhandled
            };
        }
        self.handle_action(action, listener)
    }

    #[cfg(feature = "keymap")]
    /// Routes a crossterm mouse event to the pointer handlers.
    pub fn handle_mouse<L: TreeListener>(&mut self, mouse: MouseEvent, listener: &mut L) -> TreeEvent<()> {
        let pos = Position::new(mouse.column, mouse.row);
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => self.pointer_down(pos),
            MouseEventKind::Drag(MouseButton::Left) => self.pointer_move(pos),
            MouseEventKind::Moved if self.is_pointer_drag() => self.pointer_move(pos),
            MouseEventKind::Up(MouseButton::Left) => self.pointer_up(pos, listener),
            MouseEventKind::ScrollDown => {
                self.scroll_down_by(1);
                TreeEvent::Handled
            }
            MouseEventKind::ScrollUp => {
                self.scroll_up_by(1);
                TreeEvent::Handled
            }
            _ => TreeEvent::Unhandled,
        }
    }

    /// Ensures the visible node list is up to date (if marked dirty).
    pub fn ensure_visible_nodes(&mut self) {
        if !self.dirty {
            return;
        }
        self.update_visible_nodes();
    }

    fn update_visible_nodes(&mut self) {
        self.visible_nodes.clear();
        self.visible_index.clear();
        let mut is_tail_stack: SmallVec<[bool; 8]> = SmallVec::new();
        build_visible_nodes(
            self.tree.roots(),
            0,
            None,
            &self.expanded,
            &mut is_tail_stack,
            &mut self.visible_nodes,
            &mut self.visible_index,
        );
        self.dirty = false;
        self.clamp_selection();
    }

    const fn clamp_selection(&mut self) {
        if self.visible_nodes.is_empty() {
            self.list_state.select(None);
            return;
        }

        if let Some(selected) = self.list_state.selected()
            && selected >= self.visible_nodes.len()
        {
            self.list_state
                .select(Some(self.visible_nodes.len().saturating_sub(1)));
        }
    }
}

fn build_visible_nodes(
    nodes: &[Node],
    level: u16,
    parent: Option<&NodeId>,
    expanded: &FxHashSet<NodeId>,
    is_tail_stack: &mut SmallVec<[bool; 8]>,
    out: &mut Vec<VisibleNode>,
    index: &mut FxHashMap<NodeId, usize>,
) {
    let last = nodes.len().saturating_sub(1);
    for (i, node) in nodes.iter().enumerate() {
        if level > 0 {
            is_tail_stack.push(i == last);
        }
        let children = node.children();
        index.insert(node.id().clone(), out.len());
        out.push(VisibleNode {
            id: node.id().clone(),
            level,
            parent: parent.cloned(),
            kind: node.kind(),
            label: node.label().to_owned(),
            has_children: !children.is_empty(),
            is_tail_stack: is_tail_stack.clone(),
        });

        if !children.is_empty() && expanded.contains(node.id()) {
            build_visible_nodes(
                children,
                level.saturating_add(1),
                Some(node.id()),
                expanded,
                is_tail_stack,
                out,
                index,
            );
        }
        if level > 0 {
            is_tail_stack.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drag::ReorderIntent;
    use crate::listener::TreeNotification;
    use crate::model::GroupKey;

    fn tree() -> Tree {
        Tree::new(vec![
            Node::container(
                "c1",
                "Getting started",
                vec![Node::leaf("d1", "Welcome"), Node::leaf("d2", "FAQ")],
            ),
            Node::container(
                "c2",
                "Reference",
                vec![
                    Node::container("c3", "API", vec![Node::leaf("d3", "Auth")]),
                    Node::leaf("d4", "CLI"),
                ],
            ),
        ])
        .unwrap()
    }

    fn visible_ids(state: &ContentTreeState) -> Vec<&str> {
        state
            .visible_nodes()
            .iter()
            .map(|node| node.id().as_str())
            .collect()
    }

    fn child_ids(state: &ContentTreeState, parent: &str) -> Vec<String> {
        state
            .tree()
            .group(&GroupKey::Container(parent.into()))
            .unwrap()
            .iter()
            .map(|node| node.id().to_string())
            .collect()
    }

    // Rows drawn from the top-left corner, one per visible node.
    fn laid_out(tree: Tree) -> ContentTreeState {
        let mut state = ContentTreeState::new(tree);
        state.ensure_visible_nodes();
        state.record_layout(Rect::new(0, 0, 30, 20), 0);
        state
    }

    #[test]
    fn all_containers_start_expanded() {
        let mut state = ContentTreeState::new(tree());
        state.ensure_visible_nodes();

        assert_eq!(
            visible_ids(&state),
            vec!["c1", "d1", "d2", "c2", "c3", "d3", "d4"]
        );
        let levels: Vec<_> = state.visible_nodes().iter().map(VisibleNode::level).collect();
        assert_eq!(levels, vec![0, 1, 1, 0, 1, 2, 1]);
    }

    #[test]
    fn toggle_expand_hides_children_and_ignores_leaves() {
        let mut state = ContentTreeState::new(tree());

        assert!(state.toggle_expand(&"c2".into()));
        assert!(!state.toggle_expand(&"d1".into()));
        assert!(!state.toggle_expand(&"missing".into()));
        state.ensure_visible_nodes();

        assert_eq!(visible_ids(&state), vec!["c1", "d1", "d2", "c2"]);
        assert!(!state.is_expanded(&"c2".into()));

        state.toggle_expand(&"c2".into());
        assert!(state.is_expanded(&"c2".into()));
    }

    #[test]
    fn selecting_a_container_toggles_it_and_notifies() {
        let mut state = ContentTreeState::new(tree());
        let mut events = Vec::new();

        let kind = state.select(&"c1".into(), &mut events).unwrap();

        assert_eq!(kind, NodeKind::Container);
        assert!(!state.is_expanded(&"c1".into()));
        assert_eq!(state.selection(), Some((&"c1".into(), NodeKind::Container)));

        state.select(&"d4".into(), &mut events).unwrap();
        assert_eq!(
            events,
            vec![
                TreeNotification::Select {
                    id: "c1".into(),
                    kind: NodeKind::Container
                },
                TreeNotification::Select {
                    id: "d4".into(),
                    kind: NodeKind::Leaf
                },
            ]
        );
        assert_eq!(
            state.select(&"nope".into(), &mut events),
            Err(TreeError::NotFound("nope".into()))
        );
    }

    #[test]
    fn create_container_requests_only_notify() {
        let mut state = laid_out(tree());
        let before = state.tree().clone();
        let mut events = Vec::new();

        state.handle_action(TreeAction::<()>::CreateContainer, &mut events);
        state.list_state.select(Some(3));
        state.handle_action(TreeAction::<()>::CreateChildContainer, &mut events);
        state.list_state.select(Some(1));
        let leaf = state.handle_action(TreeAction::<()>::CreateChildContainer, &mut events);

        assert_eq!(leaf, TreeEvent::Unhandled);
        assert_eq!(
            events,
            vec![
                TreeNotification::CreateContainer { parent: None },
                TreeNotification::CreateContainer {
                    parent: Some("c2".into())
                },
            ]
        );
        assert_eq!(state.tree(), &before);
    }

    #[test]
    fn pointer_drag_reorders_nested_group_and_commits_once() {
        let mut state = laid_out(tree());
        let mut events = Vec::new();

        // Row 4 is c3, row 6 is d4; both children of c2.
        assert_eq!(state.pointer_down(Position::new(2, 4)), TreeEvent::Handled);
        assert_eq!(state.pointer_move(Position::new(2, 5)), TreeEvent::Handled);
        assert!(state.drag().is_dragging());
        assert_eq!(
            state.pointer_up(Position::new(2, 6), &mut events),
            TreeEvent::Handled
        );

        assert_eq!(child_ids(&state, "c2"), vec!["d4", "c3"]);
        assert!(!state.drag().is_dragging());
        assert_eq!(events.len(), 1);
        let TreeNotification::ReorderCommitted { tree, intent } = &events[0] else {
            panic!("expected a reorder notification, got {:?}", events[0]);
        };
        assert_eq!(tree, state.tree());
        assert_eq!(
            intent,
            &ReorderIntent {
                group: GroupKey::Container("c2".into()),
                moved: "c3".into(),
                from: 0,
                to: 1,
                order: vec!["d4".into(), "c3".into()],
            }
        );
        assert_eq!(state.cursor_id(), Some(&"c3".into()));
    }

    #[test]
    fn pointer_drop_is_limited_to_active_depth() {
        let mut state = laid_out(tree());
        let mut events = Vec::new();

        // Drag d1 (row 1) over c2's row (depth 0): the closest depth-1 row wins.
        state.pointer_down(Position::new(1, 1));
        state.pointer_move(Position::new(1, 3));
        assert_eq!(state.drag().over_id(), Some(&"d2".into()));
        state.pointer_up(Position::new(1, 3), &mut events);

        assert_eq!(child_ids(&state, "c1"), vec!["d2", "d1"]);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn cross_group_pointer_drop_leaves_both_groups() {
        let mut state = laid_out(tree());
        let before = state.tree().clone();
        let mut events = Vec::new();

        // d2 (row 2) dropped onto c3's row (row 4, depth 1, but under c2).
        state.pointer_down(Position::new(1, 2));
        state.pointer_move(Position::new(1, 4));
        state.pointer_up(Position::new(1, 4), &mut events);

        assert_eq!(state.tree(), &before);
        assert!(events.is_empty());
        assert!(!state.drag().is_dragging());
    }

    #[test]
    fn short_press_is_a_click() {
        let mut state = ContentTreeState::with_config(tree(), DragConfig::default().with_threshold(3));
        state.ensure_visible_nodes();
        state.record_layout(Rect::new(0, 0, 30, 20), 0);
        let mut events = Vec::new();

        state.pointer_down(Position::new(4, 6));
        assert_eq!(state.pointer_move(Position::new(5, 6)), TreeEvent::Unhandled);
        assert!(!state.drag().is_dragging());
        state.pointer_up(Position::new(5, 6), &mut events);

        assert_eq!(
            events,
            vec![TreeNotification::Select {
                id: "d4".into(),
                kind: NodeKind::Leaf
            }]
        );
    }

    #[test]
    fn leaving_the_surface_or_losing_focus_cancels() {
        let mut state = laid_out(tree());
        let before = state.tree().clone();

        state.pointer_down(Position::new(1, 1));
        state.pointer_move(Position::new(1, 2));
        assert!(state.drag().is_dragging());
        state.pointer_move(Position::new(40, 2));
        assert!(!state.drag().is_dragging());

        assert!(state.begin_drag(&"d1".into()));
        assert!(state.focus_lost());
        assert!(!state.drag().is_dragging());

        state.set_drag_config(DragConfig::default().keep_on_focus_loss());
        state.begin_drag(&"d1".into());
        assert!(!state.focus_lost());
        assert!(state.drag().is_dragging());
        assert!(state.pointer_left());

        assert_eq!(state.tree(), &before);
    }

    #[test]
    fn keyboard_drag_moves_target_among_siblings() {
        let mut state = laid_out(tree());
        let mut events = Vec::new();
        state.list_state.select(Some(1));

        assert_eq!(
            state.handle_action(TreeAction::<()>::BeginDrag, &mut events),
            TreeEvent::Handled
        );
        assert_eq!(
            state.handle_action(TreeAction::<()>::DragPrev, &mut events),
            TreeEvent::Unhandled
        );
        state.handle_action(TreeAction::<()>::DragNext, &mut events);
        // No sibling after d2: target stays.
        assert_eq!(
            state.handle_action(TreeAction::<()>::DragNext, &mut events),
            TreeEvent::Unhandled
        );
        assert_eq!(state.drag().over_id(), Some(&"d2".into()));
        state.handle_action(TreeAction::<()>::Drop, &mut events);

        assert_eq!(child_ids(&state, "c1"), vec!["d2", "d1"]);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn keyboard_cancel_restores_nothing_because_nothing_moved() {
        let mut state = laid_out(tree());
        let before = state.tree().clone();
        state.list_state.select(Some(4));

        state.handle_action(TreeAction::<()>::BeginDrag, &mut ());
        state.handle_action(TreeAction::<()>::DragNext, &mut ());
        assert_eq!(
            state.handle_action(TreeAction::<()>::CancelDrag, &mut ()),
            TreeEvent::Handled
        );

        assert_eq!(state.tree(), &before);
        assert!(!state.drag().is_dragging());
    }

    #[test]
    fn keyboard_drag_ignores_stray_pointer_events() {
        let mut state = laid_out(tree());
        let mut events: Vec<TreeNotification> = Vec::new();
        assert!(state.begin_drag(&"d1".into()));
        state.drag.retarget(Some("d2".into()));

        // Row 2 holds d2, row 1 d1: the pointer would pick d1 as the target.
        assert_eq!(state.pointer_move(Position::new(3, 1)), TreeEvent::Unhandled);
        assert_eq!(state.drag().over_id(), Some(&"d2".into()));
        assert_eq!(state.drag().pointer(), None);

        assert_eq!(
            state.pointer_up(Position::new(3, 1), &mut events),
            TreeEvent::Unhandled
        );
        assert!(state.drag().is_dragging());
        assert!(events.is_empty());
        assert_eq!(child_ids(&state, "c1"), vec!["d1", "d2"]);
    }

    #[test]
    fn pointer_started_drag_records_its_sensor() {
        let mut state = laid_out(tree());
        state.pointer_down(Position::new(1, 1));
        state.pointer_move(Position::new(1, 2));

        assert_eq!(state.drag().sensor(), Some(DragSensor::Pointer));
        assert_eq!(state.drag().pointer(), Some(Position::new(1, 2)));
    }

    #[test]
    fn visible_levels_saturate_at_max_depth() {
        let nodes = vec![Node::container("deep", "Deep", vec![Node::leaf("leaf", "Leaf")])];
        let expanded: FxHashSet<NodeId> = std::iter::once(NodeId::from("deep")).collect();
        let mut tail = SmallVec::new();
        let mut out = Vec::new();
        let mut index = FxHashMap::default();

        build_visible_nodes(&nodes, u16::MAX, None, &expanded, &mut tail, &mut out, &mut index);

        let levels: Vec<_> = out.iter().map(VisibleNode::level).collect();
        assert_eq!(levels, vec![u16::MAX, u16::MAX]);
    }

    #[cfg(feature = "keymap")]
    mod keys {
        use super::*;
        use crossterm::event::KeyModifiers;

        fn esc() -> KeyEvent {
            KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)
        }

        #[test]
        fn escape_cancels_with_its_own_reason() {
            let mut state = laid_out(tree());
            let before = state.tree().clone();
            assert!(state.begin_drag(&"d1".into()));

            assert_eq!(state.handle_key(esc(), &mut ()), TreeEvent::Handled);

            assert!(!state.drag().is_dragging());
            assert_eq!(state.drag().last_cancel(), Some(CancelReason::Escape));
            assert_eq!(state.tree(), &before);
        }

        #[test]
        fn escape_is_ignored_when_disabled() {
            let mut state =
                ContentTreeState::with_config(tree(), DragConfig::default().no_escape_cancel());
            assert!(state.begin_drag(&"d1".into()));

            assert_eq!(state.handle_key(esc(), &mut ()), TreeEvent::Unhandled);
            assert_eq!(
                state.handle_key_with(esc(), |_| None::<()>, &mut ()),
                TreeEvent::Unhandled
            );
            assert!(state.drag().is_dragging());
        }

        #[test]
        fn custom_bindings_route_escape_the_same_way() {
            let mut state = laid_out(tree());
            assert!(state.begin_drag(&"d1".into()));

            assert_eq!(
                state.handle_key_with(esc(), |_| None::<()>, &mut ()),
                TreeEvent::Handled
            );
            assert!(!state.drag().is_dragging());
            assert_eq!(state.drag().last_cancel(), Some(CancelReason::Escape));
        }

        #[test]
        fn stray_mouse_motion_does_not_retarget_a_keyboard_drag() {
            let mut state = laid_out(tree());
            assert!(state.begin_drag(&"d1".into()));
            state.drag.retarget(Some("d2".into()));

            let moved = MouseEvent {
                kind: MouseEventKind::Moved,
                column: 3,
                row: 1,
                modifiers: KeyModifiers::NONE,
            };
            assert_eq!(state.handle_mouse(moved, &mut ()), TreeEvent::Unhandled);
            assert_eq!(state.drag().over_id(), Some(&"d2".into()));
        }
    }

    #[test]
    fn drag_actions_are_ignored_when_idle() {
        let mut state = laid_out(tree());
        let mut events: Vec<TreeNotification> = Vec::new();
        state.list_state.select(Some(1));

        for action in [TreeAction::<()>::DragNext, TreeAction::Drop, TreeAction::CancelDrag] {
            assert_eq!(state.handle_action(action, &mut events), TreeEvent::Unhandled);
        }
        assert!(events.is_empty());
        assert_eq!(child_ids(&state, "c1"), vec!["d1", "d2"]);
    }

    #[test]
    fn structurally_different_snapshot_replaces_and_expands_new_containers() {
        let mut state = ContentTreeState::new(tree());
        state.toggle_expand(&"c2".into());
        state.select(&"d1".into(), &mut ()).unwrap();

        let incoming = Tree::new(vec![
            Node::container(
                "c2",
                "Reference",
                vec![
                    Node::container("c3", "API", vec![Node::leaf("d3", "Auth")]),
                    Node::leaf("d4", "CLI"),
                ],
            ),
            Node::container("c9", "New", vec![Node::leaf("d9", "Draft")]),
        ])
        .unwrap();

        assert_eq!(
            state.set_external_snapshot(incoming.clone()),
            SnapshotOutcome::Replaced
        );
        state.ensure_visible_nodes();

        assert_eq!(state.tree(), &incoming);
        assert!(state.is_expanded(&"c9".into()));
        assert!(!state.is_expanded(&"c2".into()));
        assert_eq!(state.selection(), None);
        assert_eq!(visible_ids(&state), vec!["c2", "c9", "d9"]);
    }

    #[test]
    fn equal_snapshot_keeps_local_state_and_refreshes_labels() {
        let mut state = ContentTreeState::new(tree());
        let renamed = Tree::new(
            tree()
                .roots()
                .iter()
                .map(|node| match node {
                    Node::Container { id, children, .. } if id.as_str() == "c1" => {
                        Node::container("c1", "Start here", children.clone())
                    }
                    other => other.clone(),
                })
                .collect(),
        )
        .unwrap();

        assert_eq!(
            state.set_external_snapshot(tree()),
            SnapshotOutcome::Unchanged
        );
        assert_eq!(
            state.set_external_snapshot(renamed),
            SnapshotOutcome::LabelsRefreshed
        );
        assert_eq!(state.tree().get("c1").map(Node::label), Some("Start here"));
    }

    #[test]
    fn snapshot_removing_dragged_node_cancels_the_drag() {
        let mut state = laid_out(tree());
        assert!(state.begin_drag(&"d2".into()));

        let incoming = Tree::new(vec![Node::container(
            "c1",
            "Getting started",
            vec![Node::leaf("d1", "Welcome")],
        )])
        .unwrap();
        state.set_external_snapshot(incoming);

        assert!(!state.drag().is_dragging());
        assert!(state.drag_proxy().is_none());
    }

    #[test]
    fn snapshot_keeps_drag_when_dragged_node_survives() {
        let mut state = laid_out(tree());
        state.begin_drag(&"d1".into());
        state.drag.retarget(Some("d2".into()));

        let incoming = Tree::new(vec![Node::container(
            "c1",
            "Getting started",
            vec![Node::leaf("d1", "Welcome"), Node::leaf("d5", "New")],
        )])
        .unwrap();
        state.set_external_snapshot(incoming);

        assert_eq!(state.drag().active_id(), Some(&"d1".into()));
        assert_eq!(state.drag().over_id(), None);
        assert_eq!(state.drag_proxy().map(|proxy| proxy.label), Some("Welcome"));
    }

    #[test]
    fn view_snapshot_round_trips_expansion_and_selection() {
        let mut state = ContentTreeState::new(tree());
        state.collapse_all();
        state.set_expanded(&"c2".into(), true);
        state.select(&"d4".into(), &mut ()).unwrap();
        let view = state.capture_view();

        let mut restored = ContentTreeState::new(tree());
        restored.restore_view(view.clone());
        restored.ensure_visible_nodes();

        assert_eq!(restored.capture_view(), view);
        assert_eq!(visible_ids(&restored), vec!["c1", "c2", "c3", "d4"]);
    }

    #[test]
    fn navigation_clears_cursor_on_empty_tree() {
        let mut state = ContentTreeState::default();
        state.list_state.select(Some(0));

        state.select_prev();

        assert_eq!(state.list_state.selected(), None);
        assert_eq!(
            state.handle_action(TreeAction::<()>::SelectNext, &mut ()),
            TreeEvent::Unhandled
        );
    }

    #[test]
    fn custom_actions_are_forwarded() {
        let mut state = ContentTreeState::new(tree());
        assert_eq!(
            state.handle_action(TreeAction::Custom(7u8), &mut ()),
            TreeEvent::Action(TreeAction::Custom(7u8))
        );
    }
}
