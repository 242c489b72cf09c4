use ratatui::style::Style;

use crate::model::{NodeId, NodeKind};

#[derive(Clone, Copy)]
pub struct TreeRowContext<'a> {
    pub id: &'a NodeId,
    pub kind: NodeKind,
    pub level: u16,
    pub is_tail_stack: &'a [bool],
    pub is_expanded: bool,
    pub has_children: bool,
    pub is_selected: bool,
    /// The row is the node currently being dragged.
    pub is_drag_source: bool,
    /// The row is the current drop target of a drag.
    pub is_drop_target: bool,
    pub draw_lines: bool,
    pub line_style: Style,
}
