use ratatui::layout::{Constraint, Rect};
use ratatui::prelude::Buffer;
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, Borders, Clear, Paragraph, Row, Scrollbar, ScrollbarOrientation, ScrollbarState,
    StatefulWidget, Table, Widget,
};

use crate::context::TreeRowContext;
use crate::drag::DragProxy;
use crate::glyphs::{DefaultLabel, TreeGlyphs, TreeLabelRenderer};
use crate::state::ContentTreeState;
use crate::style::ContentTreeStyle;

/// Content tree widget: one row per visible node, plus the floating drag
/// proxy while a pointer drag is in flight.
pub struct ContentTreeView<'a, L = DefaultLabel>
where
    L: TreeLabelRenderer,
{
    label: &'a L,
    style: ContentTreeStyle<'a>,
    glyphs: TreeGlyphs<'a>,
}

impl<'a> ContentTreeView<'a, DefaultLabel> {
    pub const fn new(style: ContentTreeStyle<'a>) -> Self {
        Self {
            label: &DefaultLabel,
            style,
            glyphs: TreeGlyphs::unicode(),
        }
    }
}

impl<'a, L> ContentTreeView<'a, L>
where
    L: TreeLabelRenderer,
{
    pub const fn with_label(label: &'a L, style: ContentTreeStyle<'a>) -> Self {
        Self {
            label,
            style,
            glyphs: TreeGlyphs::unicode(),
        }
    }

    pub const fn glyphs(mut self, glyphs: TreeGlyphs<'a>) -> Self {
        self.glyphs = glyphs;
        self
    }

    fn build_rows<'b>(&'b self, state: &'b ContentTreeState) -> Vec<Row<'b>> {
        let selected = state.selection().map(|(id, _)| id);
        let drag_source = state.drag().active_id();
        let drop_target = state.drag().over_id().filter(|over| Some(*over) != drag_source);

        let mut rows = Vec::with_capacity(state.visible_len());
        for node in state.visible_nodes() {
            let ctx = TreeRowContext {
                id: &node.id,
                kind: node.kind,
                level: node.level,
                is_tail_stack: node.is_tail_stack.as_slice(),
                is_expanded: state.is_expanded(&node.id),
                has_children: node.has_children,
                is_selected: selected == Some(&node.id),
                is_drag_source: drag_source == Some(&node.id),
                is_drop_target: drop_target == Some(&node.id),
                draw_lines: self.style.draw_lines,
                line_style: self.style.line_style,
            };
            let line = self.label.line(&node.label, &ctx, &self.glyphs);
            let mut row = Row::new([line]);
            if ctx.is_drag_source {
                row = row.style(self.style.drag_source_style);
            } else if ctx.is_drop_target {
                row = row.style(self.style.drop_target_style);
            } else if ctx.is_selected {
                row = row.style(self.style.selection_style);
            }
            rows.push(row);
        }
        rows
    }

    fn render_scrollbar(
        area: Rect,
        buf: &mut Buffer,
        offset: usize,
        inner_height: usize,
        scroll_rows: usize,
    ) {
        let scroll_len = scroll_rows.saturating_add(1);
        let mut scrollbar_state = ScrollbarState::new(scroll_len)
            .position(offset.min(scroll_len.saturating_sub(1)))
            .viewport_content_length(inner_height);
        Scrollbar::default()
            .orientation(ScrollbarOrientation::VerticalRight)
            .render(area, buf, &mut scrollbar_state);
    }

    /// Draws the proxy one cell below-right of the pointer, clamped to `bounds`.
    fn render_proxy(&self, proxy: &DragProxy<'_>, bounds: Rect, buf: &mut Buffer) {
        let Some(pointer) = proxy.pointer else {
            return;
        };
        let line = Line::from(vec![
            Span::raw(" "),
            Span::raw(self.glyphs.kind_glyph(proxy.kind, false)),
            Span::raw(" "),
            Span::raw(proxy.label),
            Span::raw(" "),
        ]);
        let width = u16::try_from(line.width())
            .unwrap_or(u16::MAX)
            .min(bounds.width);
        if width == 0 || bounds.height == 0 {
            return;
        }
        let x = pointer
            .x
            .saturating_add(1)
            .min(bounds.right().saturating_sub(width))
            .max(bounds.x);
        let y = pointer
            .y
            .saturating_add(1)
            .min(bounds.bottom().saturating_sub(1))
            .max(bounds.y);
        let area = Rect::new(x, y, width, 1);
        Clear.render(area, buf);
        Paragraph::new(line)
            .style(self.style.proxy_style)
            .render(area, buf);
    }
}

impl<L> StatefulWidget for ContentTreeView<'_, L>
where
    L: TreeLabelRenderer,
{
    type State = ContentTreeState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut Self::State) {
        state.ensure_visible_nodes();

        let mut block = Block::default().borders(self.style.borders);
        if let Some(title) = self.style.title.clone() {
            block = block.title(title);
        }
        block = block
            .style(self.style.block_style)
            .border_style(self.style.border_style);

        let inner_height = usize::from(block.inner(area).height);
        state.ensure_selection_visible_with_policy(inner_height, self.style.scroll_policy);
        let scroll_rows = state.visible_len().saturating_sub(inner_height);

        let (table_area, table_block, scrollbar_area) = if scroll_rows > 0 {
            let table_area = Rect {
                width: area.width.saturating_sub(1),
                ..area
            };
            let scrollbar_area = Rect {
                x: area.x + area.width.saturating_sub(1),
                y: area.y,
                width: 1,
                height: area.height,
            };
            let mut table_borders = self.style.borders;
            table_borders.remove(Borders::RIGHT);
            (table_area, block.borders(table_borders), Some(scrollbar_area))
        } else {
            (area, block, None)
        };
        let rows_area = table_block.inner(table_area);

        let mut list_state = *state.list_state();
        {
            let table = Table::new(self.build_rows(state), [Constraint::Fill(1)])
                .style(self.style.block_style)
                .block(table_block)
                .row_highlight_style(self.style.highlight_style)
                .highlight_symbol(self.style.highlight_symbol);
            StatefulWidget::render(table, table_area, buf, &mut list_state);
        }
        *state.list_state_mut() = list_state;
        state.record_layout(rows_area, list_state.offset());

        if let Some(scrollbar_area) = scrollbar_area {
            Self::render_scrollbar(
                scrollbar_area,
                buf,
                list_state.offset(),
                inner_height,
                scroll_rows,
            );
        }

        if let Some(proxy) = state.drag_proxy() {
            self.render_proxy(&proxy, area, buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Node, Tree};
    use ratatui::layout::Position;

    fn tree(leaves: usize) -> Tree {
        let children = (0..leaves)
            .map(|idx| Node::leaf(format!("d{idx}"), format!("doc-{idx}")))
            .collect();
        Tree::new(vec![Node::container("c", "collection", children)]).unwrap()
    }

    fn buffer_text(buffer: &Buffer) -> String {
        buffer
            .content()
            .iter()
            .map(ratatui::buffer::Cell::symbol)
            .collect()
    }

    #[test]
    fn render_smoke_with_scrollbar() {
        let mut state = ContentTreeState::new(tree(12));
        let widget = ContentTreeView::new(ContentTreeStyle::default());

        let area = Rect::new(0, 0, 20, 6);
        let mut buffer = Buffer::empty(area);
        widget.render(area, &mut buffer, &mut state);

        assert!(buffer_text(&buffer).contains("collection"));
    }

    #[test]
    fn render_records_row_layout_for_pointer_input() {
        let mut state = ContentTreeState::new(tree(3));
        let area = Rect::new(0, 0, 30, 8);
        let mut buffer = Buffer::empty(area);
        ContentTreeView::new(ContentTreeStyle::default()).render(area, &mut buffer, &mut state);

        // Inside the border the first row is y = 1; row 2 holds d1.
        let targets = state.drop_targets();
        assert_eq!(targets.len(), 4);
        assert_eq!(targets[2].id.as_str(), "d1");
        assert_eq!(targets[2].area, Rect::new(1, 3, 28, 1));

        state.pointer_down(Position::new(5, 2));
        state.pointer_move(Position::new(5, 4));
        assert_eq!(state.drag().active_id().map(|id| id.as_str()), Some("d0"));
        assert_eq!(state.drag().over_id().map(|id| id.as_str()), Some("d2"));
    }

    #[test]
    fn drag_proxy_is_drawn_near_pointer() {
        let mut state = ContentTreeState::new(tree(3));
        let area = Rect::new(0, 0, 30, 8);
        let mut buffer = Buffer::empty(area);
        ContentTreeView::new(ContentTreeStyle::default())
            .glyphs(TreeGlyphs::ascii())
            .render(area, &mut buffer, &mut state);

        state.pointer_down(Position::new(5, 2));
        state.pointer_move(Position::new(5, 3));
        let mut buffer = Buffer::empty(area);
        ContentTreeView::new(ContentTreeStyle::default())
            .glyphs(TreeGlyphs::ascii())
            .render(area, &mut buffer, &mut state);

        let proxy_row: String = (0..area.width)
            .map(|x| buffer[(x, 4)].symbol())
            .collect();
        assert!(proxy_row.contains(" * doc-0 "), "row was {proxy_row:?}");
    }
}
