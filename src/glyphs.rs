use ratatui::text::{Line, Span};

use crate::context::TreeRowContext;
use crate::model::NodeKind;

#[derive(Clone, Copy)]
pub struct TreeGlyphs<'a> {
    pub indent: &'a str,
    pub branch_last: &'a str,
    pub branch: &'a str,
    pub vert: &'a str,
    pub empty: &'a str,
    pub leaf: &'a str,
    pub expanded: &'a str,
    pub collapsed: &'a str,
    /// Marker drawn in front of the row being dragged.
    pub grip: &'a str,
}

impl TreeGlyphs<'static> {
    pub const fn unicode() -> Self {
        Self {
            indent: "   ",
            branch_last: "└──",
            branch: "├──",
            vert: "│  ",
            empty: "   ",
            leaf: "•",
            expanded: "▼",
            collapsed: "▶",
            grip: "≡",
        }
    }

    pub const fn ascii() -> Self {
        Self {
            indent: "   ",
            branch_last: "`--",
            branch: "|--",
            vert: "|  ",
            empty: "   ",
            leaf: "*",
            expanded: "v",
            collapsed: ">",
            grip: "=",
        }
    }
}

impl<'a> TreeGlyphs<'a> {
    /// Glyph for a node kind; containers show their expansion state.
    pub const fn kind_glyph(&self, kind: NodeKind, is_expanded: bool) -> &'a str {
        match kind {
            NodeKind::Container if is_expanded => self.expanded,
            NodeKind::Container => self.collapsed,
            NodeKind::Leaf => self.leaf,
        }
    }
}

/// Renders the label cell of a row.
pub trait TreeLabelRenderer {
    fn line<'a>(&'a self, label: &'a str, ctx: &TreeRowContext<'a>, glyphs: &TreeGlyphs<'a>)
    -> Line<'a>;
}

/// Guide lines, kind glyph and label.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultLabel;

impl TreeLabelRenderer for DefaultLabel {
    fn line<'a>(
        &'a self,
        label: &'a str,
        ctx: &TreeRowContext<'a>,
        glyphs: &TreeGlyphs<'a>,
    ) -> Line<'a> {
        tree_label_line(ctx, label, glyphs)
    }
}

pub fn tree_label_line<'a>(
    ctx: &TreeRowContext<'_>,
    label: &'a str,
    glyphs: &TreeGlyphs<'a>,
) -> Line<'a> {
    let glyph = glyphs.kind_glyph(ctx.kind, ctx.is_expanded);
    let mut spans = Vec::with_capacity(ctx.is_tail_stack.len() + 5);

    if ctx.level > 0 && ctx.draw_lines {
        for (l, is_last) in ctx.is_tail_stack.iter().enumerate() {
            let part = if l + 1 == ctx.is_tail_stack.len() {
                if *is_last {
                    glyphs.branch_last
                } else {
                    glyphs.branch
                }
            } else if *is_last {
                glyphs.indent
            } else {
                glyphs.vert
            };
            spans.push(Span::styled(part, ctx.line_style));
        }
    } else {
        for _ in 0..ctx.level {
            spans.push(Span::raw(glyphs.empty));
        }
    }

    if ctx.is_drag_source {
        spans.push(Span::raw(glyphs.grip));
        spans.push(Span::raw(" "));
    }
    spans.push(Span::raw(glyph));
    spans.push(Span::raw(" "));
    spans.push(Span::raw(label));
    Line::from(spans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeId;
    use ratatui::style::Style;

    fn ctx<'a>(id: &'a NodeId, kind: NodeKind, tail: &'a [bool]) -> TreeRowContext<'a> {
        TreeRowContext {
            id,
            kind,
            level: u16::try_from(tail.len()).unwrap(),
            is_tail_stack: tail,
            is_expanded: true,
            has_children: kind == NodeKind::Container,
            is_selected: false,
            is_drag_source: false,
            is_drop_target: false,
            draw_lines: true,
            line_style: Style::default(),
        }
    }

    fn text(line: &Line<'_>) -> String {
        line.spans.iter().map(|span| span.content.as_ref()).collect()
    }

    #[test]
    fn nested_leaf_draws_guides() {
        let id = NodeId::from("d1");
        let tail = [false, true];
        let line = tree_label_line(&ctx(&id, NodeKind::Leaf, &tail), "FAQ", &TreeGlyphs::ascii());

        assert_eq!(text(&line), "|  `--* FAQ");
    }

    #[test]
    fn dragged_root_container_shows_grip() {
        let id = NodeId::from("c1");
        let mut row = ctx(&id, NodeKind::Container, &[]);
        row.is_drag_source = true;
        row.is_expanded = false;

        let line = tree_label_line(&row, "Guides", &TreeGlyphs::ascii());

        assert_eq!(text(&line), "= > Guides");
    }
}
