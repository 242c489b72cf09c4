use ratatui::style::{Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::Borders;

/// Scroll policy applied when the cursor row changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TreeScrollPolicy {
    KeepInView,
    CenterOnSelect,
}

/// Visual settings of the content tree widget.
#[derive(Clone)]
pub struct ContentTreeStyle<'a> {
    pub title: Option<Line<'a>>,
    pub block_style: Style,
    pub border_style: Style,
    pub highlight_style: Style,
    /// Row of the selected (opened) node.
    pub selection_style: Style,
    /// Row of the node being dragged.
    pub drag_source_style: Style,
    /// Row the dragged node would be dropped onto.
    pub drop_target_style: Style,
    /// Floating preview drawn at the pointer while dragging.
    pub proxy_style: Style,
    pub line_style: Style,
    pub highlight_symbol: &'a str,
    pub borders: Borders,
    pub draw_lines: bool,
    pub scroll_policy: TreeScrollPolicy,
}

impl Default for ContentTreeStyle<'_> {
    fn default() -> Self {
        Self {
            title: None,
            block_style: Style::default(),
            border_style: Style::default(),
            highlight_style: Style::default(),
            selection_style: Style::default().add_modifier(Modifier::BOLD),
            drag_source_style: Style::default().add_modifier(Modifier::DIM),
            drop_target_style: Style::default().add_modifier(Modifier::UNDERLINED),
            proxy_style: Style::default().add_modifier(Modifier::REVERSED),
            line_style: Style::default(),
            highlight_symbol: ">> ",
            borders: Borders::ALL,
            draw_lines: true,
            scroll_policy: TreeScrollPolicy::KeepInView,
        }
    }
}
