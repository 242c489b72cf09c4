// Interactive content directory: reorder documents and collections with the
// mouse (press, drag, release) or the keyboard (`m`/Shift+arrows to pick up,
// arrows to move the target, Enter to drop, Esc to cancel).
//
// Logs go to `directory-demo.log` (override the filter with RUST_LOG).
use std::fs::File;
use std::io;
use std::time::Duration;

use chrono::Local;
use crossterm::event::{
    self, DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture, Event,
    KeyCode, KeyEventKind,
};
use crossterm::execute;
use env_logger::{Env, Target};
use ratatui::layout::{Constraint, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::Paragraph;
use ratatui::{DefaultTerminal, Frame};

use tui_contenttree::{
    ContentTreeState, ContentTreeStyle, ContentTreeView, Node, NodeId, Tree, TreeNotification,
};

// Stand-in for the remote content store: receives committed orders and
// answers with fresh snapshots.
struct Backend {
    tree: Tree,
    next_id: usize,
}

impl Backend {
    fn new() -> Self {
        Self {
            tree: sample_tree(),
            next_id: 1,
        }
    }

    fn persist(&mut self, tree: &Tree) {
        self.tree = tree.clone();
    }

    // Adds an empty collection and returns the snapshot the host would fetch.
    fn create_container(&mut self, parent: Option<&NodeId>) -> Option<Tree> {
        let id = format!("new-{}", self.next_id);
        let label = format!("New collection {}", self.next_id);
        self.next_id += 1;
        let node = Node::container(id, label, Vec::new());

        let mut roots: Vec<Node> = self.tree.clone().into();
        match parent {
            None => roots.push(node),
            Some(parent) => {
                if !insert_child(&mut roots, parent, node) {
                    return None;
                }
            }
        }
        match Tree::new(roots) {
            Ok(tree) => {
                self.tree = tree.clone();
                Some(tree)
            }
            Err(err) => {
                log::warn!("snapshot rejected: {err}");
                None
            }
        }
    }
}

fn insert_child(nodes: &mut [Node], parent: &NodeId, child: Node) -> bool {
    for node in nodes {
        if let Node::Container { id, children, .. } = node {
            if *id == *parent {
                children.push(child);
                return true;
            }
            if insert_child(children, parent, child.clone()) {
                return true;
            }
        }
    }
    false
}

fn sample_tree() -> Tree {
    let roots = vec![
        Node::container(
            "getting-started",
            "Getting started",
            vec![
                Node::leaf("install", "Installation"),
                Node::leaf("quickstart", "Quickstart"),
                Node::leaf("faq", "FAQ"),
            ],
        ),
        Node::container(
            "guides",
            "Guides",
            vec![
                Node::container(
                    "deploy",
                    "Deployment",
                    vec![
                        Node::leaf("docker", "Docker"),
                        Node::leaf("k8s", "Kubernetes"),
                    ],
                ),
                Node::leaf("backup", "Backups"),
                Node::leaf("upgrade", "Upgrading"),
            ],
        ),
        Node::leaf("changelog", "Changelog"),
        Node::leaf("license", "License"),
    ];
    Tree::new(roots).unwrap_or_else(|_| Tree::empty())
}

fn status_line(notification: &TreeNotification) -> String {
    let now = Local::now().format("%H:%M:%S");
    match notification {
        TreeNotification::ReorderCommitted { intent, .. } => format!(
            "[{now}] saved order of {} ({} moved {} -> {})",
            intent.group, intent.moved, intent.from, intent.to
        ),
        TreeNotification::CreateContainer { parent } => match parent {
            Some(parent) => format!("[{now}] created collection in {parent}"),
            None => format!("[{now}] created root collection"),
        },
        TreeNotification::Select { id, kind } => format!("[{now}] opened {kind:?} {id}"),
    }
}

fn render(frame: &mut Frame, state: &mut ContentTreeState, style: &ContentTreeStyle<'_>, status: &str) {
    let [tree_area, status_area] =
        Layout::vertical([Constraint::Fill(1), Constraint::Length(1)]).areas(frame.area());
    frame.render_stateful_widget(ContentTreeView::new(style.clone()), tree_area, state);
    frame.render_widget(
        Paragraph::new(status).style(Style::default().fg(Color::Rgb(136, 192, 208))),
        status_area,
    );
}

fn run_app(mut terminal: DefaultTerminal, style: &ContentTreeStyle<'_>) -> io::Result<()> {
    let mut backend = Backend::new();
    let mut state = ContentTreeState::new(backend.tree.clone());
    let mut notifications: Vec<TreeNotification> = Vec::new();
    let mut status = String::from("q quits; m picks up; n/N create collections");

    loop {
        terminal.draw(|frame| render(frame, &mut state, style, &status))?;

        if !event::poll(Duration::from_millis(200))? {
            continue;
        }
        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                if key.code == KeyCode::Char('q') && !state.drag().is_dragging() {
                    break;
                }
                let _ = state.handle_key(key, &mut notifications);
            }
            Event::Mouse(mouse) => {
                let _ = state.handle_mouse(mouse, &mut notifications);
            }
            Event::FocusLost => {
                state.focus_lost();
            }
            _ => {}
        }

        for notification in notifications.drain(..) {
            status = status_line(&notification);
            match notification {
                TreeNotification::ReorderCommitted { tree, .. } => backend.persist(&tree),
                TreeNotification::CreateContainer { parent } => {
                    if let Some(snapshot) = backend.create_container(parent.as_ref()) {
                        let outcome = state.set_external_snapshot(snapshot);
                        log::info!("applied snapshot: {outcome:?}");
                    }
                }
                TreeNotification::Select { .. } => {}
            }
        }
    }

    Ok(())
}

fn main() -> io::Result<()> {
    let log_file = File::create("directory-demo.log")?;
    env_logger::Builder::from_env(Env::default().default_filter_or("debug"))
        .target(Target::Pipe(Box::new(log_file)))
        .init();

    let mut style = ContentTreeStyle::default();
    style.block_style = Style::default()
        .fg(Color::Rgb(221, 227, 235))
        .bg(Color::Rgb(24, 28, 36));
    style.border_style = Style::default().fg(Color::Rgb(92, 110, 140));
    style.line_style = Style::default().fg(Color::Rgb(86, 98, 120));
    style.highlight_style = Style::default()
        .fg(Color::Rgb(255, 255, 255))
        .bg(Color::Rgb(52, 66, 96))
        .add_modifier(Modifier::BOLD);
    style.drop_target_style = Style::default()
        .fg(Color::Rgb(229, 201, 133))
        .add_modifier(Modifier::UNDERLINED);
    style.title = Some(Line::from("Knowledge base"));

    let terminal = ratatui::init();
    execute!(io::stdout(), EnableMouseCapture, EnableFocusChange)?;
    let result = run_app(terminal, &style);
    execute!(io::stdout(), DisableMouseCapture, DisableFocusChange)?;
    ratatui::restore();
    result
}
