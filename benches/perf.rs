use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use ratatui::buffer::Buffer;
use ratatui::layout::{Position, Rect};
use ratatui::widgets::StatefulWidget;
use tui_contenttree::{
    ContentTreeState, ContentTreeStyle, ContentTreeView, DropTarget, GroupKey, Node, NodeId, Tree,
    closest_center,
};

// `collections` root containers with `docs` leaves each.
fn wide_tree(collections: usize, docs: usize) -> Tree {
    let roots = (0..collections)
        .map(|c| {
            let children = (0..docs)
                .map(|d| Node::leaf(format!("c{c}-d{d}"), format!("Document {c}.{d}")))
                .collect();
            Node::container(format!("c{c}"), format!("Collection {c}"), children)
        })
        .collect();
    Tree::new(roots).unwrap_or_else(|_| Tree::empty())
}

fn bench_reorder(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree/reorder");
    let tree = wide_tree(50, 200);
    let key = GroupKey::Container(NodeId::from("c25"));

    group.bench_function("move_first_to_last_200", |b| {
        let mut tree = tree.clone();
        b.iter(|| {
            let _ = tree.move_within_siblings(black_box(&key), 0, 199);
        });
    });

    group.bench_function("moved_within_siblings_pure", |b| {
        b.iter(|| black_box(tree.moved_within_siblings(&key, 199, 0)).is_ok());
    });

    group.bench_function("find_path_deep", |b| {
        b.iter(|| black_box(tree.find_path(black_box("c49-d199"))).is_ok());
    });

    group.finish();
}

fn bench_visible_rows(c: &mut Criterion) {
    let mut group = c.benchmark_group("state/visible_rows");
    let tree = wide_tree(100, 100);

    group.bench_function("rebuild_10k_rows", |b| {
        let mut state = ContentTreeState::new(tree.clone());
        b.iter(|| {
            state.collapse_all();
            state.expand_all();
            state.ensure_visible_nodes();
            black_box(state.visible_len());
        });
    });

    group.bench_function("render_80x40", |b| {
        let mut state = ContentTreeState::new(tree.clone());
        let area = Rect::new(0, 0, 80, 40);
        let mut buffer = Buffer::empty(area);
        b.iter(|| {
            ContentTreeView::new(ContentTreeStyle::default()).render(area, &mut buffer, &mut state);
            state.select_next();
        });
    });

    group.finish();
}

fn bench_closest_center(c: &mut Criterion) {
    let targets: Vec<DropTarget> = (0..200u16)
        .map(|row| DropTarget {
            id: NodeId::new(format!("d{row}")),
            area: Rect::new(2, row, 60, 1),
            depth: row % 3,
            enabled: true,
        })
        .collect();

    c.bench_function("drag/closest_center_200", |b| {
        b.iter(|| black_box(closest_center(black_box(Position::new(10, 137)), 1, &targets)));
    });
}

criterion_group!(benches, bench_reorder, bench_visible_rows, bench_closest_center);
criterion_main!(benches);
