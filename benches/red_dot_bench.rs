use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;

use bevy_gamekit::prelude::*;

/// A tree `Root.N0.N1...` of the given depth with `width` leaves under the
/// deepest node.
fn build_tree(depth: usize, width: usize) -> (RedDotManager, String, Vec<String>) {
    let mut manager = RedDotManager::new();
    let mut path = String::from("Root");
    manager.register_tag(&path);
    for level in 0..depth {
        path = format!("{path}.N{level}");
        manager.register_tag(&path);
    }
    let leaves: Vec<String> = (0..width).map(|i| format!("{path}.Leaf{i}")).collect();
    for leaf in leaves.iter() {
        manager.register_tag(leaf);
    }
    (manager, path, leaves)
}

pub fn bench_propagation(c: &mut Criterion) {
    let mut group = c.benchmark_group("Red Dot Propagation");

    for &depth in [1, 4, 16].iter() {
        let (mut manager, _, leaves) = build_tree(depth, 8);
        let _listener = manager
            .add_state_listener("Root", |_, info| {
                black_box(info.count);
            }, TagMatch::Partial, false);

        group.bench_function(BenchmarkId::new("add_count", depth), |b| {
            b.iter(|| {
                for leaf in leaves.iter() {
                    manager.add_count(leaf, 1);
                }
                for leaf in leaves.iter() {
                    manager.add_count(leaf, -1);
                }
            })
        });
    }
    group.finish();
}

pub fn bench_clear_branch(c: &mut Criterion) {
    let mut group = c.benchmark_group("Red Dot Clear Branch");

    for &width in [8, 64, 512].iter() {
        let (mut manager, parent, leaves) = build_tree(2, width);

        group.bench_function(BenchmarkId::new("cached", width), |b| {
            b.iter(|| {
                for leaf in leaves.iter() {
                    manager.add_count(leaf, 1);
                }
                manager.clear_branch(black_box(&parent));
            })
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(5))
        .sample_size(50);
    targets = bench_propagation, bench_clear_branch
}

criterion_main!(benches);
