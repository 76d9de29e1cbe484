use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;

use bevy::prelude::*;
use bevy_gamekit::prelude::*;

#[derive(Pooled, Default)]
struct Particle {
    slot: PoolSlot,
    position: Vec3,
    velocity: Vec3,
}

impl Poolable for Particle {
    fn reset_pooled_object(&mut self) {
        self.position = Vec3::ZERO;
        self.velocity = Vec3::ZERO;
    }
}

fn particle_manager(size: usize) -> ObjectPoolManager {
    let manager = ObjectPoolManager::new();
    let config = PoolConfig::new("Particle", PoolEntryType::of::<Particle>())
        .with_initial_size(size)
        .with_max_size(size)
        .with_growth(false);
    // benches have no error channel
    let _ = manager.register_pool(config, &mut NullScene);
    manager
}

pub fn bench_acquire_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("Acquire/Release");

    for &size in [16, 256, 4096].iter() {
        let manager = particle_manager(size);

        group.bench_function(BenchmarkId::new("single", size), |b| {
            b.iter(|| {
                if let Some(entry) = manager.acquire_object("Particle", &mut NullScene) {
                    let _ = manager.release_object(black_box(&entry), &mut NullScene);
                }
            })
        });

        group.bench_function(BenchmarkId::new("drain", size), |b| {
            b.iter(|| {
                let held: Vec<PoolEntry> = (0..size)
                    .filter_map(|_| manager.acquire_object("Particle", &mut NullScene))
                    .collect();
                for entry in held.iter() {
                    let _ = manager.release_object(entry, &mut NullScene);
                }
                black_box(held.len())
            })
        });
    }
    group.finish();
}

pub fn bench_actor_pool(c: &mut Criterion) {
    let mut group = c.benchmark_group("Actor Pool");

    let mut world = World::new();
    let manager = ObjectPoolManager::new();
    let spawner = actor_spawner(|entity| {
        entity.insert(Name::new("Spark"));
    });
    let config = PoolConfig::new("Spark", PoolEntryType::actor("Spark", spawner))
        .with_initial_size(256)
        .with_max_size(256);
    let _ = manager.register_pool(config, &mut WorldScene::new(&mut world));

    group.bench_function("acquire_release", |b| {
        b.iter(|| {
            let mut scene = WorldScene::new(&mut world);
            if let Some(entry) = manager.acquire_object("Spark", &mut scene) {
                let _ = manager.release_object(black_box(&entry), &mut scene);
            }
        })
    });
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(5))
        .sample_size(50);
    targets = bench_acquire_release, bench_actor_pool
}

criterion_main!(benches);
