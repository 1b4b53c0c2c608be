//! # ECS Core Benchmarks
//!
//! Measures the hot paths: spawning with components, pool iteration,
//! lazy transform reads over a deep chain, and snapshot round trips.

#![allow(missing_docs)]

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use latch_ecs::glam::Vec3;
use latch_ecs::{define_component, ComponentRegistry, Entity, World, WorldSettings};

#[repr(C)]
#[derive(Clone, Copy, Default, bytemuck::Pod, bytemuck::Zeroable)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
}
define_component!(Position, "Position");

#[repr(C)]
#[derive(Clone, Copy, Default, bytemuck::Pod, bytemuck::Zeroable)]
struct Velocity {
    x: f32,
    y: f32,
    z: f32,
}
define_component!(Velocity, "Velocity");

const ENTITY_COUNT: usize = 10_000;

fn registry() -> Arc<ComponentRegistry> {
    let mut reg = ComponentRegistry::new();
    reg.register::<Position>().unwrap();
    reg.register::<Velocity>().unwrap();
    Arc::new(reg)
}

fn settings() -> WorldSettings {
    WorldSettings {
        validate_mutations: false,
        ..WorldSettings::default()
    }
}

fn populated() -> World {
    let mut world = World::with_settings(registry(), settings()).unwrap();
    for i in 0..ENTITY_COUNT {
        let e = world.create_entity(None).unwrap();
        world.insert(e, Position { x: i as f32, y: 0.0, z: 0.0 }).unwrap();
        if i % 2 == 0 {
            world.insert(e, Velocity { x: 0.1, y: 0.2, z: 0.3 }).unwrap();
        }
    }
    world
}

fn bench_spawn(c: &mut Criterion) {
    c.bench_function("spawn_10k_with_position", |b| {
        b.iter_batched(
            || World::with_settings(registry(), settings()).unwrap(),
            |mut world| {
                for _ in 0..ENTITY_COUNT {
                    let e = world.create_entity(None).unwrap();
                    world.add::<Position>(e).unwrap();
                }
                black_box(world.entity_count())
            },
            BatchSize::LargeInput,
        );
    });
}

fn bench_iterate(c: &mut Criterion) {
    let mut world = populated();

    c.bench_function("iterate_10k_positions", |b| {
        b.iter(|| {
            let sum: f32 = world.iter::<Position>().map(|(_, p)| p.x).sum();
            black_box(sum)
        });
    });

    c.bench_function("mutate_5k_velocities", |b| {
        b.iter(|| {
            world
                .for_each_mut::<Velocity>(|_, v| v.y += 0.016)
                .unwrap();
        });
    });
}

fn bench_transforms(c: &mut Criterion) {
    let mut world = World::with_settings(registry(), settings()).unwrap();
    let mut chain: Vec<Entity> = Vec::new();
    for _ in 0..64 {
        let e = world.create_entity(chain.last().copied()).unwrap();
        world.set_local_position(e, Vec3::X).unwrap();
        chain.push(e);
    }
    let root = chain[0];
    let leaf = chain[chain.len() - 1];

    c.bench_function("world_position_clean_leaf", |b| {
        world.world_position(leaf).unwrap();
        b.iter(|| black_box(world.world_position(leaf).unwrap()));
    });

    c.bench_function("world_position_after_root_edit", |b| {
        b.iter(|| {
            world.set_local_position(root, Vec3::Y).unwrap();
            black_box(world.world_position(leaf).unwrap())
        });
    });
}

fn bench_snapshot(c: &mut Criterion) {
    let world = populated();
    let bytes = world.to_bytes().unwrap();

    c.bench_function("serialize_10k", |b| {
        b.iter(|| black_box(world.to_bytes().unwrap().len()));
    });

    c.bench_function("deserialize_10k", |b| {
        let mut target = World::with_settings(registry(), settings()).unwrap();
        b.iter(|| {
            target.load_bytes(&bytes).unwrap();
            black_box(target.entity_count())
        });
    });
}

criterion_group!(benches, bench_spawn, bench_iterate, bench_transforms, bench_snapshot);
criterion_main!(benches);
