//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, Once};

use latch_ecs::{define_component, CompId, ComponentDesc, ComponentRegistry, Entity, World, WorldSettings};

/// The `K` payload: owner header plus one signed value.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Value {
    pub value: i32,
}
define_component!(Value, "K");

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Velocity {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}
define_component!(Velocity, "Velocity");

static INIT: Once = Once::new();

/// Route library logs to the test harness output.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// Registry with `K` (three slots per slab) and `Velocity`.
pub fn registry() -> Arc<ComponentRegistry> {
    let mut reg = ComponentRegistry::new();
    reg.register_kind(ComponentDesc::of::<Value>().with_slab_slots(3))
        .expect("register K");
    reg.register::<Velocity>().expect("register Velocity");
    Arc::new(reg)
}

pub fn world() -> World {
    init_tracing();
    let settings = WorldSettings {
        validate_mutations: true,
        ..WorldSettings::default()
    };
    World::with_settings(registry(), settings).expect("valid settings")
}

pub fn k_id(world: &World) -> CompId {
    world.registry().id_of::<Value>().expect("K registered")
}

/// Collects every destroy event in order.
pub fn destroy_log(world: &mut World) -> Arc<Mutex<Vec<Entity>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    world.on_entity_destroy(move |e| sink.lock().unwrap().push(e));
    log
}

/// The S2 forest: A with children B and C, D under B.
pub struct Family {
    pub a: Entity,
    pub b: Entity,
    pub c: Entity,
    pub d: Entity,
}

pub fn build_family(world: &mut World) -> Family {
    let a = world.create_entity(None).unwrap();
    let b = world.create_entity(Some(a)).unwrap();
    let c = world.create_entity(Some(a)).unwrap();
    let d = world.create_entity(Some(b)).unwrap();
    Family { a, b, c, d }
}

/// Sum of `1 + child_count` over the roots.
pub fn root_span(world: &World) -> usize {
    world.roots().map(|r| 1 + world.child_count(r) as usize).sum()
}

/// Live count recomputed from slab shapes.
pub fn slab_live_count(world: &World, kind: CompId) -> usize {
    let stride = world.registry().kind_size(kind).unwrap();
    world
        .pool_stats(kind)
        .unwrap()
        .iter()
        .map(|s| s.size_bytes / stride - s.tombstones)
        .sum()
}

/// Checks the hierarchy and pool invariants through the public API.
pub fn assert_structure(world: &World) {
    world.check_invariants().unwrap();
    for (i, &e) in world.hierarchy().iter().enumerate() {
        assert_eq!(world.handle_index(e), Some(i));
    }
    assert_eq!(root_span(world), world.hierarchy().len());
    assert_eq!(world.entity_count(), world.hierarchy().len());
    for kind in world.registry().kinds() {
        assert_eq!(world.live_component_count(kind.id()), slab_live_count(world, kind.id()));
    }
}
