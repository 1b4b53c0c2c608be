//! Snapshot round trips and archive rejection paths.

mod common;

use std::sync::Arc;

use common::*;
use latch_ecs::glam::{Quat, Vec3};
use latch_ecs::serialize::archive::{write_header, write_str, write_u32, write_u64, MAGIC};
use latch_ecs::{
    ArchiveVersion, ComponentDesc, ComponentRegistry, Entity, ErrorKind, World, WorldSettings, FORMAT_VERSION,
};

fn populated() -> (World, Family) {
    let mut world = world();
    let family = build_family(&mut world);
    world.insert(family.b, Value { value: 10 }).unwrap();
    world.insert(family.d, Value { value: 20 }).unwrap();
    world.insert(family.c, Velocity { x: 1.0, y: 0.5, z: -2.0 }).unwrap();
    world.set_local_position(family.b, Vec3::new(1.0, 2.0, 3.0)).unwrap();
    world.set_local_rotation(family.d, Quat::from_rotation_x(0.25)).unwrap();
    world.set_local_scale(family.c, Vec3::splat(0.5)).unwrap();
    world.set_name(family.a, Some("root")).unwrap();
    world.set_flags(family.c, 0x10).unwrap();
    (world, family)
}

fn transform_bits(world: &World, e: Entity) -> Vec<u32> {
    let t = world.transform(e).unwrap();
    t.local_position()
        .to_array()
        .into_iter()
        .chain(t.local_rotation().to_array())
        .chain(t.local_scale().to_array())
        .map(f32::to_bits)
        .collect()
}

#[test]
fn round_trip_into_a_fresh_world() {
    let (src, family) = populated();
    let mut buf = Vec::new();
    src.serialize(&mut buf).unwrap();

    let mut dst = World::new(registry());
    dst.deserialize(&mut buf.as_slice()).unwrap();
    assert_structure(&dst);

    assert_eq!(dst.hierarchy(), src.hierarchy());
    for &e in src.hierarchy() {
        assert!(dst.is_valid(e));
        assert_eq!(dst.parent(e), src.parent(e));
        assert_eq!(dst.child_count(e), src.child_count(e));
        assert_eq!(dst.handle_index(e), src.handle_index(e));
        assert_eq!(transform_bits(&dst, e), transform_bits(&src, e));
        assert!(dst.is_transform_dirty(e));
    }
    for kind in src.registry().kinds() {
        let before: Vec<_> = src.iter_components(kind.id()).map(|(e, b)| (e, b.to_vec())).collect();
        let after: Vec<_> = dst.iter_components(kind.id()).map(|(e, b)| (e, b.to_vec())).collect();
        assert_eq!(before, after, "kind {}", kind.name());
    }
    assert_eq!(dst.name(family.a), Some("root"));
    assert_eq!(dst.find_by_name("root"), Some(family.a));
    assert_eq!(dst.flags(family.c), 0x10);
}

#[test]
fn loaded_world_keeps_working() {
    let (src, family) = populated();
    let bytes = src.to_bytes().unwrap();
    let mut dst = World::new(registry());
    dst.load_bytes(&bytes).unwrap();

    assert_eq!(dst.world_position(family.b).unwrap(), Vec3::new(1.0, 2.0, 3.0));
    let e = dst.create_entity(Some(family.d)).unwrap();
    dst.insert(e, Value { value: 30 }).unwrap();
    dst.destroy_entity(family.b).unwrap();
    assert_eq!(dst.hierarchy(), &[family.a, family.c]);
    assert_eq!(dst.live_component_count(k_id(&dst)), 0);
    assert_structure(&dst);
}

#[test]
fn gaps_in_ids_become_the_freelist() {
    let mut src = world();
    let ids: Vec<Entity> = (0..6).map(|_| src.create_entity(None).unwrap()).collect();
    src.destroy_entity(ids[1]).unwrap();
    src.destroy_entity(ids[4]).unwrap();

    let mut dst = World::new(registry());
    dst.load_bytes(&src.to_bytes().unwrap()).unwrap();
    assert_eq!(dst.entity_slot_count(), 6);
    let mut free = dst.free_list().to_vec();
    free.sort();
    assert_eq!(free, vec![ids[1], ids[4]]);

    let reused = dst.create_entity(None).unwrap();
    assert!(reused == ids[1] || reused == ids[4]);
    assert_structure(&dst);
}

#[test]
fn unknown_kind_is_invalid_format() {
    let (src, _) = populated();
    let bytes = src.to_bytes().unwrap();

    let mut reg = ComponentRegistry::new();
    reg.register::<Velocity>().unwrap();
    let mut dst = World::new(Arc::new(reg));
    let err = dst.load_bytes(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidFormat);
}

#[test]
fn kind_lookup_is_by_name_not_id() {
    let (src, family) = populated();
    let bytes = src.to_bytes().unwrap();

    // Same kinds registered in the opposite order.
    let mut reg = ComponentRegistry::new();
    reg.register::<Velocity>().unwrap();
    reg.register_kind(ComponentDesc::of::<Value>()).unwrap();
    let mut dst = World::new(Arc::new(reg));
    dst.load_bytes(&bytes).unwrap();
    assert_eq!(dst.get::<Value>(family.d), Some(&Value { value: 20 }));
    assert_eq!(dst.get::<Velocity>(family.c).map(|v| v.z), Some(-2.0));
}

#[test]
fn newer_major_is_unsupported() {
    let mut bytes = Vec::new();
    write_header(&mut bytes, ArchiveVersion { major: 2, minor: 0, patch: 0 }).unwrap();
    let mut dst = world();
    let keep = dst.create_entity(None).unwrap();
    let err = dst.load_bytes(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedVersion);
    assert!(dst.is_valid(keep));
}

#[test]
fn every_truncation_is_rejected() {
    let (src, _) = populated();
    let bytes = src.to_bytes().unwrap();
    for cut in [0, 3, 9, 20, bytes.len() / 2, bytes.len() - 1] {
        let mut dst = World::new(registry());
        let err = dst.load_bytes(&bytes[..cut]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFormat, "cut at {cut}");
        dst.check_invariants().unwrap();
    }
}

#[test]
fn corrupted_handle_index_is_rejected() {
    let mut src = world();
    src.create_entity(None).unwrap();
    let mut bytes = src.to_bytes().unwrap();
    // Entity 1 is the first id followed by a zero child count.
    let record = bytes
        .windows(8)
        .position(|w| w == [1, 0, 0, 0, 0, 0, 0, 0])
        .expect("entity record");
    bytes[record + 8] = 9;
    let mut dst = World::new(registry());
    assert_eq!(dst.load_bytes(&bytes).unwrap_err().kind(), ErrorKind::InvalidFormat);
}

#[test]
fn version_1_0_archives_have_no_metadata() {
    // A hand-written 1.0 archive: one root entity with one K component.
    let mut bytes = Vec::new();
    write_header(&mut bytes, ArchiveVersion { major: 1, minor: 0, patch: 0 }).unwrap();
    write_u32(&mut bytes, 1).unwrap();
    write_u32(&mut bytes, 1).unwrap();
    bytes.extend_from_slice(b"K");
    write_u32(&mut bytes, 8).unwrap();

    write_u32(&mut bytes, 1).unwrap(); // live
    write_u32(&mut bytes, 1).unwrap(); // slots
    write_u32(&mut bytes, 1).unwrap(); // id
    write_u32(&mut bytes, 0).unwrap(); // child_count
    bytes.extend_from_slice(&0u64.to_le_bytes());
    for v in [0.0f32, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0] {
        bytes.extend_from_slice(&v.to_le_bytes());
    }

    write_u32(&mut bytes, 1).unwrap();
    write_u32(&mut bytes, 1).unwrap();
    bytes.extend_from_slice(&42i32.to_le_bytes());
    bytes.extend_from_slice(MAGIC);

    let mut dst = World::new(registry());
    dst.load_bytes(&bytes).unwrap();
    let e = Entity::from_raw(1);
    assert_eq!(dst.get::<Value>(e), Some(&Value { value: 42 }));
    assert_eq!(dst.name(e), None);
    assert_structure(&dst);
}

/// Header plus a registry snapshot naming only `K`.
fn k_archive_prefix() -> Vec<u8> {
    let mut bytes = Vec::new();
    write_header(&mut bytes, FORMAT_VERSION).unwrap();
    write_u32(&mut bytes, 1).unwrap();
    write_str(&mut bytes, "K").unwrap();
    let reference = world();
    let size = reference.registry().kind_size(k_id(&reference)).unwrap();
    write_u32(&mut bytes, size as u32).unwrap();
    bytes
}

/// A root entity record with identity locals.
fn write_root_record(bytes: &mut Vec<u8>, id: u32, handle: u64) {
    write_u32(bytes, id).unwrap();
    write_u32(bytes, 0).unwrap();
    write_u64(bytes, handle).unwrap();
    for v in [0.0f32, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0] {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
}

fn assert_rejected(bytes: &[u8]) {
    let mut dst = world();
    let err = dst.load_bytes(bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidFormat);
    assert_eq!(dst.entity_count(), 0);
    dst.check_invariants().unwrap();
}

#[test]
fn huge_slot_count_is_rejected_without_allocating() {
    let mut bytes = Vec::new();
    write_header(&mut bytes, FORMAT_VERSION).unwrap();
    write_u32(&mut bytes, 0).unwrap(); // kinds
    write_u32(&mut bytes, 0).unwrap(); // live
    write_u32(&mut bytes, 0x7FFF_FFFE).unwrap(); // slots
    assert_rejected(&bytes);
}

#[test]
fn huge_live_count_fails_on_the_missing_records() {
    let mut bytes = Vec::new();
    write_header(&mut bytes, FORMAT_VERSION).unwrap();
    write_u32(&mut bytes, 0).unwrap();
    write_u32(&mut bytes, 0x7FFF_FFFE).unwrap();
    write_u32(&mut bytes, 0x7FFF_FFFF).unwrap();
    write_root_record(&mut bytes, 1, 0);
    assert_rejected(&bytes);
}

#[test]
fn huge_component_count_fails_on_the_missing_records() {
    let mut bytes = k_archive_prefix();
    write_u32(&mut bytes, 1).unwrap();
    write_u32(&mut bytes, 1).unwrap();
    write_root_record(&mut bytes, 1, 0);
    write_u32(&mut bytes, u32::MAX).unwrap();
    write_u32(&mut bytes, 1).unwrap();
    bytes.extend_from_slice(&5i32.to_le_bytes());
    assert_rejected(&bytes);
}

#[test]
fn huge_string_length_is_rejected_before_touching_the_world() {
    let mut bytes = Vec::new();
    write_header(&mut bytes, FORMAT_VERSION).unwrap();
    write_u32(&mut bytes, 1).unwrap();
    write_u32(&mut bytes, 0xFFFF_FFF0).unwrap();
    bytes.extend_from_slice(b"K");

    let mut dst = world();
    let keep = dst.create_entity(None).unwrap();
    let err = dst.load_bytes(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidFormat);
    assert!(dst.is_valid(keep));
    dst.check_invariants().unwrap();
}

#[test]
fn unused_slot_limit_comes_from_settings() {
    let mut src = world();
    let ids: Vec<Entity> = (0..6).map(|_| src.create_entity(None).unwrap()).collect();
    for &e in &ids[..4] {
        src.destroy_entity(e).unwrap();
    }
    let bytes = src.to_bytes().unwrap();

    let tight = WorldSettings { max_archive_free_slots: 3, ..WorldSettings::default() };
    let mut dst = World::with_settings(registry(), tight).unwrap();
    assert_eq!(dst.load_bytes(&bytes).unwrap_err().kind(), ErrorKind::InvalidFormat);

    let exact = WorldSettings { max_archive_free_slots: 4, ..WorldSettings::default() };
    let mut dst = World::with_settings(registry(), exact).unwrap();
    dst.load_bytes(&bytes).unwrap();
    assert_eq!(dst.hierarchy(), &ids[4..]);
    assert_eq!(dst.free_list().len(), 4);
    assert_structure(&dst);
}
