//! Whole-world snapshots.
//!
//! Layout after the header:
//!
//! 1. registry snapshot: `u32 count`, then `string name, u32 size` per
//!    persistent kind;
//! 2. entities: `u32 live`, `u32 slot_count`, then for each live id in
//!    ascending order `u32 id, u32 child_count, u64 handle_index,
//!    3f position, 4f rotation, 3f scale`;
//! 3. components: per snapshot kind, `u32 count` then `u32 owner` plus the
//!    kind's serialized body for each live slot in pool order;
//! 4. (1.1+) metadata: per live id, `u32 flags, u8 has_name [, string]`;
//! 5. trailing magic.
//!
//! Parents are not stored; they are rebuilt from the hierarchy order.

use std::io::{Read, Write};

use crate::ecs::{ComponentRef, Entity, EntityTransform, World};
use crate::error::{EcsError, EcsResult};
use crate::math::{Quat, Vec3};
use crate::registry::{slot_owner, CompId};
use crate::serialize::archive::*;

/// Upper bound on entity records reserved before any have been read.
const RECORD_PREALLOC: usize = 4096;

/// One entity as stored in the archive, before it is placed in the world.
struct EntityRecord {
    entity: Entity,
    child_count: u32,
    handle: u64,
    position: Vec3,
    rotation: Quat,
    scale: Vec3,
}

impl World {
    /// Write the whole world to `out`.
    pub fn serialize<W: Write>(&self, out: &mut W) -> EcsResult<()> {
        let out: &mut dyn Write = out;
        write_header(out, FORMAT_VERSION)?;

        let kinds: Vec<CompId> = self
            .registry
            .kinds()
            .filter(|k| k.is_persistent())
            .map(|k| k.id())
            .collect();
        write_u32(out, kinds.len() as u32)?;
        for &id in &kinds {
            let kind = self.registry.kind_or_err(id)?;
            write_str(out, kind.name())?;
            write_u32(out, kind.size() as u32)?;
        }

        let live: Vec<Entity> = self.live_ids().collect();
        write_u32(out, live.len() as u32)?;
        write_u32(out, self.entity_slot_count())?;
        for &e in &live {
            let data = self.rec(e);
            let t = &self.transforms[e.index() as usize];
            write_u32(out, e.index())?;
            write_u32(out, data.child_count)?;
            write_u64(out, data.handle_index as u64)?;
            write_vec3(out, t.position)?;
            write_quat(out, t.rotation)?;
            write_vec3(out, t.scale)?;
        }

        let mut component_total = 0usize;
        for &id in &kinds {
            let pool = &self.pools[id as usize];
            write_u32(out, pool.live_count() as u32)?;
            for (_, slot) in pool.iter() {
                write_u32(out, slot_owner(slot).index())?;
                self.registry.serialize(id, slot, out)?;
                component_total += 1;
            }
        }

        for &e in &live {
            let data = self.rec(e);
            write_u32(out, data.flags)?;
            match data.name.as_deref() {
                Some(name) => {
                    write_u8(out, 1)?;
                    write_str(out, name)?;
                }
                None => write_u8(out, 0)?,
            }
        }

        out.write_all(MAGIC)?;
        tracing::debug!(
            entities = live.len(),
            components = component_total,
            kinds = kinds.len(),
            "serialized world"
        );
        Ok(())
    }

    /// Replace the contents of this world with an archive.
    ///
    /// The header and registry snapshot are checked before anything is
    /// touched. After that the world is cleared; a failure further into the
    /// stream leaves it empty rather than half-loaded. No events fire.
    pub fn deserialize<R: Read>(&mut self, input: &mut R) -> EcsResult<()> {
        let input: &mut dyn Read = input;
        let result = self.read_archive(input);
        if let Err(err) = &result {
            tracing::warn!(%err, "rejected world archive");
        }
        result
    }

    fn read_archive(&mut self, input: &mut dyn Read) -> EcsResult<()> {
        let version = read_header(input)?;

        let kind_count = read_u32(input)?;
        let mut kinds = Vec::new();
        for _ in 0..kind_count {
            let name = read_string(input)?;
            let size = read_u32(input)? as usize;
            let kind = self
                .registry
                .kind_id_by_name(&name)
                .and_then(|id| self.registry.kind(id))
                .ok_or_else(|| EcsError::format(format!("archive uses unregistered kind '{name}'")))?;
            if kind.size() != size {
                return Err(EcsError::format(format!(
                    "kind '{name}' is {size} bytes in the archive but {} here",
                    kind.size()
                )));
            }
            if !kind.is_persistent() {
                return Err(EcsError::format(format!("kind '{name}' is not serializable here")));
            }
            kinds.push(kind.id());
        }

        self.clear();
        let loaded = self.read_body(input, version, &kinds);
        if loaded.is_err() {
            self.clear();
        }
        loaded
    }

    fn read_body(&mut self, input: &mut dyn Read, version: ArchiveVersion, kinds: &[CompId]) -> EcsResult<()> {
        let live_count = read_u32(input)?;
        let slot_count = read_u32(input)?;
        if live_count > slot_count || slot_count == u32::MAX {
            return Err(EcsError::format(format!("{live_count} live entities in {slot_count} slots")));
        }
        let free_slots = slot_count - live_count;
        if free_slots > self.settings.max_archive_free_slots {
            return Err(EcsError::format(format!(
                "{free_slots} unused entity slots exceeds the limit of {}",
                self.settings.max_archive_free_slots
            )));
        }

        // Counts are only trusted once the stream has delivered the records.
        let mut records = Vec::with_capacity((live_count as usize).min(RECORD_PREALLOC));
        let mut previous = 0u32;
        for _ in 0..live_count {
            let id = read_u32(input)?;
            if id <= previous || id > slot_count {
                return Err(EcsError::format(format!("entity id {id} is out of order or range")));
            }
            previous = id;
            records.push(EntityRecord {
                entity: Entity::from_raw(id),
                child_count: read_u32(input)?,
                handle: read_u64(input)?,
                position: read_vec3(input)?,
                rotation: read_quat(input)?,
                scale: read_vec3(input)?,
            });
        }

        let len = slot_count as usize + 1;
        self.entities.resize_with(len, Default::default);
        self.transforms.resize_with(len, EntityTransform::default);
        self.next_id = slot_count + 1;
        self.hierarchy = vec![Entity::NULL; records.len()];

        let mut live = Vec::with_capacity(records.len());
        for record in records {
            let e = record.entity;
            let handle = usize::try_from(record.handle)
                .ok()
                .filter(|&h| h < self.hierarchy.len() && self.hierarchy[h].is_null())
                .ok_or_else(|| EcsError::format(format!("{e} has a bad handle index {}", record.handle)))?;
            self.hierarchy[handle] = e;
            let data = self.rec_mut(e);
            data.child_count = record.child_count;
            data.handle_index = handle;
            self.transforms[e.index() as usize] = EntityTransform {
                position: record.position,
                rotation: record.rotation,
                scale: record.scale,
                ..EntityTransform::default()
            };
            live.push(e);
        }

        self.rebuild_parents()?;
        self.free_list = (1..=slot_count)
            .rev()
            .map(Entity::from_raw)
            .filter(|&e| !self.rec(e).is_live())
            .collect();

        let mut component_total = 0usize;
        for &kind in kinds {
            let count = read_u32(input)?;
            for _ in 0..count {
                let owner = Entity::from_raw(read_u32(input)?);
                if !self.is_valid(owner) {
                    return Err(EcsError::format(format!("component owner {owner} is not a live entity")));
                }
                let pool = &mut self.pools[kind as usize];
                let slot = pool.alloc_zeroed()?;
                self.registry.deserialize(kind, pool.slot_mut(slot), input)?;
                pool.set_owner(slot, owner);
                self.rec_mut(owner).components.push(ComponentRef { kind, slot });
                component_total += 1;
            }
        }

        if version.has_metadata() {
            for &e in &live {
                let flags = read_u32(input)?;
                let name = match read_u8(input)? {
                    0 => None,
                    1 => Some(read_string(input)?),
                    other => return Err(EcsError::format(format!("bad name marker {other}"))),
                };
                let data = self.rec_mut(e);
                data.flags = flags;
                data.name = name;
            }
        }

        expect_magic(input, "trailer")?;
        self.mark_all_dirty();
        tracing::debug!(
            %version,
            entities = live.len(),
            components = component_total,
            "deserialized world"
        );
        Ok(())
    }

    /// Derive every parent link from the pre-order list and child counts.
    fn rebuild_parents(&mut self) -> EcsResult<()> {
        // (ancestor, end of its subtree run)
        let mut open: Vec<(Entity, usize)> = Vec::new();
        for i in 0..self.hierarchy.len() {
            let e = self.hierarchy[i];
            if e.is_null() {
                return Err(EcsError::format(format!("no entity claims hierarchy position {i}")));
            }
            while open.last().is_some_and(|&(_, end)| end <= i) {
                open.pop();
            }
            let limit = open.last().map_or(self.hierarchy.len(), |&(_, end)| end);
            let end = i + 1 + self.rec(e).child_count as usize;
            if end > limit {
                return Err(EcsError::format(format!("{e} subtree overruns its parent")));
            }
            let parent = open.last().map_or(Entity::NULL, |&(p, _)| p);
            self.rec_mut(e).parent = parent;
            open.push((e, end));
        }
        Ok(())
    }

    /// Serialize into a fresh buffer.
    pub fn to_bytes(&self) -> EcsResult<Vec<u8>> {
        let mut buf = Vec::new();
        self.serialize(&mut buf)?;
        Ok(buf)
    }

    /// Deserialize from an in-memory archive.
    pub fn load_bytes(&mut self, mut bytes: &[u8]) -> EcsResult<()> {
        self.deserialize(&mut bytes)
    }

    /// Live ids in ascending order.
    fn live_ids(&self) -> impl Iterator<Item = Entity> + '_ {
        (1..self.next_id)
            .map(Entity::from_raw)
            .filter(|&e| self.rec(e).is_live())
    }
}
