//! Component registry
//!
//! A [`ComponentRegistry`] is built mutably at startup, then frozen behind an
//! `Arc` and handed to every [`World`](crate::World). Once shared it can no
//! longer be mutated, which is what keeps kind ids stable for the lifetime of
//! the process. [`global`] holds the optional process-wide instance.

mod component;
pub mod global;

pub use component::{
    CompId, Component, ComponentDesc, ConstructFn, CopyFn, DeserializeFn, DestructFn, MoveFn,
    SerializeFn, ENTITY_HEADER_SIZE, MAX_KIND_ALIGN, MIN_PAYLOAD_SIZE,
};
pub(crate) use component::{body_offset_for, set_slot_owner, slot_owner};

use std::any::TypeId;
use std::collections::HashMap;
use std::io::{Read, Write};

use crate::ecs::Entity;
use crate::error::{EcsError, EcsResult};

/// A registered kind: the descriptor plus its assigned id and body offset.
#[derive(Clone, Debug)]
pub struct ComponentKind {
    id: CompId,
    body_offset: usize,
    desc: ComponentDesc,
}

impl ComponentKind {
    #[inline]
    pub fn id(&self) -> CompId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.desc.name
    }

    /// Full slot size in bytes, entity header included.
    #[inline]
    pub fn size(&self) -> usize {
        self.desc.size
    }

    #[inline]
    pub fn align(&self) -> usize {
        self.desc.align
    }

    #[inline]
    pub fn body_offset(&self) -> usize {
        self.body_offset
    }

    #[inline]
    pub fn body_size(&self) -> usize {
        self.desc.size - self.body_offset
    }

    #[inline]
    pub fn slab_slots(&self) -> Option<usize> {
        self.desc.slab_slots
    }

    /// Kinds without both serialize thunks are skipped by snapshots.
    #[inline]
    pub fn is_persistent(&self) -> bool {
        self.desc.serialize.is_some() && self.desc.deserialize.is_some()
    }

    #[inline]
    pub(crate) fn body<'a>(&self, slot: &'a [u8]) -> &'a [u8] {
        &slot[self.body_offset..self.desc.size]
    }

    #[inline]
    pub(crate) fn body_mut<'a>(&self, slot: &'a mut [u8]) -> &'a mut [u8] {
        &mut slot[self.body_offset..self.desc.size]
    }

    /// Header and body of one slot as disjoint borrows.
    fn split_slot<'a>(&self, slot: &'a mut [u8]) -> (&'a mut [u8], &'a mut [u8]) {
        let (head, rest) = slot.split_at_mut(self.body_offset);
        (head, &mut rest[..self.desc.size - self.body_offset])
    }
}

/// Table of component kinds, indexed by dense [`CompId`].
#[derive(Default)]
pub struct ComponentRegistry {
    kinds: Vec<ComponentKind>,
    by_name: HashMap<String, CompId>,
    by_type: HashMap<TypeId, CompId>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a kind. Names must be unique and payloads at least pointer-sized.
    pub fn register_kind(&mut self, desc: ComponentDesc) -> EcsResult<CompId> {
        if let Err(err) = self.validate(&desc) {
            tracing::warn!(kind = %desc.name, %err, "component registration rejected");
            return Err(err);
        }

        let id = self.kinds.len() as CompId;
        let body_offset = body_offset_for(desc.align);
        self.by_name.insert(desc.name.clone(), id);
        if let Some(type_id) = desc.type_id {
            self.by_type.insert(type_id, id);
        }
        tracing::debug!(kind = %desc.name, id, size = desc.size, "registered component kind");
        self.kinds.push(ComponentKind { id, body_offset, desc });
        Ok(id)
    }

    /// Register a Rust POD component under its [`Component::NAME`].
    pub fn register<T: Component>(&mut self) -> EcsResult<CompId> {
        self.register_kind(ComponentDesc::of::<T>())
    }

    fn validate(&self, desc: &ComponentDesc) -> EcsResult<()> {
        if self.by_name.contains_key(&desc.name) {
            return Err(EcsError::Duplicated {
                name: desc.name.clone(),
            });
        }
        if self.kinds.len() >= CompId::MAX as usize {
            return Err(EcsError::usage("component kind table is full"));
        }
        if desc.name.is_empty() {
            return Err(EcsError::usage("component kind name is empty"));
        }
        if !desc.align.is_power_of_two() || desc.align > MAX_KIND_ALIGN {
            return Err(EcsError::usage(format!(
                "kind '{}' alignment {} must be a power of two no larger than {MAX_KIND_ALIGN}",
                desc.name, desc.align
            )));
        }
        if desc.size < MIN_PAYLOAD_SIZE {
            return Err(EcsError::usage(format!(
                "kind '{}' payload of {} bytes is below the {MIN_PAYLOAD_SIZE}-byte minimum",
                desc.name, desc.size
            )));
        }
        let slot_align = desc.align.max(ENTITY_HEADER_SIZE);
        if desc.size < body_offset_for(desc.align) || desc.size % slot_align != 0 {
            return Err(EcsError::usage(format!(
                "kind '{}' payload of {} bytes does not fit its header at alignment {}",
                desc.name, desc.size, slot_align
            )));
        }
        if desc.slab_slots == Some(0) {
            return Err(EcsError::usage(format!("kind '{}' has zero slab slots", desc.name)));
        }
        Ok(())
    }

    #[inline]
    pub fn kind_count(&self) -> u32 {
        self.kinds.len() as u32
    }

    #[inline]
    pub fn kind_exists(&self, id: CompId) -> bool {
        (id as usize) < self.kinds.len()
    }

    #[inline]
    pub fn kind(&self, id: CompId) -> Option<&ComponentKind> {
        self.kinds.get(id as usize)
    }

    pub(crate) fn kind_or_err(&self, id: CompId) -> EcsResult<&ComponentKind> {
        self.kind(id)
            .ok_or_else(|| EcsError::not_found(format!("component kind {id}")))
    }

    pub fn kind_name(&self, id: CompId) -> Option<&str> {
        self.kind(id).map(ComponentKind::name)
    }

    pub fn kind_size(&self, id: CompId) -> Option<usize> {
        self.kind(id).map(ComponentKind::size)
    }

    pub fn kind_id_by_name(&self, name: &str) -> Option<CompId> {
        self.by_name.get(name).copied()
    }

    /// Id of a kind registered through [`register`](Self::register).
    pub fn id_of<T: Component>(&self) -> Option<CompId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    pub fn kinds(&self) -> impl Iterator<Item = &ComponentKind> {
        self.kinds.iter()
    }

    /// Run the kind's constructor over `slot` and stamp the owner header.
    pub fn construct_in_place(&self, id: CompId, slot: &mut [u8], owner: Entity) -> EcsResult<()> {
        let kind = self.kind_or_err(id)?;
        let (head, body) = kind.split_slot(slot);
        (kind.desc.construct)(body);
        set_slot_owner(head, owner);
        Ok(())
    }

    /// Run the kind's destructor and null the header, leaving a tombstone.
    pub fn destruct(&self, id: CompId, slot: &mut [u8]) -> EcsResult<()> {
        let kind = self.kind_or_err(id)?;
        let (head, body) = kind.split_slot(slot);
        if let Some(destruct) = kind.desc.destruct {
            destruct(body);
        }
        set_slot_owner(head, Entity::NULL);
        Ok(())
    }

    /// Move `src` into `dst`. Ownership moves with it; `src` becomes a tombstone.
    pub fn move_payload(&self, id: CompId, src: &mut [u8], dst: &mut [u8]) -> EcsResult<()> {
        let kind = self.kind_or_err(id)?;
        let (src_head, src_body) = kind.split_slot(src);
        let (dst_head, dst_body) = kind.split_slot(dst);
        (kind.desc.move_fn)(src_body, dst_body);
        dst_head[..ENTITY_HEADER_SIZE].copy_from_slice(&src_head[..ENTITY_HEADER_SIZE]);
        set_slot_owner(src_head, Entity::NULL);
        Ok(())
    }

    /// Copy-construct `dst` from a bare body and stamp the owner header.
    pub fn copy_payload(
        &self,
        id: CompId,
        src_body: &[u8],
        dst: &mut [u8],
        owner: Entity,
    ) -> EcsResult<()> {
        let kind = self.kind_or_err(id)?;
        if src_body.len() != kind.body_size() {
            return Err(EcsError::usage(format!(
                "kind '{}' expects a {}-byte body, got {}",
                kind.name(),
                kind.body_size(),
                src_body.len()
            )));
        }
        let (head, body) = kind.split_slot(dst);
        (kind.desc.copy)(src_body, body);
        set_slot_owner(head, owner);
        Ok(())
    }

    /// Write the slot body through the kind's serializer.
    pub fn serialize(&self, id: CompId, slot: &[u8], out: &mut dyn Write) -> EcsResult<()> {
        let kind = self.kind_or_err(id)?;
        let ser = kind.desc.serialize.ok_or_else(|| {
            EcsError::usage(format!("kind '{}' is not serializable", kind.name()))
        })?;
        ser(kind.body(slot), out)?;
        Ok(())
    }

    /// Fill the slot body through the kind's deserializer. The header is untouched.
    pub fn deserialize(&self, id: CompId, slot: &mut [u8], input: &mut dyn Read) -> EcsResult<()> {
        let kind = self.kind_or_err(id)?;
        let de = kind.desc.deserialize.ok_or_else(|| {
            EcsError::usage(format!("kind '{}' is not serializable", kind.name()))
        })?;
        de(kind.body_mut(slot), input)?;
        Ok(())
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.kinds.iter().map(|k| (k.id, k.name(), k.size())))
            .finish()
    }
}
