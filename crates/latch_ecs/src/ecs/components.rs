// components.rs - Attaching, reading and iterating component payloads
//
// Raw calls hand out slot bodies as byte slices (the entity header is never
// exposed). The typed layer casts those bodies with bytemuck.

use std::mem::size_of;

use crate::ecs::entity::ComponentRef;
use crate::ecs::events::WorldEvent;
use crate::ecs::{Entity, World};
use crate::error::{EcsError, EcsResult};
use crate::pool::{ComponentPool, PoolCursor, SlabStats};
use crate::registry::{slot_owner, CompId, Component};

impl World {
    /// Pool backing `kind`.
    pub fn pool(&self, kind: CompId) -> Option<&ComponentPool> {
        self.pools.get(kind as usize)
    }

    fn pool_or_err(&self, kind: CompId) -> EcsResult<&ComponentPool> {
        self.pool(kind)
            .ok_or_else(|| EcsError::not_found(format!("component kind {kind}")))
    }

    /// Attach a default-constructed component and return its body.
    pub fn add_component(&mut self, e: Entity, kind: CompId) -> EcsResult<&mut [u8]> {
        self.live(e)?;
        self.pool_or_err(kind)?;
        let slot = self.pools[kind as usize].alloc_constructed(&self.registry, e)?;
        self.attach(e, ComponentRef { kind, slot })
    }

    /// Attach a component copy-constructed from `src_body`.
    pub fn add_component_by_copy(&mut self, e: Entity, kind: CompId, src_body: &[u8]) -> EcsResult<&mut [u8]> {
        self.live(e)?;
        self.pool_or_err(kind)?;
        let slot = self.pools[kind as usize].alloc_copied(&self.registry, src_body, e)?;
        self.attach(e, ComponentRef { kind, slot })
    }

    fn attach(&mut self, e: Entity, c: ComponentRef) -> EcsResult<&mut [u8]> {
        self.rec_mut(e).components.push(c);
        self.events.push(WorldEvent::ComponentAdded { entity: e, kind: c.kind });
        self.finish_mutation();
        self.body_mut(c)
            .ok_or_else(|| EcsError::not_found(format!("component kind {}", c.kind)))
    }

    fn body_mut(&mut self, c: ComponentRef) -> Option<&mut [u8]> {
        let kind = self.registry.kind(c.kind)?;
        let pool = self.pools.get_mut(c.kind as usize)?;
        Some(kind.body_mut(pool.slot_mut(c.slot)))
    }

    /// Body bytes behind a component reference.
    pub fn component_body(&self, c: ComponentRef) -> Option<&[u8]> {
        let kind = self.registry.kind(c.kind)?;
        let pool = self.pool(c.kind)?;
        pool.owner(c.slot)?;
        Some(kind.body(pool.slot(c.slot)))
    }

    /// First component of `kind` on `e`.
    pub fn get_component(&self, e: Entity, kind: CompId) -> Option<&[u8]> {
        let c = self.find_component(e, kind)?;
        self.component_body(c)
    }

    pub fn get_component_mut(&mut self, e: Entity, kind: CompId) -> Option<&mut [u8]> {
        let c = self.find_component(e, kind)?;
        self.body_mut(c)
    }

    fn find_component(&self, e: Entity, kind: CompId) -> Option<ComponentRef> {
        self.entity_data(e)?
            .components
            .iter()
            .find(|c| c.kind == kind)
            .copied()
    }

    /// Positional access in attachment order.
    pub fn component_at(&self, e: Entity, index: usize) -> Option<ComponentRef> {
        self.entity_data(e)?.components.get(index).copied()
    }

    pub fn component_count(&self, e: Entity) -> u32 {
        self.entity_data(e).map_or(0, |d| d.components.len() as u32)
    }

    /// Detach and destroy the first component of `kind` on `e`.
    pub fn remove_component(&mut self, e: Entity, kind: CompId) -> EcsResult<()> {
        let position = self
            .live(e)?
            .components
            .iter()
            .position(|c| c.kind == kind)
            .ok_or_else(|| EcsError::not_found(format!("component kind {kind} on {e}")))?;
        let c = self.rec(e).components[position];
        self.pools[kind as usize].free(&self.registry, c.slot)?;
        self.rec_mut(e).components.remove(position);
        self.events.push(WorldEvent::ComponentRemoved { entity: e, kind });
        self.finish_mutation();
        Ok(())
    }

    /// Live components of `kind`; zero for unknown kinds.
    pub fn live_component_count(&self, kind: CompId) -> usize {
        self.pool(kind).map_or(0, ComponentPool::live_count)
    }

    /// Per-slab shape of the pool for `kind`.
    pub fn pool_stats(&self, kind: CompId) -> EcsResult<Vec<SlabStats>> {
        Ok(self.pool_or_err(kind)?.stats())
    }

    // ---------------------------------------------------------------------
    // Iteration
    // ---------------------------------------------------------------------

    pub fn iter_begin(&self, kind: CompId) -> EcsResult<PoolCursor> {
        Ok(self.pool_or_err(kind)?.cursor_begin())
    }

    pub fn iter_end(&self, kind: CompId) -> EcsResult<PoolCursor> {
        Ok(self.pool_or_err(kind)?.cursor_end())
    }

    pub fn iter_advance(&self, kind: CompId, cursor: &mut PoolCursor) -> EcsResult<()> {
        self.pool_or_err(kind)?.cursor_advance(cursor);
        Ok(())
    }

    /// Owner and body under the cursor; `None` at the end.
    pub fn iter_get(&self, kind: CompId, cursor: PoolCursor) -> Option<(Entity, &[u8])> {
        let info = self.registry.kind(kind)?;
        let slot = self.pool(kind)?.cursor_get(cursor)?;
        Some((slot_owner(slot), info.body(slot)))
    }

    /// Live components of `kind` in slab-then-offset order.
    pub fn iter_components(&self, kind: CompId) -> impl Iterator<Item = (Entity, &[u8])> + '_ {
        let info = self.registry.kind(kind);
        self.pool(kind)
            .into_iter()
            .zip(info)
            .flat_map(|(pool, info)| pool.iter().map(move |(_, slot)| (slot_owner(slot), info.body(slot))))
    }

    pub fn for_each_component_mut(&mut self, kind: CompId, mut f: impl FnMut(Entity, &mut [u8])) -> EcsResult<()> {
        let info = self.registry.kind_or_err(kind)?;
        let body = info.body_offset()..info.size();
        let pool = self
            .pools
            .get_mut(kind as usize)
            .ok_or_else(|| EcsError::not_found(format!("component kind {kind}")))?;
        pool.for_each_slot_mut(|_, slot| {
            let owner = slot_owner(slot);
            f(owner, &mut slot[body.clone()]);
        });
        Ok(())
    }

    /// Read-only visit of every live component of `kind` across rayon workers.
    pub fn par_for_each_component<F>(&self, kind: CompId, f: F) -> EcsResult<()>
    where
        F: Fn(Entity, &[u8]) + Send + Sync,
    {
        let info = self.registry.kind_or_err(kind)?;
        let pool = self.pool_or_err(kind)?;
        pool.par_for_each_slot(|slot| f(slot_owner(slot), info.body(slot)));
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Typed layer
    // ---------------------------------------------------------------------

    fn typed_id<T: Component>(&self) -> EcsResult<CompId> {
        self.registry
            .id_of::<T>()
            .ok_or_else(|| EcsError::not_found(format!("component type '{}'", T::NAME)))
    }

    /// Attach a default `T`.
    pub fn add<T: Component>(&mut self, e: Entity) -> EcsResult<&mut T> {
        let kind = self.typed_id::<T>()?;
        cast_mut(self.add_component(e, kind)?)
    }

    /// Attach `value` as a new `T`.
    pub fn insert<T: Component>(&mut self, e: Entity, value: T) -> EcsResult<&mut T> {
        let slot = self.add::<T>(e)?;
        *slot = value;
        Ok(slot)
    }

    pub fn get<T: Component>(&self, e: Entity) -> Option<&T> {
        let kind = self.registry.id_of::<T>()?;
        let body = self.get_component(e, kind)?;
        bytemuck::try_from_bytes(&body[..size_of::<T>()]).ok()
    }

    pub fn get_mut<T: Component>(&mut self, e: Entity) -> Option<&mut T> {
        let kind = self.registry.id_of::<T>()?;
        let body = self.get_component_mut(e, kind)?;
        bytemuck::try_from_bytes_mut(&mut body[..size_of::<T>()]).ok()
    }

    pub fn remove<T: Component>(&mut self, e: Entity) -> EcsResult<()> {
        let kind = self.typed_id::<T>()?;
        self.remove_component(e, kind)
    }

    /// Every live `T` with its owner, in pool order.
    pub fn iter<T: Component>(&self) -> impl Iterator<Item = (Entity, &T)> + '_ {
        let kind = self.registry.id_of::<T>();
        kind.into_iter().flat_map(move |kind| {
            self.iter_components(kind)
                .filter_map(|(e, body)| bytemuck::try_from_bytes(&body[..size_of::<T>()]).ok().map(|v| (e, v)))
        })
    }

    pub fn for_each_mut<T: Component>(&mut self, mut f: impl FnMut(Entity, &mut T)) -> EcsResult<()> {
        let kind = self.typed_id::<T>()?;
        self.for_each_component_mut(kind, |e, body| {
            if let Ok(value) = bytemuck::try_from_bytes_mut(&mut body[..size_of::<T>()]) {
                f(e, value);
            }
        })
    }
}

fn cast_mut<T: Component>(body: &mut [u8]) -> EcsResult<&mut T> {
    bytemuck::try_from_bytes_mut(&mut body[..size_of::<T>()])
        .map_err(|err| EcsError::usage(format!("cannot view '{}' body: {err}", T::NAME)))
}
