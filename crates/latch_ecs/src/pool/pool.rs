use rayon::prelude::*;

use crate::ecs::Entity;
use crate::error::{EcsError, EcsResult};
use crate::pool::slab::Slab;
use crate::registry::{set_slot_owner, CompId, ComponentKind, ComponentRegistry};

/// Location of one slot inside a pool: slab index plus byte offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotRef {
    pub(crate) slab: u32,
    pub(crate) offset: u32,
}

impl SlotRef {
    #[inline]
    pub fn slab(&self) -> usize {
        self.slab as usize
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset as usize
    }
}

/// Shape of one slab, for diagnostics and tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlabStats {
    pub size_bytes: usize,
    pub capacity_bytes: usize,
    pub tombstones: usize,
}

/// Slab list backing every instance of one component kind.
///
/// Slots never move once written. Freed slots become tombstones (null
/// header) that are reused before the frontier grows; slabs are only
/// released when the whole pool is cleared.
pub struct ComponentPool {
    kind: CompId,
    stride: usize,
    slab_slots: usize,
    slabs: Vec<Slab>,
}

impl ComponentPool {
    pub fn new(kind: &ComponentKind, default_slab_slots: usize) -> Self {
        Self {
            kind: kind.id(),
            stride: kind.size(),
            slab_slots: kind.slab_slots().unwrap_or(default_slab_slots),
            slabs: Vec::new(),
        }
    }

    #[inline]
    pub fn kind(&self) -> CompId {
        self.kind
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    pub fn slab_count(&self) -> usize {
        self.slabs.len()
    }

    #[inline]
    pub(crate) fn slabs(&self) -> &[Slab] {
        &self.slabs
    }

    /// Live components across all slabs.
    pub fn live_count(&self) -> usize {
        self.slabs.iter().map(|s| s.live_slots(self.stride)).sum()
    }

    pub fn stats(&self) -> Vec<SlabStats> {
        self.slabs
            .iter()
            .map(|s| SlabStats {
                size_bytes: s.size_bytes(),
                capacity_bytes: s.capacity_bytes(),
                tombstones: s.tombstone_count(),
            })
            .collect()
    }

    /// Release every slab. Slot contents are plain bytes, nothing to drop.
    pub fn clear(&mut self) {
        self.slabs.clear();
    }

    /// Reserve a slot in the last slab, appending a slab when it is exhausted.
    fn reserve(&mut self) -> EcsResult<SlotRef> {
        if !self.slabs.last().is_some_and(Slab::has_room) {
            tracing::trace!(kind = self.kind, slab = self.slabs.len(), "growing component pool");
            self.slabs.push(Slab::with_capacity(self.slab_slots * self.stride));
        }
        let slab_index = self.slabs.len() - 1;
        let slab = &mut self.slabs[slab_index];
        let Some(offset) = slab.take_slot(self.stride) else {
            debug_assert!(false, "slab tombstone count out of sync");
            return Err(EcsError::InvariantViolation(format!(
                "kind {} slab {slab_index}: {} tombstones recorded but no null header",
                self.kind,
                slab.tombstone_count()
            )));
        };
        Ok(SlotRef {
            slab: slab_index as u32,
            offset: offset as u32,
        })
    }

    /// Allocate and default-construct a slot owned by `owner`.
    pub(crate) fn alloc_constructed(
        &mut self,
        registry: &ComponentRegistry,
        owner: Entity,
    ) -> EcsResult<SlotRef> {
        let slot = self.reserve()?;
        registry.construct_in_place(self.kind, self.slot_mut(slot), owner)?;
        Ok(slot)
    }

    /// Allocate a slot copy-constructed from `src_body`.
    pub(crate) fn alloc_copied(
        &mut self,
        registry: &ComponentRegistry,
        src_body: &[u8],
        owner: Entity,
    ) -> EcsResult<SlotRef> {
        let kind = registry.kind_or_err(self.kind)?;
        if src_body.len() != kind.body_size() {
            return Err(EcsError::usage(format!(
                "kind '{}' expects a {}-byte body, got {}",
                kind.name(),
                kind.body_size(),
                src_body.len()
            )));
        }
        let slot = self.reserve()?;
        registry.copy_payload(self.kind, src_body, self.slot_mut(slot), owner)?;
        Ok(slot)
    }

    /// Allocate a zeroed slot without running the constructor. The header
    /// stays null until the caller stamps it.
    pub(crate) fn alloc_zeroed(&mut self) -> EcsResult<SlotRef> {
        let slot = self.reserve()?;
        self.slot_mut(slot).fill(0);
        Ok(slot)
    }

    pub(crate) fn set_owner(&mut self, slot: SlotRef, owner: Entity) {
        set_slot_owner(self.slot_mut(slot), owner);
    }

    /// Destruct the slot in place and return it to its slab.
    pub(crate) fn free(&mut self, registry: &ComponentRegistry, slot: SlotRef) -> EcsResult<()> {
        let stride = self.stride;
        let slab = self
            .slabs
            .get_mut(slot.slab())
            .ok_or_else(|| EcsError::usage(format!("slot {slot:?} is not in this pool")))?;
        if slot.offset() + stride > slab.size_bytes() || slot.offset() % stride != 0 {
            return Err(EcsError::usage(format!("slot {slot:?} is outside the written region")));
        }
        debug_assert!(!slab.owner_at(slot.offset(), stride).is_null(), "double free of {slot:?}");
        registry.destruct(self.kind, slab.slot_mut(slot.offset(), stride))?;
        slab.release_slot(slot.offset(), stride);
        Ok(())
    }

    #[inline]
    pub fn slot(&self, slot: SlotRef) -> &[u8] {
        self.slabs[slot.slab()].slot(slot.offset(), self.stride)
    }

    #[inline]
    pub(crate) fn slot_mut(&mut self, slot: SlotRef) -> &mut [u8] {
        let stride = self.stride;
        self.slabs[slot.slab()].slot_mut(slot.offset(), stride)
    }

    pub fn owner(&self, slot: SlotRef) -> Option<Entity> {
        let slab = self.slabs.get(slot.slab())?;
        if slot.offset() + self.stride > slab.size_bytes() {
            return None;
        }
        let owner = slab.owner_at(slot.offset(), self.stride);
        (!owner.is_null()).then_some(owner)
    }

    /// Visit every live slot mutably, in slab-then-offset order.
    pub(crate) fn for_each_slot_mut(&mut self, mut f: impl FnMut(SlotRef, &mut [u8])) {
        let stride = self.stride;
        for (slab_index, slab) in self.slabs.iter_mut().enumerate() {
            let mut offset = 0;
            while offset < slab.size_bytes() {
                if !slab.owner_at(offset, stride).is_null() {
                    let slot = SlotRef {
                        slab: slab_index as u32,
                        offset: offset as u32,
                    };
                    f(slot, slab.slot_mut(offset, stride));
                }
                offset += stride;
            }
        }
    }

    /// Visit every live slot from rayon workers, one task per slab.
    pub(crate) fn par_for_each_slot<F>(&self, f: F)
    where
        F: Fn(&[u8]) + Send + Sync,
    {
        let stride = self.stride;
        self.slabs.par_iter().for_each(|slab| {
            for offset in slab.live_offsets(stride) {
                f(slab.slot(offset, stride));
            }
        });
    }

    /// Check that every slab's tombstone count matches its null headers.
    pub(crate) fn check(&self) -> Result<(), String> {
        for (index, slab) in self.slabs.iter().enumerate() {
            if slab.size_bytes() % self.stride != 0 || slab.size_bytes() > slab.capacity_bytes() {
                return Err(format!("kind {} slab {index}: bad frontier {}", self.kind, slab.size_bytes()));
            }
            let nulls = slab.count_null_headers(self.stride);
            if nulls != slab.tombstone_count() {
                return Err(format!(
                    "kind {} slab {index}: {} tombstones recorded, {nulls} null headers",
                    self.kind,
                    slab.tombstone_count()
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::registry::ComponentDesc;

    fn setup(slots: usize) -> (ComponentRegistry, ComponentPool) {
        let mut reg = ComponentRegistry::new();
        let id = reg
            .register_kind(ComponentDesc::raw("K", 8).with_slab_slots(slots))
            .unwrap();
        let pool = ComponentPool::new(reg.kind(id).unwrap(), 128);
        (reg, pool)
    }

    #[test]
    fn grows_a_slab_when_the_last_is_full() {
        let (reg, mut pool) = setup(3);
        let slots: Vec<_> = (1..=5)
            .map(|i| pool.alloc_constructed(&reg, Entity::from_raw(i)).unwrap())
            .collect();
        assert_eq!(pool.slab_count(), 2);
        assert_eq!(slots[3], SlotRef { slab: 1, offset: 0 });
        let sizes: Vec<_> = pool.stats().iter().map(|s| s.size_bytes / 8).collect();
        assert_eq!(sizes, vec![3, 2]);
        assert_eq!(pool.live_count(), 5);
        pool.check().unwrap();
    }

    #[test]
    fn tombstones_are_counted_and_reused() {
        let (reg, mut pool) = setup(3);
        let slots: Vec<_> = (1..=3)
            .map(|i| pool.alloc_constructed(&reg, Entity::from_raw(i)).unwrap())
            .collect();
        pool.free(&reg, slots[0]).unwrap();
        assert_eq!(pool.live_count(), 2);
        assert_eq!(pool.stats()[0].tombstones, 1);
        assert_eq!(pool.owner(slots[0]), None);
        pool.check().unwrap();

        let again = pool.alloc_constructed(&reg, Entity::from_raw(9)).unwrap();
        assert_eq!(again, slots[0]);
        assert_eq!(pool.owner(again), Some(Entity::from_raw(9)));
        assert_eq!(pool.slab_count(), 1);
        pool.check().unwrap();
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "tombstone count out of sync"))]
    fn desynced_tombstone_count_is_an_error() {
        let (reg, mut pool) = setup(3);
        let slots: Vec<_> = (1..=3)
            .map(|i| pool.alloc_constructed(&reg, Entity::from_raw(i)).unwrap())
            .collect();
        pool.free(&reg, slots[0]).unwrap();
        // Restamp the tombstone so the count no longer matches the headers.
        pool.set_owner(slots[0], Entity::from_raw(8));
        assert!(pool.check().is_err());

        let err = pool.alloc_constructed(&reg, Entity::from_raw(9)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
        assert_eq!(pool.slab_count(), 1);
        assert_eq!(pool.owner(slots[0]), Some(Entity::from_raw(8)));
    }

    #[test]
    fn copied_slots_check_body_size_first() {
        let (reg, mut pool) = setup(4);
        assert!(pool.alloc_copied(&reg, &[1, 2], Entity::from_raw(1)).is_err());
        assert_eq!(pool.slab_count(), 0);
        let slot = pool.alloc_copied(&reg, &[1, 2, 3, 4], Entity::from_raw(1)).unwrap();
        assert_eq!(&pool.slot(slot)[4..], &[1, 2, 3, 4]);
    }

    #[test]
    fn freeing_outside_the_written_region_fails() {
        let (reg, mut pool) = setup(4);
        pool.alloc_constructed(&reg, Entity::from_raw(1)).unwrap();
        let bogus = SlotRef { slab: 0, offset: 16 };
        assert!(pool.free(&reg, bogus).is_err());
        assert!(pool.free(&reg, SlotRef { slab: 3, offset: 0 }).is_err());
    }

    #[test]
    fn parallel_visit_sees_every_live_slot() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let (reg, mut pool) = setup(2);
        for i in 1..=7 {
            pool.alloc_constructed(&reg, Entity::from_raw(i)).unwrap();
        }
        let seen = AtomicUsize::new(0);
        pool.par_for_each_slot(|_| {
            seen.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(seen.into_inner(), 7);
    }
}
