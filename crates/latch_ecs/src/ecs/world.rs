// world.rs - ECS instance: entity store, hierarchy list and component pools

use smallvec::SmallVec;
use std::collections::HashSet;
use std::sync::Arc;

use crate::ecs::entity::{ComponentRef, EntityData};
use crate::ecs::events::{EventBus, WorldEvent};
use crate::ecs::transform::EntityTransform;
use crate::ecs::Entity;
use crate::error::{EcsError, EcsResult};
use crate::pool::ComponentPool;
use crate::registry::{global, ComponentRegistry};
use crate::settings::WorldSettings;

/// One independent ECS instance.
///
/// Entity records and transforms are parallel arrays indexed by entity id
/// (slot 0 is the null entity and never used). Live entities also appear in
/// the hierarchy list in depth-first pre-order, each followed by all of its
/// descendants. Component payloads live in one slab pool per registered kind.
///
/// A world is single-threaded: every mutation takes `&mut self`.
pub struct World {
    pub(crate) registry: Arc<ComponentRegistry>,
    pub(crate) settings: WorldSettings,
    pub(crate) entities: Vec<EntityData>,
    pub(crate) transforms: Vec<EntityTransform>,
    pub(crate) free_list: Vec<Entity>,
    /// Next never-issued id; ids below it have been handed out at least once.
    pub(crate) next_id: u32,
    pub(crate) hierarchy: Vec<Entity>,
    pub(crate) pools: Vec<ComponentPool>,
    pub(crate) events: EventBus,
    pub(crate) recomputes: u64,
}

impl World {
    /// Create an empty world over a frozen registry.
    pub fn new(registry: Arc<ComponentRegistry>) -> Self {
        let settings = WorldSettings::default();
        Self::build(registry, settings)
    }

    pub fn with_settings(registry: Arc<ComponentRegistry>, settings: WorldSettings) -> EcsResult<Self> {
        settings.validate()?;
        Ok(Self::build(registry, settings))
    }

    /// Create a world over the process-wide registry.
    pub fn from_global() -> EcsResult<Self> {
        let registry = global::installed()
            .ok_or_else(|| EcsError::not_found("installed component registry"))?;
        Ok(Self::new(registry))
    }

    fn build(registry: Arc<ComponentRegistry>, settings: WorldSettings) -> Self {
        let pools = registry
            .kinds()
            .map(|kind| ComponentPool::new(kind, settings.slab_capacity_slots))
            .collect();
        tracing::debug!(kinds = registry.kind_count(), "created world");
        Self {
            registry,
            settings,
            entities: vec![EntityData::default()],
            transforms: vec![EntityTransform::default()],
            free_list: Vec::new(),
            next_id: 1,
            hierarchy: Vec::new(),
            pools,
            events: EventBus::default(),
            recomputes: 0,
        }
    }

    #[inline]
    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    #[inline]
    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    /// Drop every entity and component and release all slabs. Listeners
    /// stay registered; no events fire.
    pub fn clear(&mut self) {
        for pool in &mut self.pools {
            pool.clear();
        }
        self.entities.clear();
        self.entities.push(EntityData::default());
        self.transforms.clear();
        self.transforms.push(EntityTransform::default());
        self.free_list.clear();
        self.next_id = 1;
        self.hierarchy.clear();
        self.events.discard_pending();
        tracing::debug!("cleared world");
    }

    // ---------------------------------------------------------------------
    // Record access
    // ---------------------------------------------------------------------

    /// Record of a live entity.
    pub fn entity_data(&self, e: Entity) -> Option<&EntityData> {
        if e.is_null() {
            return None;
        }
        self.entities
            .get(e.index() as usize)
            .filter(|d| d.is_live())
    }

    pub(crate) fn live(&self, e: Entity) -> EcsResult<&EntityData> {
        self.entity_data(e)
            .ok_or_else(|| EcsError::not_found(format!("entity {e}")))
    }

    #[inline]
    pub(crate) fn rec(&self, e: Entity) -> &EntityData {
        &self.entities[e.index() as usize]
    }

    #[inline]
    pub(crate) fn rec_mut(&mut self, e: Entity) -> &mut EntityData {
        &mut self.entities[e.index() as usize]
    }

    // ---------------------------------------------------------------------
    // Entity lifecycle
    // ---------------------------------------------------------------------

    /// Create an entity, appended as a root or placed at the end of
    /// `parent`'s subtree.
    pub fn create_entity(&mut self, parent: Option<Entity>) -> EcsResult<Entity> {
        self.create_named(parent, None)
    }

    pub fn create_named(&mut self, parent: Option<Entity>, name: Option<&str>) -> EcsResult<Entity> {
        let parent = match parent {
            Some(p) => {
                self.live(p)?;
                p
            }
            None => Entity::NULL,
        };
        let e = self.spawn_record(parent, name.map(str::to_owned));
        self.finish_mutation();
        Ok(e)
    }

    /// Allocate an id, initialize its records and link it into the hierarchy.
    /// `parent` must be null or live. Queues the create event.
    pub(crate) fn spawn_record(&mut self, parent: Entity, name: Option<String>) -> Entity {
        let e = self.alloc_id();
        {
            let data = self.rec_mut(e);
            *data = EntityData::default();
            data.name = name;
        }
        self.transforms[e.index() as usize] = EntityTransform::default();
        self.link(e, parent);
        tracing::trace!(entity = %e, parent = %parent, "created entity");
        self.events.push(WorldEvent::EntityCreated(e));
        e
    }

    fn alloc_id(&mut self) -> Entity {
        if let Some(e) = self.free_list.pop() {
            return e;
        }
        if self.next_id as usize >= self.entities.len() {
            let len = self.entities.len() + self.settings.entity_growth_step;
            self.entities.resize_with(len, EntityData::default);
            self.transforms.resize_with(len, EntityTransform::default);
        }
        let e = Entity::from_raw(self.next_id);
        self.next_id += 1;
        e
    }

    /// Destroy `e` and its whole subtree.
    pub fn destroy_entity(&mut self, e: Entity) -> EcsResult<()> {
        let range = self.live(e)?.subtree();
        let doomed: SmallVec<[Entity; 16]> = self.hierarchy[range.clone()].iter().copied().collect();

        for &d in &doomed {
            self.release_components(d)?;
            self.events.push(WorldEvent::EntityDestroyed(d));
        }

        let parent = self.rec(e).parent;
        self.unlink_range(range.clone(), parent);

        for &d in &doomed {
            *self.rec_mut(d) = EntityData::default();
            self.transforms[d.index() as usize] = EntityTransform::default();
            self.free_list.push(d);
        }
        tracing::trace!(entity = %e, count = doomed.len(), "destroyed subtree");
        self.finish_mutation();
        Ok(())
    }

    /// Remove every component of `e`, keeping the entity.
    pub fn clear_entity(&mut self, e: Entity) -> EcsResult<()> {
        self.live(e)?;
        self.release_components(e)?;
        self.finish_mutation();
        Ok(())
    }

    /// Free every component slot of `e`, queueing remove events.
    fn release_components(&mut self, e: Entity) -> EcsResult<()> {
        let components = std::mem::take(&mut self.rec_mut(e).components);
        for c in components {
            self.pools[c.kind as usize].free(&self.registry, c.slot)?;
            self.events.push(WorldEvent::ComponentRemoved { entity: e, kind: c.kind });
        }
        Ok(())
    }

    /// Deep-copy `e` and its subtree under the same parent. Returns the new root.
    pub fn duplicate_entity(&mut self, e: Entity) -> EcsResult<Entity> {
        let parent = self.live(e)?.parent;
        let copy = self.duplicate_into(e, parent)?;
        self.finish_mutation();
        Ok(copy)
    }

    fn duplicate_into(&mut self, src: Entity, parent: Entity) -> EcsResult<Entity> {
        let (name, flags, components) = {
            let data = self.rec(src);
            (data.name.clone(), data.flags, data.components.clone())
        };
        let dst = self.spawn_record(parent, name);
        self.rec_mut(dst).flags = flags;
        self.transforms[dst.index() as usize] = self.transforms[src.index() as usize].detached();

        for c in components {
            let body: SmallVec<[u8; 64]> = {
                let kind = self.registry.kind_or_err(c.kind)?;
                SmallVec::from_slice(kind.body(self.pools[c.kind as usize].slot(c.slot)))
            };
            let slot = self.pools[c.kind as usize].alloc_copied(&self.registry, &body, dst)?;
            self.rec_mut(dst).components.push(ComponentRef { kind: c.kind, slot });
            self.events.push(WorldEvent::ComponentAdded { entity: dst, kind: c.kind });
        }

        let children: SmallVec<[Entity; 8]> = self.direct_children(src).collect();
        for child in children {
            self.duplicate_into(child, dst)?;
        }
        Ok(dst)
    }

    /// Validate (when enabled) and deliver queued events.
    pub(crate) fn finish_mutation(&mut self) {
        if cfg!(debug_assertions) && self.settings.validate_mutations {
            let checked = self.check_invariants();
            debug_assert!(checked.is_ok(), "{checked:?}");
        }
        self.events.flush();
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    #[inline]
    pub fn is_valid(&self, e: Entity) -> bool {
        self.entity_data(e).is_some()
    }

    /// True when `e` has no components (or is not a live entity).
    pub fn is_empty(&self, e: Entity) -> bool {
        self.entity_data(e).map_or(true, |d| d.components.is_empty())
    }

    #[inline]
    pub fn entity_count(&self) -> usize {
        self.hierarchy.len()
    }

    /// Entity at position `index` of the hierarchy list.
    #[inline]
    pub fn entity_at_index(&self, index: usize) -> Option<Entity> {
        self.hierarchy.get(index).copied()
    }

    /// The depth-first hierarchy list.
    #[inline]
    pub fn hierarchy(&self) -> &[Entity] {
        &self.hierarchy
    }

    /// Ids waiting to be reused.
    #[inline]
    pub fn free_list(&self) -> &[Entity] {
        &self.free_list
    }

    /// High-water mark of issued entity ids.
    #[inline]
    pub fn entity_slot_count(&self) -> u32 {
        self.next_id - 1
    }

    pub fn handle_index(&self, e: Entity) -> Option<usize> {
        self.entity_data(e).map(|d| d.handle_index)
    }

    /// Number of transitive descendants.
    pub fn child_count(&self, e: Entity) -> u32 {
        self.entity_data(e).map_or(0, |d| d.child_count)
    }

    /// All descendants of `e`, in hierarchy order.
    pub fn children(&self, e: Entity) -> &[Entity] {
        match self.entity_data(e) {
            Some(d) => &self.hierarchy[d.handle_index + 1..d.subtree().end],
            None => &[],
        }
    }

    pub fn parent(&self, e: Entity) -> Option<Entity> {
        self.entity_data(e).and_then(EntityData::parent)
    }

    pub fn flags(&self, e: Entity) -> u32 {
        self.entity_data(e).map_or(0, |d| d.flags)
    }

    pub fn set_flags(&mut self, e: Entity, flags: u32) -> EcsResult<()> {
        self.live(e)?;
        self.rec_mut(e).flags = flags;
        Ok(())
    }

    pub fn name(&self, e: Entity) -> Option<&str> {
        self.entity_data(e).and_then(EntityData::name)
    }

    pub fn set_name(&mut self, e: Entity, name: Option<&str>) -> EcsResult<()> {
        self.live(e)?;
        self.rec_mut(e).name = name.map(str::to_owned);
        Ok(())
    }

    /// First entity in hierarchy order carrying `name`.
    pub fn find_by_name(&self, name: &str) -> Option<Entity> {
        self.hierarchy
            .iter()
            .copied()
            .find(|&e| self.rec(e).name.as_deref() == Some(name))
    }

    // ---------------------------------------------------------------------
    // Invariants
    // ---------------------------------------------------------------------

    /// Verify the structural invariants of the store, hierarchy and pools.
    pub fn check_invariants(&self) -> EcsResult<()> {
        let fail = |msg: String| Err(EcsError::InvariantViolation(msg));

        for (i, &e) in self.hierarchy.iter().enumerate() {
            match self.entity_data(e) {
                Some(d) if d.handle_index == i => {}
                Some(d) => return fail(format!("{e} sits at {i} but records {}", d.handle_index)),
                None => return fail(format!("{e} at {i} is not live")),
            }
            let data = self.rec(e);
            let end = i + 1 + data.child_count as usize;
            if end > self.hierarchy.len() {
                return fail(format!("{e} subtree overruns the hierarchy list"));
            }
            let mut j = i + 1;
            while j < end {
                let child = self.hierarchy[j];
                if self.rec(child).parent != e {
                    return fail(format!("{child} inside {e}'s subtree has parent {}", self.rec(child).parent));
                }
                j += 1 + self.rec(child).child_count as usize;
            }
            if j != end {
                return fail(format!("{e} child_count {} does not match its children", data.child_count));
            }
        }

        let mut j = 0;
        while j < self.hierarchy.len() {
            let root = self.hierarchy[j];
            if !self.rec(root).parent.is_null() {
                return fail(format!("{root} at root position {j} has a parent"));
            }
            j += 1 + self.rec(root).child_count as usize;
        }
        if j != self.hierarchy.len() {
            return fail("root subtrees do not cover the hierarchy list".into());
        }

        let live = self.entities.iter().skip(1).filter(|d| d.is_live()).count();
        if live != self.hierarchy.len() {
            return fail(format!("{live} live records but {} listed", self.hierarchy.len()));
        }

        let mut seen = HashSet::with_capacity(self.free_list.len());
        for &f in &self.free_list {
            if f.is_null() || f.index() >= self.next_id || self.rec(f).is_live() || !seen.insert(f) {
                return fail(format!("freelist entry {f} is invalid"));
            }
        }
        if live + self.free_list.len() != self.entity_slot_count() as usize {
            return fail(format!(
                "{live} live + {} free != {} issued ids",
                self.free_list.len(),
                self.entity_slot_count()
            ));
        }

        let mut attached = vec![0usize; self.pools.len()];
        for &e in &self.hierarchy {
            for c in &self.rec(e).components {
                let pool = self
                    .pools
                    .get(c.kind as usize)
                    .ok_or_else(|| EcsError::InvariantViolation(format!("{e} has unknown kind {}", c.kind)))?;
                if pool.owner(c.slot) != Some(e) {
                    return fail(format!("{e} component {:?} is owned by {:?}", c, pool.owner(c.slot)));
                }
                attached[c.kind as usize] += 1;
            }
        }
        for (pool, &count) in self.pools.iter().zip(&attached) {
            pool.check().map_err(EcsError::InvariantViolation)?;
            if pool.live_count() != count {
                return fail(format!(
                    "kind {} has {} live slots but {count} attachments",
                    pool.kind(),
                    pool.live_count()
                ));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.hierarchy.len())
            .field("free", &self.free_list.len())
            .field("kinds", &self.pools.len())
            .finish()
    }
}
