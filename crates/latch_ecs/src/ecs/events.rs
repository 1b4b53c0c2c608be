// events.rs - Entity and component lifecycle listeners
//
// Mutations queue events while they run and deliver them in one batch just
// before returning, so listeners always observe a consistent world.

use std::collections::HashMap;

use crate::ecs::{Entity, World};
use crate::error::EcsResult;
use crate::registry::CompId;

/// Handle returned by listener registration, used to unregister.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorldEvent {
    EntityCreated(Entity),
    EntityDestroyed(Entity),
    ComponentAdded { entity: Entity, kind: CompId },
    ComponentRemoved { entity: Entity, kind: CompId },
}

pub type EntityListener = Box<dyn FnMut(Entity) + Send>;
pub type ComponentListener = Box<dyn FnMut(Entity, CompId) + Send>;

#[derive(Default)]
pub(crate) struct EventBus {
    next_id: u64,
    created: Vec<(ListenerId, EntityListener)>,
    destroyed: Vec<(ListenerId, EntityListener)>,
    added: HashMap<CompId, Vec<(ListenerId, ComponentListener)>>,
    removed: HashMap<CompId, Vec<(ListenerId, ComponentListener)>>,
    pending: Vec<WorldEvent>,
}

impl EventBus {
    fn next_id(&mut self) -> ListenerId {
        self.next_id += 1;
        ListenerId(self.next_id)
    }

    /// Queue an event. Dropped right away when nobody listens for it.
    pub(crate) fn push(&mut self, event: WorldEvent) {
        let wanted = match event {
            WorldEvent::EntityCreated(_) => !self.created.is_empty(),
            WorldEvent::EntityDestroyed(_) => !self.destroyed.is_empty(),
            WorldEvent::ComponentAdded { kind, .. } => self.added.contains_key(&kind),
            WorldEvent::ComponentRemoved { kind, .. } => self.removed.contains_key(&kind),
        };
        if wanted {
            self.pending.push(event);
        }
    }

    /// Deliver queued events in the order they were raised.
    pub(crate) fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let mut pending = std::mem::take(&mut self.pending);
        for event in pending.drain(..) {
            match event {
                WorldEvent::EntityCreated(e) => self.created.iter_mut().for_each(|(_, f)| f(e)),
                WorldEvent::EntityDestroyed(e) => self.destroyed.iter_mut().for_each(|(_, f)| f(e)),
                WorldEvent::ComponentAdded { entity, kind } => {
                    if let Some(list) = self.added.get_mut(&kind) {
                        list.iter_mut().for_each(|(_, f)| f(entity, kind));
                    }
                }
                WorldEvent::ComponentRemoved { entity, kind } => {
                    if let Some(list) = self.removed.get_mut(&kind) {
                        list.iter_mut().for_each(|(_, f)| f(entity, kind));
                    }
                }
            }
        }
        self.pending = pending;
    }

    pub(crate) fn discard_pending(&mut self) {
        self.pending.clear();
    }

    fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listener_count();
        self.created.retain(|(l, _)| *l != id);
        self.destroyed.retain(|(l, _)| *l != id);
        for map in [&mut self.added, &mut self.removed] {
            map.values_mut().for_each(|list| list.retain(|(l, _)| *l != id));
            map.retain(|_, list| !list.is_empty());
        }
        self.listener_count() != before
    }

    fn listener_count(&self) -> usize {
        self.created.len()
            + self.destroyed.len()
            + self.added.values().map(Vec::len).sum::<usize>()
            + self.removed.values().map(Vec::len).sum::<usize>()
    }
}

impl World {
    pub fn on_entity_create(&mut self, f: impl FnMut(Entity) + Send + 'static) -> ListenerId {
        let id = self.events.next_id();
        self.events.created.push((id, Box::new(f)));
        id
    }

    pub fn on_entity_destroy(&mut self, f: impl FnMut(Entity) + Send + 'static) -> ListenerId {
        let id = self.events.next_id();
        self.events.destroyed.push((id, Box::new(f)));
        id
    }

    /// Listen for components of `kind` being attached.
    pub fn on_component_add(
        &mut self,
        kind: CompId,
        f: impl FnMut(Entity, CompId) + Send + 'static,
    ) -> EcsResult<ListenerId> {
        self.registry.kind_or_err(kind)?;
        let id = self.events.next_id();
        self.events.added.entry(kind).or_default().push((id, Box::new(f)));
        Ok(id)
    }

    /// Listen for components of `kind` being detached, including by entity destruction.
    pub fn on_component_remove(
        &mut self,
        kind: CompId,
        f: impl FnMut(Entity, CompId) + Send + 'static,
    ) -> EcsResult<ListenerId> {
        self.registry.kind_or_err(kind)?;
        let id = self.events.next_id();
        self.events.removed.entry(kind).or_default().push((id, Box::new(f)));
        Ok(id)
    }

    /// Unregister a listener. Returns false if it was already gone.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.events.remove(id)
    }
}
