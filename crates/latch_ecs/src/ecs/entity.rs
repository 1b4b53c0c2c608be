//! Entity handle and per-entity bookkeeping
//!
//! Entities are 32-bit ids indexing the world's parallel record arrays.
//! Zero is the null id. Ids are recycled through a freelist once destroyed.

use smallvec::SmallVec;

use crate::pool::SlotRef;
use crate::registry::CompId;

/// Entity handle.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Entity(u32);

impl Entity {
    /// The reserved "no entity" id. Also marks tombstoned component slots.
    pub const NULL: Entity = Entity(0);

    #[inline]
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn index(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// `None` for the null id.
    #[inline]
    pub fn non_null(self) -> Option<Entity> {
        (!self.is_null()).then_some(self)
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// One attached component: its kind and where its slot lives.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ComponentRef {
    pub kind: CompId,
    pub slot: SlotRef,
}

/// Handle index stored in records that are on the freelist.
pub(crate) const FREE_HANDLE: usize = usize::MAX;

/// Per-entity record. `child_count` counts all descendants, which sit
/// directly after the entity in the hierarchy list.
#[derive(Debug, Clone)]
pub struct EntityData {
    pub(crate) parent: Entity,
    pub(crate) child_count: u32,
    pub(crate) handle_index: usize,
    pub(crate) name: Option<String>,
    pub(crate) flags: u32,
    pub(crate) components: SmallVec<[ComponentRef; 4]>,
}

impl Default for EntityData {
    fn default() -> Self {
        Self {
            parent: Entity::NULL,
            child_count: 0,
            handle_index: FREE_HANDLE,
            name: None,
            flags: 0,
            components: SmallVec::new(),
        }
    }
}

impl EntityData {
    #[inline]
    pub fn parent(&self) -> Option<Entity> {
        self.parent.non_null()
    }

    #[inline]
    pub fn child_count(&self) -> u32 {
        self.child_count
    }

    /// Position in the hierarchy list, or `None` for a free record.
    #[inline]
    pub fn handle_index(&self) -> Option<usize> {
        (self.handle_index != FREE_HANDLE).then_some(self.handle_index)
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    pub fn flags(&self) -> u32 {
        self.flags
    }

    #[inline]
    pub fn components(&self) -> &[ComponentRef] {
        &self.components
    }

    #[inline]
    pub(crate) fn is_live(&self) -> bool {
        self.handle_index != FREE_HANDLE
    }

    /// Range of the subtree rooted here, within the hierarchy list.
    #[inline]
    pub(crate) fn subtree(&self) -> std::ops::Range<usize> {
        self.handle_index..self.handle_index + 1 + self.child_count as usize
    }
}
