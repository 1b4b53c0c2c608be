// hierarchy.rs - Flat pre-order parent/child list
//
// Every subtree is a contiguous run of the hierarchy list starting at its
// root. Structural edits splice whole runs and then renumber the
// `handle_index` of everything behind the splice point.

use std::ops::Range;

use crate::ecs::{Entity, World};
use crate::error::{EcsError, EcsResult};

impl World {
    /// Insert a fresh leaf at the end of `parent`'s subtree, or at the end
    /// of the list for a root.
    pub(crate) fn link(&mut self, e: Entity, parent: Entity) {
        let pos = if parent.is_null() {
            self.hierarchy.len()
        } else {
            self.rec(parent).subtree().end
        };
        self.hierarchy.insert(pos, e);
        self.reindex_from(pos);
        self.rec_mut(e).parent = parent;
        self.adjust_ancestors(parent, 1);
    }

    /// Cut a subtree run out of the list and shrink its ancestors.
    pub(crate) fn unlink_range(&mut self, range: Range<usize>, parent: Entity) {
        let removed = range.len() as i64;
        let start = range.start;
        self.hierarchy.drain(range);
        self.reindex_from(start);
        self.adjust_ancestors(parent, -removed);
    }

    pub(crate) fn reindex_from(&mut self, start: usize) {
        for i in start..self.hierarchy.len() {
            let e = self.hierarchy[i];
            self.entities[e.index() as usize].handle_index = i;
        }
    }

    fn adjust_ancestors(&mut self, mut ancestor: Entity, delta: i64) {
        while !ancestor.is_null() {
            let data = self.rec_mut(ancestor);
            data.child_count = (data.child_count as i64 + delta) as u32;
            ancestor = data.parent;
        }
    }

    /// Move `e` and its subtree under `new_parent` (or to the root level).
    ///
    /// The moved subtree lands at the end of the new parent's subtree. Ids,
    /// components and local transforms are kept; world transforms go dirty.
    pub fn set_parent(&mut self, e: Entity, new_parent: Option<Entity>) -> EcsResult<()> {
        let (range, old_parent) = {
            let data = self.live(e)?;
            (data.subtree(), data.parent)
        };
        let new_parent = match new_parent {
            Some(p) => {
                let p_index = self.live(p)?.handle_index;
                if range.contains(&p_index) {
                    return Err(EcsError::usage(format!(
                        "cannot parent {e} under {p}, which is inside its own subtree"
                    )));
                }
                p
            }
            None => Entity::NULL,
        };
        if new_parent == old_parent {
            return Ok(());
        }

        let moved: Vec<Entity> = self.hierarchy[range.clone()].to_vec();
        let count = moved.len() as i64;
        let start = range.start;
        self.unlink_range(range, old_parent);

        let pos = if new_parent.is_null() {
            self.hierarchy.len()
        } else {
            self.rec(new_parent).subtree().end
        };
        self.hierarchy.splice(pos..pos, moved);
        self.reindex_from(start.min(pos));
        self.rec_mut(e).parent = new_parent;
        self.adjust_ancestors(new_parent, count);
        self.mark_subtree_dirty(e);

        tracing::trace!(entity = %e, parent = %new_parent, "reparented subtree");
        self.finish_mutation();
        Ok(())
    }

    /// Immediate children of `e`, in hierarchy order.
    pub fn direct_children(&self, e: Entity) -> DirectChildren<'_> {
        DirectChildren {
            world: self,
            descendants: self.children(e),
            cursor: 0,
        }
    }

    /// Parent, grandparent and so on up to the root.
    pub fn ancestors(&self, e: Entity) -> Ancestors<'_> {
        let next = self.parent(e).unwrap_or(Entity::NULL);
        Ancestors { world: self, next }
    }

    /// True when `descendant` lies strictly inside `ancestor`'s subtree.
    pub fn is_ancestor_of(&self, ancestor: Entity, descendant: Entity) -> bool {
        match (self.entity_data(ancestor), self.entity_data(descendant)) {
            (Some(a), Some(d)) => a.handle_index < d.handle_index && a.subtree().contains(&d.handle_index),
            _ => false,
        }
    }

    /// Entities without a parent, in hierarchy order.
    pub fn roots(&self) -> DirectChildren<'_> {
        DirectChildren {
            world: self,
            descendants: &self.hierarchy,
            cursor: 0,
        }
    }
}

/// Iterator returned by [`World::direct_children`] and [`World::roots`].
///
/// Walks a run of the hierarchy list, hopping over each child's own subtree.
pub struct DirectChildren<'a> {
    world: &'a World,
    descendants: &'a [Entity],
    cursor: usize,
}

impl Iterator for DirectChildren<'_> {
    type Item = Entity;

    fn next(&mut self) -> Option<Entity> {
        let child = *self.descendants.get(self.cursor)?;
        self.cursor += 1 + self.world.rec(child).child_count as usize;
        Some(child)
    }
}

/// Iterator returned by [`World::ancestors`].
pub struct Ancestors<'a> {
    world: &'a World,
    next: Entity,
}

impl Iterator for Ancestors<'_> {
    type Item = Entity;

    fn next(&mut self) -> Option<Entity> {
        let current = self.next.non_null()?;
        self.next = self.world.rec(current).parent;
        Some(current)
    }
}
