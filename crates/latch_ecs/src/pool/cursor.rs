// cursor.rs - Tombstone-skipping traversal of a component pool
//
// A cursor always rests on a live slot or on `end`. Any mutation of the
// pool invalidates outstanding cursors.

use crate::pool::{ComponentPool, SlotRef};

/// Position within a [`ComponentPool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolCursor {
    slab: usize,
    offset: usize,
}

impl PoolCursor {
    #[inline]
    pub fn slot(&self) -> SlotRef {
        SlotRef {
            slab: self.slab as u32,
            offset: self.offset as u32,
        }
    }
}

impl ComponentPool {
    /// First live slot, or `end` if the pool holds none.
    pub fn cursor_begin(&self) -> PoolCursor {
        self.settle(PoolCursor { slab: 0, offset: 0 })
    }

    /// One past the last live slot of the last non-empty slab.
    #[inline]
    pub fn cursor_end(&self) -> PoolCursor {
        PoolCursor {
            slab: self.slab_count(),
            offset: 0,
        }
    }

    /// Step to the next live slot. Advancing `end` is a no-op.
    pub fn cursor_advance(&self, cursor: &mut PoolCursor) {
        if *cursor == self.cursor_end() {
            return;
        }
        cursor.offset += self.stride();
        *cursor = self.settle(*cursor);
    }

    /// Slot bytes under the cursor; `None` at `end`.
    pub fn cursor_get(&self, cursor: PoolCursor) -> Option<&[u8]> {
        if cursor.slab >= self.slab_count() {
            return None;
        }
        Some(self.slot(cursor.slot()))
    }

    /// Move forward from `cursor` until it rests on a live slot or `end`.
    fn settle(&self, mut cursor: PoolCursor) -> PoolCursor {
        let stride = self.stride();
        while let Some(slab) = self.slabs().get(cursor.slab) {
            if slab.live_slots(stride) > 0 {
                while cursor.offset < slab.size_bytes() {
                    if !slab.owner_at(cursor.offset, stride).is_null() {
                        return cursor;
                    }
                    cursor.offset += stride;
                }
            }
            cursor.slab += 1;
            cursor.offset = 0;
        }
        self.cursor_end()
    }

    pub fn iter(&self) -> PoolIter<'_> {
        PoolIter {
            pool: self,
            cursor: self.cursor_begin(),
        }
    }
}

/// Iterator over live slots in slab-then-offset order.
pub struct PoolIter<'a> {
    pool: &'a ComponentPool,
    cursor: PoolCursor,
}

impl<'a> Iterator for PoolIter<'a> {
    type Item = (SlotRef, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let pool = self.pool;
        let bytes = pool.cursor_get(self.cursor)?;
        let slot = self.cursor.slot();
        pool.cursor_advance(&mut self.cursor);
        Some((slot, bytes))
    }
}
