use bytemuck::{Pod, Zeroable};

use crate::ecs::Entity;
use crate::registry::{slot_owner, MAX_KIND_ALIGN};

/// Allocation unit for slab buffers; fixes the buffer alignment.
#[derive(Clone, Copy)]
#[repr(C, align(16))]
struct Block([u8; MAX_KIND_ALIGN]);

// SAFETY: a 16-byte array with 16-byte alignment has no padding and every
// bit pattern is valid.
unsafe impl Zeroable for Block {}
unsafe impl Pod for Block {}

/// Fixed-capacity byte buffer holding the slots of one kind.
///
/// `size` is the write frontier in bytes. Slots in `[0, size)` are either
/// live or tombstones (null header); `tombstones` counts the latter.
pub struct Slab {
    blocks: Box<[Block]>,
    capacity: usize,
    size: usize,
    tombstones: usize,
}

impl Slab {
    pub fn with_capacity(capacity_bytes: usize) -> Self {
        let blocks = vec![Block([0; MAX_KIND_ALIGN]); capacity_bytes.div_ceil(MAX_KIND_ALIGN)];
        Self {
            blocks: blocks.into_boxed_slice(),
            capacity: capacity_bytes,
            size: 0,
            tombstones: 0,
        }
    }

    #[inline]
    pub fn capacity_bytes(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn size_bytes(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn tombstone_count(&self) -> usize {
        self.tombstones
    }

    /// A slab can take another slot if it has unwritten space or a tombstone.
    #[inline]
    pub fn has_room(&self) -> bool {
        self.size < self.capacity || self.tombstones > 0
    }

    #[inline]
    pub fn live_slots(&self, stride: usize) -> usize {
        self.size / stride - self.tombstones
    }

    #[inline]
    pub(crate) fn bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<Block, u8>(&self.blocks)[..self.capacity]
    }

    #[inline]
    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut::<Block, u8>(&mut self.blocks)[..self.capacity]
    }

    #[inline]
    pub(crate) fn slot(&self, offset: usize, stride: usize) -> &[u8] {
        &self.bytes()[offset..offset + stride]
    }

    #[inline]
    pub(crate) fn slot_mut(&mut self, offset: usize, stride: usize) -> &mut [u8] {
        &mut self.bytes_mut()[offset..offset + stride]
    }

    #[inline]
    pub(crate) fn owner_at(&self, offset: usize, stride: usize) -> Entity {
        slot_owner(self.slot(offset, stride))
    }

    /// Reserve a slot: the first tombstone if any, else bump the frontier.
    /// The slot's contents are stale until the caller constructs into it.
    pub(crate) fn take_slot(&mut self, stride: usize) -> Option<usize> {
        if self.tombstones > 0 {
            let offset = (0..self.size)
                .step_by(stride)
                .find(|&off| self.owner_at(off, stride).is_null())?;
            self.tombstones -= 1;
            Some(offset)
        } else if self.size + stride <= self.capacity {
            let offset = self.size;
            self.size += stride;
            Some(offset)
        } else {
            None
        }
    }

    /// Account for a slot that was just destructed in place.
    pub(crate) fn release_slot(&mut self, offset: usize, stride: usize) {
        if offset + stride == self.size {
            self.size -= stride;
        } else {
            self.tombstones += 1;
        }
    }

    /// Offsets of live slots in slot order.
    pub(crate) fn live_offsets(&self, stride: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.size)
            .step_by(stride)
            .filter(move |&off| !self.owner_at(off, stride).is_null())
    }

    /// Count tombstones by scanning headers; used by the invariant checker.
    pub(crate) fn count_null_headers(&self, stride: usize) -> usize {
        (0..self.size)
            .step_by(stride)
            .filter(|&off| self.owner_at(off, stride).is_null())
            .count()
    }
}
