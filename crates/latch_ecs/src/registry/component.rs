// component.rs - Component kind descriptors
//
// Kinds are identified by dense u16 ids, not Rust TypeIds, so script-defined
// payloads (raw byte blobs) and Rust POD types share one registry. Every slot
// begins with a 4-byte entity header; the user body follows at `body_offset`.

use bytemuck::Pod;
use std::any::TypeId;
use std::io::{self, Read, Write};
use std::mem::{align_of, size_of};

use crate::ecs::Entity;

/// Dense component kind id, allocated in registration order.
pub type CompId = u16;

/// Bytes reserved at the start of every slot for the owning entity id.
pub const ENTITY_HEADER_SIZE: usize = size_of::<u32>();

/// Smallest slot a kind may declare (header included).
pub const MIN_PAYLOAD_SIZE: usize = size_of::<usize>();

/// Slab buffers are aligned to this; kinds may not ask for more.
pub const MAX_KIND_ALIGN: usize = 16;

pub type ConstructFn = fn(body: &mut [u8]);
pub type DestructFn = fn(body: &mut [u8]);
pub type MoveFn = fn(src: &mut [u8], dst: &mut [u8]);
pub type CopyFn = fn(src: &[u8], dst: &mut [u8]);
pub type SerializeFn = fn(body: &[u8], out: &mut dyn Write) -> io::Result<()>;
pub type DeserializeFn = fn(body: &mut [u8], input: &mut dyn Read) -> io::Result<()>;

/// Trait for Rust-defined POD components.
///
/// Implementors must be plain data: the pool stores them as bytes, copies
/// them with `memcpy` and never runs `Drop`.
pub trait Component: Pod + Default + Send + Sync + 'static {
    /// Registry name. Archives match kinds by this string.
    const NAME: &'static str;

    /// Whether the kind is written to snapshots.
    const PERSISTENT: bool = true;
}

/// Helper macro to implement the [`Component`] trait.
///
/// # Example
/// ```ignore
/// #[repr(C)]
/// #[derive(Clone, Copy, Default, bytemuck::Pod, bytemuck::Zeroable)]
/// struct Health { value: i32 }
///
/// define_component!(Health, "Health");
/// ```
#[macro_export]
macro_rules! define_component {
    ($ty:ty, $name:expr) => {
        impl $crate::Component for $ty {
            const NAME: &'static str = $name;
        }
    };
    ($ty:ty, $name:expr, transient) => {
        impl $crate::Component for $ty {
            const NAME: &'static str = $name;
            const PERSISTENT: bool = false;
        }
    };
}

/// Everything the registry needs to manage one kind of component.
#[derive(Clone, Debug)]
pub struct ComponentDesc {
    pub(crate) name: String,
    pub(crate) size: usize,
    pub(crate) align: usize,
    pub(crate) slab_slots: Option<usize>,
    pub(crate) type_id: Option<TypeId>,
    pub(crate) construct: ConstructFn,
    pub(crate) destruct: Option<DestructFn>,
    pub(crate) move_fn: MoveFn,
    pub(crate) copy: CopyFn,
    pub(crate) serialize: Option<SerializeFn>,
    pub(crate) deserialize: Option<DeserializeFn>,
}

impl ComponentDesc {
    /// A byte-blob kind: zero-initialized, copied and persisted verbatim.
    /// `size` includes the entity header.
    pub fn raw(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            size,
            align: ENTITY_HEADER_SIZE,
            slab_slots: None,
            type_id: None,
            construct: zero_bytes,
            destruct: None,
            move_fn: move_bytes,
            copy: copy_bytes,
            serialize: Some(write_bytes),
            deserialize: Some(read_bytes),
        }
    }

    /// Descriptor for a Rust POD type.
    pub fn of<T: Component>() -> Self {
        let align = align_of::<T>().max(ENTITY_HEADER_SIZE);
        let body_offset = round_up(ENTITY_HEADER_SIZE, align);
        let size = round_up((body_offset + size_of::<T>()).max(MIN_PAYLOAD_SIZE), align);
        let (serialize, deserialize): (Option<SerializeFn>, Option<DeserializeFn>) = if T::PERSISTENT {
            (Some(write_bytes), Some(read_bytes))
        } else {
            (None, None)
        };
        Self {
            name: T::NAME.to_string(),
            size,
            align,
            slab_slots: None,
            type_id: Some(TypeId::of::<T>()),
            construct: construct_default::<T>,
            destruct: None,
            move_fn: move_bytes,
            copy: copy_bytes,
            serialize,
            deserialize,
        }
    }

    pub fn with_align(mut self, align: usize) -> Self {
        self.align = align;
        self
    }

    /// Override the world's default slots-per-slab for this kind.
    pub fn with_slab_slots(mut self, slots: usize) -> Self {
        self.slab_slots = Some(slots);
        self
    }

    pub fn with_constructor(mut self, f: ConstructFn) -> Self {
        self.construct = f;
        self
    }

    pub fn with_destructor(mut self, f: DestructFn) -> Self {
        self.destruct = Some(f);
        self
    }

    pub fn with_move(mut self, f: MoveFn) -> Self {
        self.move_fn = f;
        self
    }

    pub fn with_copy(mut self, f: CopyFn) -> Self {
        self.copy = f;
        self
    }

    pub fn with_serializer(mut self, ser: SerializeFn, de: DeserializeFn) -> Self {
        self.serialize = Some(ser);
        self.deserialize = Some(de);
        self
    }

    /// Skip this kind when writing snapshots.
    pub fn transient(mut self) -> Self {
        self.serialize = None;
        self.deserialize = None;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

#[inline]
pub(crate) const fn round_up(n: usize, align: usize) -> usize {
    (n + align - 1) & !(align - 1)
}

/// Offset of the user body inside a slot with the given alignment.
#[inline]
pub(crate) const fn body_offset_for(align: usize) -> usize {
    round_up(ENTITY_HEADER_SIZE, align)
}

/// Owning entity recorded in a slot header; null marks a tombstone.
#[inline]
pub(crate) fn slot_owner(slot: &[u8]) -> Entity {
    let mut raw = [0u8; ENTITY_HEADER_SIZE];
    raw.copy_from_slice(&slot[..ENTITY_HEADER_SIZE]);
    Entity::from_raw(u32::from_ne_bytes(raw))
}

#[inline]
pub(crate) fn set_slot_owner(slot: &mut [u8], owner: Entity) {
    slot[..ENTITY_HEADER_SIZE].copy_from_slice(&owner.index().to_ne_bytes());
}

fn zero_bytes(body: &mut [u8]) {
    body.fill(0);
}

fn construct_default<T: Component>(body: &mut [u8]) {
    body.fill(0);
    let value = T::default();
    body[..size_of::<T>()].copy_from_slice(bytemuck::bytes_of(&value));
}

fn copy_bytes(src: &[u8], dst: &mut [u8]) {
    dst.copy_from_slice(src);
}

fn move_bytes(src: &mut [u8], dst: &mut [u8]) {
    dst.copy_from_slice(src);
}

fn write_bytes(body: &[u8], out: &mut dyn Write) -> io::Result<()> {
    out.write_all(body)
}

fn read_bytes(body: &mut [u8], input: &mut dyn Read) -> io::Result<()> {
    input.read_exact(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C)]
    #[derive(Clone, Copy, Default, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
    struct Tiny {
        v: u8,
    }
    define_component!(Tiny, "Tiny");

    #[repr(C)]
    #[derive(Clone, Copy, Default, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
    struct Wide {
        v: [f64; 2],
    }
    define_component!(Wide, "Wide", transient);

    #[test]
    fn typed_layout_respects_minimum_and_alignment() {
        let tiny = ComponentDesc::of::<Tiny>();
        assert_eq!(tiny.size, MIN_PAYLOAD_SIZE.max(8));
        assert_eq!(body_offset_for(tiny.align), ENTITY_HEADER_SIZE);

        let wide = ComponentDesc::of::<Wide>();
        assert_eq!(wide.align, 8);
        assert_eq!(body_offset_for(wide.align), 8);
        assert_eq!(wide.size, 24);
        assert!(wide.serialize.is_none());
    }

    #[test]
    fn header_round_trip() {
        let mut slot = [0u8; 8];
        assert!(slot_owner(&slot).is_null());
        set_slot_owner(&mut slot, Entity::from_raw(42));
        assert_eq!(slot_owner(&slot), Entity::from_raw(42));
    }
}
