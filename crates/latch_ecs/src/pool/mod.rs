//! Slab-backed storage for component payloads, one pool per kind.

mod cursor;
#[allow(clippy::module_inception)]
mod pool;
mod slab;

pub use cursor::{PoolCursor, PoolIter};
pub use pool::{ComponentPool, SlabStats, SlotRef};
pub use slab::Slab;
