//! Entities, the hierarchy list, transforms and lifecycle events.
//!
//! [`World`] is the public surface; the other modules extend it with
//! `impl World` blocks grouped by concern.

mod components;
mod entity;
mod events;
mod hierarchy;
mod transform;
mod world;

pub use entity::{ComponentRef, Entity, EntityData};
pub use events::{ComponentListener, EntityListener, ListenerId, WorldEvent};
pub use hierarchy::{Ancestors, DirectChildren};
pub use transform::EntityTransform;
pub use world::World;
