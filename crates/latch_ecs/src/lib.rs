//! Latch ECS Core
//!
//! The entity-component runtime of the engine:
//! - Component registry with dense kind ids, typed and raw descriptors
//! - Slab pools with in-slot tombstones
//! - Entity store with a flat depth-first hierarchy list
//! - Lazy world transforms
//! - Versioned binary snapshots
//!
//! ```ignore
//! use latch_ecs::{define_component, ComponentRegistry, World};
//! use std::sync::Arc;
//!
//! #[repr(C)]
//! #[derive(Clone, Copy, Default, bytemuck::Pod, bytemuck::Zeroable)]
//! struct Health { value: i32 }
//! define_component!(Health, "Health");
//!
//! let mut registry = ComponentRegistry::new();
//! registry.register::<Health>()?;
//! let mut world = World::new(Arc::new(registry));
//! let player = world.create_named(None, Some("player"))?;
//! world.insert(player, Health { value: 100 })?;
//! ```

pub mod ecs;
pub mod error;
pub mod math;
pub mod pool;
pub mod registry;
pub mod serialize;
pub mod settings;

pub use ecs::{ComponentRef, Entity, EntityData, EntityTransform, ListenerId, World, WorldEvent};
pub use error::{EcsError, EcsResult, ErrorKind};
pub use registry::{CompId, Component, ComponentDesc, ComponentKind, ComponentRegistry};
pub use serialize::{ArchiveVersion, ARCHIVE_EXTENSION, FORMAT_VERSION};
pub use settings::WorldSettings;

pub use glam;

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
