//! Process-wide registry slot.
//!
//! Startup code builds a [`ComponentRegistry`], calls [`install`] once, and
//! every later [`World::from_global`](crate::World::from_global) shares it.
//! Worlds keep their own `Arc`, so [`teardown`] never invalidates them.

use once_cell::sync::Lazy;
use std::sync::{Arc, PoisonError, RwLock};

use super::ComponentRegistry;
use crate::error::{EcsError, EcsResult};

static GLOBAL: Lazy<RwLock<Option<Arc<ComponentRegistry>>>> = Lazy::new(|| RwLock::new(None));

/// Freeze `registry` and publish it process-wide. Fails if one is already installed.
pub fn install(registry: ComponentRegistry) -> EcsResult<Arc<ComponentRegistry>> {
    let mut slot = GLOBAL.write().unwrap_or_else(PoisonError::into_inner);
    if slot.is_some() {
        return Err(EcsError::usage("a global component registry is already installed"));
    }
    let shared = Arc::new(registry);
    tracing::debug!(kinds = shared.kind_count(), "installed global component registry");
    *slot = Some(Arc::clone(&shared));
    Ok(shared)
}

/// The installed registry, if any.
pub fn installed() -> Option<Arc<ComponentRegistry>> {
    GLOBAL
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Remove the installed registry so a new one may be installed.
pub fn teardown() -> Option<Arc<ComponentRegistry>> {
    let prev = GLOBAL.write().unwrap_or_else(PoisonError::into_inner).take();
    if prev.is_some() {
        tracing::debug!("tore down global component registry");
    }
    prev
}
