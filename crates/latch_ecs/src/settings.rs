//! World settings

use serde::{Deserialize, Serialize};

use crate::error::{EcsError, EcsResult};

/// Tunables for a single [`World`](crate::World).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldSettings {
    /// Slots per slab for kinds that don't set their own capacity.
    pub slab_capacity_slots: usize,
    /// How many entity records the store grows by when the freelist is empty.
    pub entity_growth_step: usize,
    /// Run the full invariant check after every mutation (debug assertion).
    pub validate_mutations: bool,
    /// Most unused entity slots an archive may declare on top of its live
    /// entities. Larger gaps are rejected as malformed before any memory is
    /// sized from them.
    pub max_archive_free_slots: u32,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            slab_capacity_slots: 128,
            entity_growth_step: 100,
            validate_mutations: cfg!(debug_assertions),
            max_archive_free_slots: 1 << 16,
        }
    }
}

impl WorldSettings {
    pub fn from_json(text: &str) -> EcsResult<Self> {
        let settings: Self = serde_json::from_str(text)
            .map_err(|e| EcsError::usage(format!("bad world settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json(&self) -> EcsResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| EcsError::usage(format!("cannot encode world settings: {e}")))
    }

    pub fn validate(&self) -> EcsResult<()> {
        if self.slab_capacity_slots == 0 {
            return Err(EcsError::usage("slab_capacity_slots must be non-zero"));
        }
        if self.entity_growth_step == 0 {
            return Err(EcsError::usage("entity_growth_step must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let s = WorldSettings::from_json(r#"{ "slab_capacity_slots": 3 }"#).unwrap();
        assert_eq!(s.slab_capacity_slots, 3);
        assert_eq!(s.entity_growth_step, 100);
        assert_eq!(s.max_archive_free_slots, 1 << 16);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(WorldSettings::from_json(r#"{ "slab_capacity_slots": 0 }"#).is_err());
        assert!(WorldSettings::from_json("not json").is_err());
    }

    #[test]
    fn json_round_trip() {
        let s = WorldSettings {
            slab_capacity_slots: 7,
            entity_growth_step: 9,
            validate_mutations: true,
            max_archive_free_slots: 12,
        };
        let back = WorldSettings::from_json(&s.to_json().unwrap()).unwrap();
        assert_eq!(s, back);
    }
}
