use bevy::prelude::Entity;

use crate::poolable::{PoolSlot, Poolable};
use crate::prelude::Pooled;

/// Ready-made entry for pools of scene entities.
///
/// Everything gameplay-specific lives in components on the entity; the
/// pool only toggles its dormancy.
#[derive(Pooled, Debug)]
pub struct PooledActor {
    slot: PoolSlot,
    entity: Entity,
}

impl PooledActor {
    pub fn new(entity: Entity) -> Self {
        Self {
            slot: PoolSlot::default(),
            entity,
        }
    }

    pub fn entity(&self) -> Entity {
        self.entity
    }
}

impl Poolable for PooledActor {
    fn scene_entity(&self) -> Option<Entity> {
        Some(self.entity)
    }
}
