use std::sync::Arc;

use bevy::prelude::*;

/// Marker inserted on pooled scene entities while they sit in their pool.
///
/// Gameplay systems (movement, collision, AI) filter with
/// `Without<PoolDormant>` so dormant entities neither tick nor collide.
#[derive(Component, Debug, Default, Clone, Copy)]
pub struct PoolDormant;

/// Customises a freshly spawned pooled entity (meshes, colliders, gameplay
/// components).
pub type ActorSpawner = Arc<dyn Fn(&mut EntityWorldMut) + Send + Sync>;

pub fn actor_spawner(f: impl Fn(&mut EntityWorldMut) + Send + Sync + 'static) -> ActorSpawner {
    Arc::new(f)
}

/// The slice of the host scene graph the pool engine needs.
pub trait SceneGraph {
    /// Spawns a new dormant entity. Hosts without a scene return `None`.
    fn spawn_actor(&mut self, spawner: &ActorSpawner) -> Option<Entity>;

    /// Shows an entity and lets it tick and collide again, or the reverse.
    fn set_actor_enabled(&mut self, entity: Entity, enabled: bool);

    fn move_actor_to_origin(&mut self, entity: Entity);

    fn despawn_actor(&mut self, entity: Entity);

    fn contains_actor(&self, entity: Entity) -> bool;
}

/// Scene graph for pools of plain objects. Spawning always fails and every
/// other operation is a no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullScene;

impl SceneGraph for NullScene {
    fn spawn_actor(&mut self, _spawner: &ActorSpawner) -> Option<Entity> {
        None
    }

    fn set_actor_enabled(&mut self, _entity: Entity, _enabled: bool) {}

    fn move_actor_to_origin(&mut self, _entity: Entity) {}

    fn despawn_actor(&mut self, _entity: Entity) {}

    fn contains_actor(&self, _entity: Entity) -> bool {
        false
    }
}

/// Scene graph backed by a Bevy `World`.
pub struct WorldScene<'w> {
    world: &'w mut World,
}

impl<'w> WorldScene<'w> {
    pub fn new(world: &'w mut World) -> Self {
        Self { world }
    }

    pub fn world(&self) -> &World {
        self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        self.world
    }
}

impl SceneGraph for WorldScene<'_> {
    fn spawn_actor(&mut self, spawner: &ActorSpawner) -> Option<Entity> {
        let mut entity = self
            .world
            .spawn((Transform::default(), Visibility::Hidden, PoolDormant));
        spawner(&mut entity);
        Some(entity.id())
    }

    fn set_actor_enabled(&mut self, entity: Entity, enabled: bool) {
        let Ok(mut entity_mut) = self.world.get_entity_mut(entity) else {
            return;
        };
        if enabled {
            entity_mut.insert(Visibility::Inherited);
            entity_mut.remove::<PoolDormant>();
        } else {
            entity_mut.insert((Visibility::Hidden, PoolDormant));
        }
    }

    fn move_actor_to_origin(&mut self, entity: Entity) {
        let Ok(mut entity_mut) = self.world.get_entity_mut(entity) else {
            return;
        };
        if let Some(mut transform) = entity_mut.get_mut::<Transform>() {
            transform.translation = Vec3::ZERO;
        }
    }

    fn despawn_actor(&mut self, entity: Entity) {
        self.world.despawn(entity);
    }

    fn contains_actor(&self, entity: Entity) -> bool {
        self.world.entities().contains(entity)
    }
}
