use std::fmt;
use std::sync::Arc;

use bevy::prelude::Entity;
use serde::{Deserialize, Serialize};

use crate::pool_error::{PoolError, PoolResult};
use crate::poolable::{PoolId, Poolable};
use crate::pooled_actor::PooledActor;
use crate::scene::{ActorSpawner, SceneGraph};

/// Fabricates and destroys the entries of one pool.
pub trait EntryFactory: Send + Sync {
    /// Produces a new entry in an uninitialized-but-valid state.
    fn create(&self, scene: &mut dyn SceneGraph) -> Option<Box<dyn Poolable>>;

    /// Physically destroys an entry the pool no longer wants.
    fn destroy(&self, entry: &mut dyn Poolable, scene: &mut dyn SceneGraph) {
        if let Some(entity) = entry.scene_entity() {
            scene.despawn_actor(entity);
        }
    }
}

struct ObjectFactory<F>(F);

impl<F> EntryFactory for ObjectFactory<F>
where
    F: Fn() -> Box<dyn Poolable> + Send + Sync,
{
    fn create(&self, _scene: &mut dyn SceneGraph) -> Option<Box<dyn Poolable>> {
        Some((self.0)())
    }
}

struct ActorFactory<F> {
    spawner: ActorSpawner,
    build: F,
}

impl<F> EntryFactory for ActorFactory<F>
where
    F: Fn(Entity) -> Box<dyn Poolable> + Send + Sync,
{
    fn create(&self, scene: &mut dyn SceneGraph) -> Option<Box<dyn Poolable>> {
        let entity = scene.spawn_actor(&self.spawner)?;
        Some((self.build)(entity))
    }
}

/// Runtime type descriptor of a pool's entries.
#[derive(Clone)]
pub struct PoolEntryType {
    class_name: String,
    is_actor: bool,
    factory: Arc<dyn EntryFactory>,
}

impl PoolEntryType {
    /// Entries built by `make`, living outside the scene graph.
    pub fn new<T: Poolable>(make: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self {
            class_name: short_type_name::<T>().to_string(),
            is_actor: false,
            factory: Arc::new(ObjectFactory(move || Box::new(make()) as Box<dyn Poolable>)),
        }
    }

    /// Entries built with `T::default()`.
    pub fn of<T: Poolable + Default>() -> Self {
        Self::new(T::default)
    }

    /// Scene entities wrapped in a [`PooledActor`].
    pub fn actor(class_name: impl Into<String>, spawner: ActorSpawner) -> Self {
        Self::actor_with(class_name, spawner, PooledActor::new)
    }

    /// Scene entities wrapped in a custom entry type built from the entity.
    pub fn actor_with<T: Poolable>(
        class_name: impl Into<String>,
        spawner: ActorSpawner,
        build: impl Fn(Entity) -> T + Send + Sync + 'static,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            is_actor: true,
            factory: Arc::new(ActorFactory {
                spawner,
                build: move |entity| Box::new(build(entity)) as Box<dyn Poolable>,
            }),
        }
    }

    /// Any other factory.
    pub fn from_factory(
        class_name: impl Into<String>,
        is_actor: bool,
        factory: Arc<dyn EntryFactory>,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            is_actor,
            factory,
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn is_actor(&self) -> bool {
        self.is_actor
    }

    pub(crate) fn factory(&self) -> &dyn EntryFactory {
        self.factory.as_ref()
    }
}

impl fmt::Debug for PoolEntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolEntryType")
            .field("class_name", &self.class_name)
            .field("is_actor", &self.is_actor)
            .finish()
    }
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let path = full.split('<').next().unwrap_or(full);
    path.rsplit("::").next().unwrap_or(path)
}

/// Immutable definition of one pool.
///
/// The entry type is attached in code; everything else can come from a
/// config file.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub pool_id: PoolId,
    #[serde(skip)]
    pub entry_type: Option<PoolEntryType>,
    pub initial_size: usize,
    /// 0 means unbounded
    pub max_size: usize,
    pub growth_step: usize,
    pub allow_growth: bool,
    pub allow_shrink: bool,
    /// Idle ratio at or above which a shrink is permitted, in `[0.5, 0.99]`
    pub shrink_threshold: f32,
    /// Seconds between shrink checks, at least 1
    pub shrink_check_interval: f32,
    pub warmup_on_register: bool,
    /// Forces scene-graph handling even if the entry type does not ask for it
    pub is_actor_pool: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_id: PoolId::default(),
            entry_type: None,
            initial_size: 10,
            max_size: 100,
            growth_step: 5,
            allow_growth: true,
            allow_shrink: true,
            shrink_threshold: 0.8,
            shrink_check_interval: 30.0,
            warmup_on_register: true,
            is_actor_pool: false,
        }
    }
}

impl PoolConfig {
    pub fn new(pool_id: impl Into<PoolId>, entry_type: PoolEntryType) -> Self {
        Self {
            pool_id: pool_id.into(),
            entry_type: Some(entry_type),
            ..Default::default()
        }
    }

    /// Growable, shrinkable, warmed-up pool with a growth step of a fifth of
    /// the initial size.
    pub fn quick(
        pool_id: impl Into<PoolId>,
        entry_type: PoolEntryType,
        initial_size: usize,
        max_size: usize,
    ) -> Self {
        Self {
            initial_size,
            max_size,
            growth_step: (initial_size / 5).max(1),
            ..Self::new(pool_id, entry_type)
        }
    }

    pub fn with_entry_type(mut self, entry_type: PoolEntryType) -> Self {
        self.entry_type = Some(entry_type);
        self
    }

    pub fn with_initial_size(mut self, initial_size: usize) -> Self {
        self.initial_size = initial_size;
        self
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_growth_step(mut self, growth_step: usize) -> Self {
        self.growth_step = growth_step;
        self
    }

    pub fn with_growth(mut self, allow_growth: bool) -> Self {
        self.allow_growth = allow_growth;
        self
    }

    pub fn with_shrink(mut self, allow_shrink: bool) -> Self {
        self.allow_shrink = allow_shrink;
        self
    }

    pub fn with_shrink_threshold(mut self, shrink_threshold: f32) -> Self {
        self.shrink_threshold = shrink_threshold;
        self
    }

    pub fn with_shrink_check_interval(mut self, seconds: f32) -> Self {
        self.shrink_check_interval = seconds;
        self
    }

    pub fn with_warmup_on_register(mut self, warmup: bool) -> Self {
        self.warmup_on_register = warmup;
        self
    }

    pub fn with_actor_pool(mut self, is_actor_pool: bool) -> Self {
        self.is_actor_pool = is_actor_pool;
        self
    }

    pub fn is_actor_pool(&self) -> bool {
        self.is_actor_pool || self.entry_type.as_ref().is_some_and(PoolEntryType::is_actor)
    }

    pub fn class_name(&self) -> &str {
        self.entry_type
            .as_ref()
            .map(PoolEntryType::class_name)
            .unwrap_or("None")
    }

    pub fn validate(&self) -> PoolResult<()> {
        let invalid = |details: &str| {
            Err(PoolError::InvalidConfig {
                pool_id: self.pool_id.clone(),
                details: details.to_string(),
            })
        };

        if self.pool_id.is_empty() {
            return invalid("pool id is empty");
        }
        if self.entry_type.is_none() {
            return invalid("entry type is missing");
        }
        if self.max_size > 0 && self.initial_size > self.max_size {
            return invalid("initial size exceeds max size");
        }
        if self.growth_step == 0 {
            return invalid("growth step must be at least 1");
        }
        if !(0.5..=0.99).contains(&self.shrink_threshold) {
            return invalid("shrink threshold must be within [0.5, 0.99]");
        }
        if self.shrink_check_interval < 1.0 {
            return invalid("shrink check interval must be at least 1 second");
        }
        Ok(())
    }
}
