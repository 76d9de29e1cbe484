use bevy::prelude::*;

use crate::pool_config::PoolConfig;

/// Pools waiting to be registered at `Startup`.
#[derive(Resource, Default)]
pub(crate) struct PendingPools(pub Vec<PoolConfig>);

/// An extension trait for `bevy::prelude::App` to declare pools and red-dot
/// tags while building the app.
pub trait GamekitAppExtension {
    /// Registers a pool with the `ObjectPoolManager` during `Startup`.
    ///
    /// Actor pools spawn their warmup entities at that point.
    fn add_object_pool(&mut self, config: PoolConfig) -> &mut Self;

    /// Creates a red-dot tag during `Startup`.
    fn add_red_dot_tag(&mut self, tag: &str) -> &mut Self;
}

impl GamekitAppExtension for App {
    fn add_object_pool(&mut self, config: PoolConfig) -> &mut Self {
        self.world_mut()
            .get_resource_or_init::<PendingPools>()
            .0
            .push(config);
        self
    }

    fn add_red_dot_tag(&mut self, tag: &str) -> &mut Self {
        self.world_mut()
            .get_resource_or_init::<crate::config::GamekitConfig>()
            .register_red_dot_tag(tag);
        self
    }
}
