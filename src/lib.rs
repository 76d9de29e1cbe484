//! Object pooling and hierarchical red-dot aggregation for Bevy games.
//!
//! Add [`plugin`] to an app to get an [`ObjectPoolManager`](pool_manager::ObjectPoolManager)
//! and a [`RedDotManager`](red_dot_manager::RedDotManager) resource, periodic
//! pool shrinkage, pool events forwarded as Bevy events, and shutdown on
//! `AppExit`. Both managers also work on their own, without an app.

extern crate self as bevy_gamekit;

use bevy::prelude::*;

pub mod app_extension;
pub mod clock;
pub mod config;
pub mod handle_registry;
pub mod pool_config;
pub mod pool_container;
pub mod pool_error;
pub mod pool_manager;
pub mod pool_stats;
pub mod poolable;
pub mod pooled_actor;
pub mod red_dot_dispatcher;
pub mod red_dot_error;
pub mod red_dot_hierarchy;
pub mod red_dot_manager;
pub mod red_dot_provider;
pub mod red_dot_tag;
pub mod red_dot_types;
pub mod scene;
pub mod schedule;
pub mod systems;
mod sync;

pub fn plugin(app: &mut App) {
    app.add_plugins((schedule::plugin, systems::plugin));
}

pub mod prelude {
    pub use bevy_gamekit_macros::Pooled;

    pub use crate::app_extension::GamekitAppExtension;
    pub use crate::clock::{ManualClock, WallClock};
    pub use crate::config::GamekitConfig;
    pub use crate::handle_registry::{HandleId, SubscriptionHandle};
    pub use crate::pool_config::{EntryFactory, PoolConfig, PoolEntryType};
    pub use crate::pool_container::PoolContainer;
    pub use crate::pool_error::{PoolError, PoolResult};
    pub use crate::pool_manager::{
        ObjectPoolManager, PoolEvent, PoolEventKind, PoolListenerHandle,
    };
    pub use crate::pool_stats::PoolStats;
    pub use crate::poolable::{
        EntryId, PoolEntry, PoolId, PoolSlot, PoolSlotAccess, Poolable, PooledState,
    };
    pub use crate::pooled_actor::PooledActor;
    pub use crate::red_dot_dispatcher::{ClearListenerHandle, StateListenerHandle};
    pub use crate::red_dot_error::{RedDotError, RedDotResult};
    pub use crate::red_dot_manager::RedDotManager;
    pub use crate::red_dot_provider::{RedDotBinding, RedDotDataProvider};
    pub use crate::red_dot_tag::RedDotTag;
    pub use crate::red_dot_types::{RedDotInfo, RedDotType, TagMatch};
    pub use crate::scene::{
        ActorSpawner, NullScene, PoolDormant, SceneGraph, WorldScene, actor_spawner,
    };
    pub use crate::schedule::{PoolMaintenance, SyncClocks};
}
