use bevy::prelude::*;
use log::{error, info};

use crate::app_extension::PendingPools;
use crate::clock::WallClock;
use crate::config::GamekitConfig;
use crate::pool_manager::{ObjectPoolManager, PoolEvent};
use crate::red_dot_manager::RedDotManager;
use crate::schedule::{PoolMaintenance, SyncClocks};

/// Repeating timer driving pool shrink sweeps.
#[derive(Resource, Debug, Clone)]
pub struct ShrinkTimer(pub Timer);

pub fn plugin(app: &mut App) {
    app.init_resource::<GamekitConfig>()
        .init_resource::<ObjectPoolManager>()
        .init_resource::<RedDotManager>()
        .init_resource::<PendingPools>()
        .add_event::<PoolEvent>()
        .add_systems(
            Startup,
            (
                init_shrink_timer,
                register_configured_tags,
                register_pending_pools,
            ),
        )
        .add_systems(SyncClocks, sync_clocks)
        .add_systems(
            PoolMaintenance,
            (check_pool_shrinkage, forward_pool_events).chain(),
        )
        .add_systems(Last, shutdown_on_exit.run_if(on_event::<AppExit>));

    app.world_mut()
        .resource_mut::<ObjectPoolManager>()
        .set_queue_events(true);
}

pub(crate) fn init_shrink_timer(mut commands: Commands, config: Res<GamekitConfig>) {
    commands.insert_resource(ShrinkTimer(Timer::from_seconds(
        config.shrink_check_period.max(0.001),
        TimerMode::Repeating,
    )));
}

pub(crate) fn register_configured_tags(
    config: Res<GamekitConfig>,
    mut red_dots: ResMut<RedDotManager>,
) {
    for tag in config.red_dot_tags.iter() {
        red_dots.register_tag(tag);
    }
}

/// Exclusive, since actor pools spawn their warmup entities into the world.
pub(crate) fn register_pending_pools(world: &mut World) {
    let Some(mut pending) = world.get_resource_mut::<PendingPools>() else {
        return;
    };
    let configs = std::mem::take(&mut pending.0);
    if configs.is_empty() {
        return;
    }

    ObjectPoolManager::with_world(world, |manager, scene| {
        for config in configs {
            let pool_id = config.pool_id.clone();
            if let Err(err) = manager.register_pool(config, scene) {
                error!("Failed to register pool [{}]: {}", pool_id, err);
            }
        }
    });
}

pub(crate) fn sync_clocks(
    time: Res<Time>,
    mut pools: ResMut<ObjectPoolManager>,
    mut red_dots: ResMut<RedDotManager>,
) {
    let now = time.now_secs();
    pools.set_now(now);
    red_dots.set_now(now);
}

pub(crate) fn check_pool_shrinkage(world: &mut World) {
    let Some(time) = world.get_resource::<Time>() else {
        return;
    };
    let (delta, now) = (time.delta(), time.now_secs());

    let Some(mut timer) = world.get_resource_mut::<ShrinkTimer>() else {
        return;
    };
    if !timer.0.tick(delta).just_finished() {
        return;
    }

    ObjectPoolManager::with_world(world, |manager, scene| {
        manager.check_all_shrinkage(now, scene);
    });
}

pub(crate) fn forward_pool_events(
    manager: Res<ObjectPoolManager>,
    mut events: EventWriter<PoolEvent>,
) {
    for event in manager.drain_events() {
        events.write(event);
    }
}

pub(crate) fn shutdown_on_exit(world: &mut World) {
    let log_stats = world
        .get_resource::<GamekitConfig>()
        .is_some_and(|config| config.log_pool_stats_on_exit);

    ObjectPoolManager::with_world(world, |manager, scene| {
        if log_stats {
            manager.log_all_stats();
        }
        manager.shutdown(scene);
    });

    if let Some(red_dots) = world.get_resource::<RedDotManager>() {
        red_dots.remove_world_bound_listeners();
    }
    info!("Gamekit shut down");
}
