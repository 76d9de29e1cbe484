use bevy::{app::MainScheduleOrder, ecs::schedule::ScheduleLabel, prelude::*};

/// Inserts the plugin's schedules into the main schedule order:
/// - `SyncClocks`: after `First`, once `Time` has been updated.
/// - `PoolMaintenance`: after `PostUpdate`, when gameplay is done acquiring
///   and releasing for the frame.
pub fn plugin(app: &mut App) {
    app.init_schedule(SyncClocks)
        .world_mut()
        .resource_mut::<MainScheduleOrder>()
        .insert_after(First, SyncClocks);

    app.init_schedule(PoolMaintenance)
        .world_mut()
        .resource_mut::<MainScheduleOrder>()
        .insert_after(PostUpdate, PoolMaintenance);
}

/// Copies the frame time into the pool and red-dot managers.
#[derive(ScheduleLabel, Debug, Clone, PartialEq, Eq, Hash)]
pub struct SyncClocks;

/// Shrink sweeps and pool event forwarding.
///
/// Systems here run with the frame's gameplay already finished.
#[derive(ScheduleLabel, Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolMaintenance;
