use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use bitvec::vec::BitVec;
use log::{debug, error, info, warn};

use crate::pool_config::{PoolConfig, PoolEntryType};
use crate::pool_error::{PoolError, PoolResult};
use crate::pool_stats::PoolStats;
use crate::poolable::{EntryId, PoolEntry, PoolId, PooledState};
use crate::scene::{NullScene, SceneGraph};
use crate::sync::lock;

/// What an acquire attempt did, beyond handing out an entry.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AcquireOutcome {
    pub entry: Option<PoolEntry>,
    pub grew: bool,
}

#[derive(Default)]
struct ContainerState {
    config: Option<PoolConfig>,
    all: Vec<PoolEntry>,
    /// LIFO stack of indices into `all`
    available: Vec<usize>,
    /// `available_bits[i]` is set iff `i` is on `available`
    available_bits: BitVec,
    index_of: HashMap<EntryId, usize>,
    /// Entries being deactivated outside the lock
    releasing: HashSet<EntryId>,
    active_count: usize,
    peak_active: usize,
    total_acquires: u64,
    failed_acquires: u64,
    growth_ops: u64,
    shrink_ops: u64,
    last_shrink_check: f64,
}

impl ContainerState {
    fn room(&self) -> usize {
        match self.config.as_ref() {
            Some(config) if config.max_size > 0 => config.max_size.saturating_sub(self.all.len()),
            Some(_) => usize::MAX,
            None => 0,
        }
    }

    fn push_available(&mut self, index: usize) {
        self.available.push(index);
        self.available_bits.set(index, true);
    }

    fn pop_available(&mut self) -> Option<usize> {
        let index = self.available.pop()?;
        self.available_bits.set(index, false);
        Some(index)
    }

    fn insert(&mut self, entry: PoolEntry) {
        let index = self.all.len();
        self.index_of.insert(entry.id(), index);
        self.all.push(entry);
        self.available_bits.push(false);
        self.push_available(index);
    }

    /// Removes the entry at `index`, moving the last entry into its slot.
    /// The index must not be on `available`.
    fn remove_slot(&mut self, index: usize) -> PoolEntry {
        let last = self.all.len() - 1;
        let removed = self.all.swap_remove(index);
        self.index_of.remove(&removed.id());

        if index != last {
            let moved_id = self.all[index].id();
            self.index_of.insert(moved_id, index);
            let moved_available = self.available_bits[last];
            self.available_bits.set(index, moved_available);
            if moved_available {
                if let Some(slot) = self.available.iter_mut().find(|slot| **slot == last) {
                    *slot = index;
                }
            }
        }
        self.available_bits.pop();
        removed
    }

    fn stats(&self) -> PoolStats {
        let (pool_id, class_name, is_actor_pool) = match self.config.as_ref() {
            Some(config) => (
                config.pool_id.clone(),
                config.class_name().to_string(),
                config.is_actor_pool(),
            ),
            None => (PoolId::default(), "None".to_string(), false),
        };
        let total = self.all.len();
        PoolStats {
            pool_id,
            class_name,
            total,
            active: self.active_count,
            available: self.available.len(),
            peak_active: self.peak_active,
            total_acquires: self.total_acquires,
            failed_acquires: self.failed_acquires,
            growth_ops: self.growth_ops,
            shrink_ops: self.shrink_ops,
            usage_rate: if total > 0 {
                self.active_count as f32 / total as f32
            } else {
                0.0
            },
            is_actor_pool,
        }
    }
}

/// Per-type store of reusable entries.
///
/// All bookkeeping sits behind one mutex. Entry hooks and scene-graph calls
/// run with that mutex released, so a hook may call back into the container.
#[derive(Default)]
pub struct PoolContainer {
    state: Mutex<ContainerState>,
}

impl PoolContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates `config`, adopts it and warms up if it asks for it.
    pub fn initialize(
        &self,
        config: PoolConfig,
        now: f64,
        scene: &mut dyn SceneGraph,
    ) -> PoolResult<()> {
        if let Err(err) = config.validate() {
            error!("{}", err);
            return Err(err);
        }

        let warmup = {
            let mut state = lock(&self.state);
            if state.config.is_some() {
                warn!("Pool [{}] already initialized", config.pool_id);
                return Err(PoolError::AlreadyInitialized {
                    pool_id: config.pool_id,
                });
            }
            let warmup = config.warmup_on_register.then_some(config.initial_size);
            info!(
                "Initializing pool [{}] of {} (initial {}, max {})",
                config.pool_id,
                config.class_name(),
                config.initial_size,
                config.max_size
            );
            state.config = Some(config);
            state.last_shrink_check = now;
            warmup
        };

        if let Some(count) = warmup {
            self.warmup(count, scene);
        }
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        lock(&self.state).config.is_some()
    }

    pub fn pool_id(&self) -> Option<PoolId> {
        lock(&self.state).config.as_ref().map(|c| c.pool_id.clone())
    }

    pub fn config(&self) -> Option<PoolConfig> {
        lock(&self.state).config.clone()
    }

    pub fn total(&self) -> usize {
        lock(&self.state).all.len()
    }

    pub fn active_count(&self) -> usize {
        lock(&self.state).active_count
    }

    pub fn available_count(&self) -> usize {
        lock(&self.state).available.len()
    }

    pub fn contains(&self, entry: &PoolEntry) -> bool {
        lock(&self.state).index_of.contains_key(&entry.id())
    }

    /// Grows toward `count` entries without passing `max_size`. Returns how
    /// many entries were created.
    pub fn warmup(&self, count: usize, scene: &mut dyn SceneGraph) -> usize {
        let missing = {
            let state = lock(&self.state);
            count.saturating_sub(state.all.len()).min(state.room())
        };
        if missing == 0 {
            return 0;
        }
        self.fabricate(missing, scene)
    }

    /// Adds up to `amount` entries, truncated at `max_size`.
    pub fn grow(&self, amount: usize, scene: &mut dyn SceneGraph) -> usize {
        let created = self.fabricate(amount, scene);
        if created > 0 {
            let mut state = lock(&self.state);
            state.growth_ops += 1;
            if let Some(config) = state.config.as_ref() {
                info!(
                    "Pool [{}] grew by {} to {}",
                    config.pool_id,
                    created,
                    state.all.len()
                );
            }
        }
        created
    }

    fn fabricate(&self, amount: usize, scene: &mut dyn SceneGraph) -> usize {
        let (pool_id, entry_type, amount) = {
            let state = lock(&self.state);
            let Some(config) = state.config.as_ref() else {
                return 0;
            };
            let Some(entry_type) = config.entry_type.clone() else {
                return 0;
            };
            (config.pool_id.clone(), entry_type, amount.min(state.room()))
        };

        let mut fresh = Vec::with_capacity(amount);
        for _ in 0..amount {
            let Some(object) = entry_type.factory().create(scene) else {
                warn!("Pool [{}] factory failed to create an entry", pool_id);
                break;
            };
            let entry = PoolEntry::new(pool_id.clone(), object);
            deactivate(&entry, scene);
            fresh.push(entry);
        }
        let built = fresh.len();

        let excess = {
            let mut state = lock(&self.state);
            if state.config.is_none() {
                // shut down while we were building
                fresh
            } else {
                let keep = fresh.len().min(state.room());
                let excess = fresh.split_off(keep);
                for entry in fresh {
                    state.insert(entry);
                }
                excess
            }
        };

        let created = built - excess.len();
        destroy_all(excess, &entry_type, scene);
        created
    }

    /// Hands out the most recently released entry, growing once if the pool
    /// is dry.
    pub fn acquire(&self, scene: &mut dyn SceneGraph) -> Option<PoolEntry> {
        self.acquire_reporting(scene).entry
    }

    pub(crate) fn acquire_reporting(&self, scene: &mut dyn SceneGraph) -> AcquireOutcome {
        let mut grew = false;
        let mut counted = false;

        loop {
            let growth = {
                let mut state = lock(&self.state);
                let Some(config) = state.config.as_ref() else {
                    warn!("Acquire on an uninitialized pool");
                    return AcquireOutcome { entry: None, grew };
                };
                let pool_id = config.pool_id.clone();
                let allow_growth = config.allow_growth;
                let growth_step = config.growth_step;

                if !counted {
                    state.total_acquires += 1;
                    counted = true;
                }

                if let Some(entry) = take_available(&mut state, &pool_id, scene) {
                    state.active_count += 1;
                    state.peak_active = state.peak_active.max(state.active_count);
                    drop(state);
                    activate(&entry, scene);
                    return AcquireOutcome {
                        entry: Some(entry),
                        grew,
                    };
                }

                let room = state.room();
                if !grew && allow_growth && room > 0 {
                    Some(growth_step.min(room))
                } else {
                    state.failed_acquires += 1;
                    warn!(
                        "Pool [{}] exhausted ({} active of {})",
                        pool_id,
                        state.active_count,
                        state.all.len()
                    );
                    None
                }
            };

            match growth {
                Some(amount) if self.grow(amount, scene) > 0 => grew = true,
                Some(_) => {
                    let mut state = lock(&self.state);
                    state.failed_acquires += 1;
                    warn!(
                        "Pool [{}] exhausted, growth created nothing ({} active of {})",
                        state
                            .config
                            .as_ref()
                            .map(|config| config.pool_id.as_str())
                            .unwrap_or_default(),
                        state.active_count,
                        state.all.len()
                    );
                    return AcquireOutcome { entry: None, grew };
                }
                None => return AcquireOutcome { entry: None, grew },
            }
        }
    }

    /// Returns an entry to the pool.
    pub fn release(&self, entry: &PoolEntry, scene: &mut dyn SceneGraph) -> PoolResult<()> {
        {
            let mut state = lock(&self.state);
            let pool_id = match state.config.as_ref() {
                Some(config) => config.pool_id.clone(),
                None => {
                    return Err(PoolError::NotInitialized {
                        pool_id: entry.pool_id().clone(),
                    });
                }
            };

            let Some(&index) = state.index_of.get(&entry.id()) else {
                warn!("Entry {:?} is not managed by pool [{}]", entry.id(), pool_id);
                return Err(PoolError::NotOwned { pool_id });
            };
            if state.available_bits[index] || state.releasing.contains(&entry.id()) {
                debug!("Entry {:?} already released to pool [{}]", entry.id(), pool_id);
                return Err(PoolError::DoubleRelease { pool_id });
            }
            if !entry.lock().can_be_released() {
                warn!("Entry {:?} refused release to pool [{}]", entry.id(), pool_id);
                return Err(PoolError::CannotRelease { pool_id });
            }
            state.releasing.insert(entry.id());
        }

        deactivate(entry, scene);

        let mut state = lock(&self.state);
        state.releasing.remove(&entry.id());
        if let Some(&index) = state.index_of.get(&entry.id()) {
            state.push_available(index);
            state.active_count = state.active_count.saturating_sub(1);
        }
        Ok(())
    }

    /// Destroys idle entries when the idle ratio reaches the threshold.
    /// Returns how many entries were destroyed.
    pub fn shrink(&self, scene: &mut dyn SceneGraph) -> usize {
        let (removed, entry_type) = {
            let mut state = lock(&self.state);
            let Some(config) = state.config.as_ref() else {
                return 0;
            };
            if !config.allow_shrink || state.all.is_empty() {
                return 0;
            }
            let idle_ratio = state.available.len() as f32 / state.all.len() as f32;
            if idle_ratio < config.shrink_threshold {
                return 0;
            }
            let target = config
                .initial_size
                .max(state.active_count + config.growth_step);
            if state.all.len() <= target {
                return 0;
            }
            let pool_id = config.pool_id.clone();
            let entry_type = config.entry_type.clone();

            let excess = (state.all.len() - target).min(state.available.len());
            let mut removed = Vec::with_capacity(excess);
            for _ in 0..excess {
                let Some(index) = state.pop_available() else {
                    break;
                };
                removed.push(state.remove_slot(index));
            }
            state.shrink_ops += 1;
            info!(
                "Pool [{}] shrank by {} to {}",
                pool_id,
                removed.len(),
                state.all.len()
            );
            (removed, entry_type)
        };

        let count = removed.len();
        if let Some(entry_type) = entry_type {
            destroy_all(removed, &entry_type, scene);
        }
        count
    }

    /// Shrinks if at least `shrink_check_interval` seconds passed since the
    /// last check.
    pub fn check_shrinkage(&self, now: f64, scene: &mut dyn SceneGraph) -> usize {
        {
            let mut state = lock(&self.state);
            let Some(config) = state.config.as_ref() else {
                return 0;
            };
            if now - state.last_shrink_check < config.shrink_check_interval as f64 {
                return 0;
            }
            state.last_shrink_check = now;
        }
        self.shrink(scene)
    }

    pub fn stats(&self) -> PoolStats {
        lock(&self.state).stats()
    }

    /// Destroys every entry and forgets the config. Safe to call repeatedly.
    pub fn shutdown(&self, scene: &mut dyn SceneGraph) {
        let (entries, entry_type) = {
            let mut state = lock(&self.state);
            let Some(config) = state.config.take() else {
                return;
            };
            info!(
                "Shutting down pool [{}] with {} entries",
                config.pool_id,
                state.all.len()
            );
            let entries = std::mem::take(&mut state.all);
            *state = ContainerState::default();
            (entries, config.entry_type)
        };

        match entry_type {
            Some(entry_type) => destroy_all(entries, &entry_type, scene),
            None => {
                for entry in entries {
                    entry.lock().on_removed_from_pool();
                }
            }
        }
    }
}

impl Drop for PoolContainer {
    fn drop(&mut self) {
        self.shutdown(&mut NullScene);
    }
}

/// Pops available indices until one holds a live, acquirable entry. Dead
/// entries are dropped from the books, live but unacquirable ones go back on
/// the stack in their original order.
fn take_available(
    state: &mut ContainerState,
    pool_id: &PoolId,
    scene: &dyn SceneGraph,
) -> Option<PoolEntry> {
    let mut skipped = Vec::new();
    let mut found = None;

    while let Some(index) = state.pop_available() {
        let entry = state.all[index].clone();
        let (alive, acquirable) = {
            let object = entry.lock();
            let in_scene = object
                .scene_entity()
                .is_none_or(|entity| scene.contains_actor(entity));
            (object.is_alive() && in_scene, object.can_be_acquired())
        };

        if !alive {
            debug!("Discarding dead entry {:?} from pool [{}]", entry.id(), pool_id);
            // indices in `skipped` may point at the last slot, which moves
            let last = state.all.len() - 1;
            state.remove_slot(index);
            for slot in skipped.iter_mut() {
                if *slot == last {
                    *slot = index;
                }
            }
            continue;
        }
        if !acquirable {
            skipped.push(index);
            continue;
        }
        found = Some(entry);
        break;
    }

    for index in skipped.into_iter().rev() {
        state.push_available(index);
    }
    found
}

fn activate(entry: &PoolEntry, scene: &mut dyn SceneGraph) {
    let entity = {
        let mut object = entry.lock();
        object.set_pool_state(PooledState::Active);
        object.on_acquired_from_pool();
        object.scene_entity()
    };
    if let Some(entity) = entity {
        scene.set_actor_enabled(entity, true);
    }
}

fn deactivate(entry: &PoolEntry, scene: &mut dyn SceneGraph) {
    let entity = {
        let mut object = entry.lock();
        object.on_released_to_pool();
        object.reset_pooled_object();
        object.set_pool_state(PooledState::Pooled);
        object.scene_entity()
    };
    if let Some(entity) = entity {
        scene.set_actor_enabled(entity, false);
        scene.move_actor_to_origin(entity);
    }
}

fn destroy_all(entries: Vec<PoolEntry>, entry_type: &PoolEntryType, scene: &mut dyn SceneGraph) {
    for entry in entries {
        let mut object = entry.lock();
        object.on_removed_from_pool();
        entry_type.factory().destroy(&mut **object, scene);
    }
}
