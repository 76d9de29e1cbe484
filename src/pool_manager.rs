use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use bevy::prelude::*;
use log::{info, warn};

use crate::handle_registry::{HandleAllocator, HandleId, SubscriberList, SubscriptionHandle, Unsubscribe};
use crate::pool_config::PoolConfig;
use crate::pool_container::PoolContainer;
use crate::pool_error::{PoolError, PoolResult};
use crate::pool_stats::PoolStats;
use crate::poolable::{EntryId, PoolEntry, PoolId};
use crate::scene::{SceneGraph, WorldScene};
use crate::sync::{lock, read, write};

/// Something that happened to a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolEventKind {
    Acquired,
    Released,
    Grown,
    Shrunk,
    Exhausted,
    Cleared,
}

/// Broadcast to manager listeners and forwarded as a Bevy event by the plugin.
#[derive(Event, Debug, Clone, PartialEq)]
pub struct PoolEvent {
    pub pool_id: PoolId,
    pub kind: PoolEventKind,
    pub entry: Option<PoolEntry>,
}

pub type PoolListener = Arc<dyn Fn(&PoolEvent) + Send + Sync>;

/// Subscription kind of [`PoolListenerHandle`].
pub enum PoolEventSubscription {}

pub type PoolListenerHandle = SubscriptionHandle<PoolListeners, PoolEventSubscription>;

#[derive(Default)]
struct ListenerState {
    ids: HandleAllocator,
    listeners: SubscriberList<PoolListener>,
}

/// Manager-level listeners of pool events.
#[derive(Default)]
pub struct PoolListeners {
    state: Mutex<ListenerState>,
}

impl PoolListeners {
    fn broadcast(&self, event: &PoolEvent) {
        let listeners = lock(&self.state).listeners.snapshot();
        for listener in listeners {
            listener(event);
        }
    }
}

impl Unsubscribe<PoolEventSubscription> for PoolListeners {
    type Key = ();

    fn unsubscribe(&self, _key: &(), id: HandleId) {
        lock(&self.state).listeners.remove(id);
    }

    fn is_subscribed(&self, _key: &(), id: HandleId) -> bool {
        lock(&self.state).listeners.contains(id)
    }
}

/// Registry of named pools.
///
/// Routes acquire and release, keeps an entry to pool map so callers can
/// release without knowing the origin pool, and broadcasts a [`PoolEvent`]
/// for every acquire, release, growth, shrink, exhaustion and clear.
#[derive(Resource, Default)]
pub struct ObjectPoolManager {
    pools: RwLock<HashMap<PoolId, Arc<PoolContainer>>>,
    owners: RwLock<HashMap<EntryId, PoolId>>,
    listeners: Arc<PoolListeners>,
    pending: Mutex<Vec<PoolEvent>>,
    queue_events: bool,
    now: f64,
}

impl ObjectPoolManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` with the manager and a scene backed by the rest of `world`.
    /// Returns `None` if the world has no manager.
    pub fn with_world<R>(
        world: &mut World,
        f: impl FnOnce(&mut ObjectPoolManager, &mut WorldScene) -> R,
    ) -> Option<R> {
        world.try_resource_scope(|world, mut manager: Mut<ObjectPoolManager>| {
            let mut scene = WorldScene::new(world);
            f(&mut *manager, &mut scene)
        })
    }

    /// Seconds used to stamp new pools' shrink timers.
    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn set_now(&mut self, now: f64) {
        self.now = now;
    }

    /// Keep a copy of every event for [`ObjectPoolManager::drain_events`].
    pub(crate) fn set_queue_events(&mut self, queue: bool) {
        self.queue_events = queue;
    }

    pub(crate) fn drain_events(&self) -> Vec<PoolEvent> {
        std::mem::take(&mut *lock(&self.pending))
    }

    pub fn register_pool(&self, config: PoolConfig, scene: &mut dyn SceneGraph) -> PoolResult<()> {
        config.validate().inspect_err(|err| log::error!("{}", err))?;
        if self.has_pool(&config.pool_id) {
            warn!("Pool [{}] already exists", config.pool_id);
            return Err(PoolError::PoolExists {
                pool_id: config.pool_id,
            });
        }

        let pool_id = config.pool_id.clone();
        let container = Arc::new(PoolContainer::new());
        container.initialize(config, self.now, scene)?;

        let mut pools = write(&self.pools);
        if pools.contains_key(&pool_id) {
            drop(pools);
            container.shutdown(scene);
            return Err(PoolError::PoolExists { pool_id });
        }
        info!("Registered pool [{}]", pool_id);
        pools.insert(pool_id, container);
        Ok(())
    }

    /// Shuts the pool down and forgets it. Entries still held by callers are
    /// no longer routed anywhere.
    pub fn unregister_pool(&self, pool_id: &PoolId, scene: &mut dyn SceneGraph) -> PoolResult<()> {
        let Some(container) = write(&self.pools).remove(pool_id) else {
            warn!("Pool [{}] not found", pool_id);
            return Err(PoolError::PoolNotFound {
                pool_id: pool_id.clone(),
            });
        };
        write(&self.owners).retain(|_, owner| owner != pool_id);
        container.shutdown(scene);
        info!("Unregistered pool [{}]", pool_id);
        Ok(())
    }

    pub fn has_pool(&self, pool_id: &PoolId) -> bool {
        read(&self.pools).contains_key(pool_id)
    }

    /// Ids of every registered pool, sorted.
    pub fn pool_ids(&self) -> Vec<PoolId> {
        let mut ids: Vec<PoolId> = read(&self.pools).keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn container(&self, pool_id: &PoolId) -> Option<Arc<PoolContainer>> {
        read(&self.pools).get(pool_id).cloned()
    }

    fn containers(&self) -> Vec<(PoolId, Arc<PoolContainer>)> {
        let mut containers: Vec<_> = read(&self.pools)
            .iter()
            .map(|(id, container)| (id.clone(), container.clone()))
            .collect();
        containers.sort_by(|a, b| a.0.cmp(&b.0));
        containers
    }

    fn require(&self, pool_id: &PoolId) -> PoolResult<Arc<PoolContainer>> {
        self.container(pool_id).ok_or_else(|| {
            warn!("Pool [{}] not found", pool_id);
            PoolError::PoolNotFound {
                pool_id: pool_id.clone(),
            }
        })
    }

    /// Takes an entry from the named pool. `None` if the pool is unknown or
    /// exhausted.
    pub fn acquire_object(
        &self,
        pool_id: impl Into<PoolId>,
        scene: &mut dyn SceneGraph,
    ) -> Option<PoolEntry> {
        let pool_id = pool_id.into();
        let container = self.require(&pool_id).ok()?;
        let outcome = container.acquire_reporting(scene);

        if outcome.grew {
            self.emit(&pool_id, PoolEventKind::Grown, None);
        }
        match outcome.entry {
            Some(entry) => {
                write(&self.owners).insert(entry.id(), pool_id.clone());
                self.emit(&pool_id, PoolEventKind::Acquired, Some(entry.clone()));
                Some(entry)
            }
            None => {
                self.emit(&pool_id, PoolEventKind::Exhausted, None);
                None
            }
        }
    }

    /// Returns an entry to whichever pool handed it out.
    pub fn release_object(&self, entry: &PoolEntry, scene: &mut dyn SceneGraph) -> PoolResult<()> {
        let pool_id = read(&self.owners)
            .get(&entry.id())
            .cloned()
            .unwrap_or_else(|| entry.pool_id().clone());
        let container = self.require(&pool_id)?;

        container.release(entry, scene)?;
        write(&self.owners).remove(&entry.id());
        self.emit(&pool_id, PoolEventKind::Released, Some(entry.clone()));
        Ok(())
    }

    /// Marks the entry `PendingRecycle` and releases it.
    pub fn return_to_pool(&self, entry: &PoolEntry, scene: &mut dyn SceneGraph) -> PoolResult<()> {
        entry.request_return_to_pool();
        self.release_object(entry, scene)
    }

    /// Grows the named pool toward `count` entries.
    pub fn warmup_pool(
        &self,
        pool_id: &PoolId,
        count: usize,
        scene: &mut dyn SceneGraph,
    ) -> PoolResult<usize> {
        Ok(self.require(pool_id)?.warmup(count, scene))
    }

    /// Grows every pool to its initial size.
    pub fn warmup_all_pools(&self, scene: &mut dyn SceneGraph) -> usize {
        self.containers()
            .into_iter()
            .filter_map(|(_, container)| {
                let initial = container.config()?.initial_size;
                Some(container.warmup(initial, scene))
            })
            .sum()
    }

    pub fn pool_stats(&self, pool_id: &PoolId) -> Option<PoolStats> {
        self.container(pool_id).map(|container| container.stats())
    }

    /// Stats of every pool, sorted by id.
    pub fn all_pool_stats(&self) -> Vec<PoolStats> {
        self.containers()
            .into_iter()
            .map(|(_, container)| container.stats())
            .collect()
    }

    /// Fraction of the pool in use, 0 for unknown or empty pools.
    pub fn usage_rate(&self, pool_id: &PoolId) -> f32 {
        self.pool_stats(pool_id)
            .map(|stats| stats.usage_rate)
            .unwrap_or(0.0)
    }

    /// A pool is healthy while its usage stays below `warning_threshold` and
    /// no acquire has failed.
    pub fn is_pool_healthy(&self, pool_id: &PoolId, warning_threshold: f32) -> bool {
        self.pool_stats(pool_id).is_some_and(|stats| {
            stats.usage_rate < warning_threshold && stats.failed_acquires == 0
        })
    }

    pub fn available_count(&self, pool_id: &PoolId) -> usize {
        self.container(pool_id)
            .map(|container| container.available_count())
            .unwrap_or(0)
    }

    /// Runs every pool's shrink check. Returns the number of destroyed
    /// entries.
    pub fn check_all_shrinkage(&mut self, now: f64, scene: &mut dyn SceneGraph) -> usize {
        self.now = now;
        let mut destroyed = 0;
        for (pool_id, container) in self.containers() {
            let removed = container.check_shrinkage(now, scene);
            if removed > 0 {
                self.emit(&pool_id, PoolEventKind::Shrunk, None);
                destroyed += removed;
            }
        }
        destroyed
    }

    /// Shrinks every pool now, ignoring the check interval. Pools that
    /// shrank emit `Shrunk`.
    pub fn shrink_all_pools(&self, scene: &mut dyn SceneGraph) -> usize {
        let mut destroyed = 0;
        for (pool_id, container) in self.containers() {
            let removed = container.shrink(scene);
            if removed > 0 {
                self.emit(&pool_id, PoolEventKind::Shrunk, None);
                destroyed += removed;
            }
        }
        destroyed
    }

    /// Emits `Cleared` for every pool, then shuts all of them down.
    pub fn clear_all_pools(&self, scene: &mut dyn SceneGraph) {
        let containers: Vec<_> = write(&self.pools).drain().collect();
        write(&self.owners).clear();
        for (pool_id, container) in containers {
            self.emit(&pool_id, PoolEventKind::Cleared, None);
            container.shutdown(scene);
        }
        info!("Cleared all pools");
    }

    /// Unregisters every pool.
    pub fn shutdown(&self, scene: &mut dyn SceneGraph) {
        for pool_id in self.pool_ids() {
            // a concurrent unregister is fine here
            let _ = self.unregister_pool(&pool_id, scene);
        }
        lock(&self.pending).clear();
    }

    /// Writes every pool's stats line to the log.
    pub fn log_all_stats(&self) {
        let stats = self.all_pool_stats();
        info!("Object pool stats ({} pools)", stats.len());
        for stats in stats {
            info!("{}", stats);
        }
    }

    pub fn add_listener(&self, listener: impl Fn(&PoolEvent) + Send + Sync + 'static) -> PoolListenerHandle {
        let id = {
            let mut state = lock(&self.listeners.state);
            let id = state.ids.next();
            state.listeners.push(id, Arc::new(listener));
            id
        };
        SubscriptionHandle::new(&self.listeners, (), id)
    }

    fn emit(&self, pool_id: &PoolId, kind: PoolEventKind, entry: Option<PoolEntry>) {
        let event = PoolEvent {
            pool_id: pool_id.clone(),
            kind,
            entry,
        };
        self.listeners.broadcast(&event);
        if self.queue_events {
            lock(&self.pending).push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool_config::PoolEntryType;
    use crate::poolable::{PoolSlot, Poolable, PooledState};
    use crate::prelude::Pooled;
    use crate::scene::NullScene;

    #[derive(Pooled, Default)]
    struct Arrow {
        slot: PoolSlot,
    }

    impl Poolable for Arrow {}

    #[derive(Pooled, Default)]
    struct Flare {
        slot: PoolSlot,
    }

    impl Poolable for Flare {}

    fn manager() -> ObjectPoolManager {
        let manager = ObjectPoolManager::new();
        manager
            .register_pool(
                PoolConfig::new("Arrow", PoolEntryType::of::<Arrow>())
                    .with_initial_size(2)
                    .with_max_size(2),
                &mut NullScene,
            )
            .unwrap();
        manager
            .register_pool(
                PoolConfig::new("Flare", PoolEntryType::of::<Flare>())
                    .with_initial_size(1)
                    .with_max_size(4),
                &mut NullScene,
            )
            .unwrap();
        manager
    }

    fn record(manager: &ObjectPoolManager) -> (Arc<Mutex<Vec<PoolEventKind>>>, PoolListenerHandle) {
        let kinds = Arc::new(Mutex::new(Vec::new()));
        let sink = kinds.clone();
        let handle = manager.add_listener(move |event| sink.lock().unwrap().push(event.kind));
        (kinds, handle)
    }

    #[test]
    fn duplicate_and_invalid_registration() {
        let manager = manager();
        let duplicate = PoolConfig::new("Arrow", PoolEntryType::of::<Arrow>());
        assert!(matches!(
            manager.register_pool(duplicate, &mut NullScene),
            Err(PoolError::PoolExists { .. })
        ));

        let invalid = PoolConfig::new("Bad", PoolEntryType::of::<Arrow>()).with_growth_step(0);
        assert!(manager.register_pool(invalid, &mut NullScene).is_err());
        assert!(!manager.has_pool(&"Bad".into()));
        assert_eq!(manager.pool_ids(), vec![PoolId::from("Arrow"), PoolId::from("Flare")]);
    }

    #[test]
    fn release_routes_to_origin_pool() {
        let manager = manager();
        let arrow = manager.acquire_object("Arrow", &mut NullScene).unwrap();
        let flare = manager.acquire_object("Flare", &mut NullScene).unwrap();

        manager.release_object(&flare, &mut NullScene).unwrap();
        manager.release_object(&arrow, &mut NullScene).unwrap();

        assert_eq!(manager.pool_stats(&"Arrow".into()).unwrap().active, 0);
        assert_eq!(manager.pool_stats(&"Flare".into()).unwrap().active, 0);
        assert!(matches!(
            manager.release_object(&arrow, &mut NullScene),
            Err(PoolError::DoubleRelease { .. })
        ));
    }

    #[test]
    fn unknown_pool_is_reported() {
        let manager = manager();
        assert!(manager.acquire_object("Missing", &mut NullScene).is_none());
        assert!(matches!(
            manager.warmup_pool(&"Missing".into(), 3, &mut NullScene),
            Err(PoolError::PoolNotFound { .. })
        ));
        assert_eq!(manager.usage_rate(&"Missing".into()), 0.0);
        assert!(!manager.is_pool_healthy(&"Missing".into(), 0.9));
    }

    #[test]
    fn events_cover_growth_and_exhaustion() {
        let manager = manager();
        let (kinds, _handle) = record(&manager);

        let _a = manager.acquire_object("Arrow", &mut NullScene).unwrap();
        let _b = manager.acquire_object("Arrow", &mut NullScene).unwrap();
        assert!(manager.acquire_object("Arrow", &mut NullScene).is_none());
        let _c = manager.acquire_object("Flare", &mut NullScene).unwrap();
        let _d = manager.acquire_object("Flare", &mut NullScene).unwrap();

        assert_eq!(
            *kinds.lock().unwrap(),
            vec![
                PoolEventKind::Acquired,
                PoolEventKind::Acquired,
                PoolEventKind::Exhausted,
                PoolEventKind::Acquired,
                PoolEventKind::Grown,
                PoolEventKind::Acquired,
            ]
        );
        assert!(!manager.is_pool_healthy(&"Arrow".into(), 0.9));
    }

    #[test]
    fn unregistered_listener_stops_receiving() {
        let manager = manager();
        let (kinds, handle) = record(&manager);
        handle.unregister();
        handle.unregister();

        manager.acquire_object("Arrow", &mut NullScene).unwrap();
        assert!(kinds.lock().unwrap().is_empty());
    }

    #[test]
    fn return_to_pool_goes_through_pending_recycle() {
        let manager = manager();
        let arrow = manager.acquire_object("Arrow", &mut NullScene).unwrap();
        manager.return_to_pool(&arrow, &mut NullScene).unwrap();
        assert_eq!(arrow.state(), PooledState::Pooled);
        assert_eq!(manager.available_count(&"Arrow".into()), 2);
    }

    #[test]
    fn clear_all_pools_empties_registry() {
        let manager = manager();
        let (kinds, _handle) = record(&manager);
        let arrow = manager.acquire_object("Arrow", &mut NullScene).unwrap();
        kinds.lock().unwrap().clear();

        manager.clear_all_pools(&mut NullScene);
        assert!(manager.pool_ids().is_empty());
        assert_eq!(
            *kinds.lock().unwrap(),
            vec![PoolEventKind::Cleared, PoolEventKind::Cleared]
        );
        assert!(matches!(
            manager.release_object(&arrow, &mut NullScene),
            Err(PoolError::PoolNotFound { .. })
        ));
    }

    #[test]
    fn queued_events_drain_once() {
        let mut manager = manager();
        manager.set_queue_events(true);
        manager.acquire_object("Flare", &mut NullScene).unwrap();

        let events = manager.drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].pool_id, PoolId::from("Flare"));
        assert!(events[0].entry.is_some());
        assert!(manager.drain_events().is_empty());
    }
}
