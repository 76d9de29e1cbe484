use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use bevy::prelude::Entity;
use serde::{Deserialize, Serialize};

use crate::sync::lock;

/// Identifier of a pool, unique within an `ObjectPoolManager`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolId(String);

impl PoolId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PoolId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PoolId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Lifecycle state of a pooled entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PooledState {
    /// Dormant inside the pool, ready to be acquired
    #[default]
    Pooled,
    /// Handed out and in use
    Active,
    /// Still in use but asked to go back to the pool
    PendingRecycle,
}

/// Pool bookkeeping stored inside every pooled type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolSlot {
    pub(crate) state: PooledState,
    pub(crate) pool_id: PoolId,
}

impl PoolSlot {
    pub fn state(&self) -> PooledState {
        self.state
    }

    pub fn pool_id(&self) -> &PoolId {
        &self.pool_id
    }
}

/// Access to the `PoolSlot` of a pooled type. Usually derived with
/// `#[derive(Pooled)]`.
pub trait PoolSlotAccess: Send + 'static {
    fn pool_slot(&self) -> &PoolSlot;

    fn pool_slot_mut(&mut self) -> &mut PoolSlot;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Lifecycle contract every pooled type implements.
///
/// Only the hooks a type cares about need to be overridden. The container
/// drives the calls in this order:
///
/// - acquire: state becomes `Active`, then [`Poolable::on_acquired_from_pool`]
/// - release: [`Poolable::on_released_to_pool`], [`Poolable::reset_pooled_object`],
///   then state becomes `Pooled`
/// - destruction: [`Poolable::on_removed_from_pool`]
pub trait Poolable: PoolSlotAccess {
    /// Called after the entry has been marked `Active`.
    fn on_acquired_from_pool(&mut self) {}

    /// Called while the entry is still in its in-use state.
    fn on_released_to_pool(&mut self) {}

    /// Restore the entry's own invariants (velocities, transforms, references).
    fn reset_pooled_object(&mut self) {}

    /// Called once before the entry is destroyed by shrinkage or shutdown.
    fn on_removed_from_pool(&mut self) {}

    fn pool_state(&self) -> PooledState {
        self.pool_slot().state
    }

    fn set_pool_state(&mut self, state: PooledState) {
        self.pool_slot_mut().state = state;
    }

    fn pool_identifier(&self) -> &PoolId {
        &self.pool_slot().pool_id
    }

    fn can_be_acquired(&self) -> bool {
        self.pool_state() == PooledState::Pooled
    }

    fn can_be_released(&self) -> bool {
        matches!(
            self.pool_state(),
            PooledState::Active | PooledState::PendingRecycle
        )
    }

    /// The scene entity backing this entry, if it lives in the scene graph.
    fn scene_entity(&self) -> Option<Entity> {
        None
    }

    /// Entries that died outside the pool's control report `false` and are
    /// discarded on the next acquire.
    fn is_alive(&self) -> bool {
        true
    }
}

/// Process-unique identity of a pooled entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u64);

impl EntryId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

/// Shared handle to an entry owned by a pool container.
///
/// Cloning the handle does not clone the entry. Handles compare equal when
/// they point at the same entry.
#[derive(Clone)]
pub struct PoolEntry {
    id: EntryId,
    pool_id: PoolId,
    object: Arc<Mutex<Box<dyn Poolable>>>,
}

impl PoolEntry {
    pub(crate) fn new(pool_id: PoolId, mut object: Box<dyn Poolable>) -> Self {
        object.pool_slot_mut().pool_id = pool_id.clone();
        Self {
            id: EntryId::next(),
            pool_id,
            object: Arc::new(Mutex::new(object)),
        }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn pool_id(&self) -> &PoolId {
        &self.pool_id
    }

    pub fn state(&self) -> PooledState {
        self.lock().pool_state()
    }

    pub fn scene_entity(&self) -> Option<Entity> {
        self.lock().scene_entity()
    }

    /// Runs `f` against the concrete entry type. Returns `None` if the entry
    /// is not a `T`.
    pub fn with<T: Poolable, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut guard = self.lock();
        (**guard).as_any_mut().downcast_mut::<T>().map(f)
    }

    /// Runs `f` against the entry through its contract.
    pub fn with_dyn<R>(&self, f: impl FnOnce(&mut dyn Poolable) -> R) -> R {
        let mut guard = self.lock();
        f(&mut **guard)
    }

    pub fn is<T: Poolable>(&self) -> bool {
        (**self.lock()).as_any().is::<T>()
    }

    /// Marks an active entry as waiting to go back to its pool.
    ///
    /// Returns `false` if the entry was not `Active`. The entry still has to
    /// be released through its pool or manager.
    pub fn request_return_to_pool(&self) -> bool {
        let mut guard = self.lock();
        if guard.pool_state() != PooledState::Active {
            return false;
        }
        guard.set_pool_state(PooledState::PendingRecycle);
        true
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Box<dyn Poolable>> {
        lock(&self.object)
    }
}

impl PartialEq for PoolEntry {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PoolEntry {}

impl fmt::Debug for PoolEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolEntry")
            .field("id", &self.id)
            .field("pool_id", &self.pool_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::Pooled;

    #[derive(Pooled, Default)]
    struct Shell {
        slot: PoolSlot,
        fuse: u32,
    }

    impl Poolable for Shell {
        fn reset_pooled_object(&mut self) {
            self.fuse = 0;
        }
    }

    #[derive(Pooled, Default)]
    struct Spark(#[pool_slot] PoolSlot);

    impl Poolable for Spark {}

    #[test]
    fn default_predicates_follow_state() {
        let mut shell = Shell::default();
        assert!(shell.can_be_acquired());
        assert!(!shell.can_be_released());

        shell.set_pool_state(PooledState::Active);
        assert!(!shell.can_be_acquired());
        assert!(shell.can_be_released());

        shell.set_pool_state(PooledState::PendingRecycle);
        assert!(shell.can_be_released());
    }

    #[test]
    fn entry_handle_downcasts_to_concrete_type() {
        let entry = PoolEntry::new(PoolId::from("Shells"), Box::new(Shell::default()));
        assert!(entry.is::<Shell>());
        assert!(!entry.is::<Spark>());

        entry.with(|shell: &mut Shell| shell.fuse = 3);
        assert_eq!(entry.with(|shell: &mut Shell| shell.fuse), Some(3));
        assert_eq!(entry.with(|_: &mut Spark| ()), None);
        assert_eq!(entry.with_dyn(|e| e.pool_identifier().clone()), PoolId::from("Shells"));
    }

    #[test]
    fn return_request_only_from_active() {
        let entry = PoolEntry::new(PoolId::from("Sparks"), Box::new(Spark::default()));
        assert!(!entry.request_return_to_pool());

        entry.with_dyn(|e| e.set_pool_state(PooledState::Active));
        assert!(entry.request_return_to_pool());
        assert_eq!(entry.state(), PooledState::PendingRecycle);
    }

    #[test]
    fn cloned_handles_compare_equal() {
        let a = PoolEntry::new(PoolId::from("Shells"), Box::new(Shell::default()));
        let b = a.clone();
        let c = PoolEntry::new(PoolId::from("Shells"), Box::new(Shell::default()));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
