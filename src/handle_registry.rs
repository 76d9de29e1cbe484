use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

/// Identifier of one subscription. Monotonic within its allocator and never
/// reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Default)]
pub(crate) struct HandleAllocator {
    next: u64,
}

impl HandleAllocator {
    pub fn next(&mut self) -> HandleId {
        self.next += 1;
        HandleId(self.next)
    }
}

/// Subscribers in registration order.
#[derive(Debug)]
pub(crate) struct SubscriberList<T> {
    entries: Vec<(HandleId, T)>,
}

impl<T> Default for SubscriberList<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> SubscriberList<T> {
    pub fn push(&mut self, id: HandleId, subscriber: T) {
        self.entries.push((id, subscriber));
    }

    /// Keeps the order of the remaining subscribers.
    pub fn remove(&mut self, id: HandleId) -> bool {
        match self.entries.iter().position(|(entry_id, _)| *entry_id == id) {
            Some(position) => {
                self.entries.remove(position);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: HandleId) -> bool {
        self.entries.iter().any(|(entry_id, _)| *entry_id == id)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
        self.entries.retain(|(_, subscriber)| keep(subscriber));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<T: Clone> SubscriberList<T> {
    /// Copy to dispatch over, so subscribers may unsubscribe mid-dispatch.
    pub fn snapshot(&self) -> Vec<T> {
        self.entries
            .iter()
            .map(|(_, subscriber)| subscriber.clone())
            .collect()
    }
}

/// A registry handles of kind `Kind` can unsubscribe from.
pub trait Unsubscribe<Kind> {
    type Key: Clone + fmt::Debug;

    fn unsubscribe(&self, key: &Self::Key, id: HandleId);

    fn is_subscribed(&self, key: &Self::Key, id: HandleId) -> bool;
}

/// Handle to one subscription.
///
/// Holds only a weak reference to its registry, so it may outlive it.
/// `Kind` keeps handles of different subscription kinds apart.
pub struct SubscriptionHandle<T: Unsubscribe<Kind>, Kind> {
    target: Weak<T>,
    key: T::Key,
    id: HandleId,
    _kind: PhantomData<fn() -> Kind>,
}

impl<T: Unsubscribe<Kind>, Kind> SubscriptionHandle<T, Kind> {
    pub(crate) fn new(target: &Arc<T>, key: T::Key, id: HandleId) -> Self {
        Self {
            target: Arc::downgrade(target),
            key,
            id,
            _kind: PhantomData,
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn key(&self) -> &T::Key {
        &self.key
    }

    /// Removes the subscription. Does nothing if it is already gone or the
    /// registry was dropped.
    pub fn unregister(&self) {
        if let Some(target) = self.target.upgrade() {
            target.unsubscribe(&self.key, self.id);
        }
    }

    /// Whether the registry is alive and still holds this subscription.
    pub fn is_valid(&self) -> bool {
        self.target
            .upgrade()
            .is_some_and(|target| target.is_subscribed(&self.key, self.id))
    }
}

impl<T: Unsubscribe<Kind>, Kind> Clone for SubscriptionHandle<T, Kind> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            key: self.key.clone(),
            id: self.id,
            _kind: PhantomData,
        }
    }
}

impl<T: Unsubscribe<Kind>, Kind> fmt::Debug for SubscriptionHandle<T, Kind> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("key", &self.key)
            .field("id", &self.id)
            .finish()
    }
}
