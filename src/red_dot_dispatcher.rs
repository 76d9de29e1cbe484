use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::handle_registry::{HandleAllocator, HandleId, SubscriberList, SubscriptionHandle, Unsubscribe};
use crate::red_dot_tag::RedDotTag;
use crate::red_dot_types::{RedDotInfo, TagMatch};
use crate::sync::lock;

/// Called with the tag that changed and the listener's own node.
pub type StateCallback = Arc<dyn Fn(&RedDotTag, &RedDotInfo) + Send + Sync>;

pub type ClearCallback = Arc<dyn Fn() + Send + Sync>;

/// Subscription kind of [`StateListenerHandle`].
pub enum StateChangedSubscription {}

/// Subscription kind of [`ClearListenerHandle`].
pub enum ClearSubscription {}

pub type StateListenerHandle = SubscriptionHandle<RedDotDispatcher, StateChangedSubscription>;

pub type ClearListenerHandle = SubscriptionHandle<RedDotDispatcher, ClearSubscription>;

#[derive(Clone)]
struct StateListener {
    callback: StateCallback,
    match_type: TagMatch,
    unregister_on_world_destroyed: bool,
}

/// Listeners of one tag. Both kinds share one id sequence.
#[derive(Default)]
struct ListenerList {
    ids: HandleAllocator,
    state_changed: SubscriberList<StateListener>,
    clear_observers: SubscriberList<ClearCallback>,
}

/// Per-tag listener storage and synchronous fan-out.
///
/// Dispatch iterates a snapshot taken under the lock, with the lock
/// released, so callbacks may register or unregister freely.
#[derive(Default)]
pub struct RedDotDispatcher {
    lists: Mutex<HashMap<RedDotTag, ListenerList>>,
}

impl RedDotDispatcher {
    pub(crate) fn add_state_listener(
        self: &Arc<Self>,
        tag: RedDotTag,
        callback: impl Fn(&RedDotTag, &RedDotInfo) + Send + Sync + 'static,
        match_type: TagMatch,
        unregister_on_world_destroyed: bool,
    ) -> StateListenerHandle {
        let id = {
            let mut lists = lock(&self.lists);
            let list = lists.entry(tag.clone()).or_default();
            let id = list.ids.next();
            list.state_changed.push(
                id,
                StateListener {
                    callback: Arc::new(callback),
                    match_type,
                    unregister_on_world_destroyed,
                },
            );
            id
        };
        SubscriptionHandle::new(self, tag, id)
    }

    pub(crate) fn add_clear_observer(
        self: &Arc<Self>,
        tag: RedDotTag,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> ClearListenerHandle {
        let id = {
            let mut lists = lock(&self.lists);
            let list = lists.entry(tag.clone()).or_default();
            let id = list.ids.next();
            list.clear_observers.push(id, Arc::new(callback));
            id
        };
        SubscriptionHandle::new(self, tag, id)
    }

    /// Fires the state listeners registered on `node`. Off the originating
    /// tag only `Partial` listeners hear the change.
    pub(crate) fn notify_state(
        &self,
        node: &RedDotTag,
        origin: &RedDotTag,
        info: &RedDotInfo,
        on_origin: bool,
    ) {
        let listeners = match lock(&self.lists).get(node) {
            Some(list) => list.state_changed.snapshot(),
            None => return,
        };
        for listener in listeners {
            if on_origin || listener.match_type == TagMatch::Partial {
                (listener.callback)(origin, info);
            }
        }
    }

    pub(crate) fn notify_clear(&self, tag: &RedDotTag) {
        let observers = match lock(&self.lists).get(tag) {
            Some(list) => list.clear_observers.snapshot(),
            None => return,
        };
        for observer in observers {
            observer();
        }
    }

    pub(crate) fn remove_world_bound(&self) -> usize {
        let mut removed = 0;
        for list in lock(&self.lists).values_mut() {
            let before = list.state_changed.len();
            list.state_changed
                .retain(|listener| !listener.unregister_on_world_destroyed);
            removed += before - list.state_changed.len();
        }
        removed
    }

    pub fn state_listener_count(&self, tag: &RedDotTag) -> usize {
        lock(&self.lists)
            .get(tag)
            .map(|list| list.state_changed.len())
            .unwrap_or(0)
    }

    pub fn clear_observer_count(&self, tag: &RedDotTag) -> usize {
        lock(&self.lists)
            .get(tag)
            .map(|list| list.clear_observers.len())
            .unwrap_or(0)
    }
}

impl Unsubscribe<StateChangedSubscription> for RedDotDispatcher {
    type Key = RedDotTag;

    fn unsubscribe(&self, tag: &RedDotTag, id: HandleId) {
        if let Some(list) = lock(&self.lists).get_mut(tag) {
            list.state_changed.remove(id);
        }
    }

    fn is_subscribed(&self, tag: &RedDotTag, id: HandleId) -> bool {
        lock(&self.lists)
            .get(tag)
            .is_some_and(|list| list.state_changed.contains(id))
    }
}

impl Unsubscribe<ClearSubscription> for RedDotDispatcher {
    type Key = RedDotTag;

    fn unsubscribe(&self, tag: &RedDotTag, id: HandleId) {
        if let Some(list) = lock(&self.lists).get_mut(tag) {
            list.clear_observers.remove(id);
        }
    }

    fn is_subscribed(&self, tag: &RedDotTag, id: HandleId) -> bool {
        lock(&self.lists)
            .get(tag)
            .is_some_and(|list| list.clear_observers.contains(id))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn tag(s: &str) -> RedDotTag {
        RedDotTag::new(s).unwrap()
    }

    #[test]
    fn handle_kinds_share_one_id_sequence() {
        let dispatcher = Arc::new(RedDotDispatcher::default());
        let state = dispatcher.add_state_listener(tag("Bag"), |_, _| {}, TagMatch::Exact, false);
        let clear = dispatcher.add_clear_observer(tag("Bag"), || {});
        assert!(state.id() < clear.id());

        // a state handle never removes the clear observer with another id
        clear.unregister();
        assert_eq!(dispatcher.clear_observer_count(&tag("Bag")), 0);
        assert_eq!(dispatcher.state_listener_count(&tag("Bag")), 1);
    }

    #[test]
    fn exact_listeners_ignore_descendants() {
        let dispatcher = Arc::new(RedDotDispatcher::default());
        let exact = Arc::new(AtomicUsize::new(0));
        let partial = Arc::new(AtomicUsize::new(0));
        {
            let exact = exact.clone();
            dispatcher.add_state_listener(
                tag("Bag"),
                move |_, _| {
                    exact.fetch_add(1, Ordering::Relaxed);
                },
                TagMatch::Exact,
                false,
            );
        }
        {
            let partial = partial.clone();
            dispatcher.add_state_listener(
                tag("Bag"),
                move |_, _| {
                    partial.fetch_add(1, Ordering::Relaxed);
                },
                TagMatch::Partial,
                false,
            );
        }

        let info = RedDotInfo::new(tag("Bag"));
        dispatcher.notify_state(&tag("Bag"), &tag("Bag.Weapon"), &info, false);
        dispatcher.notify_state(&tag("Bag"), &tag("Bag"), &info, true);
        assert_eq!(exact.load(Ordering::Relaxed), 1);
        assert_eq!(partial.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn world_bound_listeners_are_dropped() {
        let dispatcher = Arc::new(RedDotDispatcher::default());
        let kept = dispatcher.add_state_listener(tag("Bag"), |_, _| {}, TagMatch::Exact, false);
        let dropped = dispatcher.add_state_listener(tag("Bag"), |_, _| {}, TagMatch::Exact, true);

        assert_eq!(dispatcher.remove_world_bound(), 1);
        assert!(kept.is_valid());
        assert!(!dropped.is_valid());
    }
}
