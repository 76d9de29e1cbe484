use std::collections::HashMap;
use std::sync::Arc;

use bevy::prelude::*;
use log::{debug, error, info};

use crate::red_dot_dispatcher::{ClearListenerHandle, RedDotDispatcher, StateListenerHandle};
use crate::red_dot_error::RedDotResult;
use crate::red_dot_hierarchy::DescendantCache;
use crate::red_dot_tag::RedDotTag;
use crate::red_dot_types::{RedDotInfo, RedDotType, TagMatch};

/// Hierarchical red-dot counters.
///
/// A count added at a tag is also added to every registered ancestor, and
/// listeners along the way hear about it: listeners on the tag itself always,
/// listeners on ancestors only when registered with [`TagMatch::Partial`].
///
/// Tags are accepted as strings and validated on every call. An invalid tag
/// is logged and the call does nothing.
#[derive(Resource, Default)]
pub struct RedDotManager {
    states: HashMap<RedDotTag, RedDotInfo>,
    descendants: DescendantCache,
    dispatcher: Arc<RedDotDispatcher>,
    now: f64,
}

fn parse(tag: impl AsRef<str>) -> Option<RedDotTag> {
    RedDotTag::new(tag)
        .inspect_err(|err| error!("{}", err))
        .ok()
}

impl RedDotManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seconds used for `trigger_time` stamps.
    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn set_now(&mut self, now: f64) {
        self.now = now;
    }

    pub fn dispatcher(&self) -> &Arc<RedDotDispatcher> {
        &self.dispatcher
    }

    pub fn descendant_cache(&self) -> &DescendantCache {
        &self.descendants
    }

    /// Creates the node with a zero count. Returns `true` if it was new.
    pub fn register_tag(&mut self, tag: impl AsRef<str>) -> bool {
        match parse(tag) {
            Some(tag) => self.ensure(&tag),
            None => false,
        }
    }

    fn ensure(&mut self, tag: &RedDotTag) -> bool {
        if self.states.contains_key(tag) {
            return false;
        }
        let mut info = RedDotInfo::new(tag.clone());
        info.trigger_time = self.now;
        self.states.insert(tag.clone(), info);
        self.descendants.invalidate_ancestors_of(tag);
        true
    }

    /// Removes the node. Its listeners stay registered.
    pub fn unregister_tag(&mut self, tag: impl AsRef<str>) -> bool {
        let Some(tag) = parse(tag) else {
            return false;
        };
        if self.states.remove(&tag).is_none() {
            return false;
        }
        self.descendants.invalidate_ancestors_of(&tag);
        self.descendants.remove(&tag);
        true
    }

    /// Sets the presentation fields of a node, creating it if needed.
    pub fn configure(&mut self, tag: impl AsRef<str>, dot_type: RedDotType, priority: i32) {
        let Some(tag) = parse(tag) else {
            return;
        };
        self.ensure(&tag);
        if let Some(info) = self.states.get_mut(&tag) {
            info.dot_type = dot_type;
            info.priority = priority;
        }
    }

    /// Adds `amount` at `tag`, flooring at zero, and carries the resulting
    /// change up through the registered ancestors.
    pub fn add_count(&mut self, tag: impl AsRef<str>, amount: i32) {
        let Some(tag) = parse(tag) else {
            return;
        };
        if amount == 0 {
            return;
        }
        let current = self.states.get(&tag).map(|info| info.count).unwrap_or(0);
        if current == 0 && amount < 0 {
            return;
        }

        self.ensure(&tag);
        let now = self.now;
        let delta = match self.states.get_mut(&tag) {
            Some(info) => {
                let delta = info.apply(amount as i64);
                info.delta = delta;
                info.trigger_time = now;
                delta
            }
            None => return,
        };
        debug!("Red dot [{}] {:+} -> delta {:+}", tag, amount, delta);
        self.propagate(&tag, delta);
    }

    /// Fires the origin's listeners, then walks the ancestors applying
    /// `delta` and firing their partial listeners.
    fn propagate(&mut self, origin: &RedDotTag, delta: i64) {
        let now = self.now;
        let mut node = Some(origin.clone());
        let mut on_origin = true;

        while let Some(current) = node {
            if let Some(info) = self.states.get_mut(&current) {
                if !on_origin {
                    info.delta = info.apply(delta);
                    info.trigger_time = now;
                }
                let snapshot = info.clone();
                self.dispatcher
                    .notify_state(&current, origin, &snapshot, on_origin);
            }
            on_origin = false;
            node = current.direct_parent();
        }
    }

    /// Zeroes `tag` and all of its registered descendants.
    ///
    /// The tag's old count is withdrawn from its ancestors as a normal
    /// change. Descendants are zeroed directly with a delta of 0. Every
    /// zeroed node notifies its state listeners and then its clear
    /// observers.
    pub fn clear_branch(&mut self, tag: impl AsRef<str>) {
        let Some(tag) = parse(tag) else {
            return;
        };
        self.ensure(&tag);

        let now = self.now;
        let delta = match self.states.get_mut(&tag) {
            Some(info) => {
                let delta = -(info.count as i64);
                info.count = 0;
                info.delta = delta;
                info.trigger_time = now;
                delta
            }
            None => return,
        };
        self.propagate(&tag, delta);
        self.dispatcher.notify_clear(&tag);

        let descendants = self
            .descendants
            .find_all_descendants(&tag, self.states.keys());
        for descendant in descendants.iter() {
            let Some(info) = self.states.get_mut(descendant) else {
                continue;
            };
            info.count = 0;
            info.delta = 0;
            info.trigger_time = now;
            let snapshot = info.clone();
            self.dispatcher
                .notify_state(descendant, descendant, &snapshot, true);
            self.dispatcher.notify_clear(descendant);
        }
        debug!("Cleared red dot branch [{}] ({} descendants)", tag, descendants.len());
    }

    /// Registered strict descendants of `tag`, memoized.
    pub fn descendants(&mut self, tag: impl AsRef<str>) -> Vec<RedDotTag> {
        match parse(tag) {
            Some(tag) => self.descendants.find_all_descendants(&tag, self.states.keys()),
            None => Vec::new(),
        }
    }

    pub fn contains(&self, tag: impl AsRef<str>) -> bool {
        RedDotTag::new(tag).is_ok_and(|tag| self.states.contains_key(&tag))
    }

    pub fn info(&self, tag: impl AsRef<str>) -> Option<RedDotInfo> {
        let tag = RedDotTag::new(tag).ok()?;
        self.states.get(&tag).cloned()
    }

    pub fn count(&self, tag: impl AsRef<str>) -> u32 {
        self.info(tag).map(|info| info.count).unwrap_or(0)
    }

    pub fn is_active(&self, tag: impl AsRef<str>) -> bool {
        self.info(tag).is_some_and(|info| info.is_active())
    }

    /// Tags with a positive count, sorted.
    pub fn active_tags(&self) -> Vec<RedDotTag> {
        let mut tags: Vec<RedDotTag> = self
            .states
            .values()
            .filter(|info| info.is_active())
            .map(|info| info.tag.clone())
            .collect();
        tags.sort();
        tags
    }

    /// Every node, sorted by tag.
    pub fn all_infos(&self) -> Vec<RedDotInfo> {
        let mut infos: Vec<RedDotInfo> = self.states.values().cloned().collect();
        infos.sort_by(|a, b| a.tag.cmp(&b.tag));
        infos
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Listens to state changes of `tag` and, with [`TagMatch::Partial`],
    /// of its descendants. The callback receives the tag that changed and
    /// the info of `tag`.
    pub fn add_state_listener(
        &self,
        tag: impl AsRef<str>,
        callback: impl Fn(&RedDotTag, &RedDotInfo) + Send + Sync + 'static,
        match_type: TagMatch,
        unregister_on_world_destroyed: bool,
    ) -> RedDotResult<StateListenerHandle> {
        let tag = RedDotTag::new(tag).inspect_err(|err| error!("{}", err))?;
        Ok(self.dispatcher.add_state_listener(
            tag,
            callback,
            match_type,
            unregister_on_world_destroyed,
        ))
    }

    /// Runs `callback` whenever a branch clear zeroes `tag`.
    pub fn add_clear_observer(
        &self,
        tag: impl AsRef<str>,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> RedDotResult<ClearListenerHandle> {
        let tag = RedDotTag::new(tag).inspect_err(|err| error!("{}", err))?;
        Ok(self.dispatcher.add_clear_observer(tag, callback))
    }

    /// Drops the state listeners registered with
    /// `unregister_on_world_destroyed`.
    pub fn remove_world_bound_listeners(&self) -> usize {
        let removed = self.dispatcher.remove_world_bound();
        if removed > 0 {
            info!("Removed {} world-bound red dot listeners", removed);
        }
        removed
    }

    /// Drops every node, cache entry and listener. Handles issued so far
    /// turn stale.
    pub fn shutdown(&mut self) {
        info!("Shutting down red dot manager ({} tags)", self.states.len());
        self.states.clear();
        self.descendants.clear();
        self.dispatcher = Arc::new(RedDotDispatcher::default());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn manager(tags: &[&str]) -> RedDotManager {
        let mut manager = RedDotManager::new();
        for tag in tags {
            manager.register_tag(tag);
        }
        manager
    }

    #[test]
    fn register_is_idempotent() {
        let mut manager = manager(&["Bag"]);
        manager.add_count("Bag", 2);
        assert!(!manager.register_tag("Bag"));
        assert_eq!(manager.count("Bag"), 2);
    }

    #[test]
    fn invalid_tags_are_ignored() {
        let mut manager = RedDotManager::new();
        assert!(!manager.register_tag(""));
        manager.add_count("Bag..Sword", 3);
        manager.clear_branch(" ");
        assert!(manager.is_empty());
        assert!(manager.add_state_listener("", |_, _| {}, TagMatch::Exact, false).is_err());
    }

    #[test]
    fn count_floors_at_zero() {
        let mut manager = manager(&["Bag", "Bag.Sword"]);
        manager.add_count("Bag.Sword", 2);
        manager.add_count("Bag.Sword", -5);

        let sword = manager.info("Bag.Sword").unwrap();
        assert_eq!(sword.count, 0);
        assert_eq!(sword.delta, -2);
        assert!(!sword.is_active());
        assert_eq!(manager.count("Bag"), 0);
    }

    #[test]
    fn decrement_at_zero_is_suppressed() {
        let mut manager = manager(&["Bag"]);
        let fired = Arc::new(Mutex::new(0));
        let sink = fired.clone();
        let _handle = manager
            .add_state_listener("Bag", move |_, _| *sink.lock().unwrap() += 1, TagMatch::Exact, false)
            .unwrap();

        manager.add_count("Bag", -1);
        manager.add_count("Bag", 0);
        assert_eq!(*fired.lock().unwrap(), 0);
        assert_eq!(manager.info("Bag").unwrap().delta, 0);
    }

    #[test]
    fn unregistered_ancestors_do_not_aggregate() {
        let mut manager = manager(&["Shop.Daily"]);
        manager.add_count("Shop.Daily", 4);
        assert!(!manager.contains("Shop"));
        assert_eq!(manager.count("Shop.Daily"), 4);
    }

    #[test]
    fn late_ancestor_records_clamped_delta() {
        let mut manager = manager(&["Shop.Daily"]);
        manager.add_count("Shop.Daily", 4);
        manager.register_tag("Shop");

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _handle = manager
            .add_state_listener(
                "Shop",
                move |_, info| sink.lock().unwrap().push((info.count, info.delta)),
                TagMatch::Partial,
                false,
            )
            .unwrap();

        manager.add_count("Shop.Daily", -4);
        let shop = manager.info("Shop").unwrap();
        assert_eq!((shop.count, shop.delta), (0, 0));
        assert_eq!(*seen.lock().unwrap(), vec![(0, 0)]);
        assert_eq!(manager.info("Shop.Daily").unwrap().delta, -4);
    }

    #[test]
    fn implicit_creation_invalidates_ancestor_cache() {
        let mut manager = manager(&["Quest"]);
        assert!(manager.descendants("Quest").is_empty());
        assert!(manager.descendant_cache().cached(&RedDotTag::new("Quest").unwrap()).is_some());

        manager.add_count("Quest.Main", 1);
        assert!(manager.descendant_cache().is_empty());
        assert_eq!(manager.descendants("Quest").len(), 1);
    }

    #[test]
    fn unregister_tag_forgets_node() {
        let mut manager = manager(&["Quest", "Quest.Main"]);
        assert_eq!(manager.descendants("Quest").len(), 1);
        assert!(manager.unregister_tag("Quest.Main"));
        assert!(!manager.unregister_tag("Quest.Main"));
        assert!(manager.descendants("Quest").is_empty());
    }

    #[test]
    fn configure_sets_presentation() {
        let mut manager = RedDotManager::new();
        manager.configure("Mail", RedDotType::Urgent, 7);
        let info = manager.info("Mail").unwrap();
        assert_eq!(info.dot_type, RedDotType::Urgent);
        assert_eq!(info.priority, 7);
        assert_eq!(info.count, 0);
    }

    #[test]
    fn trigger_time_follows_clock() {
        let mut manager = manager(&["Mail"]);
        manager.set_now(12.5);
        manager.add_count("Mail", 1);
        assert_eq!(manager.info("Mail").unwrap().trigger_time, 12.5);
    }

    #[test]
    fn shutdown_stales_handles() {
        let mut manager = manager(&["Mail"]);
        let handle = manager
            .add_state_listener("Mail", |_, _| {}, TagMatch::Exact, false)
            .unwrap();
        assert!(handle.is_valid());

        manager.shutdown();
        assert!(!handle.is_valid());
        assert!(manager.is_empty());
        handle.unregister();
    }

    #[test]
    fn active_tags_are_sorted() {
        let mut manager = manager(&["B", "A", "A.X"]);
        manager.add_count("B", 1);
        manager.add_count("A.X", 1);
        let active: Vec<String> = manager.active_tags().into_iter().map(String::from).collect();
        assert_eq!(active, vec!["A", "A.X", "B"]);
    }
}
