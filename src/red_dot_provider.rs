use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::red_dot_dispatcher::{ClearListenerHandle, StateListenerHandle};
use crate::red_dot_error::RedDotResult;
use crate::red_dot_manager::RedDotManager;
use crate::red_dot_tag::RedDotTag;
use crate::red_dot_types::TagMatch;
use crate::sync::lock;

/// A source of red-dot counts for one tag, e.g. unread mails of one kind.
///
/// The provider remembers how much it contributed. When a branch clear
/// zeroes its tag, the contribution is forgotten without touching the
/// manager, since the manager already dropped it.
pub struct RedDotDataProvider {
    tag: RedDotTag,
    contributed: Arc<AtomicU32>,
    cleared: Arc<Mutex<Option<ClearListenerHandle>>>,
}

impl RedDotDataProvider {
    pub fn new(manager: &mut RedDotManager, tag: impl AsRef<str>) -> RedDotResult<Self> {
        let tag = RedDotTag::new(tag)?;
        manager.register_tag(&tag);
        Ok(Self {
            tag,
            contributed: Arc::new(AtomicU32::new(0)),
            cleared: Arc::new(Mutex::new(None)),
        })
    }

    pub fn tag(&self) -> &RedDotTag {
        &self.tag
    }

    /// What this provider currently contributes to its tag.
    pub fn count(&self) -> u32 {
        self.contributed.load(Ordering::Relaxed)
    }

    pub fn is_observing_clear(&self) -> bool {
        lock(&self.cleared).is_some()
    }

    /// Moves the contribution to `count`, adding only the difference.
    pub fn set_count(&mut self, manager: &mut RedDotManager, count: u32) {
        let old = self.count();
        if old == count {
            return;
        }
        let delta = (count as i64 - old as i64).clamp(i32::MIN as i64, i32::MAX as i64) as i32;
        manager.add_count(&self.tag, delta);
        self.contributed.store(count, Ordering::Relaxed);

        if count > 0 {
            self.observe_clear(manager);
        }
    }

    pub fn add(&mut self, manager: &mut RedDotManager, amount: i32) {
        let count = (self.count() as i64 + amount as i64).clamp(0, u32::MAX as i64) as u32;
        self.set_count(manager, count);
    }

    /// Takes the whole contribution back and stops observing clears.
    pub fn withdraw(&mut self, manager: &mut RedDotManager) {
        self.set_count(manager, 0);
        if let Some(handle) = lock(&self.cleared).take() {
            handle.unregister();
        }
    }

    fn observe_clear(&self, manager: &RedDotManager) {
        let mut slot = lock(&self.cleared);
        if slot.is_some() {
            return;
        }
        let contributed = self.contributed.clone();
        let cleared = Arc::downgrade(&self.cleared);
        let handle = manager.add_clear_observer(&self.tag, move || {
            contributed.store(0, Ordering::Relaxed);
            // a cleared provider no longer affects the count
            if let Some(cleared) = cleared.upgrade() {
                if let Some(handle) = lock(&cleared).take() {
                    handle.unregister();
                }
            }
        });
        *slot = handle.ok();
    }
}

/// Mirrors a tag's state into a widget-like callback.
///
/// Receives `(visible, count)` once on bind and after every change at or
/// below the tag.
pub struct RedDotBinding {
    tag: RedDotTag,
    handle: StateListenerHandle,
}

impl RedDotBinding {
    pub fn bind(
        manager: &mut RedDotManager,
        tag: impl AsRef<str>,
        on_update: impl Fn(bool, u32) + Send + Sync + 'static,
    ) -> RedDotResult<Self> {
        let tag = RedDotTag::new(tag)?;
        manager.register_tag(&tag);

        let on_update = Arc::new(on_update);
        let listener = on_update.clone();
        let handle = manager.add_state_listener(
            &tag,
            move |_, info| listener(info.is_active(), info.count),
            TagMatch::Partial,
            true,
        )?;

        let count = manager.count(&tag);
        on_update(count > 0, count);
        Ok(Self { tag, handle })
    }

    pub fn tag(&self) -> &RedDotTag {
        &self.tag
    }

    pub fn is_bound(&self) -> bool {
        self.handle.is_valid()
    }

    pub fn unbind(&self) {
        self.handle.unregister();
    }
}
