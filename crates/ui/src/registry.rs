//! Per-mount ownership of listeners and timers.
//!
//! Timers are local tokio tasks sleeping on `tokio::time`; cancelling one
//! aborts its task.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use tokio::task::AbortHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use crate::dom::{DomError, EventKind, Handler, ListenerId, NodeId};
use crate::page::Page;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

pub type TimerCallback = Rc<dyn Fn()>;

#[derive(Default)]
struct Owned {
    listeners: Vec<ListenerId>,
    timers: BTreeMap<TimerId, AbortHandle>,
    next_timer: u64,
    released: bool,
}

/// Tracks every listener and timer one widget mount creates and releases
/// them together. Releasing twice is a no-op, and nothing can be registered
/// after release.
pub struct ResourceRegistry {
    page: Rc<Page>,
    owned: RefCell<Owned>,
}

impl ResourceRegistry {
    #[must_use]
    pub fn new(page: Rc<Page>) -> Self {
        Self {
            page,
            owned: RefCell::new(Owned::default()),
        }
    }

    /// # Errors
    ///
    /// Returns `DomError::Released` after release, or the page's error when
    /// the element is unknown.
    pub fn on(&self, node: NodeId, kind: EventKind, handler: Handler) -> Result<ListenerId, DomError> {
        self.ensure_live()?;
        let id = self.page.add_listener(node, kind, handler)?;
        self.owned.borrow_mut().listeners.push(id);
        Ok(id)
    }

    /// Run `callback` once after `delay_ms`.
    ///
    /// # Errors
    ///
    /// Returns `DomError::Released` after release.
    pub fn set_timer(&self, delay_ms: u64, callback: TimerCallback) -> Result<TimerId, DomError> {
        self.ensure_live()?;
        let delay = Duration::from_millis(delay_ms);
        let handle = self.page.spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        });
        Ok(self.track_timer(handle))
    }

    /// Run `callback` every `interval_ms`, first after one full interval.
    ///
    /// # Errors
    ///
    /// Returns `DomError::Released` after release.
    pub fn set_repeating_timer(
        &self,
        interval_ms: u64,
        callback: TimerCallback,
    ) -> Result<TimerId, DomError> {
        self.ensure_live()?;
        let period = Duration::from_millis(interval_ms.max(1));
        let handle = self.page.spawn(async move {
            let mut ticks = tokio::time::interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticks.tick().await;
                callback();
            }
        });
        Ok(self.track_timer(handle))
    }

    /// Cancel one owned timer early. Returns false if it already fired.
    pub fn clear_timer(&self, id: TimerId) -> bool {
        let handle = self.owned.borrow_mut().timers.remove(&id);
        match handle {
            Some(handle) => {
                let pending = !handle.is_finished();
                handle.abort();
                pending
            }
            None => false,
        }
    }

    /// Remove every owned listener and cancel every owned timer.
    ///
    /// Listeners that are already gone (their element was removed) are
    /// skipped without stopping the rest.
    pub fn release_all(&self) {
        let (listeners, timers) = {
            let mut owned = self.owned.borrow_mut();
            if owned.released {
                return;
            }
            owned.released = true;
            (
                std::mem::take(&mut owned.listeners),
                std::mem::take(&mut owned.timers),
            )
        };
        let counts = (listeners.len(), timers.len());
        for id in listeners {
            if let Err(err) = self.page.remove_listener(id) {
                debug!(error = %err, "listener already removed");
            }
        }
        for handle in timers.into_values() {
            handle.abort();
        }
        debug!(listeners = counts.0, timers = counts.1, "resources released");
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.owned.borrow().released
    }

    /// Owned listeners still attached to the page.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        let document = self.page.document();
        self.owned
            .borrow()
            .listeners
            .iter()
            .filter(|id| document.has_listener(**id))
            .count()
    }

    /// Owned timers that are still scheduled.
    #[must_use]
    pub fn active_timer_count(&self) -> usize {
        self.owned
            .borrow()
            .timers
            .values()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    fn ensure_live(&self) -> Result<(), DomError> {
        if self.owned.borrow().released {
            return Err(DomError::Released);
        }
        Ok(())
    }

    fn track_timer(&self, handle: AbortHandle) -> TimerId {
        let mut owned = self.owned.borrow_mut();
        owned.timers.retain(|_, h| !h.is_finished());
        let id = TimerId(owned.next_timer);
        owned.next_timer += 1;
        owned.timers.insert(id, handle);
        id
    }
}
