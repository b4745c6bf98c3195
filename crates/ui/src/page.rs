//! The host page: document, clock, local tasks and navigation.

use std::cell::{Ref, RefCell, RefMut};
use std::future::Future;
use std::rc::Rc;

use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::dom::{DomError, Event, EventKind, Handler, ListenerId, NodeId};
use crate::dom::Document;

/// Where a widget asks the host to go.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NavTarget {
    Destination(String),
    /// Go back one entry in the host's history.
    Back,
}

/// Single-threaded page shared by every widget mounted on it.
///
/// Tasks run on the current `tokio::task::LocalSet`.
pub struct Page {
    document: RefCell<Document>,
    created: Instant,
    navigations: RefCell<Vec<NavTarget>>,
}

impl Page {
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            document: RefCell::new(Document::new()),
            created: Instant::now(),
            navigations: RefCell::new(Vec::new()),
        })
    }

    /// # Panics
    ///
    /// Panics if the document is already mutably borrowed, i.e. when called
    /// from inside a `document_mut` scope.
    pub fn document(&self) -> Ref<'_, Document> {
        self.document.borrow()
    }

    /// # Panics
    ///
    /// Panics if the document is already borrowed.
    pub fn document_mut(&self) -> RefMut<'_, Document> {
        self.document.borrow_mut()
    }

    /// Milliseconds since the page was created, on the tokio clock.
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        u64::try_from(self.created.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    //
    // ─── TASKS ─────────────────────────────────────────────────────────────────
    //

    /// Run `future` on the current local task set.
    ///
    /// # Panics
    ///
    /// Panics when called outside a `tokio::task::LocalSet` context.
    pub fn spawn(&self, future: impl Future<Output = ()> + 'static) -> AbortHandle {
        tokio::task::spawn_local(future).abort_handle()
    }

    //
    // ─── EVENTS ────────────────────────────────────────────────────────────────
    //

    /// # Errors
    ///
    /// Returns `DomError::UnknownNode` for an invalid handle.
    pub fn add_listener(
        &self,
        node: NodeId,
        kind: EventKind,
        handler: Handler,
    ) -> Result<ListenerId, DomError> {
        self.document.borrow_mut().add_listener(node, kind, handler)
    }

    /// # Errors
    ///
    /// Returns `DomError::UnknownListener` if it is already gone.
    pub fn remove_listener(&self, id: ListenerId) -> Result<(), DomError> {
        self.document.borrow_mut().remove_listener(id)
    }

    /// Deliver `event` to its target, then to each ancestor.
    ///
    /// A listener removed by an earlier handler during the same dispatch is
    /// skipped.
    pub fn dispatch(&self, event: &Event) {
        let path = self
            .document
            .borrow()
            .propagation_path(event.target, event.kind);
        for (id, handler) in path {
            if self.document.borrow().has_listener(id) {
                handler(event);
            }
        }
    }

    pub fn click(&self, node: NodeId) {
        self.dispatch(&Event {
            kind: EventKind::Click,
            target: node,
            key: None,
        });
    }

    /// Replace an input's value and fire `Input` on it.
    pub fn input(&self, node: NodeId, value: &str) {
        self.document.borrow_mut().set_value(node, value);
        self.dispatch(&Event {
            kind: EventKind::Input,
            target: node,
            key: None,
        });
    }

    pub fn key_down(&self, node: NodeId, key: &str) {
        self.dispatch(&Event {
            kind: EventKind::KeyDown,
            target: node,
            key: Some(key.to_owned()),
        });
    }

    //
    // ─── NAVIGATION ────────────────────────────────────────────────────────────
    //

    /// Default full-page navigation: recorded for the host to act on.
    pub fn navigate(&self, target: NavTarget) {
        info!(?target, "page navigation");
        self.navigations.borrow_mut().push(target);
    }

    #[must_use]
    pub fn navigations(&self) -> Vec<NavTarget> {
        self.navigations.borrow().clone()
    }

    /// Remove and return recorded navigations.
    pub fn take_navigations(&self) -> Vec<NavTarget> {
        let taken = std::mem::take(&mut *self.navigations.borrow_mut());
        if !taken.is_empty() {
            debug!(count = taken.len(), "navigations taken");
        }
        taken
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::Duration;
    use tokio::task::LocalSet;

    #[test]
    fn events_bubble_to_ancestors() {
        let page = Page::new();
        let (outer, inner) = {
            let mut doc = page.document_mut();
            let body = doc.body();
            let outer = doc.append_new(body, "div", Some("outer")).unwrap();
            let inner = doc.append_new(outer, "button", Some("inner")).unwrap();
            (outer, inner)
        };
        let hits = Rc::new(Cell::new(0));
        for node in [outer, inner] {
            let hits = Rc::clone(&hits);
            page.add_listener(node, EventKind::Click, Rc::new(move |_: &Event| hits.set(hits.get() + 1)))
                .unwrap();
        }
        page.click(inner);
        assert_eq!(hits.get(), 2);
        page.click(outer);
        assert_eq!(hits.get(), 3);
    }

    #[test]
    fn listener_removed_mid_dispatch_is_skipped() {
        let page = Page::new();
        let node = {
            let mut doc = page.document_mut();
            let body = doc.body();
            doc.append_new(body, "button", Some("b")).unwrap()
        };
        let second_ran = Rc::new(Cell::new(false));
        let second_id = Rc::new(Cell::new(None));
        let first = {
            let page = Rc::downgrade(&page);
            let second_id = Rc::clone(&second_id);
            Rc::new(move |_: &Event| {
                if let (Some(page), Some(id)) = (page.upgrade(), second_id.get()) {
                    let _ = page.remove_listener(id);
                }
            })
        };
        page.add_listener(node, EventKind::Click, first).unwrap();
        let ran = Rc::clone(&second_ran);
        let id = page
            .add_listener(node, EventKind::Click, Rc::new(move |_: &Event| ran.set(true)))
            .unwrap();
        second_id.set(Some(id));

        page.click(node);
        assert!(!second_ran.get());
    }

    #[tokio::test(start_paused = true)]
    async fn clock_follows_tokio_time() {
        let page = Page::new();
        assert_eq!(page.now_ms(), 0);
        tokio::time::advance(Duration::from_millis(1_500)).await;
        assert_eq!(page.now_ms(), 1_500);
    }

    #[tokio::test]
    async fn spawned_tasks_run_on_the_local_set() {
        let page = Page::new();
        let done = Rc::new(Cell::new(false));
        let local = LocalSet::new();
        {
            let _guard = local.enter();
            let flag = Rc::clone(&done);
            page.spawn(async move { flag.set(true) });
        }
        assert!(!done.get());
        local.await;
        assert!(done.get());
    }

    #[test]
    fn navigation_is_recorded() {
        let page = Page::new();
        page.navigate(NavTarget::Destination("/quiz/read_and_select".into()));
        page.navigate(NavTarget::Back);
        assert_eq!(page.take_navigations().len(), 2);
        assert!(page.navigations().is_empty());
    }
}
