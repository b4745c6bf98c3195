//! The mount contract: `init(root, options)` returns an idempotent cleanup.

use std::cell::Cell;
use std::rc::Rc;

use async_trait::async_trait;
use tracing::{debug, warn};

use quiz_core::model::{QuizKind, SkillName};
use services::{AppServices, Stage};

use crate::dom::NodeId;
use crate::page::{NavTarget, Page};
use crate::widget::controller::{Controller, Host};

pub type Navigate = Rc<dyn Fn(NavTarget)>;
pub type NextQuizUrl = Rc<dyn Fn(&SkillName) -> Option<String>>;

/// Host capabilities. Anything left `None` falls back to a default.
#[derive(Clone, Default)]
pub struct WidgetOptions {
    /// Defaults to the page's full-page navigation.
    pub navigate: Option<Navigate>,
    /// Defaults to [`default_next_quiz_url`].
    pub next_quiz_url: Option<NextQuizUrl>,
}

/// Asked before leaving a widget.
#[async_trait(?Send)]
pub trait ConfirmExit {
    async fn confirm_exit(&self) -> bool;
}

/// Always answers the same way.
#[derive(Clone, Copy, Debug)]
pub struct FixedConfirm(pub bool);

#[async_trait(?Send)]
impl ConfirmExit for FixedConfirm {
    async fn confirm_exit(&self) -> bool {
        self.0
    }
}

/// Route of the kind after `skill` in the default skill order.
#[must_use]
pub fn default_next_quiz_url(skill: &SkillName) -> Option<String> {
    let next = QuizKind::from_skill(skill)?.next()?;
    Some(quiz_url(next))
}

#[must_use]
pub fn quiz_url(kind: QuizKind) -> String {
    format!("/quiz/{}", kind.slug())
}

/// A mountable quiz widget of one kind.
#[derive(Clone)]
pub struct QuizModule {
    kind: QuizKind,
    services: AppServices,
    confirm: Rc<dyn ConfirmExit>,
}

impl QuizModule {
    #[must_use]
    pub fn new(kind: QuizKind, services: AppServices, confirm: Rc<dyn ConfirmExit>) -> Self {
        Self {
            kind,
            services,
            confirm,
        }
    }

    #[must_use]
    pub fn kind(&self) -> QuizKind {
        self.kind
    }

    /// Mount on `root` and start loading. A missing or detached root yields a
    /// no-op cleanup.
    pub fn init(&self, page: &Rc<Page>, root: Option<NodeId>, options: WidgetOptions) -> Cleanup {
        let Some(root) = root else {
            debug!(kind = %self.kind, "no mount root; widget not started");
            return Cleanup::noop();
        };
        if !page.document().contains(root) {
            warn!(kind = %self.kind, ?root, "mount root is not attached; widget not started");
            return Cleanup::noop();
        }

        let navigate = options.navigate.unwrap_or_else(|| {
            let page = Rc::downgrade(page);
            Rc::new(move |target: NavTarget| {
                if let Some(page) = page.upgrade() {
                    page.navigate(target);
                }
            })
        });
        let next_quiz_url = options
            .next_quiz_url
            .unwrap_or_else(|| Rc::new(default_next_quiz_url));
        let host = Host {
            navigate,
            next_quiz_url,
            confirm: Rc::clone(&self.confirm),
        };
        let controller = Controller::mount(self.kind, page, root, self.services.clone(), host);
        Cleanup {
            controller: Some(controller),
            called: Cell::new(false),
        }
    }
}

/// Releases everything one mount created. Calling it again does nothing.
pub struct Cleanup {
    controller: Option<Rc<Controller>>,
    called: Cell<bool>,
}

impl Cleanup {
    #[must_use]
    pub fn noop() -> Self {
        Self {
            controller: None,
            called: Cell::new(false),
        }
    }

    pub fn call(&self) {
        if self.called.replace(true) {
            return;
        }
        if let Some(controller) = &self.controller {
            controller.teardown();
        }
    }

    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.controller.is_none()
    }

    #[must_use]
    pub fn was_called(&self) -> bool {
        self.called.get()
    }

    /// Listeners this mount still has on the page.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.controller
            .as_ref()
            .map_or(0, |c| c.listener_count())
    }

    /// Timers this mount still has scheduled.
    #[must_use]
    pub fn active_timer_count(&self) -> usize {
        self.controller
            .as_ref()
            .map_or(0, |c| c.active_timer_count())
    }

    /// Current stage, for hosts that mirror it elsewhere.
    #[must_use]
    pub fn stage(&self) -> Option<Stage> {
        self.controller.as_ref().map(|c| c.stage())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_url_follows_skill_order() {
        let skill = QuizKind::ReadAndSelect.skill();
        assert_eq!(
            default_next_quiz_url(&skill).as_deref(),
            Some("/quiz/listen_and_select")
        );
        let last = QuizKind::WritingSample.skill();
        assert_eq!(default_next_quiz_url(&last), None);
        let unknown = SkillName::new("Juggling").unwrap();
        assert_eq!(default_next_quiz_url(&unknown), None);
    }
}
