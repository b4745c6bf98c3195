//! One mounted quiz widget: wires markup to the state machine through the
//! resource registry and drives loads, timers and navigation.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::{debug, info, warn};

use quiz_core::model::{AnswerInput, Question, QuestionShape, QuizKind, TimeoutPolicy};
use services::{AppServices, ContinuePlan, LoadError, LoadedStage, QuizMachine, Stage, TimeoutAction};

use super::view::{Elements, QuizView, accepts_text, timer_label};
use crate::dom::{Event, EventKind, Handler, NodeId};
use crate::lifecycle::{ConfirmExit, Navigate, NextQuizUrl};
use crate::page::{NavTarget, Page};
use crate::registry::{ResourceRegistry, TimerId};

const TICK_MS: u64 = 1_000;

/// Host capabilities resolved from the mount options.
pub(crate) struct Host {
    pub navigate: Navigate,
    pub next_quiz_url: NextQuizUrl,
    pub confirm: Rc<dyn ConfirmExit>,
}

pub(crate) struct Controller {
    kind: QuizKind,
    page: Rc<Page>,
    root: NodeId,
    elements: Elements,
    registry: ResourceRegistry,
    services: AppServices,
    host: Host,
    machine: RefCell<QuizMachine>,
    live: Cell<bool>,
    generation: Cell<u64>,
    question_timers: RefCell<Vec<TimerId>>,
    advance_timer: Cell<Option<TimerId>>,
    exit_pending: Cell<bool>,
    reselecting: Cell<bool>,
    leaving: Cell<bool>,
    weak_self: Weak<Controller>,
}

impl Controller {
    /// Register `root` as a scope, resolve markup, wire listeners and start
    /// the first load.
    pub(crate) fn mount(
        kind: QuizKind,
        page: &Rc<Page>,
        root: NodeId,
        services: AppServices,
        host: Host,
    ) -> Rc<Self> {
        let elements = {
            let mut doc = page.document_mut();
            doc.register_scope_root(root);
            Elements::resolve(&doc, root)
        };
        let controller = Rc::new_cyclic(|weak| Self {
            kind,
            page: Rc::clone(page),
            root,
            elements,
            registry: ResourceRegistry::new(Rc::clone(page)),
            services,
            host,
            machine: RefCell::new(QuizMachine::new(kind)),
            live: Cell::new(true),
            generation: Cell::new(0),
            question_timers: RefCell::new(Vec::new()),
            advance_timer: Cell::new(None),
            exit_pending: Cell::new(false),
            reselecting: Cell::new(false),
            leaving: Cell::new(false),
            weak_self: weak.clone(),
        });
        controller.wire();
        info!(kind = %kind, "quiz widget mounted");
        controller.start_load();
        controller
    }

    /// Stop everything this mount owns. Safe to call repeatedly.
    pub(crate) fn teardown(&self) {
        if !self.live.replace(false) {
            return;
        }
        self.generation.set(self.generation.get() + 1);
        self.registry.release_all();
        self.page.document_mut().unregister_scope_root(self.root);
        info!(kind = %self.kind, "quiz widget unmounted");
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.registry.listener_count()
    }

    pub(crate) fn active_timer_count(&self) -> usize {
        self.registry.active_timer_count()
    }

    pub(crate) fn stage(&self) -> Stage {
        self.machine.borrow().stage().clone()
    }

    //
    // ─── WIRING ────────────────────────────────────────────────────────────────
    //

    fn wire(&self) {
        let els = &self.elements;
        self.listen(els.true_button, EventKind::Click, |c, _| {
            c.answer(AnswerInput::Flag(true));
        });
        self.listen(els.false_button, EventKind::Click, |c, _| {
            c.answer(AnswerInput::Flag(false));
        });
        for (index, node) in els.options.iter().enumerate() {
            self.listen(*node, EventKind::Click, move |c, _| {
                c.answer(AnswerInput::Choice(index));
            });
        }
        self.listen(els.submit, EventKind::Click, |c, _| c.submit_typed());
        self.listen(els.answer_input, EventKind::Input, |c, _| c.on_input());
        self.listen(els.next, EventKind::Click, |c, _| c.next());
        self.listen(els.continue_button, EventKind::Click, |c, _| c.continue_quiz());
        self.listen(els.back, EventKind::Click, |c, _| c.request_exit());
        self.listen(els.retry, EventKind::Click, |c, _| c.retry());
        // Keyboard shortcuts listen on the widget root, never the whole page.
        self.listen(Some(self.root), EventKind::KeyDown, |c, event| c.on_key(event));
    }

    fn listen(
        &self,
        node: Option<NodeId>,
        kind: EventKind,
        action: impl Fn(&Controller, &Event) + 'static,
    ) {
        let Some(node) = node else {
            return;
        };
        let weak = self.weak_self.clone();
        let handler: Handler = Rc::new(move |event: &Event| {
            if let Some(controller) = weak.upgrade() {
                if controller.live.get() {
                    action(&controller, event);
                }
            }
        });
        if let Err(err) = self.registry.on(node, kind, handler) {
            warn!(error = %err, ?kind, "listener not registered");
        }
    }

    fn schedule(
        &self,
        delay_ms: u64,
        repeating: bool,
        action: impl Fn(&Controller) + 'static,
    ) -> Option<TimerId> {
        let weak = self.weak_self.clone();
        let callback = Rc::new(move || {
            if let Some(controller) = weak.upgrade() {
                if controller.live.get() {
                    action(&controller);
                }
            }
        });
        let scheduled = if repeating {
            self.registry.set_repeating_timer(delay_ms, callback)
        } else {
            self.registry.set_timer(delay_ms, callback)
        };
        match scheduled {
            Ok(id) => Some(id),
            Err(err) => {
                debug!(error = %err, "timer not scheduled");
                None
            }
        }
    }

    fn cancel_question_timers(&self) {
        let timers = std::mem::take(&mut *self.question_timers.borrow_mut());
        for id in timers {
            self.registry.clear_timer(id);
        }
    }

    fn cancel_advance_timer(&self) {
        if let Some(id) = self.advance_timer.take() {
            self.registry.clear_timer(id);
        }
    }

    fn cancel_stage_timers(&self) {
        self.cancel_question_timers();
        self.cancel_advance_timer();
    }

    fn next_generation(&self) -> u64 {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        generation
    }

    /// A completion from an older load, or one arriving after teardown, is
    /// stale and must not touch state.
    fn is_current(&self, generation: u64) -> bool {
        self.live.get() && self.generation.get() == generation
    }

    //
    // ─── LOADING ───────────────────────────────────────────────────────────────
    //

    fn start_load(&self) {
        if !self.live.get() {
            return;
        }
        if let Err(err) = self.machine.borrow_mut().begin_loading() {
            debug!(error = %err, "load not started");
            return;
        }
        self.cancel_stage_timers();
        self.render();

        let generation = self.next_generation();
        let loader = self.services.loader().clone();
        let kind = self.kind;
        let weak = self.weak_self.clone();
        self.page.spawn(async move {
            let outcome = loader.load_stage(kind).await;
            if let Some(controller) = weak.upgrade() {
                controller.finish_load(generation, outcome);
            }
        });
    }

    fn finish_load(&self, generation: u64, outcome: Result<LoadedStage, LoadError>) {
        if !self.is_current(generation) {
            debug!(kind = %self.kind, "discarding stale load");
            return;
        }
        let now = self.page.now_ms();
        let applied = match outcome {
            Ok(stage) => self
                .machine
                .borrow_mut()
                .load_succeeded(stage.set, stage.questions, now),
            Err(err) => {
                warn!(kind = %self.kind, error = %err, "question data unavailable");
                self.machine.borrow_mut().load_failed(err.user_message())
            }
        };
        if let Err(err) = applied {
            debug!(error = %err, "load outcome rejected");
        }
        self.after_transition();
    }

    fn retry(&self) {
        if matches!(self.stage(), Stage::Error { .. }) {
            info!(kind = %self.kind, "retrying load");
            self.start_load();
        }
    }

    //
    // ─── QUESTIONS ─────────────────────────────────────────────────────────────
    //

    fn enter_question(&self) {
        self.cancel_stage_timers();
        if let Some(input) = self.elements.answer_input {
            self.page.document_mut().set_value(input, "");
        }
        let limit = self.kind.profile().item_limit_ms;
        let tick = self.schedule(TICK_MS, true, Controller::render_timer);
        let deadline = self.schedule(limit, false, Controller::on_timeout);
        self.question_timers
            .borrow_mut()
            .extend(tick.into_iter().chain(deadline));
        self.render();
    }

    fn current_question(&self) -> Option<Question> {
        self.machine.borrow().current_question().cloned()
    }

    /// What is currently typed, parsed for the kind's shape.
    fn typed_input(&self) -> AnswerInput {
        let shape = self.kind.profile().shape;
        if !accepts_text(shape) {
            return AnswerInput::Empty;
        }
        let value = match self.elements.answer_input {
            Some(node) => self.page.document().value(node).unwrap_or_default().to_owned(),
            None => String::new(),
        };
        AnswerInput::from_text(shape, &value)
    }

    fn answer(&self, input: AnswerInput) {
        let Some(question) = self.current_question() else {
            return;
        };
        let fits = match (&input, question.shape()) {
            (AnswerInput::Flag(_), QuestionShape::Word) => true,
            (AnswerInput::Choice(index), QuestionShape::Choice) => *index < question.options().len(),
            _ => false,
        };
        if fits {
            self.submit(input, false);
        }
    }

    fn submit_typed(&self) {
        if !accepts_text(self.kind.profile().shape) {
            return;
        }
        let input = self.typed_input();
        if input.is_empty() && self.kind.profile().timeout == TimeoutPolicy::SubmitIfNonEmpty {
            debug!(kind = %self.kind, "empty response not submitted");
            return;
        }
        self.submit(input, false);
    }

    fn on_input(&self) {
        let expired = {
            let machine = self.machine.borrow();
            machine.is_expired() && machine.stage() == &Stage::Question
        };
        if !expired {
            return;
        }
        let input = self.typed_input();
        if !input.is_empty() {
            self.submit(input, true);
        }
    }

    fn on_timeout(&self) {
        self.cancel_question_timers();
        let pending = self.typed_input();
        let action = self.machine.borrow_mut().on_timeout(&pending);
        match action {
            Ok(TimeoutAction::Submit(input)) => self.submit(input, true),
            Ok(TimeoutAction::Hold) => {
                info!(kind = %self.kind, "time expired; waiting for a response");
                self.render();
            }
            Err(err) => debug!(error = %err, "timeout ignored"),
        }
    }

    fn submit(&self, input: AnswerInput, timed_out: bool) {
        let now = self.page.now_ms();
        let submitted = self
            .machine
            .borrow_mut()
            .submit(input, now, timed_out)
            .map(|_| ());
        if let Err(err) = submitted {
            debug!(error = %err, "submission ignored");
            return;
        }
        self.cancel_question_timers();
        let delay = self.services.auto_advance_ms();
        let timer = self.schedule(delay, false, Controller::next);
        self.advance_timer.set(timer);
        self.render();
    }

    fn next(&self) {
        self.cancel_advance_timer();
        let now = self.page.now_ms();
        let completed_at = self.services.clock().now();
        let advanced = self.machine.borrow_mut().advance(now, completed_at).map(|_| ());
        if let Err(err) = advanced {
            debug!(error = %err, "advance ignored");
            return;
        }
        if self.stage() == Stage::Results {
            self.finish_stage();
        } else {
            self.after_transition();
        }
    }

    fn after_transition(&self) {
        if self.stage() == Stage::Question {
            self.enter_question();
        } else {
            self.render();
        }
    }

    //
    // ─── RESULTS ───────────────────────────────────────────────────────────────
    //

    /// Save the stage's result and count it toward the skill right away, so
    /// an unmount without exit keeps it. Exit and next-skill then flush
    /// nothing for this stage.
    fn finish_stage(&self) {
        let (result, stages) = {
            let mut machine = self.machine.borrow_mut();
            (machine.take_pending_result(), machine.flush_stages())
        };
        if let Some(result) = &result {
            info!(
                kind = %self.kind,
                correct = result.correct,
                total = result.total,
                score = result.session_score,
                "stage completed"
            );
        }
        let progress = self.services.progress().clone();
        let skill = self.kind.skill();
        let total = self.kind.profile().stage_budget;
        self.page.spawn(async move {
            if let Some(result) = result {
                if let Err(err) = progress.record_session(&result).await {
                    warn!(skill = %result.skill, error = %err, "session result not saved");
                }
            }
            if stages > 0 {
                if let Err(err) = progress.increment_progress(&skill, stages, total).await {
                    warn!(skill = %skill, error = %err, "progress not saved");
                }
            }
        });
        self.render();
    }

    fn next_destination(&self) -> Option<String> {
        (self.host.next_quiz_url)(&self.kind.skill())
    }

    fn continue_quiz(&self) {
        if self.leaving.get() || self.reselecting.get() {
            return;
        }
        let has_next = self.next_destination().is_some();
        let plan = self.machine.borrow().continue_plan(has_next);
        match plan {
            Ok(ContinuePlan::Reselect) => self.reselect(),
            Ok(ContinuePlan::Reload) => self.start_load(),
            Ok(ContinuePlan::NextSkill) => self.leave_for_next_skill(),
            Err(err) => debug!(error = %err, "continue ignored"),
        }
    }

    fn reselect(&self) {
        let cached = self.machine.borrow().set().cloned();
        let Some(set) = cached else {
            self.start_load();
            return;
        };
        // Reselection writes the used pool, so only one may be in flight.
        self.reselecting.set(true);
        self.render();
        let generation = self.next_generation();
        let loader = self.services.loader().clone();
        let kind = self.kind;
        let weak = self.weak_self.clone();
        self.page.spawn(async move {
            let outcome = loader.reselect(kind, &set).await;
            if let Some(controller) = weak.upgrade() {
                controller.finish_reselect(generation, outcome);
            }
        });
    }

    fn finish_reselect(&self, generation: u64, outcome: Result<Vec<Question>, LoadError>) {
        self.reselecting.set(false);
        if !self.is_current(generation) {
            debug!(kind = %self.kind, "discarding stale reselection");
            return;
        }
        let now = self.page.now_ms();
        let started = match outcome {
            Ok(questions) => self
                .machine
                .borrow_mut()
                .start_new_stage(questions, now)
                .map_err(|e| e.to_string()),
            Err(err) => Err(err.to_string()),
        };
        match started {
            Ok(()) => self.enter_question(),
            Err(reason) => {
                warn!(kind = %self.kind, reason, "reselection failed; reloading");
                self.start_load();
            }
        }
    }

    //
    // ─── LEAVING ───────────────────────────────────────────────────────────────
    //

    fn leave_for_next_skill(&self) {
        let Some(destination) = self.next_destination() else {
            return;
        };
        self.leaving.set(true);
        self.cancel_stage_timers();
        let count = self.machine.borrow_mut().flush_stages();
        self.leave(count, NavTarget::Destination(destination));
    }

    fn request_exit(&self) {
        if self.exit_pending.get() || self.leaving.get() {
            return;
        }
        self.exit_pending.set(true);
        let confirm = Rc::clone(&self.host.confirm);
        let weak = self.weak_self.clone();
        self.page.spawn(async move {
            let confirmed = confirm.confirm_exit().await;
            if let Some(controller) = weak.upgrade() {
                controller.finish_exit(confirmed);
            }
        });
    }

    fn finish_exit(&self, confirmed: bool) {
        self.exit_pending.set(false);
        if !self.live.get() {
            return;
        }
        if !confirmed {
            debug!(kind = %self.kind, "exit cancelled");
            return;
        }
        self.leaving.set(true);
        self.cancel_stage_timers();
        let count = self.machine.borrow_mut().exit();
        self.render();
        self.leave(count, NavTarget::Back);
    }

    /// Persist any stages not yet counted, then navigate if still mounted.
    fn leave(&self, stages: u32, target: NavTarget) {
        let progress = self.services.progress().clone();
        let skill = self.kind.skill();
        let total = self.kind.profile().stage_budget;
        let navigate = Rc::clone(&self.host.navigate);
        let weak = self.weak_self.clone();
        self.page.spawn(async move {
            if stages > 0 {
                if let Err(err) = progress.increment_progress(&skill, stages, total).await {
                    warn!(skill = %skill, error = %err, "progress not saved");
                }
            }
            let mounted = weak.upgrade().is_some_and(|c| c.live.get());
            if mounted {
                info!(?target, "leaving quiz");
                navigate(target);
            }
        });
    }

    //
    // ─── KEYBOARD ──────────────────────────────────────────────────────────────
    //

    fn on_key(&self, event: &Event) {
        let Some(key) = event.key.as_deref() else {
            return;
        };
        let visible = |panel: Option<NodeId>| {
            panel.is_some_and(|node| self.page.document().is_visible(node))
        };
        match self.stage() {
            Stage::Question if visible(self.elements.question) => self.on_question_key(key),
            Stage::Feedback if visible(self.elements.feedback) && key == "Enter" => self.next(),
            Stage::Results if visible(self.elements.results) && key == "Enter" => {
                self.continue_quiz();
            }
            _ => {}
        }
    }

    fn on_question_key(&self, key: &str) {
        match (self.kind.profile().shape, key) {
            (QuestionShape::Word, "t" | "T") => self.answer(AnswerInput::Flag(true)),
            (QuestionShape::Word, "f" | "F") => self.answer(AnswerInput::Flag(false)),
            (QuestionShape::Choice, digit) => {
                if let Some(index) = digit.parse::<usize>().ok().and_then(|d| d.checked_sub(1)) {
                    self.answer(AnswerInput::Choice(index));
                }
            }
            (shape, "Enter") if accepts_text(shape) => self.submit_typed(),
            _ => {}
        }
    }

    //
    // ─── RENDERING ─────────────────────────────────────────────────────────────
    //

    fn render(&self) {
        let has_next = self.next_destination().is_some();
        let view = {
            let machine = self.machine.borrow();
            let can_continue = !self.leaving.get()
                && !self.reselecting.get()
                && machine.can_continue(has_next);
            QuizView::build(&machine, self.page.now_ms(), can_continue)
        };
        view.apply(&mut self.page.document_mut(), &self.elements);
    }

    fn render_timer(&self) {
        let Some(node) = self.elements.timer else {
            return;
        };
        let label = timer_label(&self.machine.borrow(), self.page.now_ms());
        self.page.document_mut().set_text(node, label);
    }
}
