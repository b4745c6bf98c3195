use chrono::{DateTime, Utc};
use tracing::debug;

use quiz_core::model::{
    AnswerInput, Question, QuestionSet, QuizKind, SessionAnswer, SessionResult, TimeoutPolicy,
};
use quiz_core::scoring::score_session;

use super::state::{ContinuePlan, Stage, TimeoutAction};
use crate::error::MachineError;

/// Drives one widget through loading, questions, feedback and results.
///
/// Times are milliseconds on the host's timer clock; only elapsed differences
/// matter. `current_index` never exceeds the number of stage questions.
#[derive(Debug, Clone)]
pub struct QuizMachine {
    kind: QuizKind,
    stage: Stage,
    set: Option<QuestionSet>,
    questions: Vec<Question>,
    current: usize,
    answers: Vec<SessionAnswer>,
    question_started_ms: u64,
    expired: bool,
    stages_completed: u32,
    stages_flushed: u32,
    pending_result: Option<SessionResult>,
    last_result: Option<SessionResult>,
}

impl QuizMachine {
    #[must_use]
    pub fn new(kind: QuizKind) -> Self {
        Self {
            kind,
            stage: Stage::Loading,
            set: None,
            questions: Vec::new(),
            current: 0,
            answers: Vec::new(),
            question_started_ms: 0,
            expired: false,
            stages_completed: 0,
            stages_flushed: 0,
            pending_result: None,
            last_result: None,
        }
    }

    //
    // ─── ACCESSORS ─────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn kind(&self) -> QuizKind {
        self.kind
    }

    #[must_use]
    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    /// Cached question set, once one has loaded.
    #[must_use]
    pub fn set(&self) -> Option<&QuestionSet> {
        self.set.as_ref()
    }

    #[must_use]
    pub fn title(&self) -> String {
        self.set
            .as_ref()
            .and_then(QuestionSet::title)
            .map_or_else(|| self.kind.profile().skill.to_owned(), str::to_owned)
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current)
    }

    #[must_use]
    pub fn answers(&self) -> &[SessionAnswer] {
        &self.answers
    }

    #[must_use]
    pub fn last_answer(&self) -> Option<&SessionAnswer> {
        self.answers.last()
    }

    #[must_use]
    pub fn correct_count(&self) -> usize {
        self.answers
            .iter()
            .filter(|answer| answer.correct == Some(true))
            .count()
    }

    #[must_use]
    pub fn stages_completed(&self) -> u32 {
        self.stages_completed
    }

    /// Stages finished but not yet added to persisted progress.
    #[must_use]
    pub fn unflushed_stages(&self) -> u32 {
        self.stages_completed - self.stages_flushed
    }

    /// True after a hold-on-timeout; the next non-empty input submits.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expired
    }

    /// Result of the most recently finished stage.
    #[must_use]
    pub fn last_result(&self) -> Option<&SessionResult> {
        self.last_result.as_ref()
    }

    /// Time left on the current question.
    #[must_use]
    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        let elapsed = now_ms.saturating_sub(self.question_started_ms);
        self.kind.profile().item_limit_ms.saturating_sub(elapsed)
    }

    //
    // ─── LOADING ───────────────────────────────────────────────────────────────
    //

    /// Enter `Loading` for the first load, a retry, or a reload from results.
    ///
    /// # Errors
    ///
    /// Returns `MachineError::InvalidTransition` from any other stage.
    pub fn begin_loading(&mut self) -> Result<(), MachineError> {
        match self.stage {
            Stage::Loading | Stage::Error { .. } | Stage::Results => {
                self.stage = Stage::Loading;
                Ok(())
            }
            _ => Err(self.invalid("load")),
        }
    }

    /// Accept a loaded set and the stage's selected questions.
    ///
    /// An empty selection moves the machine to `Error` instead of `Question`.
    ///
    /// # Errors
    ///
    /// Returns `MachineError::EmptySelection` for an empty selection and
    /// `MachineError::InvalidTransition` outside `Loading`.
    pub fn load_succeeded(
        &mut self,
        set: QuestionSet,
        questions: Vec<Question>,
        now_ms: u64,
    ) -> Result<(), MachineError> {
        if self.stage != Stage::Loading {
            return Err(self.invalid("finish loading"));
        }
        self.set = Some(set);
        if questions.is_empty() {
            self.stage = Stage::Error {
                message: MachineError::EmptySelection.to_string(),
            };
            return Err(MachineError::EmptySelection);
        }
        self.start_stage(questions, now_ms);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `MachineError::InvalidTransition` outside `Loading`.
    pub fn load_failed(&mut self, message: impl Into<String>) -> Result<(), MachineError> {
        if self.stage != Stage::Loading {
            return Err(self.invalid("fail loading"));
        }
        self.stage = Stage::Error {
            message: message.into(),
        };
        Ok(())
    }

    //
    // ─── ANSWERING ─────────────────────────────────────────────────────────────
    //

    /// Record an answer for the current question and show feedback.
    ///
    /// # Errors
    ///
    /// Returns `MachineError::InvalidTransition` outside `Question`.
    pub fn submit(
        &mut self,
        input: AnswerInput,
        now_ms: u64,
        timed_out: bool,
    ) -> Result<&SessionAnswer, MachineError> {
        if self.stage != Stage::Question {
            return Err(self.invalid("submit"));
        }
        let Some(question) = self.questions.get(self.current) else {
            return Err(self.invalid("submit"));
        };
        let answer = SessionAnswer {
            question_id: question.id.clone(),
            correct: question.evaluate(&input),
            input,
            elapsed_ms: now_ms.saturating_sub(self.question_started_ms),
            timed_out: timed_out || self.expired,
        };
        debug!(
            kind = %self.kind,
            index = self.current,
            correct = ?answer.correct,
            timed_out = answer.timed_out,
            "answer recorded"
        );
        self.expired = false;
        self.answers.push(answer);
        self.stage = Stage::Feedback;
        Ok(&self.answers[self.answers.len() - 1])
    }

    /// Apply the kind's timeout policy to whatever is currently entered.
    ///
    /// # Errors
    ///
    /// Returns `MachineError::InvalidTransition` outside `Question`.
    pub fn on_timeout(&mut self, pending: &AnswerInput) -> Result<TimeoutAction, MachineError> {
        if self.stage != Stage::Question {
            return Err(self.invalid("time out"));
        }
        match self.kind.profile().timeout {
            TimeoutPolicy::SubmitOrSkip => Ok(TimeoutAction::Submit(pending.clone())),
            TimeoutPolicy::SubmitIfNonEmpty if !pending.is_empty() => {
                Ok(TimeoutAction::Submit(pending.clone()))
            }
            TimeoutPolicy::SubmitIfNonEmpty => {
                self.expired = true;
                Ok(TimeoutAction::Hold)
            }
        }
    }

    /// Leave feedback for the next question, or for results after the last.
    ///
    /// Reaching results scores the stage; see [`Self::take_pending_result`].
    ///
    /// # Errors
    ///
    /// Returns `MachineError::InvalidTransition` outside `Feedback`.
    pub fn advance(
        &mut self,
        now_ms: u64,
        completed_at: DateTime<Utc>,
    ) -> Result<&Stage, MachineError> {
        if self.stage != Stage::Feedback {
            return Err(self.invalid("advance"));
        }
        self.current = (self.current + 1).min(self.questions.len());
        if self.current < self.questions.len() {
            self.question_started_ms = now_ms;
            self.stage = Stage::Question;
        } else {
            let result = score_session(self.kind, &self.answers, &self.questions, completed_at);
            self.stages_completed += 1;
            self.last_result = Some(result.clone());
            self.pending_result = Some(result);
            self.stage = Stage::Results;
        }
        Ok(&self.stage)
    }

    /// The finished stage's result, handed out once for persisting.
    pub fn take_pending_result(&mut self) -> Option<SessionResult> {
        self.pending_result.take()
    }

    //
    // ─── CONTINUING AND EXITING ────────────────────────────────────────────────
    //

    /// Whether "continue" has somewhere to go.
    #[must_use]
    pub fn can_continue(&self, has_next_skill: bool) -> bool {
        self.stage == Stage::Results && (self.within_budget() || has_next_skill)
    }

    /// # Errors
    ///
    /// Returns `MachineError::NoContinuation` when the budget is used up and
    /// there is no next skill, and `MachineError::InvalidTransition` outside
    /// `Results`.
    pub fn continue_plan(&self, has_next_skill: bool) -> Result<ContinuePlan, MachineError> {
        if self.stage != Stage::Results {
            return Err(self.invalid("continue"));
        }
        if !self.within_budget() {
            return if has_next_skill {
                Ok(ContinuePlan::NextSkill)
            } else {
                Err(MachineError::NoContinuation)
            };
        }
        Ok(if self.set.is_some() {
            ContinuePlan::Reselect
        } else {
            ContinuePlan::Reload
        })
    }

    /// Begin another stage of the same kind with freshly selected questions.
    ///
    /// # Errors
    ///
    /// Returns `MachineError::EmptySelection` for an empty selection and
    /// `MachineError::InvalidTransition` outside `Results`.
    pub fn start_new_stage(
        &mut self,
        questions: Vec<Question>,
        now_ms: u64,
    ) -> Result<(), MachineError> {
        if self.stage != Stage::Results {
            return Err(self.invalid("start a new stage"));
        }
        if questions.is_empty() {
            return Err(MachineError::EmptySelection);
        }
        self.start_stage(questions, now_ms);
        Ok(())
    }

    /// Mark finished stages as persisted and return how many were pending.
    pub fn flush_stages(&mut self) -> u32 {
        let pending = self.unflushed_stages();
        self.stages_flushed = self.stages_completed;
        pending
    }

    /// Enter the terminal stage. Returns stages still to be persisted.
    pub fn exit(&mut self) -> u32 {
        if self.stage.is_terminal() {
            return 0;
        }
        self.stage = Stage::Exited;
        self.flush_stages()
    }

    fn start_stage(&mut self, questions: Vec<Question>, now_ms: u64) {
        self.questions = questions;
        self.current = 0;
        self.answers.clear();
        self.expired = false;
        self.question_started_ms = now_ms;
        self.stage = Stage::Question;
    }

    fn within_budget(&self) -> bool {
        self.stages_completed < self.kind.profile().stage_budget
    }

    fn invalid(&self, action: &'static str) -> MachineError {
        MachineError::InvalidTransition {
            stage: self.stage.name(),
            action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{QuestionBody, QuestionId, QuestionShape, SetConfig, SubScore};
    use quiz_core::time::fixed_now;

    fn word(i: usize, is_real: bool) -> Question {
        Question::new(
            QuestionId::positional(i),
            QuestionBody::Word {
                word: format!("word{i}"),
                is_real,
                audio_url: None,
            },
        )
    }

    fn words(n: usize) -> Vec<Question> {
        (0..n).map(|i| word(i, true)).collect()
    }

    fn set(questions: &[Question]) -> QuestionSet {
        QuestionSet::new(QuestionShape::Word, questions.to_vec(), SetConfig::default()).unwrap()
    }

    fn loaded(kind: QuizKind, n: usize) -> QuizMachine {
        let questions = words(n);
        let mut machine = QuizMachine::new(kind);
        machine
            .load_succeeded(set(&questions), questions, 0)
            .unwrap();
        machine
    }

    fn play_stage(machine: &mut QuizMachine, correct: usize) {
        let total = machine.question_count();
        for i in 0..total {
            machine
                .submit(AnswerInput::Flag(i < correct), 1_000, false)
                .unwrap();
            machine.advance(1_000, fixed_now()).unwrap();
        }
    }

    #[test]
    fn starts_loading_and_moves_to_question() {
        let machine = loaded(QuizKind::ReadAndSelect, 3);
        assert_eq!(machine.stage(), &Stage::Question);
        assert_eq!(machine.current_index(), 0);
        assert_eq!(machine.current_question().map(|q| q.id.as_str()), Some("q0"));
    }

    #[test]
    fn empty_selection_lands_in_error() {
        let mut machine = QuizMachine::new(QuizKind::ReadAndSelect);
        let err = machine
            .load_succeeded(set(&words(1)), Vec::new(), 0)
            .unwrap_err();
        assert_eq!(err, MachineError::EmptySelection);
        assert!(matches!(machine.stage(), Stage::Error { .. }));
    }

    #[test]
    fn retry_from_error_returns_to_loading() {
        let mut machine = QuizMachine::new(QuizKind::ReadAndSelect);
        machine.load_failed("offline").unwrap();
        assert_eq!(
            machine.stage(),
            &Stage::Error {
                message: "offline".into()
            }
        );
        machine.begin_loading().unwrap();
        assert_eq!(machine.stage(), &Stage::Loading);
    }

    #[test]
    fn submit_outside_question_is_refused() {
        let mut machine = QuizMachine::new(QuizKind::ReadAndSelect);
        let err = machine.submit(AnswerInput::Flag(true), 0, false).unwrap_err();
        assert_eq!(
            err,
            MachineError::InvalidTransition {
                stage: "loading",
                action: "submit"
            }
        );
    }

    #[test]
    fn double_submit_is_refused() {
        let mut machine = loaded(QuizKind::ReadAndSelect, 2);
        machine.submit(AnswerInput::Flag(true), 10, false).unwrap();
        assert!(machine.submit(AnswerInput::Flag(true), 20, false).is_err());
        assert_eq!(machine.answers().len(), 1);
    }

    #[test]
    fn submit_records_elapsed_and_correctness() {
        let mut machine = loaded(QuizKind::ReadAndSelect, 2);
        let answer = machine.submit(AnswerInput::Flag(false), 1_250, false).unwrap();
        assert_eq!(answer.correct, Some(false));
        assert_eq!(answer.elapsed_ms, 1_250);
        assert_eq!(machine.stage(), &Stage::Feedback);
    }

    #[test]
    fn fifteen_of_twenty_scores_seventy_five() {
        let mut machine = loaded(QuizKind::ReadAndSelect, 20);
        play_stage(&mut machine, 15);

        assert_eq!(machine.stage(), &Stage::Results);
        assert_eq!(machine.current_index(), machine.question_count());
        assert_eq!(machine.stages_completed(), 1);
        let result = machine.take_pending_result().unwrap();
        assert_eq!(result.correct, 15);
        assert_eq!(result.total, 20);
        assert!((result.sub_score(SubScore::Accuracy) - 75.0).abs() < 1e-9);
        assert!(machine.take_pending_result().is_none());
        assert!(machine.last_result().is_some());
    }

    #[test]
    fn skip_policy_submits_empty_input() {
        let mut machine = loaded(QuizKind::ReadAndSelect, 2);
        let action = machine.on_timeout(&AnswerInput::Empty).unwrap();
        assert_eq!(action, TimeoutAction::Submit(AnswerInput::Empty));
    }

    #[test]
    fn writing_policy_holds_until_input() {
        let mut machine = QuizMachine::new(QuizKind::WriteAboutPhoto);
        let question = Question::new(
            QuestionId::new("p1"),
            QuestionBody::Writing {
                prompt: "Describe the photo".into(),
                image_url: None,
                sample: "A dog runs".into(),
                min_words: None,
            },
        );
        let set = QuestionSet::new(
            QuestionShape::Writing,
            vec![question.clone()],
            SetConfig::default(),
        )
        .unwrap();
        machine.load_succeeded(set, vec![question], 0).unwrap();

        assert_eq!(
            machine.on_timeout(&AnswerInput::Empty).unwrap(),
            TimeoutAction::Hold
        );
        assert!(machine.is_expired());
        assert_eq!(machine.stage(), &Stage::Question);

        let answer = machine
            .submit(AnswerInput::Text("A dog".into()), 70_000, false)
            .unwrap();
        assert!(answer.timed_out);
        assert!(!machine.is_expired());
    }

    #[test]
    fn continue_reselects_within_budget_then_moves_on() {
        let mut machine = loaded(QuizKind::WritingSample, 1);
        // writing_sample allows two stages.
        machine
            .submit(AnswerInput::Text("essay".into()), 0, false)
            .unwrap();
        machine.advance(0, fixed_now()).unwrap();
        assert!(machine.can_continue(false));
        assert_eq!(machine.continue_plan(false), Ok(ContinuePlan::Reselect));

        machine.start_new_stage(words_as_writing(), 0).unwrap();
        machine
            .submit(AnswerInput::Text("essay".into()), 0, false)
            .unwrap();
        machine.advance(0, fixed_now()).unwrap();

        assert_eq!(machine.stages_completed(), 2);
        assert!(!machine.can_continue(false));
        assert_eq!(machine.continue_plan(false), Err(MachineError::NoContinuation));
        assert_eq!(machine.continue_plan(true), Ok(ContinuePlan::NextSkill));
    }

    fn words_as_writing() -> Vec<Question> {
        vec![Question::new(
            QuestionId::new("w2"),
            QuestionBody::Writing {
                prompt: "Write more".into(),
                image_url: None,
                sample: String::new(),
                min_words: None,
            },
        )]
    }

    #[test]
    fn exit_flushes_each_stage_once() {
        let mut machine = loaded(QuizKind::ReadAndSelect, 2);
        play_stage(&mut machine, 2);
        assert_eq!(machine.unflushed_stages(), 1);
        assert_eq!(machine.flush_stages(), 1);
        assert_eq!(machine.exit(), 0);
        assert_eq!(machine.stage(), &Stage::Exited);
        assert_eq!(machine.exit(), 0);
    }

    #[test]
    fn reload_without_cached_set_is_planned() {
        let mut machine = loaded(QuizKind::ReadAndSelect, 1);
        play_stage(&mut machine, 1);
        machine.set = None;
        assert_eq!(machine.continue_plan(false), Ok(ContinuePlan::Reload));
        machine.begin_loading().unwrap();
        assert_eq!(machine.stage(), &Stage::Loading);
    }

    #[test]
    fn title_falls_back_to_skill_name() {
        let machine = loaded(QuizKind::ReadAndSelect, 1);
        assert_eq!(machine.title(), "Read and Select");
    }
}
