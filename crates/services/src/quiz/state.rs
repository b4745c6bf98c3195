use quiz_core::model::AnswerInput;

/// Visible phase of a quiz widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Loading,
    Error { message: String },
    Question,
    Feedback,
    Results,
    /// Terminal; the widget was left through a confirmed exit.
    Exited,
}

impl Stage {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Loading => "loading",
            Stage::Error { .. } => "error",
            Stage::Question => "question",
            Stage::Feedback => "feedback",
            Stage::Results => "results",
            Stage::Exited => "exited",
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Exited)
    }
}

/// What to do when a question's timer runs out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeoutAction {
    /// Submit this input as a timed-out answer.
    Submit(AnswerInput),
    /// Keep the question open; the next non-empty input submits it.
    Hold,
}

/// How "continue" proceeds from the results panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinuePlan {
    /// Pick a new stage from the cached set.
    Reselect,
    /// No cached set; fetch again.
    Reload,
    /// Stage budget used up; move to the next skill.
    NextSkill,
}
