use quiz_core::model::{Level, QuestionShape, SessionAnswer, SessionResult};
use quiz_core::time::format_countdown;
use services::{QuizMachine, Stage};

use crate::dom::{Document, NodeId};
use crate::markup;
use crate::scope::resolve;

/// Shapes answered by typing rather than by buttons.
#[must_use]
pub fn accepts_text(shape: QuestionShape) -> bool {
    matches!(
        shape,
        QuestionShape::Blanks | QuestionShape::Transcript | QuestionShape::Writing
    )
}

//
// ─── ELEMENTS ──────────────────────────────────────────────────────────────────
//

/// Widget elements resolved once at mount. Missing markup stays `None` and is
/// skipped when rendering.
#[derive(Debug, Clone, Default)]
pub(crate) struct Elements {
    pub loading: Option<NodeId>,
    pub error: Option<NodeId>,
    pub question: Option<NodeId>,
    pub feedback: Option<NodeId>,
    pub results: Option<NodeId>,
    pub title: Option<NodeId>,
    pub prompt: Option<NodeId>,
    pub progress: Option<NodeId>,
    pub timer: Option<NodeId>,
    pub feedback_text: Option<NodeId>,
    pub error_message: Option<NodeId>,
    pub results_summary: Option<NodeId>,
    pub score: Option<NodeId>,
    pub level: Option<NodeId>,
    pub true_button: Option<NodeId>,
    pub false_button: Option<NodeId>,
    pub options: Vec<Option<NodeId>>,
    pub answer_input: Option<NodeId>,
    pub submit: Option<NodeId>,
    pub next: Option<NodeId>,
    pub continue_button: Option<NodeId>,
    pub back: Option<NodeId>,
    pub retry: Option<NodeId>,
}

impl Elements {
    pub(crate) fn resolve(doc: &Document, root: NodeId) -> Self {
        let find = |id: &str| resolve(doc, root, id);
        Self {
            loading: find(markup::LOADING_PANEL),
            error: find(markup::ERROR_PANEL),
            question: find(markup::QUESTION_PANEL),
            feedback: find(markup::FEEDBACK_PANEL),
            results: find(markup::RESULTS_PANEL),
            title: find(markup::TITLE),
            prompt: find(markup::PROMPT),
            progress: find(markup::PROGRESS),
            timer: find(markup::TIMER),
            feedback_text: find(markup::FEEDBACK_TEXT),
            error_message: find(markup::ERROR_MESSAGE),
            results_summary: find(markup::RESULTS_SUMMARY),
            score: find(markup::SCORE),
            level: find(markup::LEVEL),
            true_button: find(markup::TRUE_BUTTON),
            false_button: find(markup::FALSE_BUTTON),
            options: (0..markup::OPTION_SLOTS)
                .map(|i| find(&markup::option_button_id(i)))
                .collect(),
            answer_input: find(markup::ANSWER_INPUT),
            submit: find(markup::SUBMIT_BUTTON),
            next: find(markup::NEXT_BUTTON),
            continue_button: find(markup::CONTINUE_BUTTON),
            back: find(markup::BACK_BUTTON),
            retry: find(markup::RETRY_BUTTON),
        }
    }
}

//
// ─── VIEW MODEL ────────────────────────────────────────────────────────────────
//

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Panel {
    Loading,
    Error,
    Question,
    Feedback,
    Results,
    None,
}

/// Everything the markup shows, derived from the machine.
#[derive(Clone, Debug, PartialEq)]
pub struct QuizView {
    pub panel: Panel,
    pub title: String,
    pub error_message: String,
    pub progress: String,
    pub timer: String,
    pub prompt: String,
    pub show_flags: bool,
    pub options: Vec<String>,
    pub show_text_input: bool,
    pub feedback: String,
    pub summary: String,
    pub score: String,
    pub level: String,
    pub show_continue: bool,
}

impl QuizView {
    #[must_use]
    pub fn build(machine: &QuizMachine, now_ms: u64, can_continue: bool) -> Self {
        let shape = machine.kind().profile().shape;
        let question = machine.current_question();
        let (summary, score, level) = machine
            .last_result()
            .map(result_lines)
            .unwrap_or_default();

        Self {
            panel: panel_for(machine.stage()),
            title: machine.title(),
            error_message: match machine.stage() {
                Stage::Error { message } => message.clone(),
                _ => String::new(),
            },
            progress: format!(
                "Question {} of {}",
                (machine.current_index() + 1).min(machine.question_count().max(1)),
                machine.question_count()
            ),
            timer: timer_label(machine, now_ms),
            prompt: question.map(|q| q.prompt_text()).unwrap_or_default(),
            show_flags: shape == QuestionShape::Word,
            options: question.map(|q| q.options().to_vec()).unwrap_or_default(),
            show_text_input: accepts_text(shape),
            feedback: machine
                .last_answer()
                .map(|answer| feedback_line(machine, answer))
                .unwrap_or_default(),
            summary,
            score,
            level,
            show_continue: can_continue,
        }
    }

    pub(crate) fn apply(&self, doc: &mut Document, els: &Elements) {
        let panels = [
            (els.loading, Panel::Loading),
            (els.error, Panel::Error),
            (els.question, Panel::Question),
            (els.feedback, Panel::Feedback),
            (els.results, Panel::Results),
        ];
        for (node, panel) in panels {
            show(doc, node, self.panel == panel);
        }

        text(doc, els.title, &self.title);
        text(doc, els.error_message, &self.error_message);
        text(doc, els.progress, &self.progress);
        text(doc, els.timer, &self.timer);
        text(doc, els.prompt, &self.prompt);
        text(doc, els.feedback_text, &self.feedback);
        text(doc, els.results_summary, &self.summary);
        text(doc, els.score, &self.score);
        text(doc, els.level, &self.level);

        show(doc, els.true_button, self.show_flags);
        show(doc, els.false_button, self.show_flags);
        text(doc, els.true_button, "Real word");
        text(doc, els.false_button, "Not a word");
        for (index, node) in els.options.iter().enumerate() {
            let label = self.options.get(index);
            show(doc, *node, label.is_some());
            text(doc, *node, label.map_or("", String::as_str));
        }
        show(doc, els.answer_input, self.show_text_input);
        show(doc, els.submit, self.show_text_input);
        show(doc, els.continue_button, self.show_continue);
    }
}

/// Countdown for the current question, or a notice once it expired.
#[must_use]
pub fn timer_label(machine: &QuizMachine, now_ms: u64) -> String {
    if machine.is_expired() {
        "Time is up".to_owned()
    } else {
        format_countdown(machine.remaining_ms(now_ms))
    }
}

fn panel_for(stage: &Stage) -> Panel {
    match stage {
        Stage::Loading => Panel::Loading,
        Stage::Error { .. } => Panel::Error,
        Stage::Question => Panel::Question,
        Stage::Feedback => Panel::Feedback,
        Stage::Results => Panel::Results,
        Stage::Exited => Panel::None,
    }
}

fn feedback_line(machine: &QuizMachine, answer: &SessionAnswer) -> String {
    let expected = machine
        .current_question()
        .filter(|q| q.id == answer.question_id)
        .and_then(|q| q.expected_answer());
    let mut line = match (answer.correct, expected) {
        (Some(true), _) => "Correct!".to_owned(),
        (Some(false), Some(expected)) => format!("Incorrect. The answer was: {expected}"),
        (Some(false), None) => "Incorrect.".to_owned(),
        (None, _) => "Response recorded.".to_owned(),
    };
    if answer.timed_out {
        line.push_str(" Time ran out.");
    }
    line
}

fn result_lines(result: &SessionResult) -> (String, String, String) {
    let graded = result.details.iter().any(|d| d.correct.is_some());
    let summary = if graded {
        format!("{} of {} correct", result.correct, result.total)
    } else {
        format!("{} response(s) recorded", result.total)
    };
    (
        summary,
        format!("{:.0}", result.session_score),
        Level::from_score(result.session_score).label().to_owned(),
    )
}

fn text(doc: &mut Document, node: Option<NodeId>, value: &str) {
    if let Some(node) = node {
        doc.set_text(node, value);
    }
}

fn show(doc: &mut Document, node: Option<NodeId>, visible: bool) {
    if let Some(node) = node {
        doc.set_hidden(node, !visible);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{
        AnswerInput, Question, QuestionBody, QuestionId, QuestionSet, QuizKind, SetConfig,
    };
    use quiz_core::time::fixed_now;

    fn choice_machine() -> QuizMachine {
        let question = Question::new(
            QuestionId::new("c1"),
            QuestionBody::Choice {
                stem: "Pick the verb".into(),
                passage: None,
                audio_url: None,
                options: vec!["run".into(), "blue".into()],
                correct: 0,
            },
        );
        let set = QuestionSet::new(
            QuestionShape::Choice,
            vec![question.clone()],
            SetConfig {
                title: Some("Verbs".into()),
                shuffle_questions: false,
            },
        )
        .unwrap();
        let mut machine = QuizMachine::new(QuizKind::CompleteTheSentence);
        machine.load_succeeded(set, vec![question], 0).unwrap();
        machine
    }

    #[test]
    fn question_view_lists_options() {
        let machine = choice_machine();
        let view = QuizView::build(&machine, 5_000, false);
        assert_eq!(view.panel, Panel::Question);
        assert_eq!(view.title, "Verbs");
        assert_eq!(view.progress, "Question 1 of 1");
        assert_eq!(view.options, vec!["run".to_owned(), "blue".to_owned()]);
        assert!(!view.show_flags);
        assert!(!view.show_text_input);
        assert_eq!(view.timer, "0:15");
    }

    #[test]
    fn feedback_names_the_expected_answer() {
        let mut machine = choice_machine();
        machine.submit(AnswerInput::Choice(1), 1_000, false).unwrap();
        let view = QuizView::build(&machine, 1_000, false);
        assert_eq!(view.panel, Panel::Feedback);
        assert_eq!(view.feedback, "Incorrect. The answer was: run");
    }

    #[test]
    fn results_show_score_and_level() {
        let mut machine = choice_machine();
        machine.submit(AnswerInput::Choice(0), 1_000, false).unwrap();
        machine.advance(1_000, fixed_now()).unwrap();
        let view = QuizView::build(&machine, 1_000, true);
        assert_eq!(view.panel, Panel::Results);
        assert_eq!(view.summary, "1 of 1 correct");
        assert!(view.show_continue);
        assert!(!view.level.is_empty());
    }
}
