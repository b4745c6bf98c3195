//! Element identifiers and the standard widget markup.

use crate::dom::{DomError, Document, NodeId};

pub const LOADING_PANEL: &str = "quiz-loading";
pub const ERROR_PANEL: &str = "quiz-error";
pub const QUESTION_PANEL: &str = "quiz-question";
pub const FEEDBACK_PANEL: &str = "quiz-feedback";
pub const RESULTS_PANEL: &str = "quiz-results";

pub const TITLE: &str = "quiz-title";
pub const PROMPT: &str = "quiz-prompt";
pub const PROGRESS: &str = "quiz-progress";
pub const TIMER: &str = "quiz-timer";
pub const FEEDBACK_TEXT: &str = "quiz-feedback-text";
pub const ERROR_MESSAGE: &str = "quiz-error-message";
pub const RESULTS_SUMMARY: &str = "quiz-results-summary";
pub const SCORE: &str = "quiz-score";
pub const LEVEL: &str = "quiz-level";

pub const TRUE_BUTTON: &str = "quiz-true";
pub const FALSE_BUTTON: &str = "quiz-false";
pub const ANSWER_INPUT: &str = "quiz-answer-input";
pub const SUBMIT_BUTTON: &str = "quiz-submit";
pub const NEXT_BUTTON: &str = "quiz-next";
pub const CONTINUE_BUTTON: &str = "quiz-continue";
pub const BACK_BUTTON: &str = "quiz-back";
pub const RETRY_BUTTON: &str = "quiz-retry";

/// Number of option buttons in the template.
pub const OPTION_SLOTS: usize = quiz_core::model::MAX_CHOICE_OPTIONS;

#[must_use]
pub fn option_button_id(index: usize) -> String {
    format!("quiz-option-{index}")
}

/// Build the standard widget markup under `root`. Every panel except the
/// loading panel starts hidden.
///
/// # Errors
///
/// Returns `DomError::UnknownNode` if `root` is not a valid element.
pub fn mount_quiz_markup(doc: &mut Document, root: NodeId) -> Result<(), DomError> {
    doc.append_new(root, "h2", Some(TITLE))?;
    doc.append_new(root, "button", Some(BACK_BUTTON))?;

    doc.append_new(root, "div", Some(LOADING_PANEL))?;

    let error = panel(doc, root, ERROR_PANEL)?;
    doc.append_new(error, "p", Some(ERROR_MESSAGE))?;
    doc.append_new(error, "button", Some(RETRY_BUTTON))?;

    let question = panel(doc, root, QUESTION_PANEL)?;
    doc.append_new(question, "span", Some(PROGRESS))?;
    doc.append_new(question, "span", Some(TIMER))?;
    doc.append_new(question, "p", Some(PROMPT))?;
    doc.append_new(question, "button", Some(TRUE_BUTTON))?;
    doc.append_new(question, "button", Some(FALSE_BUTTON))?;
    for index in 0..OPTION_SLOTS {
        doc.append_new(question, "button", Some(&option_button_id(index)))?;
    }
    doc.append_new(question, "textarea", Some(ANSWER_INPUT))?;
    doc.append_new(question, "button", Some(SUBMIT_BUTTON))?;

    let feedback = panel(doc, root, FEEDBACK_PANEL)?;
    doc.append_new(feedback, "p", Some(FEEDBACK_TEXT))?;
    doc.append_new(feedback, "button", Some(NEXT_BUTTON))?;

    let results = panel(doc, root, RESULTS_PANEL)?;
    doc.append_new(results, "p", Some(RESULTS_SUMMARY))?;
    doc.append_new(results, "strong", Some(SCORE))?;
    doc.append_new(results, "span", Some(LEVEL))?;
    doc.append_new(results, "button", Some(CONTINUE_BUTTON))?;

    Ok(())
}

fn panel(doc: &mut Document, root: NodeId, id: &str) -> Result<NodeId, DomError> {
    let node = doc.append_new(root, "div", Some(id))?;
    doc.set_hidden(node, true);
    Ok(node)
}
