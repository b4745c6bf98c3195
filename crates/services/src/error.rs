//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::QuestionSetError;
use quiz_core::selection::SelectionError;
use storage::sqlite::SqliteInitError;

/// The `DataUnavailable` condition: a question set could not be produced.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoadError {
    #[error("question data request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("question data request returned status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("question data could not be read from {path}: {reason}")]
    Io { path: String, reason: String },
    #[error(transparent)]
    Invalid(#[from] QuestionSetError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
}

impl LoadError {
    /// Message suitable for the widget's error panel.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            LoadError::Invalid(QuestionSetError::Empty | QuestionSetError::MissingQuestions)
            | LoadError::Selection(SelectionError::NoQuestionsRemaining) => {
                "No questions are available: the question data is empty or missing.".to_owned()
            }
            LoadError::Invalid(err) => format!("The question data is invalid ({err})."),
            LoadError::Selection(err) => format!("Could not pick questions: {err}."),
            LoadError::Http(_) | LoadError::HttpStatus(_) | LoadError::Io { .. } => {
                format!("Could not load questions: {self}.")
            }
        }
    }
}

/// Transitions the quiz state machine refuses.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MachineError {
    #[error("cannot {action} while in the {stage} stage")]
    InvalidTransition {
        stage: &'static str,
        action: &'static str,
    },
    #[error("no questions were selected for the stage")]
    EmptySelection,
    #[error("stage budget is used up and there is no next skill")]
    NoContinuation,
}

/// Invalid environment configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid question data URL: {0}")]
    InvalidBaseUrl(String),
    #[error("invalid {name} value: {raw}")]
    InvalidNumber { name: &'static str, raw: String },
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Storage(#[from] SqliteInitError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_message_mentions_empty_data() {
        let message = LoadError::Invalid(QuestionSetError::Empty).user_message();
        assert!(message.contains("empty or missing"), "{message}");
        let missing = LoadError::Invalid(QuestionSetError::MissingQuestions).user_message();
        assert_eq!(message, missing);
    }

    #[test]
    fn exhausted_selection_reads_as_empty_data() {
        let message = LoadError::Selection(SelectionError::NoQuestionsRemaining).user_message();
        assert_eq!(message, LoadError::Invalid(QuestionSetError::Empty).user_message());
    }

    #[test]
    fn status_message_names_the_status() {
        let message = LoadError::HttpStatus(reqwest::StatusCode::NOT_FOUND).user_message();
        assert!(message.contains("404"), "{message}");
    }
}
