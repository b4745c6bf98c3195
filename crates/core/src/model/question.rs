use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

use crate::model::QuestionId;
use crate::scoring::text::{normalize_answer, word_overlap};

/// Similarity at or above which a typed transcript counts as correct.
pub const TRANSCRIPT_PASS_SIMILARITY: f64 = 80.0;

/// Most options a choice question may offer; the widget has one button each.
pub const MAX_CHOICE_OPTIONS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionShape {
    Word,
    Blanks,
    Transcript,
    Choice,
    Writing,
}

impl fmt::Display for QuestionShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            QuestionShape::Word => "word",
            QuestionShape::Blanks => "blanks",
            QuestionShape::Transcript => "transcript",
            QuestionShape::Choice => "choice",
            QuestionShape::Writing => "writing",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionSetError {
    #[error("question data could not be read: {0}")]
    Malformed(String),

    #[error("question data has no question list")]
    MissingQuestions,

    #[error("question data is empty")]
    Empty,

    #[error("question {index} is a {found} question, expected {expected}")]
    ShapeMismatch {
        index: usize,
        expected: QuestionShape,
        found: QuestionShape,
    },

    #[error("question {index} is invalid: {reason}")]
    InvalidQuestion { index: usize, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    #[must_use]
    pub fn weight(self) -> f64 {
        match self {
            Difficulty::Easy => 1.0,
            Difficulty::Medium => 2.0,
            Difficulty::Hard => 3.0,
        }
    }
}

/// Kind-specific content of a question, tagged by `type` in the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionBody {
    Word {
        word: String,
        is_real: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        audio_url: Option<String>,
    },
    Blanks {
        passage: String,
        answers: Vec<String>,
    },
    Transcript {
        audio_url: String,
        transcript: String,
    },
    Choice {
        stem: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        passage: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        audio_url: Option<String>,
        options: Vec<String>,
        correct: usize,
    },
    Writing {
        prompt: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        image_url: Option<String>,
        #[serde(default)]
        sample: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_words: Option<u32>,
    },
}

impl QuestionBody {
    #[must_use]
    pub fn shape(&self) -> QuestionShape {
        match self {
            QuestionBody::Word { .. } => QuestionShape::Word,
            QuestionBody::Blanks { .. } => QuestionShape::Blanks,
            QuestionBody::Transcript { .. } => QuestionShape::Transcript,
            QuestionBody::Choice { .. } => QuestionShape::Choice,
            QuestionBody::Writing { .. } => QuestionShape::Writing,
        }
    }

    fn problem(&self) -> Option<&'static str> {
        match self {
            QuestionBody::Word { word, .. } if word.trim().is_empty() => Some("word is empty"),
            QuestionBody::Blanks { answers, .. } if answers.is_empty() => {
                Some("passage has no blanks")
            }
            QuestionBody::Transcript { transcript, .. } if transcript.trim().is_empty() => {
                Some("transcript is empty")
            }
            QuestionBody::Choice { options, .. } if options.is_empty() => Some("no options"),
            QuestionBody::Choice { options, .. } if options.len() > MAX_CHOICE_OPTIONS => {
                Some("too many options")
            }
            QuestionBody::Choice {
                options, correct, ..
            } if *correct >= options.len() => Some("correct option is out of range"),
            QuestionBody::Writing { prompt, .. } if prompt.trim().is_empty() => {
                Some("prompt is empty")
            }
            _ => None,
        }
    }
}

/// One learner response as captured from the widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnswerInput {
    Empty,
    Flag(bool),
    Choice(usize),
    Text(String),
    Blanks(Vec<String>),
}

impl AnswerInput {
    /// Parses free text for a question of the given shape.
    #[must_use]
    pub fn from_text(shape: QuestionShape, raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::Empty;
        }
        match shape {
            QuestionShape::Blanks => Self::Blanks(
                trimmed
                    .split(',')
                    .map(|part| part.trim().to_owned())
                    .collect(),
            ),
            _ => Self::Text(trimmed.to_owned()),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            AnswerInput::Empty => true,
            AnswerInput::Text(text) => text.trim().is_empty(),
            AnswerInput::Blanks(parts) => parts.iter().all(|p| p.trim().is_empty()),
            AnswerInput::Flag(_) | AnswerInput::Choice(_) => false,
        }
    }

    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            AnswerInput::Text(text) => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Question {
    pub id: QuestionId,
    pub difficulty: Difficulty,
    #[serde(flatten)]
    pub body: QuestionBody,
}

impl Question {
    #[must_use]
    pub fn new(id: QuestionId, body: QuestionBody) -> Self {
        Self {
            id,
            difficulty: Difficulty::default(),
            body,
        }
    }

    #[must_use]
    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    #[must_use]
    pub fn shape(&self) -> QuestionShape {
        self.body.shape()
    }

    /// Returns whether the response is correct, or `None` for open writing tasks.
    #[must_use]
    pub fn evaluate(&self, input: &AnswerInput) -> Option<bool> {
        match (&self.body, input) {
            (QuestionBody::Writing { .. }, _) => None,
            (QuestionBody::Word { is_real, .. }, AnswerInput::Flag(flag)) => Some(flag == is_real),
            (QuestionBody::Choice { correct, .. }, AnswerInput::Choice(picked)) => {
                Some(picked == correct)
            }
            (QuestionBody::Blanks { answers, .. }, AnswerInput::Blanks(given)) => {
                Some(blanks_match(answers, given) == answers.len())
            }
            (QuestionBody::Blanks { answers, .. }, AnswerInput::Text(text)) => {
                let given: Vec<String> = text.split(',').map(str::to_owned).collect();
                Some(blanks_match(answers, &given) == answers.len())
            }
            (QuestionBody::Transcript { transcript, .. }, AnswerInput::Text(text)) => {
                Some(word_overlap(transcript, text) >= TRANSCRIPT_PASS_SIMILARITY)
            }
            _ => Some(false),
        }
    }

    /// Text shown as the correct answer on the feedback panel.
    #[must_use]
    pub fn expected_answer(&self) -> Option<String> {
        match &self.body {
            QuestionBody::Word { is_real: true, .. } => Some("a real English word".to_owned()),
            QuestionBody::Word { is_real: false, .. } => Some("not a real English word".to_owned()),
            QuestionBody::Blanks { answers, .. } => Some(answers.join(", ")),
            QuestionBody::Transcript { transcript, .. } => Some(transcript.clone()),
            QuestionBody::Choice {
                options, correct, ..
            } => options.get(*correct).cloned(),
            QuestionBody::Writing { sample, .. } if !sample.trim().is_empty() => {
                Some(sample.clone())
            }
            QuestionBody::Writing { .. } => None,
        }
    }

    #[must_use]
    pub fn prompt_text(&self) -> String {
        match &self.body {
            QuestionBody::Word { word, .. } => word.clone(),
            QuestionBody::Blanks { passage, .. } => passage.clone(),
            QuestionBody::Transcript { audio_url, .. } => format!("Type what you hear: {audio_url}"),
            QuestionBody::Choice {
                stem,
                passage: Some(passage),
                ..
            } => format!("{passage}\n\n{stem}"),
            QuestionBody::Choice { stem, .. } => stem.clone(),
            QuestionBody::Writing {
                prompt,
                image_url: Some(image),
                ..
            } => format!("{prompt} [{image}]"),
            QuestionBody::Writing { prompt, .. } => prompt.clone(),
        }
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        match &self.body {
            QuestionBody::Choice { options, .. } => options,
            _ => &[],
        }
    }
}

fn blanks_match(expected: &[String], given: &[String]) -> usize {
    expected
        .iter()
        .zip(given)
        .filter(|(want, got)| normalize_answer(want) == normalize_answer(got))
        .count()
}

/// Optional payload-level settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetConfig {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub shuffle_questions: bool,
}

#[derive(Deserialize)]
struct RawPayload {
    #[serde(default)]
    questions: Option<Vec<RawQuestion>>,
    #[serde(default)]
    config: Option<SetConfig>,
}

#[derive(Deserialize)]
struct RawQuestion {
    #[serde(default)]
    id: Option<QuestionId>,
    #[serde(default)]
    difficulty: Option<Difficulty>,
    #[serde(flatten)]
    body: QuestionBody,
}

/// Validated, ordered question list for one quiz kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionSet {
    questions: Vec<Question>,
    config: SetConfig,
}

impl QuestionSet {
    /// # Errors
    ///
    /// Returns `QuestionSetError::Empty` for an empty list and validation errors
    /// for questions of the wrong shape or with unusable content.
    pub fn new(
        expected: QuestionShape,
        questions: Vec<Question>,
        config: SetConfig,
    ) -> Result<Self, QuestionSetError> {
        if questions.is_empty() {
            return Err(QuestionSetError::Empty);
        }
        let mut seen = HashSet::with_capacity(questions.len());
        for (index, question) in questions.iter().enumerate() {
            let found = question.shape();
            if found != expected {
                return Err(QuestionSetError::ShapeMismatch {
                    index,
                    expected,
                    found,
                });
            }
            if let Some(reason) = question.body.problem() {
                return Err(QuestionSetError::InvalidQuestion {
                    index,
                    reason: reason.to_owned(),
                });
            }
            if !seen.insert(question.id.clone()) {
                return Err(QuestionSetError::InvalidQuestion {
                    index,
                    reason: format!("duplicate id {}", question.id),
                });
            }
        }
        Ok(Self { questions, config })
    }

    /// Parse and validate a `{ questions: [...], config?: {...} }` payload.
    ///
    /// # Errors
    ///
    /// Returns `QuestionSetError` when the JSON is unreadable, the list is
    /// missing or empty, or any question fails validation.
    pub fn from_json(expected: QuestionShape, payload: &str) -> Result<Self, QuestionSetError> {
        let raw: RawPayload = serde_json::from_str(payload)
            .map_err(|e| QuestionSetError::Malformed(e.to_string()))?;
        let raw_questions = raw.questions.ok_or(QuestionSetError::MissingQuestions)?;
        let questions = raw_questions
            .into_iter()
            .enumerate()
            .map(|(index, q)| Question {
                id: q.id.unwrap_or_else(|| QuestionId::positional(index)),
                difficulty: q.difficulty.unwrap_or_default(),
                body: q.body,
            })
            .collect();
        Self::new(expected, questions, raw.config.unwrap_or_default())
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn config(&self) -> &SetConfig {
        &self.config
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.config.title.as_deref()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}
