use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::model::{AnswerInput, QuestionId, QuizKind, SkillName};

/// Normalized 0–100 component of a session score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubScore {
    Accuracy,
    WeightedAccuracy,
    Vocabulary,
    Intuition,
    ResponseBalance,
    Speed,
    Completion,
    Similarity,
    Quality,
}

impl SubScore {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            SubScore::Accuracy => "accuracy",
            SubScore::WeightedAccuracy => "accuracy on harder items",
            SubScore::Vocabulary => "vocabulary recognition",
            SubScore::Intuition => "word intuition",
            SubScore::ResponseBalance => "response balance",
            SubScore::Speed => "speed",
            SubScore::Completion => "completion",
            SubScore::Similarity => "precision",
            SubScore::Quality => "writing quality",
        }
    }
}

impl fmt::Display for SubScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One response recorded while a stage is running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionAnswer {
    pub question_id: QuestionId,
    pub input: AnswerInput,
    /// `None` for open writing tasks.
    pub correct: Option<bool>,
    pub elapsed_ms: u64,
    pub timed_out: bool,
}

/// Per-question detail kept with a persisted session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionDetail {
    pub question_id: QuestionId,
    pub correct: Option<bool>,
    pub elapsed_ms: u64,
    pub timed_out: bool,
    pub response: AnswerInput,
}

impl From<&SessionAnswer> for QuestionDetail {
    fn from(answer: &SessionAnswer) -> Self {
        Self {
            question_id: answer.question_id.clone(),
            correct: answer.correct,
            elapsed_ms: answer.elapsed_ms,
            timed_out: answer.timed_out,
            response: answer.input.clone(),
        }
    }
}

/// Durable record of one completed stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    pub id: Uuid,
    pub skill: SkillName,
    pub kind: QuizKind,
    pub completed_at: DateTime<Utc>,
    pub total: u32,
    pub correct: u32,
    pub sub_scores: BTreeMap<SubScore, f64>,
    pub session_score: f64,
    pub details: Vec<QuestionDetail>,
}

impl SessionResult {
    #[must_use]
    pub fn sub_score(&self, sub: SubScore) -> f64 {
        self.sub_scores.get(&sub).copied().unwrap_or(0.0)
    }

    #[must_use]
    pub fn accuracy(&self) -> f64 {
        self.sub_score(SubScore::Accuracy)
    }
}
