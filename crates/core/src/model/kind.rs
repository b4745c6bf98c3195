use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::{QuestionShape, SkillName, SubScore};

/// What happens when a question's time limit runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPolicy {
    /// Submit whatever was entered, including nothing.
    SubmitOrSkip,
    /// Submit only non-empty input; otherwise keep the question open until
    /// the learner enters something.
    SubmitIfNonEmpty,
}

/// Weights of the cross-session assessment combination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssessmentWeights {
    pub quality: f64,
    pub average_score: f64,
    pub improvement: f64,
    pub consistency: f64,
    pub specialization: Option<f64>,
}

/// Tuned constants for one quiz kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KindProfile {
    pub skill: &'static str,
    pub shape: QuestionShape,
    pub questions_per_stage: usize,
    pub stage_budget: u32,
    pub item_limit_ms: u64,
    pub timeout: TimeoutPolicy,
    /// Word target for writing heuristics; unused by other shapes.
    pub target_words: u32,
    pub primary: SubScore,
    pub session_weights: &'static [(SubScore, f64)],
    pub assessment: AssessmentWeights,
}

const WORD_WEIGHTS: &[(SubScore, f64)] = &[
    (SubScore::Accuracy, 0.4),
    (SubScore::Vocabulary, 0.2),
    (SubScore::Intuition, 0.2),
    (SubScore::ResponseBalance, 0.1),
    (SubScore::Speed, 0.1),
];

const CHOICE_WEIGHTS: &[(SubScore, f64)] = &[
    (SubScore::Accuracy, 0.5),
    (SubScore::WeightedAccuracy, 0.25),
    (SubScore::Completion, 0.15),
    (SubScore::Speed, 0.1),
];

const BLANKS_WEIGHTS: &[(SubScore, f64)] = &[
    (SubScore::Accuracy, 0.4),
    (SubScore::Similarity, 0.35),
    (SubScore::Completion, 0.15),
    (SubScore::Speed, 0.1),
];

const TRANSCRIPT_WEIGHTS: &[(SubScore, f64)] = &[
    (SubScore::Similarity, 0.6),
    (SubScore::Accuracy, 0.2),
    (SubScore::Completion, 0.1),
    (SubScore::Speed, 0.1),
];

const WRITING_WEIGHTS: &[(SubScore, f64)] = &[
    (SubScore::Quality, 0.7),
    (SubScore::Completion, 0.3),
];

const WORD_ASSESSMENT: AssessmentWeights = AssessmentWeights {
    quality: 0.35,
    average_score: 0.3,
    improvement: 0.1,
    consistency: 0.15,
    specialization: Some(0.1),
};

const DEFAULT_ASSESSMENT: AssessmentWeights = AssessmentWeights {
    quality: 0.4,
    average_score: 0.3,
    improvement: 0.1,
    consistency: 0.2,
    specialization: None,
};

const READ_AND_SELECT: KindProfile = KindProfile {
    skill: "Read and Select",
    shape: QuestionShape::Word,
    questions_per_stage: 20,
    stage_budget: 6,
    item_limit_ms: 5_000,
    timeout: TimeoutPolicy::SubmitOrSkip,
    target_words: 0,
    primary: SubScore::Accuracy,
    session_weights: WORD_WEIGHTS,
    assessment: WORD_ASSESSMENT,
};

const LISTEN_AND_SELECT: KindProfile = KindProfile {
    skill: "Listen and Select",
    questions_per_stage: 15,
    stage_budget: 5,
    item_limit_ms: 8_000,
    ..READ_AND_SELECT
};

const FILL_IN_BLANKS: KindProfile = KindProfile {
    skill: "Fill in the Blanks",
    shape: QuestionShape::Blanks,
    questions_per_stage: 5,
    stage_budget: 4,
    item_limit_ms: 60_000,
    timeout: TimeoutPolicy::SubmitOrSkip,
    target_words: 0,
    primary: SubScore::Accuracy,
    session_weights: BLANKS_WEIGHTS,
    assessment: DEFAULT_ASSESSMENT,
};

const LISTEN_AND_TYPE: KindProfile = KindProfile {
    skill: "Listen and Type",
    shape: QuestionShape::Transcript,
    questions_per_stage: 6,
    stage_budget: 4,
    item_limit_ms: 45_000,
    timeout: TimeoutPolicy::SubmitOrSkip,
    target_words: 0,
    primary: SubScore::Similarity,
    session_weights: TRANSCRIPT_WEIGHTS,
    assessment: DEFAULT_ASSESSMENT,
};

const COMPLETE_THE_SENTENCE: KindProfile = KindProfile {
    skill: "Complete the Sentence",
    shape: QuestionShape::Choice,
    questions_per_stage: 10,
    stage_budget: 5,
    item_limit_ms: 20_000,
    timeout: TimeoutPolicy::SubmitOrSkip,
    target_words: 0,
    primary: SubScore::Accuracy,
    session_weights: CHOICE_WEIGHTS,
    assessment: DEFAULT_ASSESSMENT,
};

const VOCABULARY_IN_CONTEXT: KindProfile = KindProfile {
    skill: "Vocabulary in Context",
    questions_per_stage: 8,
    stage_budget: 4,
    item_limit_ms: 30_000,
    ..COMPLETE_THE_SENTENCE
};

const INTERACTIVE_READING: KindProfile = KindProfile {
    skill: "Interactive Reading",
    questions_per_stage: 6,
    stage_budget: 3,
    item_limit_ms: 90_000,
    ..COMPLETE_THE_SENTENCE
};

const INTERACTIVE_LISTENING: KindProfile = KindProfile {
    skill: "Interactive Listening",
    questions_per_stage: 6,
    stage_budget: 3,
    item_limit_ms: 60_000,
    ..COMPLETE_THE_SENTENCE
};

const WRITE_ABOUT_PHOTO: KindProfile = KindProfile {
    skill: "Write About the Photo",
    shape: QuestionShape::Writing,
    questions_per_stage: 1,
    stage_budget: 3,
    item_limit_ms: 60_000,
    timeout: TimeoutPolicy::SubmitIfNonEmpty,
    target_words: 30,
    primary: SubScore::Quality,
    session_weights: WRITING_WEIGHTS,
    assessment: DEFAULT_ASSESSMENT,
};

const READ_THEN_WRITE: KindProfile = KindProfile {
    skill: "Read, Then Write",
    item_limit_ms: 300_000,
    target_words: 50,
    ..WRITE_ABOUT_PHOTO
};

const WRITING_SAMPLE: KindProfile = KindProfile {
    skill: "Writing Sample",
    stage_budget: 2,
    item_limit_ms: 480_000,
    target_words: 120,
    ..WRITE_ABOUT_PHOTO
};

/// The eleven exercise types. Declaration order is the default skill order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizKind {
    ReadAndSelect,
    ListenAndSelect,
    FillInBlanks,
    ListenAndType,
    CompleteTheSentence,
    VocabularyInContext,
    InteractiveReading,
    InteractiveListening,
    WriteAboutPhoto,
    ReadThenWrite,
    WritingSample,
}

impl QuizKind {
    pub const ALL: [QuizKind; 11] = [
        QuizKind::ReadAndSelect,
        QuizKind::ListenAndSelect,
        QuizKind::FillInBlanks,
        QuizKind::ListenAndType,
        QuizKind::CompleteTheSentence,
        QuizKind::VocabularyInContext,
        QuizKind::InteractiveReading,
        QuizKind::InteractiveListening,
        QuizKind::WriteAboutPhoto,
        QuizKind::ReadThenWrite,
        QuizKind::WritingSample,
    ];

    #[must_use]
    pub fn profile(self) -> &'static KindProfile {
        match self {
            QuizKind::ReadAndSelect => &READ_AND_SELECT,
            QuizKind::ListenAndSelect => &LISTEN_AND_SELECT,
            QuizKind::FillInBlanks => &FILL_IN_BLANKS,
            QuizKind::ListenAndType => &LISTEN_AND_TYPE,
            QuizKind::CompleteTheSentence => &COMPLETE_THE_SENTENCE,
            QuizKind::VocabularyInContext => &VOCABULARY_IN_CONTEXT,
            QuizKind::InteractiveReading => &INTERACTIVE_READING,
            QuizKind::InteractiveListening => &INTERACTIVE_LISTENING,
            QuizKind::WriteAboutPhoto => &WRITE_ABOUT_PHOTO,
            QuizKind::ReadThenWrite => &READ_THEN_WRITE,
            QuizKind::WritingSample => &WRITING_SAMPLE,
        }
    }

    #[must_use]
    pub fn slug(self) -> &'static str {
        match self {
            QuizKind::ReadAndSelect => "read_and_select",
            QuizKind::ListenAndSelect => "listen_and_select",
            QuizKind::FillInBlanks => "fill_in_blanks",
            QuizKind::ListenAndType => "listen_and_type",
            QuizKind::CompleteTheSentence => "complete_the_sentence",
            QuizKind::VocabularyInContext => "vocabulary_in_context",
            QuizKind::InteractiveReading => "interactive_reading",
            QuizKind::InteractiveListening => "interactive_listening",
            QuizKind::WriteAboutPhoto => "write_about_photo",
            QuizKind::ReadThenWrite => "read_then_write",
            QuizKind::WritingSample => "writing_sample",
        }
    }

    #[must_use]
    pub fn skill(self) -> SkillName {
        SkillName::from_profile(self.profile().skill)
    }

    /// Finds the kind whose skill normalizes to the same storage key.
    #[must_use]
    pub fn from_skill(skill: &SkillName) -> Option<Self> {
        let key = skill.key();
        Self::ALL.into_iter().find(|kind| kind.skill().key() == key)
    }

    /// The kind after this one in the default skill order.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        let index = Self::ALL.iter().position(|kind| *kind == self)?;
        Self::ALL.get(index + 1).copied()
    }
}

impl fmt::Display for QuizKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown quiz kind: {0}")]
pub struct ParseKindError(pub String);

impl FromStr for QuizKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.slug() == s)
            .ok_or_else(|| ParseKindError(s.to_owned()))
    }
}
