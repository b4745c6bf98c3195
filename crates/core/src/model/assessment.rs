use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::model::{QuizKind, SkillName, SubScore};

/// Six-band proficiency label derived from an assessment's final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Level {
    Beginner,
    Elementary,
    LowerIntermediate,
    Intermediate,
    UpperIntermediate,
    Advanced,
}

impl Level {
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 90.0 => Level::Advanced,
            s if s >= 75.0 => Level::UpperIntermediate,
            s if s >= 60.0 => Level::Intermediate,
            s if s >= 45.0 => Level::LowerIntermediate,
            s if s >= 30.0 => Level::Elementary,
            _ => Level::Beginner,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Level::Beginner => "Beginner",
            Level::Elementary => "Elementary",
            Level::LowerIntermediate => "Lower-Intermediate",
            Level::Intermediate => "Intermediate",
            Level::UpperIntermediate => "Upper-Intermediate",
            Level::Advanced => "Advanced",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Aggregate over a skill's session history. Recomputed from scratch each time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillAssessment {
    pub skill: SkillName,
    pub kind: QuizKind,
    pub assessed_at: DateTime<Utc>,
    pub sessions: u32,
    pub average_sub_scores: BTreeMap<SubScore, f64>,
    pub quality: f64,
    pub average_score: f64,
    /// Last session score minus first session score.
    pub improvement: f64,
    pub consistency: f64,
    pub specialization: Option<f64>,
    pub final_score: f64,
    pub level: Level,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub recommendations: Vec<String>,
}
