//! Persisted per-skill progress, session history, assessments and used pools.
//!
//! Reads never fail: a missing or unreadable record falls back to its default
//! and the problem is logged. Writes return `StorageError` so callers decide
//! whether a failed save matters.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use quiz_core::Clock;
use quiz_core::SESSION_HISTORY_CAP;
use quiz_core::model::{
    QuizKind, SessionResult, SkillAssessment, SkillName, SkillProgressCounter, UsedQuestionPool,
};
use quiz_core::scoring::score_assessment;
use storage::{KeyValueStore, StorageError};

//
// ─── KEYS ──────────────────────────────────────────────────────────────────────
//

const PROGRESS_PREFIX: &str = "quiz_progress_";
const SESSIONS_PREFIX: &str = "quiz_sessions_";
const ASSESSMENT_PREFIX: &str = "quiz_assessment_";
const USED_PREFIX: &str = "quiz_used_";

fn progress_key(skill: &SkillName) -> String {
    format!("{PROGRESS_PREFIX}{}", skill.key())
}

fn sessions_key(skill: &SkillName) -> String {
    format!("{SESSIONS_PREFIX}{}", skill.key())
}

fn assessment_key(skill: &SkillName) -> String {
    format!("{ASSESSMENT_PREFIX}{}", skill.key())
}

fn used_key(kind: QuizKind) -> String {
    format!("{USED_PREFIX}{}", kind.slug())
}

#[derive(serde::Deserialize)]
struct StoredCounter {
    #[serde(default)]
    completed: u32,
}

//
// ─── STORE ─────────────────────────────────────────────────────────────────────
//

#[derive(Clone)]
pub struct ProgressStore {
    kv: Arc<dyn KeyValueStore>,
    clock: Clock,
}

impl ProgressStore {
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            clock: Clock::default(),
        }
    }

    /// Use a fixed clock for assessment timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Stored counter for `skill`, or a fresh one with `total` stages.
    ///
    /// `total` always comes from the caller; a stored count above it is clamped.
    pub async fn get_progress(&self, skill: &SkillName, total: u32) -> SkillProgressCounter {
        let stored: Option<StoredCounter> = self.read_json(&progress_key(skill)).await;
        let completed = stored.map_or(0, |s| s.completed);
        SkillProgressCounter::from_persisted(completed, total)
    }

    /// Add `count` completed stages, capped at `total`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the updated counter cannot be written.
    pub async fn increment_progress(
        &self,
        skill: &SkillName,
        count: u32,
        total: u32,
    ) -> Result<SkillProgressCounter, StorageError> {
        let mut counter = self.get_progress(skill, total).await;
        counter.increment(count);
        self.write_json(&progress_key(skill), &counter).await?;
        debug!(skill = %skill, completed = counter.completed(), total, "progress updated");
        Ok(counter)
    }

    /// Session history for `skill`, oldest first.
    pub async fn get_sessions(&self, skill: &SkillName) -> Vec<SessionResult> {
        self.read_json(&sessions_key(skill))
            .await
            .unwrap_or_default()
    }

    /// Append a result, keeping only the most recent entries.
    ///
    /// A result whose id is already stored is not appended again.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the history cannot be written.
    pub async fn append_session(
        &self,
        skill: &SkillName,
        result: &SessionResult,
    ) -> Result<Vec<SessionResult>, StorageError> {
        let mut history = self.get_sessions(skill).await;
        if history.iter().any(|existing| existing.id == result.id) {
            debug!(skill = %skill, id = %result.id, "session already recorded");
            return Ok(history);
        }
        history.push(result.clone());
        if history.len() > SESSION_HISTORY_CAP {
            let overflow = history.len() - SESSION_HISTORY_CAP;
            history.drain(..overflow);
        }
        self.write_json(&sessions_key(skill), &history).await?;
        Ok(history)
    }

    pub async fn get_assessment(&self, skill: &SkillName) -> Option<SkillAssessment> {
        self.read_json(&assessment_key(skill)).await
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the assessment cannot be written.
    pub async fn save_assessment(
        &self,
        skill: &SkillName,
        assessment: &SkillAssessment,
    ) -> Result<(), StorageError> {
        self.write_json(&assessment_key(skill), assessment).await
    }

    /// Store a finished session and refresh the skill's assessment from the
    /// updated history.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if either write fails.
    pub async fn record_session(
        &self,
        result: &SessionResult,
    ) -> Result<SkillAssessment, StorageError> {
        let history = self.append_session(&result.skill, result).await?;
        let assessment = score_assessment(result.kind, &history, self.clock.now());
        self.save_assessment(&result.skill, &assessment).await?;
        debug!(
            skill = %result.skill,
            sessions = assessment.sessions,
            final_score = assessment.final_score,
            "assessment updated"
        );
        Ok(assessment)
    }

    /// Identifiers already served for `kind`.
    pub async fn used_pool(&self, kind: QuizKind) -> UsedQuestionPool {
        self.read_json(&used_key(kind)).await.unwrap_or_default()
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the pool cannot be written.
    pub async fn save_used_pool(
        &self,
        kind: QuizKind,
        pool: &UsedQuestionPool,
    ) -> Result<(), StorageError> {
        self.write_json(&used_key(kind), pool).await
    }

    /// Progress for every known kind, in default skill order.
    pub async fn all_progress(&self) -> Vec<(QuizKind, SkillProgressCounter)> {
        let mut out = Vec::with_capacity(QuizKind::ALL.len());
        for kind in QuizKind::ALL {
            let counter = self
                .get_progress(&kind.skill(), kind.profile().stage_budget)
                .await;
            out.push((kind, counter));
        }
        out
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.kv.get(key).await {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(key, error = %err, "progress read failed; using default");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, error = %err, "stored progress is unreadable; using default");
                None
            }
        }
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw =
            serde_json::to_string(value).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.kv.set(key, &raw).await
    }
}
