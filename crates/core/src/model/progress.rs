use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::QuestionId;

/// Whole-stage completion count for one skill, capped at `total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillProgressCounter {
    completed: u32,
    total: u32,
}

impl SkillProgressCounter {
    #[must_use]
    pub fn new(total: u32) -> Self {
        Self {
            completed: 0,
            total,
        }
    }

    /// Rehydrate from storage, clamping `completed` to `total`.
    #[must_use]
    pub fn from_persisted(completed: u32, total: u32) -> Self {
        Self {
            completed: completed.min(total),
            total,
        }
    }

    #[must_use]
    pub fn completed(&self) -> u32 {
        self.completed
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.total > 0 && self.completed >= self.total
    }

    pub fn increment(&mut self, count: u32) {
        self.completed = self.completed.saturating_add(count).min(self.total);
    }
}

/// Identifiers shown in earlier sessions of one quiz kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsedQuestionPool {
    ids: BTreeSet<QuestionId>,
}

impl UsedQuestionPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, id: &QuestionId) -> bool {
        self.ids.contains(id)
    }

    pub fn record<'a>(&mut self, ids: impl IntoIterator<Item = &'a QuestionId>) {
        self.ids.extend(ids.into_iter().cloned());
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_never_exceeds_total() {
        let mut counter = SkillProgressCounter::new(6);
        counter.increment(1);
        assert_eq!(counter.completed(), 1);
        counter.increment(u32::MAX);
        assert_eq!(counter.completed(), 6);
        assert!(counter.is_done());
    }

    #[test]
    fn persisted_counter_is_clamped() {
        let counter = SkillProgressCounter::from_persisted(9, 3);
        assert_eq!(counter.completed(), 3);
    }

    #[test]
    fn empty_total_is_never_done() {
        assert!(!SkillProgressCounter::new(0).is_done());
    }

    #[test]
    fn pool_records_and_clears() {
        let mut pool = UsedQuestionPool::new();
        let ids = [QuestionId::new("a"), QuestionId::new("b")];
        pool.record(&ids);
        assert!(pool.contains(&QuestionId::new("a")));
        assert_eq!(pool.len(), 2);
        pool.clear();
        assert!(pool.is_empty());
    }
}
