//! Picks a stage's questions while avoiding repeats across sessions.

use rand::Rng;
use rand::seq::SliceRandom;
use thiserror::Error;

use crate::model::{Question, UsedQuestionPool};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SelectionError {
    #[error("no questions remaining to select from")]
    NoQuestionsRemaining,
}

/// Outcome of one selection pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub questions: Vec<Question>,
    /// Pool to persist for the next session.
    pub pool: UsedQuestionPool,
    /// True when the pool was exhausted and cleared before selecting.
    pub pool_reset: bool,
}

/// Select up to `count` questions that are not in `pool`.
///
/// When every question has been used the pool is cleared and selection runs
/// once more from the full list. Chosen identifiers are merged into the
/// returned pool.
///
/// # Errors
///
/// Returns `SelectionError::NoQuestionsRemaining` only when `all` is empty.
pub fn select_questions<R: Rng + ?Sized>(
    all: &[Question],
    pool: &UsedQuestionPool,
    count: usize,
    rng: &mut R,
) -> Result<Selection, SelectionError> {
    select_inner(all, pool.clone(), count.max(1), rng, true)
}

fn select_inner<R: Rng + ?Sized>(
    all: &[Question],
    mut pool: UsedQuestionPool,
    count: usize,
    rng: &mut R,
    may_reset: bool,
) -> Result<Selection, SelectionError> {
    let mut remaining: Vec<Question> = all
        .iter()
        .filter(|question| !pool.contains(&question.id))
        .cloned()
        .collect();

    if remaining.is_empty() {
        if !may_reset {
            return Err(SelectionError::NoQuestionsRemaining);
        }
        pool.clear();
        return select_inner(all, pool, count, rng, false).map(|selection| Selection {
            pool_reset: true,
            ..selection
        });
    }

    if remaining.len() > count {
        remaining.shuffle(rng);
        remaining.truncate(count);
    }

    pool.record(remaining.iter().map(|question| &question.id));
    Ok(Selection {
        questions: remaining,
        pool,
        pool_reset: false,
    })
}
