//! Session scoring and cross-session assessment.
//!
//! Every quiz kind converges on the same two weighted combinations; the kind's
//! [`KindProfile`] only chooses which sub-scores exist and how much each
//! counts.

mod advice;
mod subscores;
pub mod text;

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::model::{
    KindProfile, Level, Question, QuestionDetail, QuizKind, SessionAnswer, SessionResult,
    SkillAssessment, SubScore,
};
use advice::{AdviceInputs, advise};
use text::count_f64;

/// Clamp to `[0, 100]`, mapping NaN to zero.
#[must_use]
pub fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Weighted linear combination of sub-scores, clamped to `[0, 100]`.
/// Missing sub-scores count as zero.
#[must_use]
pub fn weighted_score(weights: &[(SubScore, f64)], values: &BTreeMap<SubScore, f64>) -> f64 {
    let sum: f64 = weights
        .iter()
        .map(|(sub, weight)| weight * values.get(sub).copied().unwrap_or(0.0))
        .sum();
    clamp_score(sum)
}

/// Convert a completed stage's answers into a durable session record.
#[must_use]
pub fn score_session(
    kind: QuizKind,
    answers: &[SessionAnswer],
    questions: &[Question],
    completed_at: DateTime<Utc>,
) -> SessionResult {
    let profile = kind.profile();
    let sub_scores: BTreeMap<SubScore, f64> = subscores::compute(profile, answers, questions)
        .into_iter()
        .map(|(sub, value)| (sub, clamp_score(value)))
        .collect();
    let session_score = weighted_score(profile.session_weights, &sub_scores);
    let correct = answers
        .iter()
        .filter(|answer| answer.correct == Some(true))
        .count();

    SessionResult {
        id: Uuid::new_v4(),
        skill: kind.skill(),
        kind,
        completed_at,
        total: u32::try_from(answers.len()).unwrap_or(u32::MAX),
        correct: u32::try_from(correct).unwrap_or(u32::MAX),
        sub_scores,
        session_score,
        details: answers.iter().map(QuestionDetail::from).collect(),
    }
}

/// Recompute a skill's assessment from its full session history.
#[must_use]
pub fn score_assessment(
    kind: QuizKind,
    history: &[SessionResult],
    assessed_at: DateTime<Utc>,
) -> SkillAssessment {
    let profile = kind.profile();
    let scores: Vec<f64> = history.iter().map(|s| s.session_score).collect();
    let average_sub_scores = average_sub_scores(profile, history);

    let quality = average_sub_scores
        .get(&profile.primary)
        .copied()
        .unwrap_or(0.0);
    let average_score = mean(&scores);
    let improvement = match (scores.first(), scores.last()) {
        (Some(first), Some(last)) => last - first,
        _ => 0.0,
    };
    let normalized_improvement = clamp_score(50.0 + improvement);
    let consistency = if history.is_empty() {
        0.0
    } else {
        (100.0 - std_dev(&scores)).max(0.0)
    };
    let specialization = profile.assessment.specialization.map(|_| {
        let vocabulary = average_sub_scores
            .get(&SubScore::Vocabulary)
            .copied()
            .unwrap_or(0.0);
        let intuition = average_sub_scores
            .get(&SubScore::Intuition)
            .copied()
            .unwrap_or(0.0);
        100.0 - (vocabulary - intuition).abs()
    });

    let final_score = if history.is_empty() {
        0.0
    } else {
        let weights = profile.assessment;
        clamp_score(
            weights.quality * quality
                + weights.average_score * average_score
                + weights.improvement * normalized_improvement
                + weights.consistency * consistency
                + weights.specialization.unwrap_or(0.0) * specialization.unwrap_or(0.0),
        )
    };

    let advice = advise(&AdviceInputs {
        sessions: history.len(),
        averages: &average_sub_scores,
        improvement,
        consistency,
    });

    SkillAssessment {
        skill: kind.skill(),
        kind,
        assessed_at,
        sessions: u32::try_from(history.len()).unwrap_or(u32::MAX),
        average_sub_scores,
        quality,
        average_score,
        improvement,
        consistency,
        specialization,
        final_score,
        level: Level::from_score(final_score),
        strengths: advice.strengths,
        weaknesses: advice.weaknesses,
        recommendations: advice.recommendations,
    }
}

fn average_sub_scores(profile: &KindProfile, history: &[SessionResult]) -> BTreeMap<SubScore, f64> {
    if history.is_empty() {
        return BTreeMap::new();
    }
    profile
        .session_weights
        .iter()
        .map(|(sub, _)| {
            let values: Vec<f64> = history.iter().map(|s| s.sub_score(*sub)).collect();
            (*sub, mean(&values))
        })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / count_f64(values.len())
}

/// Population standard deviation.
fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / count_f64(values.len());
    variance.sqrt()
}
