use std::collections::{BTreeMap, HashMap};

use crate::model::{
    AnswerInput, KindProfile, Question, QuestionBody, QuestionId, QuestionShape, SessionAnswer,
    SubScore,
};
use crate::scoring::text::{count_f64, normalize_answer, ratio, word_overlap, writing_quality};

/// Raw answers joined with the question each one responds to.
struct Scored<'a> {
    answer: &'a SessionAnswer,
    question: Option<&'a Question>,
}

/// Compute every sub-score the kind's profile weights.
pub(crate) fn compute(
    profile: &KindProfile,
    answers: &[SessionAnswer],
    questions: &[Question],
) -> BTreeMap<SubScore, f64> {
    let by_id: HashMap<&QuestionId, &Question> = questions.iter().map(|q| (&q.id, q)).collect();
    let scored: Vec<Scored<'_>> = answers
        .iter()
        .map(|answer| Scored {
            answer,
            question: by_id.get(&answer.question_id).copied(),
        })
        .collect();

    profile
        .session_weights
        .iter()
        .map(|(sub, _)| {
            let value = if scored.is_empty() {
                0.0
            } else {
                sub_score(*sub, profile, &scored)
            };
            (*sub, value)
        })
        .collect()
}

fn sub_score(sub: SubScore, profile: &KindProfile, scored: &[Scored<'_>]) -> f64 {
    match sub {
        SubScore::Accuracy => accuracy(scored.iter()),
        SubScore::WeightedAccuracy => weighted_accuracy(scored),
        SubScore::Vocabulary => word_accuracy(scored, true),
        SubScore::Intuition => word_accuracy(scored, false),
        SubScore::ResponseBalance => response_balance(scored),
        SubScore::Speed => speed(scored, profile.item_limit_ms),
        SubScore::Completion => completion(scored),
        SubScore::Similarity => similarity(scored, profile.shape),
        SubScore::Quality => quality(scored, profile.target_words),
    }
}

fn accuracy<'a, 'b: 'a>(scored: impl Iterator<Item = &'a Scored<'b>>) -> f64 {
    let (mut correct, mut total) = (0_usize, 0_usize);
    for item in scored {
        total += 1;
        if item.answer.correct == Some(true) {
            correct += 1;
        }
    }
    ratio(correct, total) * 100.0
}

fn weighted_accuracy(scored: &[Scored<'_>]) -> f64 {
    let mut earned = 0.0;
    let mut possible = 0.0;
    for item in scored {
        let weight = item.question.map_or(1.0, |q| q.difficulty.weight());
        possible += weight;
        if item.answer.correct == Some(true) {
            earned += weight;
        }
    }
    if possible > 0.0 {
        earned / possible * 100.0
    } else {
        0.0
    }
}

fn is_real_word(item: &Scored<'_>) -> Option<bool> {
    match item.question.map(|q| &q.body) {
        Some(QuestionBody::Word { is_real, .. }) => Some(*is_real),
        _ => None,
    }
}

/// Accuracy restricted to real (`true`) or invented (`false`) words. Falls
/// back to overall accuracy when the stage had none of that group.
fn word_accuracy(scored: &[Scored<'_>], real: bool) -> f64 {
    let group: Vec<&Scored<'_>> = scored
        .iter()
        .filter(|item| is_real_word(item) == Some(real))
        .collect();
    if group.is_empty() {
        return accuracy(scored.iter());
    }
    accuracy(group.into_iter())
}

fn response_balance(scored: &[Scored<'_>]) -> f64 {
    let yes = scored
        .iter()
        .filter(|item| item.answer.input == AnswerInput::Flag(true))
        .count();
    let real = scored
        .iter()
        .filter(|item| is_real_word(item) == Some(true))
        .count();
    let gap = (ratio(yes, scored.len()) - ratio(real, scored.len())).abs();
    100.0 - gap * 100.0
}

fn speed(scored: &[Scored<'_>], limit_ms: u64) -> f64 {
    if limit_ms == 0 {
        return 100.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let total_ms: f64 = scored.iter().map(|item| item.answer.elapsed_ms as f64).sum();
    #[allow(clippy::cast_precision_loss)]
    let limit = limit_ms as f64;
    let mean = total_ms / count_f64(scored.len());
    ((1.0 - mean / limit) * 100.0).clamp(0.0, 100.0)
}

fn completion(scored: &[Scored<'_>]) -> f64 {
    let answered = scored
        .iter()
        .filter(|item| !item.answer.input.is_empty())
        .count();
    ratio(answered, scored.len()) * 100.0
}

fn similarity(scored: &[Scored<'_>], shape: QuestionShape) -> f64 {
    match shape {
        QuestionShape::Blanks => blank_level_accuracy(scored),
        _ => {
            let total: f64 = scored
                .iter()
                .map(|item| match (item.question.map(|q| &q.body), &item.answer.input) {
                    (Some(QuestionBody::Transcript { transcript, .. }), AnswerInput::Text(text)) => {
                        word_overlap(transcript, text)
                    }
                    _ => 0.0,
                })
                .sum();
            total / count_f64(scored.len())
        }
    }
}

/// Share of individual blanks filled correctly across the stage.
fn blank_level_accuracy(scored: &[Scored<'_>]) -> f64 {
    let (mut hits, mut blanks) = (0_usize, 0_usize);
    for item in scored {
        let Some(QuestionBody::Blanks { answers, .. }) = item.question.map(|q| &q.body) else {
            continue;
        };
        blanks += answers.len();
        let given: Vec<String> = match &item.answer.input {
            AnswerInput::Blanks(parts) => parts.clone(),
            AnswerInput::Text(text) => text.split(',').map(str::to_owned).collect(),
            _ => Vec::new(),
        };
        hits += answers
            .iter()
            .zip(&given)
            .filter(|(want, got)| normalize_answer(want) == normalize_answer(got))
            .count();
    }
    ratio(hits, blanks) * 100.0
}

fn quality(scored: &[Scored<'_>], target_words: u32) -> f64 {
    let total: f64 = scored
        .iter()
        .map(|item| {
            let sample = match item.question.map(|q| &q.body) {
                Some(QuestionBody::Writing { sample, .. }) => sample.as_str(),
                _ => "",
            };
            let target = match item.question.map(|q| &q.body) {
                Some(QuestionBody::Writing {
                    min_words: Some(min),
                    ..
                }) => *min,
                _ => target_words,
            };
            item.answer
                .input
                .text()
                .map_or(0.0, |text| writing_quality(text, sample, target))
        })
        .sum();
    total / count_f64(scored.len())
}
