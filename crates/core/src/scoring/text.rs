//! Text heuristics shared by typed-answer and writing kinds.

use std::collections::{HashMap, HashSet};

/// Trimmed, lower-cased form used to compare short answers.
#[must_use]
pub fn normalize_answer(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Lower-cased word tokens with surrounding punctuation removed.
#[must_use]
pub fn tokens(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|word| {
            word.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
                .to_lowercase()
        })
        .filter(|word| !word.is_empty())
        .collect()
}

/// Multiset word overlap between an expected text and a response, 0–100.
#[must_use]
pub fn word_overlap(expected: &str, response: &str) -> f64 {
    let expected = tokens(expected);
    let response = tokens(response);
    let longest = expected.len().max(response.len());
    if longest == 0 {
        return 100.0;
    }
    let mut available: HashMap<&str, usize> = HashMap::new();
    for word in &expected {
        *available.entry(word.as_str()).or_default() += 1;
    }
    let mut matched = 0_usize;
    for word in &response {
        if let Some(count) = available.get_mut(word.as_str()) {
            if *count > 0 {
                *count -= 1;
                matched += 1;
            }
        }
    }
    ratio(matched, longest) * 100.0
}

/// Averaged writing heuristics, 0–100: length against target, lexical
/// diversity, sentence length, and coverage of the sample's keywords.
#[must_use]
pub fn writing_quality(response: &str, sample: &str, target_words: u32) -> f64 {
    let words = tokens(response);
    if words.is_empty() {
        return 0.0;
    }

    let target = f64::from(target_words.max(1));
    let length = (count_f64(words.len()) / target).min(1.0) * 100.0;

    let unique: HashSet<&str> = words.iter().map(String::as_str).collect();
    let diversity = (ratio(unique.len(), words.len()) / 0.7).min(1.0) * 100.0;

    let sentences = response
        .split(['.', '!', '?'])
        .filter(|s| !tokens(s).is_empty())
        .count()
        .max(1);
    let per_sentence = ratio(words.len(), sentences);
    let distance = if per_sentence < 8.0 {
        8.0 - per_sentence
    } else if per_sentence > 25.0 {
        per_sentence - 25.0
    } else {
        0.0
    };
    let sentence_band = (100.0 - distance * 5.0).max(0.0);

    let keywords: HashSet<String> = tokens(sample)
        .into_iter()
        .filter(|word| word.chars().count() >= 5)
        .collect();
    let coverage = if keywords.is_empty() {
        100.0
    } else {
        let hits = keywords.iter().filter(|k| unique.contains(k.as_str())).count();
        (ratio(hits, keywords.len()) * 2.0).min(1.0) * 100.0
    };

    (length + diversity + sentence_band + coverage) / 4.0
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn count_f64(n: usize) -> f64 {
    n as f64
}

pub(crate) fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        count_f64(part) / count_f64(whole)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_strip_punctuation_and_case() {
        assert_eq!(tokens("Hello, World! It's"), vec!["hello", "world", "it's"]);
    }

    #[test]
    fn overlap_is_symmetric_in_length() {
        assert_eq!(word_overlap("the cat sat", "the cat sat"), 100.0);
        assert_eq!(word_overlap("the cat sat", ""), 0.0);
        let partial = word_overlap("the cat sat down", "the cat");
        assert!((partial - 50.0).abs() < 1e-9);
        let padded = word_overlap("the cat", "the the the cat");
        assert!((padded - 50.0).abs() < 1e-9);
    }

    #[test]
    fn writing_quality_rewards_length_and_variety() {
        let sample = "A golden retriever runs across a sunny beach near the ocean.";
        let short = writing_quality("Dog.", sample, 30);
        let long = writing_quality(
            "A happy golden retriever is running along the sunny beach. \
             Waves roll in from the ocean behind it while people watch from the sand. \
             The dog looks excited and carries a bright ball in its mouth.",
            sample,
            30,
        );
        assert!(long > short, "{long} <= {short}");
        assert!((0.0..=100.0).contains(&long));
        assert_eq!(writing_quality("   ", sample, 30), 0.0);
    }
}
