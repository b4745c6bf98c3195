use std::collections::BTreeMap;

use crate::model::SubScore;

const STRENGTH_AT: f64 = 80.0;
const WEAKNESS_AT: f64 = 50.0;

/// Advisory lists for an assessment; independent of the score itself.
#[derive(Debug, Default)]
pub(crate) struct Advice {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub recommendations: Vec<String>,
}

pub(crate) struct AdviceInputs<'a> {
    pub sessions: usize,
    pub averages: &'a BTreeMap<SubScore, f64>,
    pub improvement: f64,
    pub consistency: f64,
}

pub(crate) fn advise(inputs: &AdviceInputs<'_>) -> Advice {
    let mut advice = Advice::default();

    for (sub, value) in inputs.averages {
        if *value >= STRENGTH_AT {
            advice.strengths.push(format!("Strong {}", sub.label()));
        } else if *value <= WEAKNESS_AT {
            advice.weaknesses.push(format!("Low {}", sub.label()));
            advice.recommendations.push(recommend(*sub).to_owned());
        }
    }

    if inputs.sessions >= 3 && inputs.consistency >= 85.0 {
        advice
            .strengths
            .push("Consistent results across sessions".to_owned());
    }
    if inputs.sessions >= 2 && inputs.consistency < 60.0 {
        advice
            .weaknesses
            .push("Results vary a lot between sessions".to_owned());
        advice
            .recommendations
            .push("Practice at a steady pace in shorter, regular sittings".to_owned());
    }
    if inputs.improvement >= 10.0 {
        advice
            .strengths
            .push("Clear improvement since the first session".to_owned());
    } else if inputs.improvement < 0.0 {
        advice
            .recommendations
            .push("Review recent mistakes before starting another session".to_owned());
    }
    if inputs.sessions < 3 {
        advice
            .recommendations
            .push("Complete at least 3 sessions for a reliable level estimate".to_owned());
    }

    advice
}

fn recommend(sub: SubScore) -> &'static str {
    match sub {
        SubScore::Accuracy | SubScore::WeightedAccuracy => {
            "Slow down and check each answer before submitting"
        }
        SubScore::Vocabulary => "Read widely to grow the set of words you recognise",
        SubScore::Intuition => "Pay attention to spelling patterns that real words follow",
        SubScore::ResponseBalance => "Avoid defaulting to the same answer when unsure",
        SubScore::Speed => "Work on answering within the time limit",
        SubScore::Completion => "Give an answer to every item, even when unsure",
        SubScore::Similarity => "Listen for every word and check spelling carefully",
        SubScore::Quality => "Write longer answers with varied vocabulary and clear sentences",
    }
}
