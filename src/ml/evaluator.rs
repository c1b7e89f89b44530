// ============================================================
// Layer 5 — Evaluator
// ============================================================
// Scores the model against gold answers on a sampled subset of
// a pool. Predicted spans are rendered back to text through the
// reverse vocabulary and compared with the standard QA metrics:
//
//   EM — 1 if the normalized prediction equals the normalized
//        gold string, else 0
//   F1 — token-overlap harmonic mean between the normalized
//        prediction and gold token multisets
//
// Normalization: lowercase, strip punctuation, drop the
// articles a/an/the, collapse whitespace.
//
// Sampling is without replacement within one call and
// independent across calls; no evaluation state persists.

use anyhow::Result;
use burn::prelude::*;
use rand::Rng;
use std::collections::HashMap;

use crate::data::batcher::QaBatcher;
use crate::data::dataset::QaPool;
use crate::data::vocab::Vocabulary;
use crate::ml::inferencer::predict_span;
use crate::ml::model::MatchLstm;

/// How many example predictions to log per verbose evaluation.
const LOGGED_SAMPLES: usize = 10;

/// Normalize an answer string for comparison.
pub fn normalize_answer(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| !c.is_ascii_punctuation())
        .collect::<String>()
        .split_whitespace()
        .filter(|token| !matches!(*token, "a" | "an" | "the"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Binary exact match after normalization.
pub fn exact_match_score(prediction: &str, ground_truth: &str) -> bool {
    normalize_answer(prediction) == normalize_answer(ground_truth)
}

/// Token-overlap F1 between normalized answers, in [0, 1].
pub fn f1_score(prediction: &str, ground_truth: &str) -> f64 {
    let prediction = normalize_answer(prediction);
    let ground_truth = normalize_answer(ground_truth);
    let predicted: Vec<&str> = prediction.split_whitespace().collect();
    let gold: Vec<&str> = ground_truth.split_whitespace().collect();

    if predicted.is_empty() && gold.is_empty() {
        return 1.0;
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for token in &gold {
        *counts.entry(token).or_insert(0) += 1;
    }

    let mut num_same = 0usize;
    for token in &predicted {
        if let Some(count) = counts.get_mut(token) {
            if *count > 0 {
                *count -= 1;
                num_same += 1;
            }
        }
    }

    if num_same == 0 {
        return 0.0;
    }
    let precision = num_same as f64 / predicted.len() as f64;
    let recall = num_same as f64 / gold.len() as f64;
    2.0 * precision * recall / (precision + recall)
}

/// Evaluate the model on up to `sample_size` examples drawn
/// without replacement from `pool` (capped by pool size).
/// Returns (F1, EM) as percentages. When `verbose` is set, the
/// summary and up to 10 example predictions are logged.
pub fn evaluate_answer<B: Backend>(
    model: &MatchLstm<B>,
    batcher: &QaBatcher<B>,
    pool: &QaPool,
    vocab: &Vocabulary,
    sample_size: usize,
    verbose: bool,
    rng: &mut impl Rng,
) -> Result<(f64, f64)> {
    let sampled = pool.sample_for_eval(sample_size, rng);
    if sampled.is_empty() {
        return Ok((0.0, 0.0));
    }

    let mut f1_total = 0.0f64;
    let mut em_total = 0.0f64;
    let mut logged = 0usize;

    for example in &sampled {
        let (a_s, a_e) = predict_span(model, batcher, example)?;
        let our_answer = vocab.render(&example.paragraph[a_s..=a_e]);
        let their_answer = example.answer_text();

        f1_total += f1_score(&our_answer, &their_answer);
        em_total += exact_match_score(&our_answer, &their_answer) as u64 as f64;

        if verbose && logged < LOGGED_SAMPLES {
            tracing::info!("Ground Truth: '{}', Our Answer: '{}'", their_answer, our_answer);
            logged += 1;
        }
    }

    let total = sampled.len() as f64;
    let f1 = 100.0 * f1_total / total;
    let em = 100.0 * em_total / total;

    if verbose {
        tracing::info!("F1: {:.2}, EM: {:.2}, for {} samples", f1, em, sampled.len());
    }
    Ok((f1, em))
}
