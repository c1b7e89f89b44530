// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Turns the model's masked probability distributions into a
// concrete (start, end) answer span.
//
// Start and end are argmaxed independently, which can produce
// an end before the start. The tie-break keeps the endpoint
// with the larger peak probability and collapses the other onto
// it, so the resolved span is a single token at the
// higher-confidence index and end >= start always holds.

use anyhow::{anyhow, Result};
use burn::prelude::*;

use crate::data::batcher::QaBatcher;
use crate::domain::example::QaExample;
use crate::ml::model::MatchLstm;

/// Predict the answer span for one example.
pub fn predict_span<B: Backend>(
    model: &MatchLstm<B>,
    batcher: &QaBatcher<B>,
    example: &QaExample,
) -> Result<(usize, usize)> {
    let batch = batcher.batch(&[example]);
    let (start_probs, end_probs) = model.predictions(&batch);

    let start: Vec<f32> = start_probs
        .into_data()
        .to_vec()
        .map_err(|e| anyhow!("cannot read start distribution: {e:?}"))?;
    let end: Vec<f32> = end_probs
        .into_data()
        .to_vec()
        .map_err(|e| anyhow!("cannot read end distribution: {e:?}"))?;

    Ok(resolve_span(&start, &end))
}

/// Resolve independent start/end distributions into an ordered
/// span. Guarantees end >= start.
pub fn resolve_span(start_probs: &[f32], end_probs: &[f32]) -> (usize, usize) {
    let a_s = argmax(start_probs);
    let a_e = argmax(end_probs);

    if a_e < a_s {
        if start_probs[a_s] > end_probs[a_e] {
            (a_s, a_s)
        } else {
            (a_e, a_e)
        }
    } else {
        (a_s, a_e)
    }
}

fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
        .0
}
