// ============================================================
// Layer 4 — Q&A Batcher
// ============================================================
// Stacks a sampled set of examples into device tensors. All
// sequences are already padded to fixed lengths, so batching is
// flatten-then-reshape: no dynamic padding happens here.
//
// The batcher is generic over the Burn backend so the training
// loop (autodiff backend) and the evaluator (inference backend)
// share one implementation.

use burn::prelude::*;

use crate::domain::example::QaExample;

/// A batch of examples ready for the model forward pass.
/// Every tensor has batch_size as its first dimension.
#[derive(Debug, Clone)]
pub struct QaBatch<B: Backend> {
    /// Question token ids, shape [batch, Q]
    pub question_ids: Tensor<B, 2, Int>,

    /// Question validity mask as 1.0 / 0.0, shape [batch, Q].
    /// Float because it gates the recurrence arithmetic directly.
    pub question_mask: Tensor<B, 2>,

    /// Paragraph token ids, shape [batch, P]
    pub paragraph_ids: Tensor<B, 2, Int>,

    /// Paragraph validity mask, shape [batch, P].
    /// Boolean because the loss/prediction layer uses mask_fill.
    pub paragraph_mask: Tensor<B, 2, Bool>,

    /// Gold start indices, shape [batch]
    pub start_positions: Tensor<B, 1, Int>,

    /// Gold end indices, shape [batch]
    pub end_positions: Tensor<B, 1, Int>,

    /// True paragraph length per example (count of valid positions)
    pub paragraph_len: Vec<usize>,
}

/// Holds the target device so tensors land where the model runs.
#[derive(Clone, Debug)]
pub struct QaBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> QaBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    /// Stack sampled examples into a QaBatch.
    pub fn batch(&self, items: &[&QaExample]) -> QaBatch<B> {
        assert!(!items.is_empty(), "cannot batch zero examples");
        let batch_size = items.len();
        let q_len = items[0].question.len();
        let p_len = items[0].paragraph.len();

        let question_flat: Vec<i32> = items
            .iter()
            .flat_map(|e| e.question.iter().map(|&id| id as i32))
            .collect();
        let question_mask_flat: Vec<f32> = items
            .iter()
            .flat_map(|e| e.question_mask.iter().map(|&m| if m { 1.0 } else { 0.0 }))
            .collect();
        let paragraph_flat: Vec<i32> = items
            .iter()
            .flat_map(|e| e.paragraph.iter().map(|&id| id as i32))
            .collect();
        let paragraph_mask_flat: Vec<bool> = items
            .iter()
            .flat_map(|e| e.paragraph_mask.iter().copied())
            .collect();

        let starts: Vec<i32> = items.iter().map(|e| e.span.0 as i32).collect();
        let ends: Vec<i32> = items.iter().map(|e| e.span.1 as i32).collect();
        let paragraph_len: Vec<usize> = items.iter().map(|e| e.paragraph_len()).collect();

        let question_ids = Tensor::<B, 1, Int>::from_ints(question_flat.as_slice(), &self.device)
            .reshape([batch_size, q_len]);
        let question_mask =
            Tensor::<B, 1>::from_floats(question_mask_flat.as_slice(), &self.device)
                .reshape([batch_size, q_len]);
        let paragraph_ids = Tensor::<B, 1, Int>::from_ints(paragraph_flat.as_slice(), &self.device)
            .reshape([batch_size, p_len]);
        let paragraph_mask = Tensor::<B, 2, Bool>::from_data(
            TensorData::new(paragraph_mask_flat, [batch_size, p_len]),
            &self.device,
        );
        let start_positions = Tensor::<B, 1, Int>::from_ints(starts.as_slice(), &self.device);
        let end_positions = Tensor::<B, 1, Int>::from_ints(ends.as_slice(), &self.device);

        QaBatch {
            question_ids,
            question_mask,
            paragraph_ids,
            paragraph_mask,
            start_positions,
            end_positions,
            paragraph_len,
        }
    }
}
