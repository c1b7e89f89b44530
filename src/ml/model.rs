// ============================================================
// Layer 5 — Match-LSTM Model Assembly
// ============================================================
// Wires the full architecture together:
//
//   token ids ─ embedding lookup (frozen table)
//        │
//        ▼
//   preprocessing LSTMs ─→ HQ [batch, Q, l], HP [batch, P, l]
//        │
//        ▼
//   matching cells, forward + backward over the paragraph
//        │
//        ▼
//   HR [batch, P, 2l] ─→ boundary decoder ─→ start/end logits
//
// plus the masked loss (training) and masked softmax
// predictions (inference). HQ, HP and HR are recomputed on
// every forward pass; nothing is cached across steps.
//
// The embedding table is a constant (non-parameter) tensor:
// it is loaded once from the pretrained archive, shared by both
// lookups, and never receives gradient updates.

use burn::nn::loss::CrossEntropyLossConfig;
use burn::prelude::*;
use burn::tensor::activation;

use crate::data::batcher::QaBatch;
use crate::data::embedding::EmbeddingTable;
use crate::ml::cell::{run_unidirectional, LstmCell, LstmCellConfig, LstmState};
use crate::ml::decoder::{BoundaryDecoder, BoundaryDecoderConfig};
use crate::ml::match_cell::{MatchLstmCell, MatchLstmCellConfig};

/// Fill value for masked-out logits. Large enough that softmax
/// underflows to exactly 0.0 at masked positions, small enough
/// to stay well clear of f32 overflow when summed with logits.
const MASKED_LOGIT: f32 = -1.0e9;

#[derive(Config, Debug)]
pub struct MatchLstmConfig {
    pub vocab_size:         usize,
    pub embedding_size:     usize,
    pub state_size:         usize,
    pub max_paragraph_size: usize,
    pub max_question_size:  usize,
}

impl MatchLstmConfig {
    /// Build the model around a loaded embedding table. A table
    /// whose shape disagrees with the config is a fatal
    /// configuration error.
    pub fn init<B: Backend>(&self, embeddings: &EmbeddingTable, device: &B::Device) -> MatchLstm<B> {
        let (vocab_size, dim) = embeddings.dim();
        assert_eq!(
            (vocab_size, dim),
            (self.vocab_size, self.embedding_size),
            "embedding table shape mismatch: expected [{}, {}], got [{}, {}]",
            self.vocab_size,
            self.embedding_size,
            vocab_size,
            dim
        );

        let table = Tensor::<B, 2>::from_data(
            TensorData::new(embeddings.to_flat_vec(), [vocab_size, dim]),
            device,
        );

        MatchLstm {
            embeddings: table,
            encoder: MatchLstmEncoder {
                question_rnn:   LstmCellConfig::new(self.embedding_size, self.state_size).init(device),
                paragraph_rnn:  LstmCellConfig::new(self.embedding_size, self.state_size).init(device),
                match_forward:  MatchLstmCellConfig::new(self.state_size).init(device),
                match_backward: MatchLstmCellConfig::new(self.state_size).init(device),
                hidden_size:    self.state_size,
            },
            decoder: BoundaryDecoderConfig::new(self.state_size).init(device),
            max_paragraph_size: self.max_paragraph_size,
            max_question_size:  self.max_question_size,
        }
    }
}

/// Raw (pre-softmax) position scores, one per paragraph position.
#[derive(Debug, Clone)]
pub struct SpanLogits<B: Backend> {
    pub start: Tensor<B, 2>,
    pub end:   Tensor<B, 2>,
}

// ─── Encoder ──────────────────────────────────────────────────────────────────

/// Preprocessing encoders plus the bidirectional matching pass.
#[derive(Module, Debug)]
pub struct MatchLstmEncoder<B: Backend> {
    question_rnn:   LstmCell<B>,
    paragraph_rnn:  LstmCell<B>,
    match_forward:  MatchLstmCell<B>,
    match_backward: MatchLstmCell<B>,
    hidden_size:    usize,
}

impl<B: Backend> MatchLstmEncoder<B> {
    /// Encode a batch into HR [batch, P, 2l].
    ///
    /// The backward matching direction is realized by reversing
    /// each example's valid paragraph prefix (padding stays in
    /// place), running the second cell forward, and un-reversing
    /// its outputs. Both directions read the same HQ, unmodified.
    pub fn forward(
        &self,
        question_embed: Tensor<B, 3>,
        paragraph_embed: Tensor<B, 3>,
        question_mask: Tensor<B, 2>,
        paragraph_mask: Tensor<B, 2>,
        paragraph_len: &[usize],
    ) -> Tensor<B, 3> {
        let [batch_size, p_len, _] = paragraph_embed.dims();
        let l = self.hidden_size;
        let device = paragraph_embed.device();

        let hq = run_unidirectional(&self.question_rnn, question_embed, question_mask);
        let hp = run_unidirectional(&self.paragraph_rnn, paragraph_embed, paragraph_mask.clone());

        let hr_forward = self.match_pass(&self.match_forward, &hq, hp.clone(), &paragraph_mask);

        let reverse = reversal_indices::<B>(paragraph_len, p_len, &device)
            .unsqueeze_dim::<3>(2)
            .expand([batch_size, p_len, l]);
        let hp_reversed = hp.gather(1, reverse.clone());
        let hr_backward = self
            .match_pass(&self.match_backward, &hq, hp_reversed, &paragraph_mask)
            .gather(1, reverse);

        Tensor::cat(vec![hr_forward, hr_backward], 2) // [batch, P, 2l]
    }

    /// One matching direction over HP, with the same length
    /// masking as the preprocessing recurrence: zero emitted
    /// output and frozen carried state past the true length.
    fn match_pass(
        &self,
        cell: &MatchLstmCell<B>,
        hq: &Tensor<B, 3>,
        hp: Tensor<B, 3>,
        mask: &Tensor<B, 2>,
    ) -> Tensor<B, 3> {
        let [batch_size, p_len, l] = hp.dims();
        let device = hp.device();

        let hq_proj = cell.project_question(hq);
        let mut state = LstmState::zeros(batch_size, l, &device);
        let mut outputs = Vec::with_capacity(p_len);

        for t in 0..p_len {
            let hp_t = hp
                .clone()
                .slice([0..batch_size, t..t + 1, 0..l])
                .reshape([batch_size, l]);
            let m_t = mask.clone().slice([0..batch_size, t..t + 1]).expand([batch_size, l]);
            let keep = m_t.clone().ones_like() - m_t.clone();

            let (h_new, s_new) = cell.step(hq, &hq_proj, hp_t, state.clone());

            outputs.push(h_new * m_t.clone());
            state = LstmState {
                cell:   s_new.cell * m_t.clone() + state.cell * keep.clone(),
                hidden: s_new.hidden * m_t + state.hidden * keep,
            };
        }

        Tensor::stack::<3>(outputs, 1)
    }
}

/// Per-example index map that reverses the valid prefix and
/// leaves padding positions where they are.
fn reversal_indices<B: Backend>(
    lengths: &[usize],
    max_len: usize,
    device: &B::Device,
) -> Tensor<B, 2, Int> {
    let mut indices = Vec::with_capacity(lengths.len() * max_len);
    for &len in lengths {
        for t in 0..max_len {
            let idx = if t < len { len - 1 - t } else { t };
            indices.push(idx as i32);
        }
    }
    Tensor::<B, 1, Int>::from_ints(indices.as_slice(), device).reshape([lengths.len(), max_len])
}

// ─── Model ────────────────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct MatchLstm<B: Backend> {
    /// Frozen pretrained embedding table [vocab, embedding_dim].
    /// A constant, not a Param: the optimizer never touches it.
    embeddings: Tensor<B, 2>,
    encoder:    MatchLstmEncoder<B>,
    decoder:    BoundaryDecoder<B>,
    max_paragraph_size: usize,
    max_question_size:  usize,
}

impl<B: Backend> MatchLstm<B> {
    /// Look token ids up in the frozen table.
    fn embed(&self, ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let [batch_size, seq_len] = ids.dims();
        let dim = self.embeddings.dims()[1];
        self.embeddings
            .clone()
            .select(0, ids.reshape([batch_size * seq_len]))
            .reshape([batch_size, seq_len, dim])
    }

    /// Raw start/end logits for a batch, [batch, P] each.
    pub fn forward(&self, batch: &QaBatch<B>) -> SpanLogits<B> {
        let q_dims = batch.question_ids.dims();
        let p_dims = batch.paragraph_ids.dims();
        assert_eq!(
            q_dims[1], self.max_question_size,
            "question length mismatch: expected {}, got {}",
            self.max_question_size, q_dims[1]
        );
        assert_eq!(
            p_dims[1], self.max_paragraph_size,
            "paragraph length mismatch: expected {}, got {}",
            self.max_paragraph_size, p_dims[1]
        );

        let question_embed = self.embed(batch.question_ids.clone());
        let paragraph_embed = self.embed(batch.paragraph_ids.clone());

        let hr = self.encoder.forward(
            question_embed,
            paragraph_embed,
            batch.question_mask.clone(),
            batch.paragraph_mask.clone().float(),
            &batch.paragraph_len,
        );

        let (start, end) = self.decoder.forward(hr);
        SpanLogits { start, end }
    }

    /// Masked cross-entropy training loss: per example, logits are
    /// restricted to valid paragraph positions, then scored against
    /// the gold start and end independently. Total loss is the mean
    /// start term plus the mean end term, equally weighted. Masked
    /// positions get zero probability and therefore zero gradient.
    pub fn forward_loss(&self, batch: &QaBatch<B>) -> (Tensor<B, 1>, SpanLogits<B>) {
        let logits = self.forward(batch);
        let invalid = batch.paragraph_mask.clone().bool_not();

        let masked_start = logits.start.clone().mask_fill(invalid.clone(), MASKED_LOGIT);
        let masked_end = logits.end.clone().mask_fill(invalid, MASKED_LOGIT);

        let ce = CrossEntropyLossConfig::new().init(&masked_start.device());
        let loss = ce.forward(masked_start, batch.start_positions.clone())
            + ce.forward(masked_end, batch.end_positions.clone());

        (loss, logits)
    }

    /// Inference-time distributions: mask, then softmax, so
    /// padding positions hold exactly zero probability and can
    /// never be argmax candidates.
    pub fn predictions(&self, batch: &QaBatch<B>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let logits = self.forward(batch);
        let invalid = batch.paragraph_mask.clone().bool_not();

        let start = activation::softmax(logits.start.mask_fill(invalid.clone(), MASKED_LOGIT), 1);
        let end = activation::softmax(logits.end.mask_fill(invalid, MASKED_LOGIT), 1);
        (start, end)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batcher::QaBatcher;
    use crate::domain::example::QaExample;
    use ndarray::Array2;

    type TestBackend = burn::backend::NdArray;

    const VOCAB: usize = 12;
    const EMBED: usize = 4;
    const STATE: usize = 3;
    const P: usize = 5;
    const Q: usize = 3;

    fn table() -> EmbeddingTable {
        let values: Vec<f32> = (0..VOCAB * EMBED).map(|i| (i as f32) / 10.0).collect();
        EmbeddingTable::from_array(Array2::from_shape_vec((VOCAB, EMBED), values).unwrap())
    }

    fn model() -> MatchLstm<TestBackend> {
        MatchLstmConfig::new(VOCAB, EMBED, STATE, P, Q).init(&table(), &Default::default())
    }

    fn example(paragraph_mask: Vec<bool>) -> QaExample {
        QaExample {
            question:       vec![1, 2, 0],
            question_mask:  vec![true, true, false],
            paragraph:      vec![3, 4, 5, 0, 0],
            paragraph_mask,
            span:           (1, 2),
            answer:         vec!["x".into()],
        }
    }

    #[test]
    fn embedding_lookup_returns_table_rows() {
        let m = model();
        let device = Default::default();
        let ids = Tensor::<TestBackend, 1, Int>::from_ints([2, 0].as_slice(), &device)
            .reshape([1, 2]);
        let embedded: Vec<f32> = m.embed(ids).into_data().to_vec().unwrap();

        // Row 2 of the table is [0.8, 0.9, 1.0, 1.1], row 0 is [0.0, 0.1, 0.2, 0.3]
        let expected = [0.8, 0.9, 1.0, 1.1, 0.0, 0.1, 0.2, 0.3];
        for (v, e) in embedded.iter().zip(&expected) {
            assert!((v - e).abs() < 1e-6);
        }
    }

    #[test]
    fn encoder_produces_double_width_paragraph_representation() {
        let m = model();
        let batcher = QaBatcher::<TestBackend>::new(Default::default());
        let e = example(vec![true, true, true, false, false]);
        let batch = batcher.batch(&[&e]);

        let question_embed = m.embed(batch.question_ids.clone());
        let paragraph_embed = m.embed(batch.paragraph_ids.clone());
        let hr = m.encoder.forward(
            question_embed,
            paragraph_embed,
            batch.question_mask.clone(),
            batch.paragraph_mask.clone().float(),
            &batch.paragraph_len,
        );
        assert_eq!(hr.dims(), [1, P, 2 * STATE]);
    }

    #[test]
    fn logits_cover_every_paragraph_position() {
        let m = model();
        let batcher = QaBatcher::<TestBackend>::new(Default::default());
        let a = example(vec![true, true, true, false, false]);
        let b = example(vec![true, true, true, true, true]);
        let batch = batcher.batch(&[&a, &b]);

        let logits = m.forward(&batch);
        assert_eq!(logits.start.dims(), [2, P]);
        assert_eq!(logits.end.dims(), [2, P]);
    }

    #[test]
    fn masked_positions_hold_exactly_zero_probability() {
        let m = model();
        let batcher = QaBatcher::<TestBackend>::new(Default::default());
        // Mask [1,1,1,0,0]: indices 3 and 4 are padding
        let e = example(vec![true, true, true, false, false]);
        let batch = batcher.batch(&[&e]);

        let (start, end) = m.predictions(&batch);
        let s: Vec<f32> = start.into_data().to_vec().unwrap();
        let ee: Vec<f32> = end.into_data().to_vec().unwrap();

        assert_eq!(s[3], 0.0);
        assert_eq!(s[4], 0.0);
        assert_eq!(ee[3], 0.0);
        assert_eq!(ee[4], 0.0);

        let s_total: f32 = s.iter().sum();
        let e_total: f32 = ee.iter().sum();
        assert!((s_total - 1.0).abs() < 1e-5);
        assert!((e_total - 1.0).abs() < 1e-5);
    }

    #[test]
    fn loss_is_a_finite_positive_scalar() {
        let m = model();
        let batcher = QaBatcher::<TestBackend>::new(Default::default());
        let e = example(vec![true, true, true, false, false]);
        let batch = batcher.batch(&[&e]);

        let (loss, _) = m.forward_loss(&batch);
        let value: f32 = loss.into_scalar().elem();
        assert!(value.is_finite());
        assert!(value > 0.0);
    }

    #[test]
    #[should_panic(expected = "embedding table shape mismatch")]
    fn mis_shaped_embedding_table_is_fatal() {
        let _ = MatchLstmConfig::new(VOCAB, EMBED + 1, STATE, P, Q)
            .init::<TestBackend>(&table(), &Default::default());
    }
}
