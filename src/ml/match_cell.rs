// ============================================================
// Layer 5 — Matching Cell
// ============================================================
// The attention-augmented recurrent cell at the heart of the
// encoder. At each paragraph position it attends over the full
// question representation HQ, concatenates the resulting
// context vector with the paragraph token's preprocessed
// vector, and delegates the state update to an inner LSTM cell.
//
// The HQ linear projection does not depend on the step, so it
// is computed once per batch (project_question) and reused at
// every paragraph position. The per-step term is broadcast
// across the Q question positions.
//
// The question-side softmax is intentionally NOT masked:
// padding positions of HQ are zero vectors (length-masked
// preprocessing), so they contribute nothing to the context
// vector even though the softmax can assign them weight. See
// the test at the bottom of this file.

use burn::nn::{Initializer, Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation;

use crate::ml::cell::{LstmCell, LstmCellConfig, LstmState, RecurrentStep};

#[derive(Config, Debug)]
pub struct MatchLstmCellConfig {
    pub hidden_size: usize,
}

impl MatchLstmCellConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> MatchLstmCell<B> {
        let l = self.hidden_size;
        let xavier = Initializer::XavierUniform { gain: 1.0 };
        MatchLstmCell {
            question_proj: LinearConfig::new(l, l)
                .with_bias(false)
                .with_initializer(xavier.clone())
                .init(device),
            input_proj: LinearConfig::new(l, l).with_initializer(xavier.clone()).init(device),
            state_proj: LinearConfig::new(l, l)
                .with_bias(false)
                .with_initializer(xavier)
                .init(device),
            // Scoring vector starts at zero: the first steps attend
            // uniformly until the cell learns where to look
            score: LinearConfig::new(l, 1).with_initializer(Initializer::Zeros).init(device),
            inner: LstmCellConfig::new(2 * l, l).init(device),
            hidden_size: l,
        }
    }
}

/// Attention-augmented recurrent cell. Two independently
/// parameterized instances run the forward and backward passes
/// over the paragraph; each is a pure function of
/// (hp_i, state, HQ, parameters).
#[derive(Module, Debug)]
pub struct MatchLstmCell<B: Backend> {
    question_proj: Linear<B>,
    input_proj:    Linear<B>,
    state_proj:    Linear<B>,
    score:         Linear<B>,
    inner:         LstmCell<B>,
    hidden_size:   usize,
}

impl<B: Backend> MatchLstmCell<B> {
    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Project HQ once for the batch. The result is a fixed
    /// per-batch constant reused identically at every step.
    pub fn project_question(&self, hq: &Tensor<B, 3>) -> Tensor<B, 3> {
        self.question_proj.forward(hq.clone())
    }

    /// Attend over the question: returns the context vector
    /// [batch, l] and the attention weights [batch, Q, 1]
    /// (softmax over Q, summing to 1 per example).
    pub(crate) fn attend(
        &self,
        hq: &Tensor<B, 3>,
        hq_proj: &Tensor<B, 3>,
        hp_i: Tensor<B, 2>,
        hidden: &Tensor<B, 2>,
    ) -> (Tensor<B, 2>, Tensor<B, 3>) {
        let [batch_size, q_len, l] = hq.dims();

        // Step term from the paragraph input and previous output,
        // broadcast across the Q question positions
        let step_term = self.input_proj.forward(hp_i) + self.state_proj.forward(hidden.clone());
        let step_term = step_term.unsqueeze_dim::<3>(1).expand([batch_size, q_len, l]);

        let g = (hq_proj.clone() + step_term).tanh();
        let scores = self.score.forward(g); // [batch, Q, 1]
        let alpha = activation::softmax(scores, 1);

        // Weighted sum of HQ by the attention weights
        let context = hq
            .clone()
            .swap_dims(1, 2) // [batch, l, Q]
            .matmul(alpha.clone()) // [batch, l, 1]
            .reshape([batch_size, l]);

        (context, alpha)
    }

    /// One paragraph position: attend, concatenate, update.
    pub fn step(
        &self,
        hq: &Tensor<B, 3>,
        hq_proj: &Tensor<B, 3>,
        hp_i: Tensor<B, 2>,
        state: LstmState<B>,
    ) -> (Tensor<B, 2>, LstmState<B>) {
        let (context, _alpha) = self.attend(hq, hq_proj, hp_i.clone(), &state.hidden);
        let z_i = Tensor::cat(vec![hp_i, context], 1); // [batch, 2l]
        self.inner.step(z_i, state)
    }
}
