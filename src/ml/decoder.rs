// ============================================================
// Layer 5 — Boundary Pointer Decoder
// ============================================================
// Consumes the paragraph representation HR [batch, P, 2l] and
// produces two score vectors [batch, P]: start-position logits
// and end-position logits.
//
// Exactly two iterations of one decode step share a single
// parameter set: iteration 1 scores the start position,
// iteration 2 runs from the recurrent state left behind by
// iteration 1 and scores the end position. The sharing is
// explicit: one decode_step method, invoked twice.
//
// The returned logits are raw (pre-softmax). Masking and
// normalization are the loss/prediction layer's job; the
// softmax inside each iteration only exists to build the
// attention-weighted input for the pointer cell, and is
// unmasked like the rest of the decoder.

use burn::nn::{Initializer, Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation;

use crate::ml::cell::{LstmCell, LstmCellConfig, LstmState, RecurrentStep};

#[derive(Config, Debug)]
pub struct BoundaryDecoderConfig {
    pub hidden_size: usize,
}

impl BoundaryDecoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> BoundaryDecoder<B> {
        let l = self.hidden_size;
        let xavier = Initializer::XavierUniform { gain: 1.0 };
        BoundaryDecoder {
            hr_proj: LinearConfig::new(2 * l, l)
                .with_bias(false)
                .with_initializer(xavier.clone())
                .init(device),
            state_proj: LinearConfig::new(l, l).with_initializer(xavier).init(device),
            score: LinearConfig::new(l, 1).with_initializer(Initializer::Zeros).init(device),
            pointer: LstmCellConfig::new(2 * l, l).init(device),
            hidden_size: l,
        }
    }
}

#[derive(Module, Debug)]
pub struct BoundaryDecoder<B: Backend> {
    hr_proj:     Linear<B>,
    state_proj:  Linear<B>,
    score:       Linear<B>,
    pointer:     LstmCell<B>,
    hidden_size: usize,
}

impl<B: Backend> BoundaryDecoder<B> {
    /// Decode start and end logits from HR. The pointer cell
    /// starts from a zero state.
    pub fn forward(&self, hr: Tensor<B, 3>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let [batch_size, _, channels] = hr.dims();
        assert_eq!(
            channels,
            2 * self.hidden_size,
            "decoder expects HR with {} channels, got {}",
            2 * self.hidden_size,
            channels
        );

        // The HR projection is step-independent: compute once
        let hr_proj = self.hr_proj.forward(hr.clone()); // [batch, P, l]
        let state = LstmState::zeros(batch_size, self.hidden_size, &hr.device());

        let (start_logits, state) = self.decode_step(&hr, &hr_proj, state);
        let (end_logits, _) = self.decode_step(&hr, &hr_proj, state);

        (start_logits, end_logits)
    }

    /// One decode iteration: score every paragraph position from
    /// the current pointer state, then advance the pointer cell on
    /// the attention-weighted summary of HR.
    fn decode_step(
        &self,
        hr: &Tensor<B, 3>,
        hr_proj: &Tensor<B, 3>,
        state: LstmState<B>,
    ) -> (Tensor<B, 2>, LstmState<B>) {
        let [batch_size, p_len, l] = hr_proj.dims();

        let state_term = self.state_proj.forward(state.hidden.clone());
        let state_term = state_term.unsqueeze_dim::<3>(1).expand([batch_size, p_len, l]);

        let f_k = (hr_proj.clone() + state_term).tanh();
        let scores = self.score.forward(f_k); // [batch, P, 1]
        let logits = scores.clone().reshape([batch_size, p_len]);

        // Attention-weighted summary of HR feeds the pointer cell
        let beta = activation::softmax(scores, 1);
        let cell_input = hr
            .clone()
            .swap_dims(1, 2) // [batch, 2l, P]
            .matmul(beta) // [batch, 2l, 1]
            .reshape([batch_size, 2 * l]);

        let (_, next_state) = self.pointer.step(cell_input, state);
        (logits, next_state)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray;

    fn random_hr(batch: usize, p_len: usize, l: usize) -> Tensor<TestBackend, 3> {
        // Deterministic pseudo-values; content is irrelevant, shape is not
        let values: Vec<f32> = (0..batch * p_len * 2 * l)
            .map(|i| ((i * 37 % 23) as f32 - 11.0) / 13.0)
            .collect();
        Tensor::<TestBackend, 1>::from_floats(values.as_slice(), &Default::default())
            .reshape([batch, p_len, 2 * l])
    }

    #[test]
    fn produces_one_logit_per_paragraph_position() {
        let decoder = BoundaryDecoderConfig::new(3).init::<TestBackend>(&Default::default());
        let hr = random_hr(2, 5, 3);

        let (start, end) = decoder.forward(hr);
        assert_eq!(start.dims(), [2, 5]);
        assert_eq!(end.dims(), [2, 5]);
    }

    #[test]
    fn logits_are_finite() {
        let decoder = BoundaryDecoderConfig::new(2).init::<TestBackend>(&Default::default());
        let hr = random_hr(1, 4, 2);

        let (start, end) = decoder.forward(hr);
        let s: Vec<f32> = start.into_data().to_vec().unwrap();
        let e: Vec<f32> = end.into_data().to_vec().unwrap();
        assert!(s.iter().chain(e.iter()).all(|v| v.is_finite()));
    }

    #[test]
    #[should_panic(expected = "decoder expects HR")]
    fn rejects_mis_sized_paragraph_representation() {
        let decoder = BoundaryDecoderConfig::new(3).init::<TestBackend>(&Default::default());
        // 4 channels where 6 are required
        let hr = Tensor::<TestBackend, 1>::from_floats(vec![0.0; 8].as_slice(), &Default::default())
            .reshape([1, 2, 4]);
        let _ = decoder.forward(hr);
    }
}
