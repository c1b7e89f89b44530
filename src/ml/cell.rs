// ============================================================
// Layer 5 — Recurrent Cell
// ============================================================
// A step-wise LSTM cell built from Linear blocks, plus the
// length-masked unidirectional unroll the preprocessing
// encoders run over padded sequences.
//
// The cell is deliberately step-wise (one position per call)
// rather than sequence-wise: the matching cell and the pointer
// decoder both need to interleave attention computation with
// the recurrence, which a whole-sequence API cannot express.

use burn::nn::{Initializer, Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation;

/// Minimal interface a recurrent cell exposes to the components
/// that drive it. The matching cell and the decoder own an inner
/// cell through this seam and delegate the state update to it,
/// so nothing above this module depends on the LSTM gate layout.
pub trait RecurrentStep<B: Backend> {
    /// Advance one position: (input, state) -> (output, state).
    fn step(&self, input: Tensor<B, 2>, state: LstmState<B>) -> (Tensor<B, 2>, LstmState<B>);
}

/// Recurrent (memory, output) state for one forward pass.
/// Never persisted across batches.
#[derive(Debug, Clone)]
pub struct LstmState<B: Backend> {
    pub cell: Tensor<B, 2>,
    pub hidden: Tensor<B, 2>,
}

impl<B: Backend> LstmState<B> {
    /// Zero state, the start of every pass.
    pub fn zeros(batch_size: usize, hidden_size: usize, device: &B::Device) -> Self {
        Self {
            cell:   Tensor::zeros([batch_size, hidden_size], device),
            hidden: Tensor::zeros([batch_size, hidden_size], device),
        }
    }
}

#[derive(Config, Debug)]
pub struct LstmCellConfig {
    pub input_size: usize,
    pub hidden_size: usize,
}

impl LstmCellConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> LstmCell<B> {
        // One fused projection per source: [input|hidden] -> 4 gates
        let input_proj = LinearConfig::new(self.input_size, 4 * self.hidden_size)
            .with_initializer(Initializer::XavierUniform { gain: 1.0 })
            .init(device);
        let hidden_proj = LinearConfig::new(self.hidden_size, 4 * self.hidden_size)
            .with_bias(false)
            .with_initializer(Initializer::XavierUniform { gain: 1.0 })
            .init(device);
        LstmCell { input_proj, hidden_proj, hidden_size: self.hidden_size }
    }
}

/// Standard LSTM cell with a forget-gate bias of 1.0.
#[derive(Module, Debug)]
pub struct LstmCell<B: Backend> {
    input_proj:  Linear<B>,
    hidden_proj: Linear<B>,
    hidden_size: usize,
}

impl<B: Backend> LstmCell<B> {
    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }
}

impl<B: Backend> RecurrentStep<B> for LstmCell<B> {
    fn step(&self, input: Tensor<B, 2>, state: LstmState<B>) -> (Tensor<B, 2>, LstmState<B>) {
        let [batch_size, _] = input.dims();
        let l = self.hidden_size;

        let gates = self.input_proj.forward(input) + self.hidden_proj.forward(state.hidden);

        let input_gate  = activation::sigmoid(gates.clone().slice([0..batch_size, 0..l]));
        let forget_gate =
            activation::sigmoid(gates.clone().slice([0..batch_size, l..2 * l]).add_scalar(1.0));
        let candidate   = gates.clone().slice([0..batch_size, 2 * l..3 * l]).tanh();
        let output_gate = activation::sigmoid(gates.slice([0..batch_size, 3 * l..4 * l]));

        let cell = forget_gate * state.cell + input_gate * candidate;
        let hidden = output_gate * cell.clone().tanh();

        (hidden.clone(), LstmState { cell, hidden })
    }
}

/// Unroll a cell over a padded sequence with length-aware masking.
///
/// `inputs` is [batch, steps, features], `mask` is [batch, steps]
/// with 1.0 at valid positions. Past an example's true length the
/// emitted output is zero and the carried (cell, hidden) state is
/// frozen, so padding positions neither influence later positions
/// nor receive gradient through them.
pub fn run_unidirectional<B: Backend>(
    cell: &LstmCell<B>,
    inputs: Tensor<B, 3>,
    mask: Tensor<B, 2>,
) -> Tensor<B, 3> {
    let [batch_size, steps, features] = inputs.dims();
    assert_eq!(
        mask.dims(),
        [batch_size, steps],
        "sequence mask shape mismatch: expected [{batch_size}, {steps}], got {:?}",
        mask.dims()
    );

    let device = inputs.device();
    let l = cell.hidden_size();
    let mut state = LstmState::zeros(batch_size, l, &device);
    let mut outputs = Vec::with_capacity(steps);

    for t in 0..steps {
        let x_t = inputs
            .clone()
            .slice([0..batch_size, t..t + 1, 0..features])
            .reshape([batch_size, features]);
        let m_t = mask.clone().slice([0..batch_size, t..t + 1]).expand([batch_size, l]);
        let keep = m_t.clone().ones_like() - m_t.clone();

        let (h_new, s_new) = cell.step(x_t, state.clone());

        outputs.push(h_new * m_t.clone());
        state = LstmState {
            cell:   s_new.cell * m_t.clone() + state.cell * keep.clone(),
            hidden: s_new.hidden * m_t + state.hidden * keep,
        };
    }

    Tensor::stack::<3>(outputs, 1)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray;

    #[test]
    fn step_produces_hidden_sized_output() {
        let device = Default::default();
        let cell = LstmCellConfig::new(4, 3).init::<TestBackend>(&device);
        let input = Tensor::<TestBackend, 2>::from_floats([[1.0, -1.0, 0.5, 2.0]], &device);
        let state = LstmState::zeros(1, 3, &device);

        let (output, next) = cell.step(input, state);
        assert_eq!(output.dims(), [1, 3]);
        assert_eq!(next.cell.dims(), [1, 3]);
        assert_eq!(next.hidden.dims(), [1, 3]);
    }

    #[test]
    fn outputs_are_zero_past_true_length() {
        let device = Default::default();
        let cell = LstmCellConfig::new(2, 3).init::<TestBackend>(&device);
        // One example of true length 2 inside 4 padded steps
        let inputs = Tensor::<TestBackend, 2>::from_floats(
            [[1.0, 2.0], [3.0, 4.0], [9.0, 9.0], [9.0, 9.0]],
            &device,
        )
        .reshape([1, 4, 2]);
        let mask = Tensor::<TestBackend, 2>::from_floats([[1.0, 1.0, 0.0, 0.0]], &device);

        let outputs = run_unidirectional(&cell, inputs, mask);
        let values: Vec<f32> = outputs.into_data().to_vec().unwrap();

        // steps 2 and 3 (indices 6..12 in the flat layout) are zero
        assert!(values[6..12].iter().all(|&v| v == 0.0));
        // step 1 is a real activation
        assert!(values[3..6].iter().any(|&v| v != 0.0));
    }

    #[test]
    fn padding_does_not_disturb_carried_state() {
        let device = Default::default();
        let cell = LstmCellConfig::new(2, 3).init::<TestBackend>(&device);

        // Same valid prefix, wildly different padding content:
        // the valid outputs must be identical.
        let prefix = [[1.0, 2.0], [3.0, 4.0]];
        let a = Tensor::<TestBackend, 2>::from_floats(
            [prefix[0], prefix[1], [100.0, -100.0]],
            &device,
        )
        .reshape([1, 3, 2]);
        let b = Tensor::<TestBackend, 2>::from_floats(
            [prefix[0], prefix[1], [0.0, 0.0]],
            &device,
        )
        .reshape([1, 3, 2]);
        let mask = Tensor::<TestBackend, 2>::from_floats([[1.0, 1.0, 0.0]], &device);

        let out_a: Vec<f32> = run_unidirectional(&cell, a, mask.clone())
            .into_data()
            .to_vec()
            .unwrap();
        let out_b: Vec<f32> = run_unidirectional(&cell, b, mask)
            .into_data()
            .to_vec()
            .unwrap();

        for (x, y) in out_a.iter().zip(&out_b) {
            assert!((x - y).abs() < 1e-6);
        }
    }
}
