// ============================================================
// Layer 5 — Global-Norm Gradient Clipping
// ============================================================
// Treats the gradients of ALL trainable parameters as one
// vector: if its L2 norm exceeds the configured ceiling, every
// gradient is rescaled by the same factor so the global norm
// lands exactly on the ceiling. Directions within the gradient
// vector are unchanged; gradients at or below the ceiling pass
// through untouched.
//
// Implemented as two visitor passes over the module's
// parameters: one accumulates the squared norm out of the
// gradient container, the second rescales in place. The
// returned norm is the PRE-clip value, which the progress line
// reports.

use burn::module::{AutodiffModule, ModuleVisitor, ParamId};
use burn::optim::GradientsParams;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use std::marker::PhantomData;

/// L2 norm of the full gradient vector across all parameters.
pub fn global_grad_norm<B, M>(module: &M, grads: &GradientsParams) -> f32
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let mut probe = NormProbe::<B> { grads, sum_squares: 0.0, backend: PhantomData };
    module.visit(&mut probe);
    probe.sum_squares.sqrt() as f32
}

/// Clip gradients to a global-norm ceiling. Returns the
/// (possibly rescaled) gradients and the pre-clip global norm.
pub fn clip_by_global_norm<B, M>(
    module: &M,
    grads: GradientsParams,
    max_norm: f32,
) -> (GradientsParams, f32)
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let norm = global_grad_norm(module, &grads);
    if norm <= max_norm || norm == 0.0 {
        return (grads, norm);
    }

    let scale = max_norm / norm;
    let mut scaler = GradScaler::<B> { grads, scale, backend: PhantomData };
    module.visit(&mut scaler);
    (scaler.grads, norm)
}

struct NormProbe<'a, B: AutodiffBackend> {
    grads: &'a GradientsParams,
    sum_squares: f64,
    backend: PhantomData<B>,
}

impl<'a, B: AutodiffBackend> ModuleVisitor<B> for NormProbe<'a, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.get::<B::InnerBackend, D>(id) {
            let sum: f32 = grad.powf_scalar(2.0).sum().into_scalar().elem();
            self.sum_squares += sum as f64;
        }
    }
}

struct GradScaler<B: AutodiffBackend> {
    grads: GradientsParams,
    scale: f32,
    backend: PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for GradScaler<B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.remove::<B::InnerBackend, D>(id) {
            self.grads.register(id, grad.mul_scalar(self.scale));
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::cell::{LstmCellConfig, LstmState, RecurrentStep};

    type TestBackend = burn::backend::Autodiff<burn::backend::NdArray>;

    fn cell_with_grads() -> (
        crate::ml::cell::LstmCell<TestBackend>,
        GradientsParams,
    ) {
        let device = Default::default();
        let cell = LstmCellConfig::new(2, 3).init::<TestBackend>(&device);
        let input = Tensor::<TestBackend, 2>::from_floats([[1.5, -2.0]], &device);
        let state = LstmState::zeros(1, 3, &device);

        let (output, next) = cell.step(input, state);
        let loss = output.sum() + next.cell.sum();
        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &cell);
        (cell, grads)
    }

    #[test]
    fn post_clip_norm_equals_the_ceiling() {
        let (cell, grads) = cell_with_grads();
        let before = global_grad_norm(&cell, &grads);
        assert!(before > 0.0);

        let ceiling = before / 2.0;
        let (clipped, reported) = clip_by_global_norm(&cell, grads, ceiling);

        assert!((reported - before).abs() < 1e-6, "reported norm is pre-clip");
        let after = global_grad_norm(&cell, &clipped);
        assert!(
            (after - ceiling).abs() < 1e-4,
            "post-clip norm {after} should equal ceiling {ceiling}"
        );
    }

    #[test]
    fn gradients_below_the_ceiling_are_untouched() {
        let (cell, grads) = cell_with_grads();
        let before = global_grad_norm(&cell, &grads);

        let (clipped, reported) = clip_by_global_norm(&cell, grads, before * 2.0);
        assert_eq!(reported, before);

        let after = global_grad_norm(&cell, &clipped);
        assert!((after - before).abs() < 1e-6);
    }
}
