// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Synchronous single-threaded training:
//
//   Init → (SampleBatch → ForwardBackward → ClipGradients
//         → ApplyUpdate)* → EpochEvaluate → MaybeCheckpoint
//         → next epoch
//
// Each step draws a fresh random batch (out-of-range spans are
// resampled away), runs one forward-and-backward computation,
// clips the global gradient norm, and applies exactly one
// optimizer update. Per epoch the model is evaluated on sampled
// subsets of the train set (drift detection) and the dev set,
// a checkpoint is written, and the best-dev-F1 snapshot is
// refreshed when strictly improved.
//
// Training runs on Autodiff<NdArray>; evaluation runs on the
// inner backend via model.valid().

use anyhow::{bail, Result};
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer, SgdConfig};
use burn::prelude::*;
use std::io::Write;

use crate::application::train_use_case::TrainConfig;
use crate::data::batcher::QaBatcher;
use crate::data::dataset::SquadDataset;
use crate::data::embedding::EmbeddingTable;
use crate::data::vocab::Vocabulary;
use crate::infra::checkpoint::CheckpointManager;
use crate::infra::metrics::{EpochMetrics, MetricsLogger};
use crate::ml::clip::clip_by_global_norm;
use crate::ml::evaluator::evaluate_answer;
use crate::ml::model::{MatchLstm, MatchLstmConfig};

pub type TrainBackend = burn::backend::Autodiff<burn::backend::NdArray>;
pub type EvalBackend = burn::backend::NdArray;

/// Size of the circular per-step loss buffer.
const ROLLING_WINDOW: usize = 20;

/// Build the model and dispatch on the configured optimizer.
/// Anything outside {adam, sgd} is a fatal configuration error.
pub fn run_training(
    cfg: &TrainConfig,
    dataset: &SquadDataset,
    embeddings: &EmbeddingTable,
    vocab: &Vocabulary,
    ckpt: &CheckpointManager,
) -> Result<()> {
    let device = burn::backend::ndarray::NdArrayDevice::default();

    let model_cfg = MatchLstmConfig::new(
        embeddings.vocab_size(),
        cfg.embedding_size,
        cfg.state_size,
        cfg.max_paragraph_size,
        cfg.max_question_size,
    );
    let model: MatchLstm<TrainBackend> = model_cfg.init(embeddings, &device);
    tracing::info!(
        "Model ready: {} trainable parameters (state_size={})",
        model.num_params(),
        cfg.state_size
    );

    match cfg.optimizer.as_str() {
        "adam" => fit(cfg, dataset, vocab, ckpt, model, AdamConfig::new().with_epsilon(1e-8).init(), device),
        "sgd" => fit(cfg, dataset, vocab, ckpt, model, SgdConfig::new().init(), device),
        other => bail!("Unrecognised optimizer '{other}': expected 'adam' or 'sgd'"),
    }
}

fn fit<O>(
    cfg: &TrainConfig,
    dataset: &SquadDataset,
    vocab: &Vocabulary,
    ckpt: &CheckpointManager,
    mut model: MatchLstm<TrainBackend>,
    mut optim: O,
    device: burn::backend::ndarray::NdArrayDevice,
) -> Result<()>
where
    O: Optimizer<MatchLstm<TrainBackend>, TrainBackend>,
{
    let batcher = QaBatcher::<TrainBackend>::new(device.clone());
    let eval_batcher = QaBatcher::<EvalBackend>::new(device);
    let mut rng = rand::thread_rng();

    let metrics = if cfg.export_metrics {
        Some(MetricsLogger::new(ckpt.run_dir())?)
    } else {
        None
    };

    let num_train = dataset.train.len();
    let steps_per_epoch = (num_train + cfg.batch_size - 1) / cfg.batch_size;
    let mut rolling = RollingLoss::new(ROLLING_WINDOW);
    let mut best = BestTracker::new();
    let mut global_step = 0usize;

    for epoch in 1..=cfg.epochs {
        for i in 0..steps_per_epoch {
            let examples =
                dataset.train.get_batch(cfg.batch_size, cfg.max_paragraph_size, &mut rng);
            let batch = batcher.batch(&examples);

            let (loss, _) = model.forward_loss(&batch);
            let batch_loss: f32 = loss.clone().into_scalar().elem();

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            let (grads, norm) = clip_by_global_norm(&model, grads, cfg.max_gradient_norm);
            model = optim.step(cfg.learning_rate, model, grads);

            global_step += 1;
            rolling.record(global_step, batch_loss);

            let completed = ((i + 1) * cfg.batch_size).min(num_train);
            let bar = "=".repeat(20 * completed / num_train.max(1));
            print!(
                "\rEPOCH: {} ==> (Rolling Ave Loss: {:.3}, Batch Loss: {:.3}) [{:<20}] (Completion: {}/{}) [norm: {:.2}]",
                epoch,
                rolling.mean(),
                batch_loss,
                bar,
                completed,
                num_train,
                norm
            );
            std::io::stdout().flush().ok();
        }
        println!();

        let eval_model = model.valid();
        tracing::info!("---------- Evaluating on Train Set ----------");
        let (train_f1, train_em) = evaluate_answer(
            &eval_model,
            &eval_batcher,
            &dataset.train,
            vocab,
            cfg.eval_size,
            true,
            &mut rng,
        )?;
        tracing::info!("---------- Evaluating on Dev Set ------------");
        let (dev_f1, dev_em) = evaluate_answer(
            &eval_model,
            &eval_batcher,
            &dataset.val,
            vocab,
            cfg.eval_size,
            true,
            &mut rng,
        )?;

        ckpt.save_epoch(&model, epoch, global_step)?;

        if best.observe(dev_f1) {
            ckpt.save_best(&model)?;
            tracing::info!(
                "New best dev F1: {:.2}, best model saved under '{}'",
                dev_f1,
                ckpt.early_stopping_dir().display()
            );
        }

        if let Some(logger) = &metrics {
            logger.log(&EpochMetrics {
                epoch,
                rolling_loss: rolling.mean() as f64,
                train_f1,
                train_em,
                dev_f1,
                dev_em,
            })?;
        }
    }

    tracing::info!("Training complete: {} steps over {} epochs", global_step, cfg.epochs);
    Ok(())
}

// ─── Rolling loss ─────────────────────────────────────────────────────────────

/// Fixed-size circular buffer of per-step losses, indexed by
/// global step modulo the window size. The mean is over the
/// whole buffer, so early readings are pulled toward the
/// zero-initialized slots; the value is for progress monitoring
/// only and is never fed back into training.
pub struct RollingLoss {
    window: Vec<f32>,
}

impl RollingLoss {
    pub fn new(size: usize) -> Self {
        Self { window: vec![0.0; size] }
    }

    pub fn record(&mut self, global_step: usize, loss: f32) {
        let size = self.window.len();
        self.window[global_step % size] = loss;
    }

    pub fn mean(&self) -> f32 {
        self.window.iter().sum::<f32>() / self.window.len() as f32
    }
}

// ─── Best-F1 tracking ─────────────────────────────────────────────────────────

/// Tracks the run's best dev F1. `observe` reports whether the
/// new value STRICTLY beats everything seen before; ties do not
/// refresh the early-stopping checkpoint.
pub struct BestTracker {
    best: f64,
}

impl BestTracker {
    pub fn new() -> Self {
        Self { best: 0.0 }
    }

    pub fn observe(&mut self, dev_f1: f64) -> bool {
        if dev_f1 > self.best {
            self.best = dev_f1;
            true
        } else {
            false
        }
    }
}

impl Default for BestTracker {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_mean_includes_zero_initialized_slots() {
        let mut rolling = RollingLoss::new(4);
        rolling.record(1, 8.0);
        rolling.record(2, 4.0);
        assert!((rolling.mean() - 3.0).abs() < 1e-6);
    }

    #[test]
    fn rolling_buffer_wraps_by_step_index() {
        let mut rolling = RollingLoss::new(2);
        rolling.record(1, 10.0);
        rolling.record(2, 20.0);
        // Step 3 lands on slot 1 again, evicting the 10.0
        rolling.record(3, 2.0);
        assert!((rolling.mean() - 11.0).abs() < 1e-6);
    }

    #[test]
    fn best_checkpoint_requires_strict_improvement() {
        let mut best = BestTracker::new();
        assert!(best.observe(3.0));
        assert!(best.observe(5.0));
        assert!(!best.observe(5.0), "a tie must not refresh the best checkpoint");
        assert!(!best.observe(4.0));
        assert!(best.observe(5.1));
    }
}
