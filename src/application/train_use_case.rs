// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Load the preprocessed dataset   (Layer 4 - data)
//   Step 2: Load the reverse vocabulary     (Layer 4 - data)
//   Step 3: Load the pretrained embeddings  (Layer 4 - data)
//   Step 4: Dump the resolved flags         (log_dir)
//   Step 5: Create the run directory        (Layer 6 - infra)
//   Step 6: Run the training loop           (Layer 5 - ml)
//
// Configuration problems (bad optimizer name, shape mismatches,
// degenerate pools) surface here, before any training step.

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::data::embedding::EmbeddingTable;
use crate::data::loader::SquadLoader;
use crate::data::vocab::Vocabulary;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::trainer::run_training;

/// Architecture name used in the checkpoint directory layout.
pub const MODEL_NAME: &str = "match-lstm";

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters and paths for a training run.
// Serialisable so the run directory keeps an exact record and
// the evaluate command can rebuild the same architecture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Optimizer step size
    pub learning_rate: f64,

    /// Global gradient-norm clipping ceiling
    pub max_gradient_norm: f32,

    pub batch_size: usize,
    pub epochs: usize,

    /// Hidden size of every recurrent cell (l)
    pub state_size: usize,

    /// Dimensionality of the pretrained embeddings
    pub embedding_size: usize,

    /// Paragraph length cutoff (P)
    pub max_paragraph_size: usize,

    /// Question length cutoff (Q)
    pub max_question_size: usize,

    /// Examples sampled per evaluation call
    pub eval_size: usize,

    /// "adam" or "sgd"
    pub optimizer: String,

    pub data_dir: String,
    pub train_dir: String,
    pub log_dir: String,

    /// Embedding archive path; empty selects
    /// {data_dir}/glove.trimmed.{embedding_size}.npz
    pub embed_path: String,

    /// Vocabulary path; empty selects {data_dir}/vocab.dat
    pub vocab_path: String,

    /// Per-epoch metrics CSV export toggle
    pub export_metrics: bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            learning_rate:      0.001,
            max_gradient_norm:  10.0,
            batch_size:         32,
            epochs:             10,
            state_size:         150,
            embedding_size:     300,
            max_paragraph_size: 300,
            max_question_size:  20,
            eval_size:          400,
            optimizer:          "adam".to_string(),
            data_dir:           "data/squad".to_string(),
            train_dir:          "train".to_string(),
            log_dir:            "log".to_string(),
            embed_path:         String::new(),
            vocab_path:         String::new(),
            export_metrics:     false,
        }
    }
}

impl TrainConfig {
    pub fn resolved_embed_path(&self) -> PathBuf {
        if self.embed_path.is_empty() {
            Path::new(&self.data_dir).join(format!("glove.trimmed.{}.npz", self.embedding_size))
        } else {
            PathBuf::from(&self.embed_path)
        }
    }

    pub fn resolved_vocab_path(&self) -> PathBuf {
        if self.vocab_path.is_empty() {
            Path::new(&self.data_dir).join("vocab.dat")
        } else {
            PathBuf::from(&self.vocab_path)
        }
    }

    /// Reject unusable configurations up front.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            matches!(self.optimizer.as_str(), "adam" | "sgd"),
            "Unrecognised optimizer '{}': expected 'adam' or 'sgd'",
            self.optimizer
        );
        ensure!(self.batch_size > 0, "batch_size must be positive");
        ensure!(self.epochs > 0, "epochs must be positive");
        ensure!(self.state_size > 0, "state_size must be positive");
        ensure!(self.embedding_size > 0, "embedding_size must be positive");
        ensure!(self.max_paragraph_size > 0, "max_paragraph_size must be positive");
        ensure!(self.max_question_size > 0, "max_question_size must be positive");
        ensure!(self.eval_size > 0, "eval_size must be positive");
        Ok(())
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────

pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end.
    pub fn execute(&self) -> Result<()> {
        let cfg = &self.config;
        cfg.validate()?;

        // ── Step 1: Load the preprocessed dataset ─────────────────────────────
        let loader =
            SquadLoader::new(&cfg.data_dir, cfg.max_question_size, cfg.max_paragraph_size);
        let dataset = loader.load()?;
        ensure!(
            dataset.train.len() >= cfg.batch_size,
            "Training pool ({} examples) is smaller than batch_size ({})",
            dataset.train.len(),
            cfg.batch_size
        );

        // ── Step 2: Load the reverse vocabulary ───────────────────────────────
        let vocab = Vocabulary::load(cfg.resolved_vocab_path())?;

        // ── Step 3: Load the pretrained embeddings ────────────────────────────
        let embeddings = EmbeddingTable::load(cfg.resolved_embed_path())?;
        ensure!(
            embeddings.embedding_dim() == cfg.embedding_size,
            "Embedding table is [{} x {}] but embedding_size is {}",
            embeddings.vocab_size(),
            embeddings.embedding_dim(),
            cfg.embedding_size
        );
        ensure!(
            vocab.len() <= embeddings.vocab_size(),
            "Vocabulary has {} tokens but the embedding table only {} rows",
            vocab.len(),
            embeddings.vocab_size()
        );

        // ── Step 4: Dump the resolved flags for post-mortems ──────────────────
        fs::create_dir_all(&cfg.log_dir)
            .with_context(|| format!("Cannot create log_dir '{}'", cfg.log_dir))?;
        let flags_path = Path::new(&cfg.log_dir).join("flags.json");
        fs::write(&flags_path, serde_json::to_string_pretty(cfg)?)
            .with_context(|| format!("Cannot write '{}'", flags_path.display()))?;

        // ── Step 5: Create the run directory, persist the config ──────────────
        let ckpt = CheckpointManager::create(&cfg.train_dir, MODEL_NAME)?;
        ckpt.save_config(cfg)?;

        // ── Step 6: Run the training loop (Layer 5) ───────────────────────────
        run_training(cfg, &dataset, &embeddings, &vocab, &ckpt)
    }
}
