// ============================================================
// Layer 2 — EvaluateUseCase
// ============================================================
// Scores a previously trained run against the dev set:
//
//   Step 1: Load the run's saved config       (Layer 6 - infra)
//   Step 2: Reload dataset / vocab / embeddings (Layer 4)
//   Step 3: Rebuild the architecture, load weights
//   Step 4: Evaluate F1 / EM on the dev set   (Layer 5 - ml)
//
// Dataset and file paths default to whatever the run trained
// with, individually overridable for evaluating on data that
// has moved since training.

use anyhow::{ensure, Result};
use rand::thread_rng;

use crate::data::batcher::QaBatcher;
use crate::data::embedding::EmbeddingTable;
use crate::data::loader::SquadLoader;
use crate::data::vocab::Vocabulary;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::evaluator::evaluate_answer;
use crate::ml::model::{MatchLstm, MatchLstmConfig};
use crate::ml::trainer::EvalBackend;

pub struct EvaluateConfig {
    /// The run directory: {train_dir}/{model_name}/{timestamp}
    pub run_dir: String,

    /// Load the early-stopping snapshot instead of the last epoch
    pub best: bool,

    /// Examples to sample; 0 falls back to the run's eval_size
    pub eval_size: usize,

    /// Optional overrides of the run's recorded paths
    pub data_dir: Option<String>,
    pub vocab_path: Option<String>,
    pub embed_path: Option<String>,
}

pub struct EvaluateUseCase {
    config: EvaluateConfig,
}

impl EvaluateUseCase {
    pub fn new(config: EvaluateConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<()> {
        // ── Step 1: The run's configuration ───────────────────────────────────
        let ckpt = CheckpointManager::open(&self.config.run_dir);
        let mut train_cfg = ckpt.load_config()?;
        if let Some(data_dir) = &self.config.data_dir {
            train_cfg.data_dir = data_dir.clone();
        }
        if let Some(vocab_path) = &self.config.vocab_path {
            train_cfg.vocab_path = vocab_path.clone();
        }
        if let Some(embed_path) = &self.config.embed_path {
            train_cfg.embed_path = embed_path.clone();
        }
        let eval_size = if self.config.eval_size > 0 {
            self.config.eval_size
        } else {
            train_cfg.eval_size
        };

        // ── Step 2: Dataset, vocabulary, embeddings ───────────────────────────
        let loader = SquadLoader::new(
            &train_cfg.data_dir,
            train_cfg.max_question_size,
            train_cfg.max_paragraph_size,
        );
        let dataset = loader.load()?;
        ensure!(!dataset.val.is_empty(), "Dev split is empty, nothing to evaluate");

        let vocab = Vocabulary::load(train_cfg.resolved_vocab_path())?;
        let embeddings = EmbeddingTable::load(train_cfg.resolved_embed_path())?;

        // ── Step 3: Rebuild the model, restore weights ────────────────────────
        let device = burn::backend::ndarray::NdArrayDevice::default();
        let model_cfg = MatchLstmConfig::new(
            embeddings.vocab_size(),
            train_cfg.embedding_size,
            train_cfg.state_size,
            train_cfg.max_paragraph_size,
            train_cfg.max_question_size,
        );
        let model: MatchLstm<EvalBackend> = model_cfg.init(&embeddings, &device);
        let model = ckpt.load_model(model, &device, self.config.best)?;
        tracing::info!(
            "Loaded {} checkpoint from '{}'",
            if self.config.best { "best" } else { "latest" },
            self.config.run_dir
        );

        // ── Step 4: Score the dev set ─────────────────────────────────────────
        let batcher = QaBatcher::<EvalBackend>::new(device);
        let mut rng = thread_rng();
        tracing::info!("---------- Evaluating on Dev Set ------------");
        let (f1, em) =
            evaluate_answer(&model, &batcher, &dataset.val, &vocab, eval_size, true, &mut rng)?;

        println!("Dev F1: {f1:.2}  EM: {em:.2}");
        Ok(())
    }
}
