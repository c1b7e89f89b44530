// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `evaluate`
// and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, etc.)
//
// Flag defaults match the reference hyperparameters the
// architecture was tuned with (Adam at 1e-3, paragraphs cut at
// 300 tokens, questions at 20).

use clap::{Args, Subcommand};

use crate::application::evaluate_use_case::EvaluateConfig;
use crate::application::train_use_case::TrainConfig;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the Match-LSTM model on a preprocessed SQuAD directory
    Train(TrainArgs),

    /// Score a previously trained run on the dev set
    Evaluate(EvaluateArgs),
}

/// All arguments for the `train` command.
/// Each field becomes a --flag on the command line.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Optimizer step size
    #[arg(long, default_value_t = 0.001)]
    pub learning_rate: f64,

    /// Global gradient-norm clipping ceiling
    #[arg(long, default_value_t = 10.0)]
    pub max_gradient_norm: f32,

    /// Number of examples processed together in one forward pass
    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Number of full passes through the training pool
    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    /// Hidden size of every recurrent cell
    #[arg(long, default_value_t = 150)]
    pub state_size: usize,

    /// Dimensionality of the pretrained embeddings
    #[arg(long, default_value_t = 300)]
    pub embedding_size: usize,

    /// Paragraph length cutoff; longer paragraphs are truncated
    /// and spans ending past the cutoff are resampled away
    #[arg(long, default_value_t = 300)]
    pub max_paragraph_size: usize,

    /// Question length cutoff
    #[arg(long, default_value_t = 20)]
    pub max_question_size: usize,

    /// Examples sampled per evaluation call (capped by split size)
    #[arg(long, default_value_t = 400)]
    pub eval_size: usize,

    /// Optimizer: "adam" or "sgd"
    #[arg(long, default_value = "adam")]
    pub optimizer: String,

    /// Directory with the preprocessed dataset files
    #[arg(long, default_value = "data/squad")]
    pub data_dir: String,

    /// Directory checkpoints are written under
    #[arg(long, default_value = "train")]
    pub train_dir: String,

    /// Directory the resolved flags are dumped into
    #[arg(long, default_value = "log")]
    pub log_dir: String,

    /// Embedding archive; defaults to
    /// {data_dir}/glove.trimmed.{embedding_size}.npz
    #[arg(long, default_value = "")]
    pub embed_path: String,

    /// Vocabulary file; defaults to {data_dir}/vocab.dat
    #[arg(long, default_value = "")]
    pub vocab_path: String,

    /// Append per-epoch metrics CSV rows under the run directory
    #[arg(long, default_value_t = false)]
    pub export_metrics: bool,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// This is the boundary between Layer 1 and Layer 2 —
/// the application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            learning_rate:      a.learning_rate,
            max_gradient_norm:  a.max_gradient_norm,
            batch_size:         a.batch_size,
            epochs:             a.epochs,
            state_size:         a.state_size,
            embedding_size:     a.embedding_size,
            max_paragraph_size: a.max_paragraph_size,
            max_question_size:  a.max_question_size,
            eval_size:          a.eval_size,
            optimizer:          a.optimizer,
            data_dir:           a.data_dir,
            train_dir:          a.train_dir,
            log_dir:            a.log_dir,
            embed_path:         a.embed_path,
            vocab_path:         a.vocab_path,
            export_metrics:     a.export_metrics,
        }
    }
}

/// All arguments for the `evaluate` command
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// The run directory: {train_dir}/{model_name}/{timestamp}
    #[arg(long)]
    pub run_dir: String,

    /// Load the early-stopping snapshot instead of the last epoch
    #[arg(long, default_value_t = false)]
    pub best: bool,

    /// Examples to sample; 0 uses the run's recorded eval_size
    #[arg(long, default_value_t = 0)]
    pub eval_size: usize,

    /// Override the run's recorded dataset directory
    #[arg(long)]
    pub data_dir: Option<String>,

    /// Override the run's recorded vocabulary path
    #[arg(long)]
    pub vocab_path: Option<String>,

    /// Override the run's recorded embedding archive path
    #[arg(long)]
    pub embed_path: Option<String>,
}

impl From<EvaluateArgs> for EvaluateConfig {
    fn from(a: EvaluateArgs) -> Self {
        EvaluateConfig {
            run_dir:    a.run_dir,
            best:       a.best,
            eval_size:  a.eval_size,
            data_dir:   a.data_dir,
            vocab_path: a.vocab_path,
            embed_path: a.embed_path,
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(subcommand)]
        command: Commands,
    }

    #[test]
    fn train_defaults_match_the_reference_hyperparameters() {
        let parsed = Harness::parse_from(["test", "train"]);
        let Commands::Train(args) = parsed.command else {
            panic!("expected the train subcommand");
        };
        let cfg = TrainConfig::from(args);

        assert_eq!(cfg.learning_rate, 0.001);
        assert_eq!(cfg.max_gradient_norm, 10.0);
        assert_eq!(cfg.batch_size, 32);
        assert_eq!(cfg.state_size, 150);
        assert_eq!(cfg.max_paragraph_size, 300);
        assert_eq!(cfg.max_question_size, 20);
        assert_eq!(cfg.optimizer, "adam");
        assert!(!cfg.export_metrics);
    }

    #[test]
    fn train_flags_override_defaults() {
        let parsed = Harness::parse_from([
            "test",
            "train",
            "--optimizer",
            "sgd",
            "--batch-size",
            "16",
            "--export-metrics",
        ]);
        let Commands::Train(args) = parsed.command else {
            panic!("expected the train subcommand");
        };
        let cfg = TrainConfig::from(args);

        assert_eq!(cfg.optimizer, "sgd");
        assert_eq!(cfg.batch_size, 16);
        assert!(cfg.export_metrics);
    }

    #[test]
    fn evaluate_requires_a_run_dir() {
        assert!(Harness::try_parse_from(["test", "evaluate"]).is_err());

        let parsed =
            Harness::parse_from(["test", "evaluate", "--run-dir", "train/match-lstm/x", "--best"]);
        let Commands::Evaluate(args) = parsed.command else {
            panic!("expected the evaluate subcommand");
        };
        let cfg = EvaluateConfig::from(args);
        assert_eq!(cfg.run_dir, "train/match-lstm/x");
        assert!(cfg.best);
        assert_eq!(cfg.eval_size, 0);
        assert!(cfg.data_dir.is_none());
    }
}
