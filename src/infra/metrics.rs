// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Optional structured export of per-epoch training metrics,
// enabled by the config's metrics toggle. One CSV row per
// epoch, appended under the run directory:
//
//   epoch,rolling_loss,train_f1,train_em,dev_f1,dev_em
//
// The rolling loss is the window mean at the end of the epoch;
// F1/EM columns come from the sampled train/dev evaluations.
// Appending (rather than rewriting) keeps the file usable for
// plotting while training is still running.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// One row of metrics for a single training epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,

    /// Mean of the rolling loss window at epoch end
    pub rolling_loss: f64,

    /// F1 / EM on the sampled train subset (drift detection)
    pub train_f1: f64,
    pub train_em: f64,

    /// F1 / EM on the sampled dev subset (drives early stopping)
    pub dev_f1: f64,
    pub dev_em: f64,
}

/// Appends epoch metrics to a CSV file under the run directory.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create the logger, writing the CSV header if the file is new.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let csv_path = dir.join("metrics.csv");

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "epoch,rolling_loss,train_f1,train_em,dev_f1,dev_em")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch's metrics as a new row.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;
        writeln!(
            f,
            "{},{:.6},{:.4},{:.4},{:.4},{:.4}",
            m.epoch, m.rolling_loss, m.train_f1, m.train_em, m.dev_f1, m.dev_em,
        )?;
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
