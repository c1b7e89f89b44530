// ============================================================
// Layer 4 — Pretrained Embedding Table
// ============================================================
// The embedding file is a .npz archive holding a single
// [vocab_size, embedding_dim] array, conventionally named
// "glove" after the embedding source. It is loaded exactly once
// at model construction and frozen: the table is shared by both
// encoders' lookups and never receives gradient updates.
//
// The array may be stored as f32 or as f64 (numpy saves f64 by
// default); both are accepted and held as f32.

use anyhow::{bail, Context, Result};
use ndarray::Array2;
use ndarray_npy::NpzReader;
use std::fs::File;
use std::path::Path;

/// Frozen pretrained word embeddings, one row per token id.
pub struct EmbeddingTable {
    vectors: Array2<f32>,
}

impl EmbeddingTable {
    /// Load the embedding archive from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Cannot open embedding archive '{}'", path.display()))?;
        let mut npz = NpzReader::new(file)
            .with_context(|| format!("'{}' is not a readable .npz archive", path.display()))?;

        let names = npz.names().context("Cannot list embedding archive entries")?;
        let entry = Self::pick_entry(&names)?;

        // f32 first, then numpy's default f64 layout
        let vectors: Array2<f32> = match npz.by_name(&entry) {
            Ok(arr) => arr,
            Err(_) => {
                let arr: Array2<f64> = npz.by_name(&entry).with_context(|| {
                    format!("Entry '{}' in '{}' is not a 2-d float array", entry, path.display())
                })?;
                arr.mapv(|v| v as f32)
            }
        };

        let (vocab_size, dim) = vectors.dim();
        tracing::info!(
            "Loaded embeddings: {} x {} from '{}' (entry '{}')",
            vocab_size,
            dim,
            path.display(),
            entry
        );
        Ok(Self { vectors })
    }

    /// Pick the embedding entry: the conventional "glove" name if
    /// present, otherwise the archive's sole array.
    fn pick_entry(names: &[String]) -> Result<String> {
        if let Some(name) = names
            .iter()
            .find(|n| *n == "glove" || *n == "glove.npy")
        {
            return Ok(name.clone());
        }
        match names {
            [only] => Ok(only.clone()),
            [] => bail!("Embedding archive contains no arrays"),
            _ => bail!(
                "Embedding archive has no 'glove' entry and {} candidates: {:?}",
                names.len(),
                names
            ),
        }
    }

    #[cfg(test)]
    pub fn from_array(vectors: Array2<f32>) -> Self {
        Self { vectors }
    }

    /// (vocab_size, embedding_dim)
    pub fn dim(&self) -> (usize, usize) {
        self.vectors.dim()
    }

    pub fn vocab_size(&self) -> usize {
        self.vectors.dim().0
    }

    pub fn embedding_dim(&self) -> usize {
        self.vectors.dim().1
    }

    /// Row-major copy of the table, for handing to the tensor backend.
    pub fn to_flat_vec(&self) -> Vec<f32> {
        self.vectors.iter().copied().collect()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use ndarray_npy::NpzWriter;

    #[test]
    fn round_trips_a_glove_archive() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut npz = NpzWriter::new(file.reopen().unwrap());
        npz.add_array("glove", &array![[1.0f32, 2.0], [3.0, 4.0], [5.0, 6.0]]).unwrap();
        npz.finish().unwrap();

        let table = EmbeddingTable::load(file.path()).unwrap();
        assert_eq!(table.dim(), (3, 2));
        assert_eq!(table.to_flat_vec(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn falls_back_to_sole_entry() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut npz = NpzWriter::new(file.reopen().unwrap());
        npz.add_array("vectors", &array![[0.5f32], [1.5]]).unwrap();
        npz.finish().unwrap();

        let table = EmbeddingTable::load(file.path()).unwrap();
        assert_eq!(table.dim(), (2, 1));
    }

    #[test]
    fn rejects_ambiguous_archives() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut npz = NpzWriter::new(file.reopen().unwrap());
        npz.add_array("a", &array![[0.0f32]]).unwrap();
        npz.add_array("b", &array![[0.0f32]]).unwrap();
        npz.finish().unwrap();

        assert!(EmbeddingTable::load(file.path()).is_err());
    }
}
