// ============================================================
// Layer 4 — Vocabulary
// ============================================================
// The vocabulary file is newline-delimited: one token per line,
// and the 0-indexed line number IS the token id. The model only
// ever needs the reverse direction (id → token), to render a
// predicted span back into text for scoring and logging.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Reverse vocabulary: token id → token string.
pub struct Vocabulary {
    tokens: Vec<String>,
}

impl Vocabulary {
    /// Load a newline-delimited vocabulary file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Cannot read vocabulary file '{}'", path.display()))?;

        let tokens: Vec<String> = contents.lines().map(|l| l.to_string()).collect();
        tracing::info!("Loaded vocabulary: {} tokens from '{}'", tokens.len(), path.display());
        Ok(Self { tokens })
    }

    #[cfg(test)]
    pub fn from_tokens(tokens: Vec<String>) -> Self {
        Self { tokens }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Token for an id; ids outside the vocabulary render as `<unk>`.
    pub fn token(&self, id: u32) -> &str {
        self.tokens.get(id as usize).map(String::as_str).unwrap_or("<unk>")
    }

    /// Render a sequence of token ids as whitespace-joined text.
    pub fn render(&self, ids: &[u32]) -> String {
        ids.iter().map(|&id| self.token(id)).collect::<Vec<_>>().join(" ")
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn line_number_is_token_id() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "<pad>\nthe\ncat").unwrap();

        let vocab = Vocabulary::load(file.path()).unwrap();
        assert_eq!(vocab.len(), 3);
        assert_eq!(vocab.token(1), "the");
        assert_eq!(vocab.token(2), "cat");
    }

    #[test]
    fn unknown_ids_render_as_unk() {
        let vocab = Vocabulary::from_tokens(vec!["a".into()]);
        assert_eq!(vocab.token(7), "<unk>");
        assert_eq!(vocab.render(&[0, 7]), "a <unk>");
    }
}
