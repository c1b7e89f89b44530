// ============================================================
// Layer 3 — QaExample Domain Type
// ============================================================
// One labelled reading-comprehension example. The answer is a
// SPAN within the paragraph: a (start, end) pair of token
// indices, both inclusive. The model never generates text, it
// points at where the answer already sits in the paragraph.
//
// Both token sequences are fixed-length and right-padded; each
// is paired with a boolean validity mask of identical length.
// The true sequence length is the number of `true` mask
// entries, which is always a prefix (padding never interleaves
// with real tokens).

use serde::{Deserialize, Serialize};

/// A labelled Q&A example with token-level span annotation.
///
/// `span` indexes into `paragraph` (inclusive on both ends).
/// `answer` is the gold answer as whitespace tokens, used for
/// text-level Exact-Match / F1 scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaExample {
    /// Question token ids, right-padded to the configured maximum
    pub question: Vec<u32>,

    /// Validity mask for `question` (true = real token)
    pub question_mask: Vec<bool>,

    /// Paragraph token ids, right-padded to the configured maximum
    pub paragraph: Vec<u32>,

    /// Validity mask for `paragraph` (true = real token)
    pub paragraph_mask: Vec<bool>,

    /// Gold answer span: (start, end) paragraph token indices, inclusive
    pub span: (usize, usize),

    /// Gold answer text as whitespace tokens
    pub answer: Vec<String>,
}

impl QaExample {
    /// True (unpadded) question length.
    pub fn question_len(&self) -> usize {
        self.question_mask.iter().filter(|&&m| m).count()
    }

    /// True (unpadded) paragraph length.
    pub fn paragraph_len(&self) -> usize {
        self.paragraph_mask.iter().filter(|&&m| m).count()
    }

    /// Length of the gold answer span in tokens.
    pub fn span_length(&self) -> usize {
        self.span.1.saturating_sub(self.span.0) + 1
    }

    /// Whether the gold end index is representable under the
    /// paragraph-length cutoff. Out-of-range examples are filtered
    /// out of training batches by resampling.
    pub fn span_in_range(&self, cutoff: usize) -> bool {
        self.span.1 < cutoff
    }

    /// The paragraph token ids covered by the gold span.
    pub fn gold_token_slice(&self) -> &[u32] {
        &self.paragraph[self.span.0..=self.span.1]
    }

    /// Gold answer rendered as a single whitespace-joined string.
    pub fn answer_text(&self) -> String {
        self.answer.join(" ")
    }
}
