// ============================================================
// Layer 4 — Dataset Loader
// ============================================================
// Parses the preprocessed dataset files produced upstream of
// this system. Each split contributes four parallel files in
// `data_dir`, where line i across all four describes the same
// example:
//
//   {split}.ids.question   whitespace-separated token ids
//   {split}.ids.context    whitespace-separated token ids
//   {split}.span           "start end" paragraph token indices
//   {split}.answer         gold answer text
//
// Sequences are truncated and right-padded (id 0) to the
// configured maximum lengths, and paired with boolean validity
// masks. Spans are kept as-is even when they point past the
// paragraph cutoff: out-of-range examples are filtered at batch
// sampling time, not here.

use anyhow::{ensure, Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::data::dataset::{QaPool, SquadDataset};
use crate::domain::example::QaExample;

/// Loads both splits of the preprocessed dataset from a directory.
pub struct SquadLoader {
    dir: PathBuf,
    max_question_size: usize,
    max_paragraph_size: usize,
}

impl SquadLoader {
    pub fn new(dir: impl Into<PathBuf>, max_question_size: usize, max_paragraph_size: usize) -> Self {
        Self { dir: dir.into(), max_question_size, max_paragraph_size }
    }

    /// Load the train and val splits.
    pub fn load(&self) -> Result<SquadDataset> {
        let train = self.load_split("train")?;
        let val = self.load_split("val")?;
        tracing::info!("Loaded dataset: {} train, {} val examples", train.len(), val.len());
        Ok(SquadDataset { train, val })
    }

    fn load_split(&self, split: &str) -> Result<QaPool> {
        let questions = self.read_id_lines(&format!("{split}.ids.question"))?;
        let paragraphs = self.read_id_lines(&format!("{split}.ids.context"))?;
        let spans = self.read_span_lines(&format!("{split}.span"))?;
        let answers = self.read_answer_lines(&format!("{split}.answer"))?;

        ensure!(
            questions.len() == paragraphs.len()
                && questions.len() == spans.len()
                && questions.len() == answers.len(),
            "Split '{}' files disagree on example count: {} questions, {} contexts, {} spans, {} answers",
            split,
            questions.len(),
            paragraphs.len(),
            spans.len(),
            answers.len(),
        );

        let examples = questions
            .into_iter()
            .zip(paragraphs)
            .zip(spans)
            .zip(answers)
            .map(|(((question, paragraph), span), answer)| {
                let (question, question_mask) = pad_and_mask(question, self.max_question_size);
                let (paragraph, paragraph_mask) = pad_and_mask(paragraph, self.max_paragraph_size);
                QaExample { question, question_mask, paragraph, paragraph_mask, span, answer }
            })
            .collect();

        Ok(QaPool::new(examples))
    }

    fn read_lines(&self, name: &str) -> Result<Vec<String>> {
        let path = self.dir.join(name);
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read dataset file '{}'", path.display()))?;
        Ok(contents.lines().map(|l| l.to_string()).collect())
    }

    fn read_id_lines(&self, name: &str) -> Result<Vec<Vec<u32>>> {
        self.read_lines(name)?
            .iter()
            .enumerate()
            .map(|(i, line)| {
                line.split_whitespace()
                    .map(|tok| {
                        tok.parse::<u32>()
                            .with_context(|| format!("{}:{}: invalid token id '{}'", name, i + 1, tok))
                    })
                    .collect()
            })
            .collect()
    }

    fn read_span_lines(&self, name: &str) -> Result<Vec<(usize, usize)>> {
        self.read_lines(name)?
            .iter()
            .enumerate()
            .map(|(i, line)| parse_span(line).with_context(|| format!("{}:{}: invalid span '{}'", name, i + 1, line)))
            .collect()
    }

    fn read_answer_lines(&self, name: &str) -> Result<Vec<Vec<String>>> {
        Ok(self
            .read_lines(name)?
            .iter()
            .map(|line| line.split_whitespace().map(|t| t.to_string()).collect())
            .collect())
    }
}

fn parse_span(line: &str) -> Result<(usize, usize)> {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(start), Some(end), None) => Ok((start.parse()?, end.parse()?)),
        _ => anyhow::bail!("expected exactly two indices"),
    }
}

/// Truncate to `max_len`, right-pad with id 0, and derive the
/// validity mask. The true length is always the count of `true`
/// entries in the returned mask.
fn pad_and_mask(mut ids: Vec<u32>, max_len: usize) -> (Vec<u32>, Vec<bool>) {
    ids.truncate(max_len);
    let true_len = ids.len();
    ids.resize(max_len, 0);
    let mut mask = vec![true; true_len];
    mask.resize(max_len, false);
    (ids, mask)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::Path;

    fn write_file(dir: &Path, name: &str, contents: &str) {
        let mut f = fs::File::create(dir.join(name)).unwrap();
        write!(f, "{contents}").unwrap();
    }

    fn write_split(dir: &Path, split: &str) {
        write_file(dir, &format!("{split}.ids.question"), "1 2\n3\n");
        write_file(dir, &format!("{split}.ids.context"), "4 5 6\n7 8 9 10 11 12\n");
        write_file(dir, &format!("{split}.span"), "0 1\n2 5\n");
        write_file(dir, &format!("{split}.answer"), "the answer\nanother one\n");
    }

    #[test]
    fn pads_truncates_and_masks() {
        let dir = tempfile::tempdir().unwrap();
        write_split(dir.path(), "train");
        write_split(dir.path(), "val");

        let loader = SquadLoader::new(dir.path(), 4, 5);
        let dataset = loader.load().unwrap();
        assert_eq!(dataset.train.len(), 2);

        let first = &dataset.train.examples()[0];
        assert_eq!(first.question, vec![1, 2, 0, 0]);
        assert_eq!(first.question_mask, vec![true, true, false, false]);
        assert_eq!(first.paragraph, vec![4, 5, 6, 0, 0]);
        assert_eq!(first.paragraph_len(), 3);
        assert_eq!(first.span, (0, 1));
        assert_eq!(first.answer_text(), "the answer");

        // Second paragraph has 6 ids and gets truncated to 5; its span
        // is preserved untouched for batch-time filtering.
        let second = &dataset.train.examples()[1];
        assert_eq!(second.paragraph, vec![7, 8, 9, 10, 11]);
        assert_eq!(second.paragraph_len(), 5);
        assert_eq!(second.span, (2, 5));
    }

    #[test]
    fn rejects_mismatched_example_counts() {
        let dir = tempfile::tempdir().unwrap();
        write_split(dir.path(), "train");
        write_split(dir.path(), "val");
        // Extra span line in train.span
        write_file(dir.path(), "train.span", "0 1\n2 5\n3 3\n");

        let loader = SquadLoader::new(dir.path(), 4, 5);
        assert!(loader.load().is_err());
    }

    #[test]
    fn rejects_unparseable_ids() {
        let dir = tempfile::tempdir().unwrap();
        write_split(dir.path(), "train");
        write_split(dir.path(), "val");
        write_file(dir.path(), "val.ids.question", "1 x\n2\n");

        let loader = SquadLoader::new(dir.path(), 4, 5);
        assert!(loader.load().is_err());
    }
}
