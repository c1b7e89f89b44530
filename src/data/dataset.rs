// ============================================================
// Layer 4 — Example Pools & Batch Sampling
// ============================================================
// A QaPool is one split's worth of examples. The training loop
// never iterates the pool in order: every step draws a fresh
// batch at random, and the evaluator draws its own independent
// samples. Both policies live here so they can be tested
// without tensors.

use rand::seq::index::sample;
use rand::Rng;

use crate::domain::example::QaExample;

/// Both splits of the loaded dataset.
pub struct SquadDataset {
    pub train: QaPool,
    pub val: QaPool,
}

/// One split's examples plus its sampling policies.
pub struct QaPool {
    examples: Vec<QaExample>,
}

impl QaPool {
    pub fn new(examples: Vec<QaExample>) -> Self {
        Self { examples }
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn examples(&self) -> &[QaExample] {
        &self.examples
    }

    /// Draw a training batch of `batch_size` examples.
    ///
    /// The initial draw is without replacement. Any drawn example
    /// whose gold end index falls outside the representable range
    /// (>= `cutoff`) is replaced by a fresh uniform draw from the
    /// full pool, retried until the replacement is in range. Such
    /// examples are an expected condition, not an error.
    ///
    /// Callers must ensure the pool holds at least `batch_size`
    /// examples and at least one in-range example; a pool whose
    /// every span is out of range would make the replacement loop
    /// spin forever.
    pub fn get_batch<'a>(
        &'a self,
        batch_size: usize,
        cutoff: usize,
        rng: &mut impl Rng,
    ) -> Vec<&'a QaExample> {
        let mut batch: Vec<&QaExample> = sample(rng, self.examples.len(), batch_size)
            .into_iter()
            .map(|i| &self.examples[i])
            .collect();

        for slot in batch.iter_mut() {
            while !slot.span_in_range(cutoff) {
                *slot = &self.examples[rng.gen_range(0..self.examples.len())];
            }
        }
        batch
    }

    /// Draw up to `n` examples without replacement for evaluation.
    /// Capped by pool size; independent across calls.
    pub fn sample_for_eval<'a>(&'a self, n: usize, rng: &mut impl Rng) -> Vec<&'a QaExample> {
        let n = n.min(self.examples.len());
        sample(rng, self.examples.len(), n)
            .into_iter()
            .map(|i| &self.examples[i])
            .collect()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn example(end: usize) -> QaExample {
        QaExample {
            question:       vec![1, 0],
            question_mask:  vec![true, false],
            paragraph:      vec![2, 3, 4, 0],
            paragraph_mask: vec![true, true, true, false],
            span:           (0, end),
            answer:         vec!["x".into()],
        }
    }

    #[test]
    fn out_of_range_spans_never_reach_a_batch() {
        // Pool of three, one with span end 305 under a cutoff of 300:
        // that example must be replaced before the batch is returned.
        let pool = QaPool::new(vec![example(3), example(305), example(7)]);
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..50 {
            let batch = pool.get_batch(2, 300, &mut rng);
            assert_eq!(batch.len(), 2);
            assert!(batch.iter().all(|e| e.span.1 < 300));
        }
    }

    #[test]
    fn batch_has_requested_size() {
        let pool = QaPool::new((0..10).map(|_| example(1)).collect());
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(pool.get_batch(4, 300, &mut rng).len(), 4);
    }

    #[test]
    fn terminates_with_a_single_valid_example() {
        // Every slot must converge onto the sole in-range example.
        let pool = QaPool::new(vec![example(500), example(2), example(301)]);
        let mut rng = StdRng::seed_from_u64(42);
        let batch = pool.get_batch(3, 300, &mut rng);
        assert!(batch.iter().all(|e| e.span.1 == 2));
    }

    #[test]
    fn eval_sample_is_capped_by_pool_size() {
        let pool = QaPool::new((0..5).map(|_| example(1)).collect());
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(pool.sample_for_eval(400, &mut rng).len(), 5);
        assert_eq!(pool.sample_for_eval(2, &mut rng).len(), 2);
    }
}
