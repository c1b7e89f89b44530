// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between the preprocessed dataset files on disk
// and device-ready tensor batches.
//
// The pipeline flows in this order:
//
//   {train,val}.ids.* / .span / .answer files
//       │
//       ▼
//   SquadLoader       → parses id/span/answer files, pads, masks
//       │
//       ▼
//   QaPool            → per-step batch sampling with span filtering
//       │
//       ▼
//   QaBatcher         → stacks sampled examples into tensors
//
// Alongside it, two load-once resources:
//   Vocabulary        → id → token, for rendering predicted spans
//   EmbeddingTable    → frozen pretrained word vectors (.npz)
//
// Tokenization and vocabulary construction happen upstream of
// this system; the loader only consumes their output files.

/// Parses the preprocessed id/span/answer files into examples
pub mod loader;

/// Newline-delimited vocabulary with reverse (id → token) lookup
pub mod vocab;

/// Pretrained embedding archive (.npz) loading
pub mod embedding;

/// Example pools and the batch sampling policy
pub mod dataset;

/// Stacks sampled examples into tensor batches
pub mod batcher;
