// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All Burn framework specific code lives in this layer.
//
// What's in this layer:
//
//   cell.rs       — Step-wise LSTM cell and the length-masked
//                   unidirectional unroll used by the
//                   preprocessing encoders
//
//   match_cell.rs — The matching cell: per paragraph position it
//                   attends over the full question representation
//                   and feeds the attention-augmented input to an
//                   inner LSTM cell
//
//   decoder.rs    — Boundary pointer decoder: two decode
//                   iterations over one shared parameter set,
//                   producing start and end position logits
//
//   model.rs      — Model assembly: frozen embedding lookup,
//                   preprocessing + bidirectional match encoder,
//                   decoder, masked loss and masked predictions
//
//   clip.rs       — Global-norm gradient clipping over the
//                   gradient container
//
//   trainer.rs    — The training loop: batch sampling, clipping,
//                   optimizer step, rolling loss, per-epoch
//                   evaluation and checkpointing
//
//   inferencer.rs — Span prediction: masked probabilities to a
//                   concrete (start, end) pair with tie-breaking
//
//   evaluator.rs  — Exact-Match / F1 scoring against gold answers
//
// Reference: Wang & Jiang (2017) Machine Comprehension Using
//            Match-LSTM and Answer Pointer

/// Step-wise LSTM cell and masked unidirectional unrolling
pub mod cell;

/// Attention-augmented matching cell
pub mod match_cell;

/// Two-iteration boundary pointer decoder
pub mod decoder;

/// Model assembly, loss and prediction layers
pub mod model;

/// Global-norm gradient clipping
pub mod clip;

/// Training loop
pub mod trainer;

/// Span resolution from predicted distributions
pub mod inferencer;

/// Exact-Match / F1 evaluation
pub mod evaluator;
