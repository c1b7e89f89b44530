// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting persistence concerns:
//
//   checkpoint.rs — Model checkpointing into a timestamped run
//                   directory, with a separate early-stopping
//                   snapshot for the best dev F1 seen in the run.
//                   Uses Burn's CompactRecorder for weights and
//                   JSON sidecars for config and run state.
//
//   metrics.rs    — Optional per-epoch metrics CSV (loss, F1,
//                   EM) appended under the run directory when
//                   the export toggle is set.

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Per-epoch training metrics CSV logger
pub mod metrics;
