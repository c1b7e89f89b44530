// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers to accomplish one goal each:
// training a model, or evaluating a saved run.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No UI or printing here (that's Layer 1)
//   - Only workflow coordination
//
// The immutable TrainConfig defined here is the single
// configuration surface: built once from CLI args, validated
// before any training step runs, and passed by reference to
// every component constructor.

// The training workflow
pub mod train_use_case;

// The saved-run evaluation workflow
pub mod evaluate_use_case;
