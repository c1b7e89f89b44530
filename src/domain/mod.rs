// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs describing what the system operates on.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - NO ML-specific code
//
// Keeping the domain free of the tensor framework means the
// data pipeline and its tests never need a backend device.

// A labelled reading-comprehension example: padded token id
// sequences, validity masks, gold answer span and answer text
pub mod example;
