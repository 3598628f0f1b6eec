// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer wires the other layers together for one workflow
// at a time (build, encode/decode, pair sampling).
//
// Rules for this layer:
//   - No encoding or segmentation logic here
//   - No printing here (that's Layer 1)
//   - No direct file access (that's Layer 4 and 6)
//   - Only workflow coordination

// Corpus -> lexicon -> transformer.json
pub mod build_use_case;

// Text <-> indices with a saved transformer
pub mod codec_use_case;

// Adjacent-unit pair sampling over a corpus
pub mod pairs_use_case;
