// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that reads or writes files outside the corpus:
//
//   transformer_store.rs — Transformer persistence
//                          Saves the built SequenceTransformer
//                          as JSON and validates it on load.
//
//   embedding_store.rs   — Word embedding table
//                          Memory-maps a flat f32 matrix plus
//                          its JSON word index, so large tables
//                          are not read into memory up front.
//
//   sequence_store.rs    — Memory-mapped f64 matrices of
//                          encoded sequence batches.
//
//   names_store.rs       — One-per-line word lists: phrase
//                          lists and the female/male first-name
//                          lists used for PERSON gender tagging.
//
//   annotator_store.rs   — Gazetteer and pre-computed annotation
//                          files that configure the annotator.
//
// Other layers receive already-loaded values from here and
// never open files themselves (apart from the corpus loader).

/// Transformer save and load
pub mod transformer_store;

/// Memory-mapped word embedding table
pub mod embedding_store;

/// Memory-mapped sequence batches
pub mod sequence_store;

/// Phrase and first-name word lists
pub mod names_store;

/// Gazetteer and annotation dump loading
pub mod annotator_store;
