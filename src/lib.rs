// ============================================================
// narrative-seq
// ============================================================
// Text preparation and sequence encoding for narrative
// generation models, laid out in layers:
//
//   cli          (1) — argument parsing and output
//   application  (2) — build / codec / pairs workflows
//   domain       (3) — tokens, entities, errors, traits
//   data         (4) — annotators, tokenizing, entities,
//                      detokenizing, pair sampling, corpus loading
//   ml           (5) — lexicon, codec, embeddings
//   infra        (6) — persisted artifacts and resource files
//
// The linguistic analysis itself comes from an `Annotator`
// implementation passed into every operation that needs it.

pub mod cli;
pub mod application;
pub mod domain;
pub mod data;
pub mod ml;
pub mod infra;
