// ============================================================
// Layer 4 — Text Pipeline
// ============================================================
// Everything between raw story text and token strings, plus the
// way back from generated tokens to prose.
//
//   story files
//       │
//       ▼
//   CorpusLoader      → reads .txt / .docx, one Document per story
//       │
//       ▼
//   Annotator         → sentences, tokens, tags, parses, entities
//       │
//       ├── clauses       → clause-level segmentation
//       ├── entities      → ENT_PERSON_0 style anonymization
//       ├── phrases       → new_york style phrase folding
//       ▼
//   tokenizer         → filtered token strings
//       │
//       ▼
//   (ml layer: lexicon, indices, embeddings)
//
//   generated tokens ──► detokenizer ──► prose
//   stories          ──► pairs       ──► (context, next) samples
//
// Each module is responsible for exactly one step.

/// Regex baseline annotator and replaying annotator
pub mod annotator;

/// Reads .txt and .docx stories from disk
pub mod loader;

/// Token filtering and sentence / clause segmentation
pub mod tokenizer;

/// Dependency-based clause splitting
pub mod clauses;

/// Entity detection, numbering and re-instantiation
pub mod entities;

/// Multi-word phrase folding
pub mod phrases;

/// Tokens back to readable text
pub mod detokenizer;

/// Adjacent sentence / clause pair sampling
pub mod pairs;

/// PTB tag indices
pub mod pos;
