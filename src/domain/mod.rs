// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, enums, and traits that define the core
// concepts of the pipeline.
//
// Rules for this layer:
//   - NO file I/O
//   - NO linguistic analysis (that's the Annotator's job)
//   - NO numeric encoding (that's Layer 5)
//
// What lives here:
//   - A story document loaded from a corpus
//   - The annotated token shape the external annotator returns
//   - Entity labels and numbered placeholders (ENT_PERSON_0)
//   - The Annotator trait (the injected linguistic black box)
//   - The fatal error taxonomy
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// A story document loaded from a corpus directory
pub mod document;

// Annotated tokens, entity spans, and reserved symbols
pub mod token;

// Entity labels, gender tags, and numbered placeholders
pub mod entity;

// The Annotator trait and document source abstraction
pub mod traits;

// Fatal pipeline errors (invariant violations)
pub mod error;
