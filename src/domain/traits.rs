// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// Two seams where implementations get swapped:
//
//   Annotator      — the linguistic black box (segmentation,
//                    tagging, parsing, NER, word vectors).
//                    Implementations:
//                      - RuleAnnotator     → regex baseline / test double
//                      - ScriptedAnnotator → replays external annotations
//                      - (external) any real NLP pipeline
//
//   DocumentSource — where a corpus comes from.
//                    Implementations:
//                      - CorpusLoader → .txt and .docx directories
//
// The pipeline only ever sees these traits, so a deterministic
// annotator can stand in for a real model in tests.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;

use crate::domain::document::Document;
use crate::domain::token::Annotation;

// ─── Annotator ────────────────────────────────────────────────────────────────
/// External linguistic annotator.
///
/// Must be `Send + Sync`: the pair sampler shares one annotator
/// across its worker threads.
pub trait Annotator: Send + Sync {
    /// Split text into sentence strings (trimmed, in order).
    fn segment(&self, text: &str) -> Result<Vec<String>>;

    /// Tokenize and annotate text.
    fn annotate(&self, text: &str) -> Result<Annotation>;

    /// Native word vector, if the annotator ships one for `word`.
    fn vector(&self, _word: &str) -> Option<Vec<f32>> {
        None
    }

    /// Length of the vectors returned by [`Annotator::vector`]; 0 when none.
    fn vector_size(&self) -> usize {
        0
    }
}

// ─── DocumentSource ───────────────────────────────────────────────────────────
/// Any component that can load a corpus of story documents.
pub trait DocumentSource {
    /// Load all available documents from this source.
    fn load_all(&self) -> Result<Vec<Document>>;
}
