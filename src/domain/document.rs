// ============================================================
// Layer 3 — Document Domain Type
// ============================================================
// One story from a corpus. The loader has already flattened
// whatever file format it came from into plain text, so by
// the time a Document exists it is just a source name and the
// raw narrative.

use serde::{Deserialize, Serialize};

/// A raw story document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// File name plus block number, kept for traceability
    /// (e.g. "stories.txt#3")
    pub source: String,

    /// Story text before any tokenisation
    pub text: String,
}

impl Document {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text:   text.into(),
        }
    }

    /// Number of whitespace-separated words, used for corpus stats
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}
