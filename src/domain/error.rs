// ============================================================
// Layer 3 — Fatal Pipeline Errors
// ============================================================
// Recoverable conditions never reach this enum:
//   - empty token lists are coerced to a single <UNK>
//   - unknown words map to index 1 / the <UNK> symbol
//   - missing gender lists just disable gender tagging
//
// What IS here are invariant violations. They mean either a
// corrupted lexicon or an annotator that broke its contract,
// and they abort the current operation. Functions still return
// anyhow::Result; callers that need to branch on the cause can
// downcast to PipelineError.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// `lookup.len()` must equal `size + 1`
    #[error("corrupted lexicon: {size} words but lookup has {lookup_len} slots")]
    CorruptedLexicon { size: usize, lookup_len: usize },

    /// A numeric sequence referenced an index the lexicon never issued
    #[error("index {index} is outside the lexicon (size {size})")]
    IndexOutOfRange { index: usize, size: usize },

    /// The annotator returned a fine tag missing from the PTB table
    #[error("annotator returned unknown POS tag '{0}'")]
    UnknownPosTag(String),

    /// The annotator returned structurally invalid data
    #[error("annotator contract violation: {0}")]
    AnnotatorContract(String),

    /// Embedding lookups requested with neither source configured
    #[error("no embedding source configured (attach word embeddings or enable annotator vectors)")]
    NoEmbeddingSource,

    /// Operation needs a lexicon but make_lexicon was never run
    #[error("lexicon has not been built")]
    LexiconNotBuilt,
}
