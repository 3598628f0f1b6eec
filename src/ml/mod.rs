// ============================================================
// Layer 5 — Sequence Encoding Layer
// ============================================================
// Everything that turns prepared token sequences into numbers
// and back again lives here.
//
//   lexicon.rs    — The vocabulary and its build step
//                   SequenceTransformer owns the config, the
//                   word <-> index lexicon, corpus word counts,
//                   entity frequency tables and the phrase set.
//                   make_lexicon() reads a corpus once and fills
//                   all of them.
//
//   codec.rs      — Index encoding and decoding
//                   • tokens -> indices (missing words -> UNK)
//                   • indices -> tokens (0 -> UNK word, past the
//                     lexicon -> error)
//                   • decode with entity adaptation, detokenize
//                     and generation filtering
//                   • bag-of-words count matrices
//
//   embeddings.rs — Vector lookup
//                   Concatenates stored word vectors with the
//                   annotator's native vectors, averages phrase
//                   parts, and pads or reduces whole batches.
//
// Only this layer touches ndarray.

/// Lexicon, configuration and corpus statistics
pub mod lexicon;

/// Token <-> index encoding, decoding and bag-of-words
pub mod codec;

/// Word embedding lookup, padding and reduction
pub mod embeddings;
