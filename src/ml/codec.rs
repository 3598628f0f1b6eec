// ============================================================
// Layer 5 — Sequence Codec
// ============================================================
// Token strings ↔ lexicon indices, plus bag-of-words vectors.
//
// Encoding rules:
//   known word        → its index
//   unknown word      → 1 (<UNK>)
//   empty slot        → 0
//   empty sequence    → [1]
//
// Decoding runs the other way and then, optionally:
//   1. re-instantiate ENT_ placeholders with real entities
//   2. detokenize (or just join with spaces)
//   3. trim to the first sentences / first EOS token
//
// Bag-of-words: one row per sequence, size + 1 columns, counts
// of each index, with column 0 (empty slots) forced to zero.

use std::collections::HashSet;

use anyhow::Result;
use ndarray::Array2;
use rand::Rng;

use crate::data::detokenizer::{detokenize_tok_seq, filter_gen_seq, FilterMode};
use crate::data::entities::{adapt_tok_seq_ents, EntityMap};
use crate::data::tokenizer::tokenize;
use crate::domain::entity::Placeholder;
use crate::domain::error::PipelineError;
use crate::domain::token::ENT_PREFIX;
use crate::domain::traits::Annotator;
use crate::ml::lexicon::{SequenceTransformer, EMPTY_INDEX, UNK_INDEX};

/// Coarse POS kept by [`SequenceTransformer::seqs_to_feature_words`] by default
pub const DEFAULT_FEATURE_POS: [&str; 2] = ["NOUN", "PROPN"];

/// Post-processing for [`SequenceTransformer::decode_num_seqs`].
#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
    /// Render prose instead of space-joined tokens
    pub detokenize:      bool,
    /// Trim each decoded sequence
    pub filter:          Option<FilterMode>,
    /// Per-sequence entity mappings (surface → placeholder)
    pub ents:            Vec<EntityMap<Placeholder>>,
    /// Replace placeholders using `ents` and corpus frequencies
    pub adapt_ents:      bool,
    /// Restore the casing of the surfaces in `ents` when detokenizing
    pub capitalize_ents: bool,
}

impl SequenceTransformer {
    // ── Encoding ──

    fn encode_word(&self, word: Option<&str>) -> Result<u32, PipelineError> {
        let lexicon = self.lexicon()?;
        Ok(match word {
            None | Some("") => EMPTY_INDEX,
            Some(w) => lexicon.get(w).unwrap_or(UNK_INDEX),
        })
    }

    /// Tokens → indices.
    pub fn tok_seq_to_nums<S: AsRef<str>>(&self, seq: &[S]) -> Result<Vec<u32>> {
        let mut nums = seq
            .iter()
            .map(|w| self.encode_word(Some(w.as_ref())))
            .collect::<Result<Vec<_>, _>>()?;
        if nums.is_empty() {
            nums.push(UNK_INDEX);
        }
        Ok(nums)
    }

    /// Sequences with empty slots (as produced by feature extraction) → indices.
    pub fn feature_seq_to_nums(&self, seq: &[Option<String>]) -> Result<Vec<u32>> {
        let mut nums = seq
            .iter()
            .map(|w| self.encode_word(w.as_deref()))
            .collect::<Result<Vec<_>, _>>()?;
        if nums.is_empty() {
            nums.push(UNK_INDEX);
        }
        Ok(nums)
    }

    pub fn tok_seqs_to_nums<S: AsRef<str>>(&self, seqs: &[Vec<S>]) -> Result<Vec<Vec<u32>>> {
        seqs.iter().map(|seq| self.tok_seq_to_nums(seq)).collect()
    }

    /// Texts → configured token lists (anonymized and phrase-folded
    /// when the transformer is configured to).
    pub fn text_to_tok_seqs<S: AsRef<str>>(&self, annotator: &dyn Annotator, texts: &[S]) -> Result<Vec<Vec<String>>> {
        texts
            .iter()
            .map(|text| self.text_to_tokens(annotator, text.as_ref()))
            .collect()
    }

    pub fn text_to_nums<S: AsRef<str>>(&self, annotator: &dyn Annotator, texts: &[S]) -> Result<Vec<Vec<u32>>> {
        let tok_seqs = self.text_to_tok_seqs(annotator, texts)?;
        self.tok_seqs_to_nums(&tok_seqs)
    }

    // ── Decoding ──

    /// Indices → words; index 0 decodes to the unknown word.
    pub fn nums_to_tok_seq(&self, seq: &[u32]) -> Result<Vec<String>> {
        let lexicon = self.lexicon()?;
        seq.iter()
            .map(|&idx| {
                Ok(lexicon
                    .word(idx)?
                    .unwrap_or(self.config.unk_word.as_str())
                    .to_string())
            })
            .collect()
    }

    /// Numeric sequences back to text.
    pub fn decode_num_seqs<R: Rng + ?Sized>(
        &self,
        annotator: &dyn Annotator,
        seqs: &[Vec<u32>],
        options: &DecodeOptions,
        rng: &mut R,
    ) -> Result<Vec<String>> {
        let sub_ent_probs = if options.adapt_ents { self.sub_ent_probs() } else { Default::default() };

        let mut decoded = Vec::with_capacity(seqs.len());
        for (idx, seq) in seqs.iter().enumerate() {
            let mut tokens = self.nums_to_tok_seq(seq)?;
            let ents = options.ents.get(idx);

            if let (true, Some(ents)) = (options.adapt_ents, ents) {
                tokens = adapt_tok_seq_ents(&tokens, ents, &sub_ent_probs, rng, &self.config.unk_word);
            }

            let mut text = if options.detokenize {
                let capitalize: Vec<String> = match (options.capitalize_ents, ents) {
                    (true, Some(ents)) => ents.keys().cloned().collect(),
                    _ => Vec::new(),
                };
                detokenize_tok_seq(annotator, &tokens, &capitalize)?
            } else {
                tokens.join(" ")
            };

            if let Some(filter) = &options.filter {
                text = filter_gen_seq(annotator, &text, filter)?;
            }
            decoded.push(text);
        }
        Ok(decoded)
    }

    // ── Bag of words ──

    pub fn num_seqs_to_bow(&self, seqs: &[Vec<u32>]) -> Result<Array2<u32>> {
        let size = self.lexicon()?.size();
        let mut bow = Array2::<u32>::zeros((seqs.len(), size + 1));

        for (row, seq) in seqs.iter().enumerate() {
            for &idx in seq {
                let col = idx as usize;
                if col > size {
                    return Err(PipelineError::IndexOutOfRange { index: col, size }.into());
                }
                bow[[row, col]] += 1;
            }
        }
        bow.column_mut(EMPTY_INDEX as usize).fill(0);
        Ok(bow)
    }

    pub fn text_to_bow<S: AsRef<str>>(&self, annotator: &dyn Annotator, texts: &[S]) -> Result<Array2<u32>> {
        let nums = self.text_to_nums(annotator, texts)?;
        self.num_seqs_to_bow(&nums)
    }

    // ── Feature words ──

    /// Per token: the word if it is in the lexicon and is either an
    /// entity placeholder or has a POS in `include_pos`; else `None`.
    pub fn seqs_to_feature_words<S: AsRef<str>>(
        &self,
        annotator: &dyn Annotator,
        texts: &[S],
        include_pos: &HashSet<String>,
    ) -> Result<Vec<Vec<Option<String>>>> {
        let lexicon = self.lexicon()?;
        texts
            .iter()
            .map(|text| {
                let text = text.as_ref();
                let pos: Vec<String> = annotator.annotate(text)?.tokens.into_iter().map(|t| t.pos).collect();
                let words = tokenize(annotator, text, &Default::default())?;
                if words.len() != pos.len() {
                    return Err(PipelineError::AnnotatorContract(format!(
                        "{} tokens but {} POS tags for '{}'",
                        words.len(),
                        pos.len(),
                        text
                    ))
                    .into());
                }
                Ok(words
                    .into_iter()
                    .zip(pos)
                    .map(|(word, pos)| {
                        let keep = lexicon.contains(&word)
                            && (word.starts_with(ENT_PREFIX) || include_pos.contains(&pos));
                        keep.then_some(word)
                    })
                    .collect())
            })
            .collect()
    }
}
