// ============================================================
// Layer 4 — Phrase Folding
// ============================================================
// Joins known multi-word phrases into single "_"-joined tokens
// before tokenization, so "ice cream" can be one lexicon entry:
//
//   "they ate ice cream"  + {"ice_cream"}
//   → "they ate ice_cream"
//
// Greedy left to right: try the 3-word window, then 2 words,
// else emit the single word. When the phrase list is
// lemmatized, candidate windows are compared by their lemmas.

use std::collections::BTreeSet;

use anyhow::Result;

use crate::data::tokenizer::{tokenize, TokenizeOptions};
use crate::domain::token::JOIN_CHAR;
use crate::domain::traits::Annotator;

const MAX_PHRASE_LEN: usize = 3;

fn candidate(annotator: &dyn Annotator, words: &[String], lemmatized: bool) -> Result<String> {
    let sep = JOIN_CHAR.to_string();
    if !lemmatized {
        return Ok(words.join(&sep));
    }
    let lemmas: Vec<String> = annotator
        .annotate(&words.join(" "))?
        .tokens
        .into_iter()
        .map(|t| t.lemma)
        .collect();
    Ok(lemmas.join(&sep))
}

/// Rewrite `text` with every matching phrase joined by `_`.
pub fn combine_phrases_in_seq(
    annotator: &dyn Annotator,
    text: &str,
    phrases: &BTreeSet<String>,
    lemmatized: bool,
) -> Result<String> {
    let words = tokenize(annotator, text, &TokenizeOptions::raw())?;
    let mut folded: Vec<String> = Vec::with_capacity(words.len());

    let mut idx = 0;
    while idx < words.len() {
        let mut matched = None;
        let longest = MAX_PHRASE_LEN.min(words.len() - idx);
        for len in (2..=longest).rev() {
            let phrase = candidate(annotator, &words[idx..idx + len], lemmatized)?;
            if phrases.contains(&phrase) {
                matched = Some((phrase, len));
                break;
            }
        }

        match matched {
            Some((phrase, len)) => {
                folded.push(phrase);
                idx += len;
            }
            None => {
                folded.push(words[idx].clone());
                idx += 1;
            }
        }
    }
    Ok(folded.join(" "))
}
