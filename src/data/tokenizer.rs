// ============================================================
// Layer 4 — Tokenizer / Segmenter
// ============================================================
// Turns raw text into a filtered list of token strings using
// the injected Annotator.
//
// tokenize() steps (applied in order):
//   1. Annotate the text
//   2. (optional) Merge each named-entity span into one unit
//   3. (optional) Keep units whose fine tag is allowed
//   4. (optional) Keep units whose coarse POS is allowed
//      → phrases (units containing "_") always survive 3 and 4
//   5. Pick the string form: lemma, lowercase, or raw surface
//   6. Drop empty strings, optionally prepend <START>
//
// Lowercasing skips units that are already normalised:
//   - merged entity spans ("New York" stays as is)
//   - anonymized placeholders (ENT_PERSON_0)
//   - phrases joined with "_"
//
// segment() returns sentences, or clauses via the dependency
// heuristic in clauses.rs.

use std::collections::HashSet;

use anyhow::Result;

use crate::data::clauses::segment_into_clauses;
use crate::domain::token::{Annotation, ENT_PREFIX, JOIN_CHAR, START_MARKER};
use crate::domain::traits::Annotator;

// ─── Options ──────────────────────────────────────────────────────────────────
/// Options controlling [`tokenize`].
#[derive(Debug, Clone)]
pub struct TokenizeOptions {
    pub lowercase:          bool,
    pub recognize_entities: bool,
    pub lemmatize:          bool,
    /// Allowed fine-grained tags; empty means no filter
    pub include_tags:       HashSet<String>,
    /// Allowed coarse POS; empty means no filter
    pub include_pos:        HashSet<String>,
    pub prepend_start:      bool,
}

impl Default for TokenizeOptions {
    fn default() -> Self {
        Self {
            lowercase:          true,
            recognize_entities: false,
            lemmatize:          false,
            include_tags:       HashSet::new(),
            include_pos:        HashSet::new(),
            prepend_start:      false,
        }
    }
}

impl TokenizeOptions {
    /// Surface forms exactly as annotated (no lowercasing)
    pub fn raw() -> Self {
        Self::default().with_lowercase(false)
    }

    pub fn with_lowercase(mut self, lowercase: bool) -> Self {
        self.lowercase = lowercase;
        self
    }

    pub fn with_entities(mut self, recognize: bool) -> Self {
        self.recognize_entities = recognize;
        self
    }

    pub fn with_lemmatize(mut self, lemmatize: bool) -> Self {
        self.lemmatize = lemmatize;
        self
    }

    pub fn with_include_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_include_pos<I, S>(mut self, pos: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_pos = pos.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_prepend_start(mut self, prepend: bool) -> Self {
        self.prepend_start = prepend;
        self
    }
}

/// Sentence-level or clause-level segmentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SegmentMode {
    #[default]
    Sentences,
    Clauses,
}

// ─── Units ────────────────────────────────────────────────────────────────────
/// A token or a merged entity span, before string selection.
struct Unit {
    surface:   String,
    lemma:     String,
    pos:       String,
    tag:       String,
    is_merged: bool,
}

impl Unit {
    fn is_phrase(&self) -> bool {
        self.surface.contains(JOIN_CHAR)
    }
}

/// Build units from an annotation, merging entity spans when asked.
fn collect_units(annotation: &Annotation, merge_entities: bool) -> Vec<Unit> {
    let single = |idx: usize| {
        let t = &annotation.tokens[idx];
        Unit {
            surface:   t.text.trim().to_string(),
            lemma:     t.lemma.clone(),
            pos:       t.pos.clone(),
            tag:       t.tag.clone(),
            is_merged: false,
        }
    };

    if !merge_entities {
        return (0..annotation.len()).map(&single).collect();
    }

    // Entity spans keyed by start token; whitespace-only detections are ignored
    let mut span_at = vec![None; annotation.len()];
    for span in &annotation.entities {
        if span.start < span.end
            && span.end <= annotation.len()
            && !annotation.entity_text(span).is_empty()
        {
            span_at[span.start] = Some(span);
        }
    }

    let mut units = Vec::with_capacity(annotation.len());
    for (idx, token) in annotation.tokens.iter().enumerate() {
        match span_at[idx] {
            Some(span) => {
                let covered = &annotation.tokens[span.start..span.end];
                let last = &covered[covered.len() - 1];
                units.push(Unit {
                    surface:   annotation.entity_text(span),
                    lemma:     covered.iter().map(|t| t.lemma.as_str()).collect::<Vec<_>>().join(" "),
                    pos:       last.pos.clone(),
                    tag:       last.tag.clone(),
                    is_merged: true,
                });
            }
            // Tokens inside an entity (but not its start) are absorbed
            None if token.ent_type.is_some() => {}
            None => units.push(single(idx)),
        }
    }
    units
}

// ─── tokenize ─────────────────────────────────────────────────────────────────
/// Tokenize `text` into an ordered list of token strings.
pub fn tokenize(annotator: &dyn Annotator, text: &str, options: &TokenizeOptions) -> Result<Vec<String>> {
    let annotation = annotator.annotate(text)?;
    let mut units = collect_units(&annotation, options.recognize_entities);

    // Both filters apply in sequence; a unit has to pass each one
    if !options.include_tags.is_empty() {
        units.retain(|u| u.is_phrase() || options.include_tags.contains(&u.tag));
    }
    if !options.include_pos.is_empty() {
        units.retain(|u| u.is_phrase() || options.include_pos.contains(&u.pos));
    }

    let mut tokens: Vec<String> = units
        .into_iter()
        .map(|u| {
            let is_placeholder = u.surface.starts_with(ENT_PREFIX);
            if options.lemmatize {
                if is_placeholder { u.surface } else { u.lemma.trim().to_string() }
            } else if options.lowercase && !u.is_merged && !is_placeholder && !u.is_phrase() {
                u.surface.to_lowercase()
            } else {
                u.surface
            }
        })
        .filter(|t| !t.is_empty())
        .collect();

    if options.prepend_start {
        tokens.insert(0, START_MARKER.to_string());
    }
    Ok(tokens)
}

// ─── segment ──────────────────────────────────────────────────────────────────
/// Split text into sentence or clause strings.
pub fn segment(annotator: &dyn Annotator, text: &str, mode: SegmentMode) -> Result<Vec<String>> {
    match mode {
        SegmentMode::Sentences => Ok(annotator
            .segment(text)?
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()),
        SegmentMode::Clauses => segment_into_clauses(annotator, text),
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::annotator::{RuleAnnotator, ScriptedAnnotator};
    use crate::domain::token::AnnotatedToken;

    fn tagged_annotator() -> ScriptedAnnotator {
        // "The old man saw New York"
        let ann = Annotation::new(vec![
            AnnotatedToken::new("The").with_lemma("the").with_pos("DET", "DT"),
            AnnotatedToken::new("old").with_lemma("old").with_pos("ADJ", "JJ"),
            AnnotatedToken::new("man").with_lemma("man").with_pos("NOUN", "NN"),
            AnnotatedToken::new("saw").with_lemma("see").with_pos("VERB", "VBD"),
            AnnotatedToken::new("New").with_lemma("new").with_pos("PROPN", "NNP"),
            AnnotatedToken::new("York").with_lemma("york").with_pos("PROPN", "NNP").with_whitespace(false),
        ])
        .with_entity(4, 6, "GPE");
        ScriptedAnnotator::new(RuleAnnotator::new()).with_annotation("The old man saw New York", ann)
    }

    const TEXT: &str = "The old man saw New York";

    #[test]
    fn test_default_lowercases() {
        let a = tagged_annotator();
        let toks = tokenize(&a, TEXT, &TokenizeOptions::default()).unwrap();
        assert_eq!(toks, vec!["the", "old", "man", "saw", "new", "york"]);
    }

    #[test]
    fn test_recognize_entities_merges_and_keeps_case() {
        let a = tagged_annotator();
        let opts = TokenizeOptions::default().with_entities(true);
        let toks = tokenize(&a, TEXT, &opts).unwrap();
        assert_eq!(toks, vec!["the", "old", "man", "saw", "New York"]);
    }

    #[test]
    fn test_lemmatize_wins_over_lowercase() {
        let a = tagged_annotator();
        let opts = TokenizeOptions::default().with_lemmatize(true);
        let toks = tokenize(&a, TEXT, &opts).unwrap();
        assert_eq!(toks, vec!["the", "old", "man", "see", "new", "york"]);
    }

    #[test]
    fn test_tag_and_pos_filters_both_apply() {
        let a = tagged_annotator();
        // Tag filter keeps NN + VBD + NNP, POS filter then keeps only NOUN
        let opts = TokenizeOptions::default()
            .with_include_tags(["NN", "VBD", "NNP"])
            .with_include_pos(["NOUN"]);
        let toks = tokenize(&a, TEXT, &opts).unwrap();
        assert_eq!(toks, vec!["man"]);
    }

    #[test]
    fn test_phrases_bypass_filters_and_case() {
        let a = RuleAnnotator::new();
        let opts = TokenizeOptions::default().with_include_pos(["NOUN"]);
        let toks = tokenize(&a, "We saw New_York today", &opts).unwrap();
        assert_eq!(toks, vec!["New_York"]);
    }

    #[test]
    fn test_placeholders_not_lowercased() {
        let a = RuleAnnotator::new();
        let toks = tokenize(&a, "ENT_PERSON_0 Ran", &TokenizeOptions::default()).unwrap();
        assert_eq!(toks, vec!["ENT_PERSON_0", "ran"]);
    }

    #[test]
    fn test_prepend_start() {
        let a = RuleAnnotator::new();
        let opts = TokenizeOptions::default().with_prepend_start(true);
        let toks = tokenize(&a, "Hi there", &opts).unwrap();
        assert_eq!(toks, vec!["<START>", "hi", "there"]);
    }

    #[test]
    fn test_segment_sentences() {
        let a = RuleAnnotator::new();
        let sents = segment(&a, "One. Two!", SegmentMode::Sentences).unwrap();
        assert_eq!(sents, vec!["One.", "Two!"]);
    }
}
