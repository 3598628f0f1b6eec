// ============================================================
// Layer 4 — In-crate Annotators
// ============================================================
// The real linguistic analysis is an external collaborator.
// These two implementations exist so the pipeline can run
// end to end without one:
//
//   RuleAnnotator
//     - Sentence split on . ! ? (plus trailing quotes/brackets)
//     - Word / punctuation split with English contraction
//       handling:  don't → do n't,  John's → John 's
//     - PTB tags for punctuation and numbers, XX otherwise
//     - Lowercase lemmas
//     - Flat dependency structure (every token is its own head)
//     - Optional gazetteer: exact token-sequence matches become
//       entity spans (longest entry wins)
//
//   ScriptedAnnotator
//     - Replays annotations produced elsewhere (e.g. a JSON dump
//       from an external tagger), keyed by the trimmed text
//     - Any text it has no script for goes to a RuleAnnotator
//
// Neither is a statistical model; both are deterministic.
//
// Reference: regex crate documentation

use std::collections::HashMap;
use std::sync::OnceLock;

use anyhow::Result;
use regex::Regex;

use crate::domain::token::{AnnotatedToken, Annotation, EntitySpan};
use crate::domain::traits::Annotator;

/// Contraction suffixes split off the preceding word (after the apostrophe)
const CONTRACTION_SUFFIXES: [&str; 6] = ["s", "d", "ll", "ve", "m", "re"];

fn sentence_end_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"[.!?]+["'”’)\]]*(?:\s+|$)"#).expect("static sentence pattern")
    })
}

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"['’]?\w+(?:['’]\w+)*|[^\w\s]").expect("static word pattern")
    })
}

// ─── Raw word splitting ───────────────────────────────────────────────────────
/// A surface piece with its byte range in the source text.
struct Piece<'a> {
    text:  &'a str,
    start: usize,
    end:   usize,
}

fn is_apostrophe(c: char) -> bool {
    c == '\'' || c == '’'
}

/// Lowercased text after the apostrophe at byte `cut` of `text`.
fn suffix_after(text: &str, cut: usize) -> String {
    let quote_len = text[cut..].chars().next().map(char::len_utf8).unwrap_or(1);
    text[cut + quote_len..].to_lowercase()
}

/// Split one regex match into word + contraction pieces.
///
/// All offsets are taken from `text` itself; lowercasing can change
/// byte lengths, so only suffixes are lowercased for comparison.
fn split_contraction<'a>(text: &'a str, start: usize, out: &mut Vec<Piece<'a>>) {
    // Leading apostrophe: keep "'s" / "'ll" whole, otherwise it is a quote mark
    if text.starts_with(is_apostrophe) {
        let quote_len = text.chars().next().map(char::len_utf8).unwrap_or(1);
        let rest = suffix_after(text, 0);
        if !CONTRACTION_SUFFIXES.contains(&rest.as_str()) {
            out.push(Piece { text: &text[..quote_len], start, end: start + quote_len });
            split_contraction(&text[quote_len..], start + quote_len, out);
            return;
        }
        out.push(Piece { text, start, end: start + text.len() });
        return;
    }

    if let Some(apos) = text.rfind(is_apostrophe).filter(|&i| i > 0) {
        let suffix = suffix_after(text, apos);

        // do n't / ca n't / wo n't
        if suffix == "t" && text.chars().count() > 3 {
            let before = text[..apos].char_indices().next_back();
            if let Some((cut, 'n' | 'N')) = before.filter(|&(i, _)| i > 0) {
                out.push(Piece { text: &text[..cut], start, end: start + cut });
                out.push(Piece { text: &text[cut..], start: start + cut, end: start + text.len() });
                return;
            }
        }

        // John 's / we 'll / they 're
        if CONTRACTION_SUFFIXES.contains(&suffix.as_str()) {
            out.push(Piece { text: &text[..apos], start, end: start + apos });
            out.push(Piece { text: &text[apos..], start: start + apos, end: start + text.len() });
            return;
        }
    }

    out.push(Piece { text, start, end: start + text.len() });
}

fn split_words(text: &str) -> Vec<Piece<'_>> {
    let mut pieces = Vec::new();
    for m in word_re().find_iter(text) {
        split_contraction(m.as_str(), m.start(), &mut pieces);
    }
    pieces
}

/// Coarse POS and fine PTB tag for a token the rules can recognise.
fn rule_tags(text: &str) -> (&'static str, &'static str) {
    match text {
        "." | "!" | "?" => ("PUNCT", "."),
        "," => ("PUNCT", ","),
        ":" | ";" => ("PUNCT", ":"),
        "(" | "[" | "{" => ("PUNCT", "-LRB-"),
        ")" | "]" | "}" => ("PUNCT", "-RRB-"),
        "\"" | "“" | "`" => ("PUNCT", "``"),
        "”" | "'" | "’" => ("PUNCT", "''"),
        "-" | "–" | "—" => ("PUNCT", "HYPH"),
        "$" => ("SYM", "$"),
        "#" => ("SYM", "#"),
        _ => {
            let lower = text.to_lowercase();
            if lower == "n't" || lower == "n’t" {
                ("PART", "RB")
            } else if lower == "'s" || lower == "’s" {
                ("PART", "POS")
            } else if text.starts_with(is_apostrophe) && text.chars().count() > 1 {
                ("AUX", "VBP")
            } else if text.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',')
                && text.chars().any(|c| c.is_ascii_digit())
            {
                ("NUM", "CD")
            } else if text.chars().all(|c| !c.is_alphanumeric() && c != '_') {
                ("PUNCT", "NFP")
            } else {
                ("X", "XX")
            }
        }
    }
}

// ─── RuleAnnotator ────────────────────────────────────────────────────────────
/// Deterministic regex annotator with an optional gazetteer.
#[derive(Debug, Clone, Default)]
pub struct RuleAnnotator {
    /// (surface tokens, label), longest first
    gazetteer: Vec<(Vec<String>, String)>,
}

impl RuleAnnotator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register entity surfaces (e.g. `("Bob Smith", "PERSON")`).
    /// Matching is on raw tokens and is case-sensitive.
    pub fn with_gazetteer<I, S, L>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (S, L)>,
        S: AsRef<str>,
        L: Into<String>,
    {
        for (surface, label) in entries {
            let tokens: Vec<String> = split_words(surface.as_ref())
                .into_iter()
                .map(|p| p.text.to_string())
                .collect();
            if !tokens.is_empty() {
                self.gazetteer.push((tokens, label.into()));
            }
        }
        // Longest entries first so "Bob Smith" beats "Bob"
        self.gazetteer.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        self
    }

    pub fn gazetteer_len(&self) -> usize {
        self.gazetteer.len()
    }

    /// Find the gazetteer entry matching at `start`, if any.
    fn match_entity(&self, tokens: &[AnnotatedToken], start: usize) -> Option<(usize, &str)> {
        self.gazetteer.iter().find_map(|(surface, label)| {
            let end = start + surface.len();
            let hit = end <= tokens.len()
                && tokens[start..end]
                    .iter()
                    .zip(surface)
                    .all(|(t, s)| &t.text == s);
            hit.then_some((end, label.as_str()))
        })
    }
}

impl Annotator for RuleAnnotator {
    fn segment(&self, text: &str) -> Result<Vec<String>> {
        let mut sentences = Vec::new();
        let mut start = 0usize;

        for m in sentence_end_re().find_iter(text) {
            let sentence = text[start..m.end()].trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            start = m.end();
        }

        // Trailing text without terminal punctuation is still a sentence
        let rest = text[start..].trim();
        if !rest.is_empty() {
            sentences.push(rest.to_string());
        }
        Ok(sentences)
    }

    fn annotate(&self, text: &str) -> Result<Annotation> {
        let pieces = split_words(text);

        let mut tokens: Vec<AnnotatedToken> = pieces
            .iter()
            .enumerate()
            .map(|(idx, piece)| {
                let (pos, tag) = rule_tags(piece.text);
                let whitespace = text[piece.end..]
                    .chars()
                    .next()
                    .map(char::is_whitespace)
                    .unwrap_or(false);
                AnnotatedToken::new(piece.text)
                    .with_lemma(piece.text.to_lowercase())
                    .with_pos(pos, tag)
                    .with_dep("", idx)
                    .with_whitespace(whitespace)
            })
            .collect();

        let mut annotation = Annotation::default();
        if !self.gazetteer.is_empty() {
            let mut idx = 0;
            while idx < tokens.len() {
                match self.match_entity(&tokens, idx) {
                    Some((end, label)) => {
                        for token in &mut tokens[idx..end] {
                            token.pos = "PROPN".to_string();
                            token.tag = "NNP".to_string();
                        }
                        annotation.entities.push(EntitySpan {
                            start: idx,
                            end,
                            label: label.to_string(),
                        });
                        idx = end;
                    }
                    None => idx += 1,
                }
            }
            for span in &annotation.entities {
                for token in &mut tokens[span.start..span.end] {
                    token.ent_type = Some(span.label.clone());
                }
            }
        }

        annotation.tokens = tokens;
        Ok(annotation)
    }
}

// ─── ScriptedAnnotator ────────────────────────────────────────────────────────
/// Replays fixed annotations, falling back to a [`RuleAnnotator`].
#[derive(Debug, Clone, Default)]
pub struct ScriptedAnnotator {
    annotations: HashMap<String, Annotation>,
    sentences:   HashMap<String, Vec<String>>,
    vectors:     HashMap<String, Vec<f32>>,
    vector_size: usize,
    fallback:    RuleAnnotator,
}

impl ScriptedAnnotator {
    pub fn new(fallback: RuleAnnotator) -> Self {
        Self { fallback, ..Self::default() }
    }

    /// Build from a text → annotation map (the JSON dump format).
    pub fn from_annotations(annotations: HashMap<String, Annotation>, fallback: RuleAnnotator) -> Self {
        let annotations = annotations
            .into_iter()
            .map(|(text, ann)| (text.trim().to_string(), ann))
            .collect();
        Self { annotations, fallback, ..Self::default() }
    }

    pub fn with_annotation(mut self, text: &str, annotation: Annotation) -> Self {
        self.annotations.insert(text.trim().to_string(), annotation);
        self
    }

    pub fn with_sentences<S: Into<String>>(mut self, text: &str, sentences: Vec<S>) -> Self {
        self.sentences
            .insert(text.trim().to_string(), sentences.into_iter().map(Into::into).collect());
        self
    }

    /// Register a native word vector. All vectors must share one length.
    pub fn with_vector(mut self, word: &str, vector: Vec<f32>) -> Self {
        self.vector_size = vector.len();
        self.vectors.insert(word.to_string(), vector);
        self
    }

    pub fn num_scripts(&self) -> usize {
        self.annotations.len()
    }
}

impl Annotator for ScriptedAnnotator {
    fn segment(&self, text: &str) -> Result<Vec<String>> {
        match self.sentences.get(text.trim()) {
            Some(sentences) => Ok(sentences.clone()),
            None => self.fallback.segment(text),
        }
    }

    fn annotate(&self, text: &str) -> Result<Annotation> {
        match self.annotations.get(text.trim()) {
            Some(annotation) => Ok(annotation.clone()),
            None => self.fallback.annotate(text),
        }
    }

    fn vector(&self, word: &str) -> Option<Vec<f32>> {
        self.vectors.get(word).cloned()
    }

    fn vector_size(&self) -> usize {
        self.vector_size
    }
}
