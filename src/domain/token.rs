// ============================================================
// Layer 3 — Annotated Token Types
// ============================================================
// The shape of the data the external linguistic annotator
// hands back for a piece of text.
//
// One Annotation holds:
//   - tokens:   every token in document order, each carrying
//               its surface form, lemma, coarse POS, fine tag,
//               dependency label and head index
//   - entities: named-entity spans over those tokens
//
// Head indices are document-level token indices. A root token
// points at itself, which is how the clause heuristic detects
// the top of the tree.
//
// Everything derives Serialize/Deserialize so annotations
// produced by an external tagger can be dumped to JSON and
// replayed through the ScriptedAnnotator.

use serde::{Deserialize, Serialize};

use crate::domain::error::PipelineError;

/// Symbol used for words that are not in the lexicon.
pub const UNK_WORD: &str = "<UNK>";

/// Marker inserted before a sequence when `prepend_start` is on.
pub const START_MARKER: &str = "<START>";

/// Prefix carried by every anonymized entity token.
pub const ENT_PREFIX: &str = "ENT_";

/// Character joining phrase words and placeholder parts.
pub const JOIN_CHAR: char = '_';

fn default_whitespace() -> bool {
    true
}

/// One token as produced by the annotator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedToken {
    /// Surface form exactly as it appeared in the text
    pub text: String,

    /// Whether the token was followed by a space in the source
    #[serde(default = "default_whitespace")]
    pub whitespace: bool,

    #[serde(default)]
    pub lemma: String,

    /// Coarse-grained POS (NOUN, PROPN, PUNCT, ...)
    #[serde(default)]
    pub pos: String,

    /// Fine-grained Penn Treebank tag (NN, NNP, VBD, ...)
    #[serde(default)]
    pub tag: String,

    /// Dependency relation to the head (ROOT, advcl, conj, ...)
    #[serde(default)]
    pub dep: String,

    /// Document-level index of the governing token
    #[serde(default)]
    pub head: usize,

    /// Entity label when the token lies inside an entity span
    #[serde(default)]
    pub ent_type: Option<String>,
}

impl AnnotatedToken {
    /// Create a token with no linguistic attributes beyond its text.
    /// The lemma defaults to the surface form.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            lemma: text.clone(),
            text,
            whitespace: true,
            pos: String::new(),
            tag: String::new(),
            dep: String::new(),
            head: 0,
            ent_type: None,
        }
    }

    pub fn with_pos(mut self, pos: impl Into<String>, tag: impl Into<String>) -> Self {
        self.pos = pos.into();
        self.tag = tag.into();
        self
    }

    pub fn with_lemma(mut self, lemma: impl Into<String>) -> Self {
        self.lemma = lemma.into();
        self
    }

    pub fn with_dep(mut self, dep: impl Into<String>, head: usize) -> Self {
        self.dep = dep.into();
        self.head = head;
        self
    }

    pub fn with_whitespace(mut self, whitespace: bool) -> Self {
        self.whitespace = whitespace;
        self
    }

    /// Surface text plus the trailing space, if any.
    /// Concatenating this over a token run reproduces the source span.
    pub fn text_with_ws(&self) -> String {
        if self.whitespace {
            format!("{} ", self.text)
        } else {
            self.text.clone()
        }
    }

    /// True for anonymized placeholder tokens (ENT_PERSON_0 ...)
    pub fn is_placeholder(&self) -> bool {
        self.text.starts_with(ENT_PREFIX)
    }
}

/// A named-entity span over token indices `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySpan {
    pub start: usize,
    pub end: usize,
    pub label: String,
}

/// Full annotation of one piece of text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub tokens: Vec<AnnotatedToken>,
    #[serde(default)]
    pub entities: Vec<EntitySpan>,
}

impl Annotation {
    pub fn new(tokens: Vec<AnnotatedToken>) -> Self {
        Self { tokens, entities: Vec::new() }
    }

    /// Attach an entity span and stamp `ent_type` on the covered tokens.
    pub fn with_entity(mut self, start: usize, end: usize, label: impl Into<String>) -> Self {
        let label = label.into();
        for token in self.tokens.iter_mut().take(end).skip(start) {
            token.ent_type = Some(label.clone());
        }
        self.entities.push(EntitySpan { start, end, label });
        self
    }

    /// Source text of a token range, with inner whitespace preserved.
    /// Not trimmed: the last token's trailing space is included.
    /// Out-of-range spans yield an empty string.
    pub fn span_text(&self, start: usize, end: usize) -> String {
        self.tokens
            .get(start..end.min(self.tokens.len()))
            .unwrap_or_default()
            .iter()
            .map(AnnotatedToken::text_with_ws)
            .collect()
    }

    /// Every entity span must satisfy `start < end <= tokens.len()`.
    pub fn validate_entities(&self) -> Result<(), PipelineError> {
        match self.entities.iter().find(|s| s.start >= s.end || s.end > self.tokens.len()) {
            Some(span) => Err(PipelineError::AnnotatorContract(format!(
                "entity span {}..{} ({}) outside {} tokens",
                span.start,
                span.end,
                span.label,
                self.tokens.len()
            ))),
            None => Ok(()),
        }
    }

    /// Trimmed text of an entity span
    pub fn entity_text(&self, span: &EntitySpan) -> String {
        self.span_text(span.start, span.end).trim().to_string()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Annotation {
        Annotation::new(vec![
            AnnotatedToken::new("New"),
            AnnotatedToken::new("York").with_whitespace(false),
            AnnotatedToken::new(".").with_whitespace(false),
        ])
        .with_entity(0, 2, "GPE")
    }

    #[test]
    fn test_span_text_preserves_spacing() {
        let ann = sample();
        assert_eq!(ann.span_text(0, 3), "New York.");
        assert_eq!(ann.span_text(0, 1), "New ");
    }

    #[test]
    fn test_with_entity_stamps_tokens() {
        let ann = sample();
        assert_eq!(ann.tokens[0].ent_type.as_deref(), Some("GPE"));
        assert_eq!(ann.tokens[1].ent_type.as_deref(), Some("GPE"));
        assert!(ann.tokens[2].ent_type.is_none());
        assert_eq!(ann.entity_text(&ann.entities[0]), "New York");
    }

    #[test]
    fn test_out_of_range_spans() {
        let mut ann = sample();
        assert!(ann.validate_entities().is_ok());
        assert_eq!(ann.span_text(5, 7), "");

        ann.entities.push(EntitySpan { start: 5, end: 7, label: "PERSON".to_string() });
        assert!(matches!(ann.validate_entities(), Err(PipelineError::AnnotatorContract(_))));
    }

    #[test]
    fn test_deserialize_defaults() {
        let json = r#"{"tokens": [{"text": "Hi"}]}"#;
        let ann: Annotation = serde_json::from_str(json).unwrap();
        assert!(ann.tokens[0].whitespace);
        assert!(ann.entities.is_empty());
        assert_eq!(ann.tokens[0].head, 0);
    }
}
