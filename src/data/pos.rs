// ============================================================
// Layer 4 — POS Index Encoding
// ============================================================
// Maps each token's fine-grained Penn Treebank tag to a fixed
// positive index, for models that take a POS channel alongside
// the word indices. Placeholder tokens (ENT_…) are encoded as
// proper nouns regardless of what the annotator said.
//
// The table is fixed; an unknown tag means the annotator is
// using a different tag set and is reported as fatal.

use anyhow::Result;

use crate::domain::error::PipelineError;
use crate::domain::token::ENT_PREFIX;
use crate::domain::traits::Annotator;

/// PTB fine tags in index order; index = position + 1.
pub const PTB_TAGS: [&str; 59] = [
    "#", "$", "''", "(", ")", ",", "-LRB-", "-PRB-", ".", ":",
    "ADD", "AFX", "BES", "CC", "CD", "DT", "EX", "FW", "GW", "HVS",
    "HYPH", "IN", "JJ", "JJR", "JJS", "LS", "MD", "NFP", "NIL", "NN",
    "NNP", "NNPS", "NNS", "PDT", "POS", "PRP", "PRP$", "RB", "RBR", "RBS",
    "RP", "SP", "SYM", "TO", "UH", "VB", "VBD", "VBG", "VBN", "VBP",
    "VBZ", "WDT", "WP", "WP$", "WRB", "XX", "``", "\"\"", "-RRB-",
];

const PROPER_NOUN: &str = "NNP";

/// Index of a PTB tag, if it is in the table.
pub fn pos_tag_index(tag: &str) -> Option<u32> {
    PTB_TAGS.iter().position(|&t| t == tag).map(|i| i as u32 + 1)
}

/// One POS index per annotated token of `text`.
pub fn get_pos_num_seq(annotator: &dyn Annotator, text: &str) -> Result<Vec<u32>> {
    let annotation = annotator.annotate(text)?;
    annotation
        .tokens
        .iter()
        .map(|token| {
            let tag = if token.text.starts_with(ENT_PREFIX) { PROPER_NOUN } else { token.tag.as_str() };
            pos_tag_index(tag).ok_or_else(|| PipelineError::UnknownPosTag(tag.to_string()).into())
        })
        .collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::annotator::{RuleAnnotator, ScriptedAnnotator};
    use crate::domain::token::{AnnotatedToken, Annotation};

    #[test]
    fn test_table_edges() {
        assert_eq!(pos_tag_index("#"), Some(1));
        assert_eq!(pos_tag_index("NNP"), Some(31));
        assert_eq!(pos_tag_index("-RRB-"), Some(59));
        assert_eq!(pos_tag_index("BOGUS"), None);
    }

    #[test]
    fn test_placeholders_are_proper_nouns() {
        let a = RuleAnnotator::new();
        // ENT_ → NNP, "ran" → XX, "." → "."
        assert_eq!(get_pos_num_seq(&a, "ENT_PERSON_0 ran.").unwrap(), vec![31, 56, 9]);
    }

    #[test]
    fn test_unknown_tag_is_fatal() {
        let ann = Annotation::new(vec![AnnotatedToken::new("x").with_pos("X", "ZZZ")]);
        let a = ScriptedAnnotator::new(RuleAnnotator::new()).with_annotation("x", ann);
        let err = get_pos_num_seq(&a, "x").unwrap_err();
        assert_eq!(
            err.downcast_ref::<PipelineError>(),
            Some(&PipelineError::UnknownPosTag("ZZZ".to_string()))
        );
    }
}
