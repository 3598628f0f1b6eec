// ============================================================
// Layer 4 — Detokenizer
// ============================================================
// Best-effort rendering of a token list back into prose.
//
// Per sentence (after re-segmenting the joined tokens):
//   1. Capitalize spans matching the supplied entity strings
//   2. Normalise curly quotes, " i " → " I "
//   3. Collapse contractions:  do n't → don't,  he 's → he's
//   4. Attach punctuation:     "sat ." → "sat."
//   5. Fold quote runs into a single double quote
//   6. Pairing scan: an opener followed by a space loses the
//      space; its closer preceded by a space loses that space
//        ( hi )  → (hi)      " yes "  → "yes"
//   7. Uppercase the first letter
//
// Steps 2-3 run on the sentence padded with spaces; the padding
// is trimmed before step 4, so " - " only joins inner dashes.
//
// Example:
//   ["the", "cat", "sat", "."]  → "The cat sat."
//   ["do", "n't", "go", "."]     → "Don't go."
//
// filter_gen_seq() trims generated text to its first sentences,
// or up to the first end-of-sequence token.

use std::collections::HashSet;
use std::sync::OnceLock;

use anyhow::Result;
use regex::Regex;

use crate::domain::traits::Annotator;

// ─── Rewrite rules ────────────────────────────────────────────────────────────
fn contraction_rules() -> &'static [(Regex, &'static str)] {
    static RULES: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    RULES.get_or_init(|| {
        [
            (r" n'\s*t ", "n't "),
            (r" '\s*d ", "'d "),
            (r" '\s*s ", "'s "),
            (r" '\s*ve ", "'ve "),
            (r" '\s*ll ", "'ll "),
            (r" '\s*m ", "'m "),
            (r" '\s*re ", "'re "),
        ]
        .into_iter()
        .map(|(pattern, with)| (Regex::new(pattern).expect("static contraction pattern"), with))
        .collect()
    })
}

fn quote_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(["']\s*){2,}"#).expect("static quote pattern"))
}

/// Literal replacements applied in order after contractions
const PUNCT_RULES: [(&str, &str); 12] = [
    (" .", "."),
    (" !", "!"),
    (" ?", "?"),
    (" ,", ","),
    (" - ", "-"),
    (" :", ":"),
    (" ;", ";"),
    ("$ ", "$"),
    ("' '", "''"),
    ("` `", "``"),
    ("''", "\""),
    ("``", "\""),
];

/// Closing mark for an opening mark
fn closer(open: char) -> Option<char> {
    match open {
        '\'' | '`' => Some('\''),
        '"' => Some('"'),
        '(' => Some(')'),
        '[' => Some(']'),
        _ => None,
    }
}

/// Remove the inner spaces of quote and bracket pairs.
fn pair_punctuation(sentence: &str) -> String {
    let mut chars: Vec<char> = sentence.chars().collect();
    let mut open: Vec<char> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let closes_top = open.last().and_then(|&o| closer(o)) == Some(c);

        if closes_top {
            if i > 0 && chars[i - 1] == ' ' {
                chars.remove(i - 1);
                open.pop();
            }
        } else if closer(c).is_some() && i + 1 < chars.len() && chars[i + 1] == ' ' {
            open.push(c);
            chars.remove(i + 1);
        }

        // A removed space before `c` shifts it left; re-examine position i
        if chars.get(i) == Some(&c) {
            i += 1;
        }
    }
    chars.into_iter().collect()
}

fn capitalize_first_alpha(sentence: &str) -> String {
    match sentence.char_indices().find(|(_, c)| c.is_alphabetic()) {
        Some((idx, c)) => {
            let mut out = String::with_capacity(sentence.len());
            out.push_str(&sentence[..idx]);
            out.extend(c.to_uppercase());
            out.push_str(&sentence[idx + c.len_utf8()..]);
            out
        }
        None => sentence.to_string(),
    }
}

/// Replace lowercase runs matching an entity with the entity's casing.
fn capitalize_entities(words: &mut [String], entities: &[Vec<String>]) {
    let mut idx = 0;
    while idx < words.len() {
        for entity in entities {
            let end = idx + entity.len();
            if entity.is_empty() || end > words.len() {
                continue;
            }
            let hit = words[idx..end]
                .iter()
                .zip(entity)
                .all(|(w, e)| w.to_lowercase() == e.to_lowercase());
            if hit {
                words[idx..end].clone_from_slice(entity);
                idx = end - 1;
                break;
            }
        }
        idx += 1;
    }
}

fn render_sentence(words: &[String]) -> String {
    // Padding lets the pronoun and contraction rules fire at the sentence edges
    let mut s = format!(" {} ", words.join(" "));

    s = s.replace(['‘', '’'], "'").replace(['“', '”'], "\"");
    s = s.replace(" i ", " I ");

    for (re, with) in contraction_rules() {
        s = re.replace_all(&s, *with).into_owned();
    }

    // Punctuation rules see the unpadded sentence: an edge dash stays spaced
    s = s.trim().to_string();
    for (from, to) in PUNCT_RULES {
        s = s.replace(from, to);
    }
    s = quote_run_re().replace_all(&s, "\" ").into_owned();

    let paired = pair_punctuation(&s);
    capitalize_first_alpha(paired.trim())
}

// ─── detokenize ───────────────────────────────────────────────────────────────
/// Render tokens as text; `capitalize` lists entity strings whose
/// casing should be restored.
pub fn detokenize_tok_seq(annotator: &dyn Annotator, tokens: &[String], capitalize: &[String]) -> Result<String> {
    let entities: Vec<Vec<String>> = capitalize
        .iter()
        .map(|e| e.split_whitespace().map(str::to_string).collect())
        .collect();

    let mut rendered = Vec::new();
    for sentence in annotator.segment(&tokens.join(" "))? {
        let mut words: Vec<String> = sentence.split_whitespace().map(str::to_string).collect();
        if !entities.is_empty() {
            capitalize_entities(&mut words, &entities);
        }
        rendered.push(render_sentence(&words));
    }
    Ok(rendered.join(" "))
}

// ─── filter_gen_seq ───────────────────────────────────────────────────────────
/// How to cut a generated sequence short.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterMode {
    /// Keep text up to and including the first of these tokens
    EosTokens(HashSet<String>),
    /// Keep the first n sentences
    Sentences(usize),
}

impl Default for FilterMode {
    fn default() -> Self {
        FilterMode::Sentences(1)
    }
}

pub fn filter_gen_seq(annotator: &dyn Annotator, text: &str, mode: &FilterMode) -> Result<String> {
    match mode {
        FilterMode::EosTokens(eos) => {
            let annotation = annotator.annotate(text)?;
            let cut = annotation
                .tokens
                .iter()
                .position(|t| eos.contains(t.text.trim()));
            Ok(match cut {
                Some(idx) => annotation.span_text(0, idx + 1).trim().to_string(),
                None => text.to_string(),
            })
        }
        FilterMode::Sentences(n) => {
            let sentences = annotator.segment(text)?;
            Ok(sentences.into_iter().take(*n).collect::<Vec<_>>().join(" "))
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::annotator::RuleAnnotator;

    fn toks(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn detok(words: &[&str]) -> String {
        detokenize_tok_seq(&RuleAnnotator::new(), &toks(words), &[]).unwrap()
    }

    #[test]
    fn test_simple_sentence() {
        assert_eq!(detok(&["the", "cat", "sat", "."]), "The cat sat.");
    }

    #[test]
    fn test_contraction() {
        assert_eq!(detok(&["do", "n't", "go", "."]), "Don't go.");
    }

    #[test]
    fn test_sentence_final_contraction_and_pronoun() {
        assert_eq!(detok(&["i", "know", "he", "'s"]), "I know he's");
        assert_eq!(detok(&["so", "i", "left", "."]), "So I left.");
    }

    #[test]
    fn test_multiple_sentences() {
        assert_eq!(detok(&["hi", "!", "how", "are", "you", "?"]), "Hi! How are you?");
    }

    #[test]
    fn test_brackets_and_quotes_pair() {
        assert_eq!(detok(&["he", "(", "finally", ")", "left", "."]), "He (finally) left.");
        assert_eq!(detok(&["she", "said", "\"", "no", "\"", "."]), "She said \"no\".");
    }

    #[test]
    fn test_hyphen_and_comma() {
        assert_eq!(detok(&["a", "well", "-", "known", "cat", ",", "too", "."]), "A well-known cat, too.");
    }

    #[test]
    fn test_edge_dashes_keep_their_space() {
        assert_eq!(detok(&["wait", "-"]), "Wait -");
        assert_eq!(detok(&["-", "so", "it", "goes", "."]), "- So it goes.");
        assert_eq!(detok(&["he", "'s", "-", "fine", "."]), "He's-fine.");
    }

    #[test]
    fn test_capitalizes_entities() {
        let a = RuleAnnotator::new();
        let out = detokenize_tok_seq(&a, &toks(&["we", "met", "bob", "smith", "."]), &toks(&["Bob Smith"])).unwrap();
        assert_eq!(out, "We met Bob Smith.");
    }

    #[test]
    fn test_pair_scan_unmatched_opener() {
        assert_eq!(pair_punctuation(" ( a b "), " (a b ");
    }

    #[test]
    fn test_filter_by_sentences() {
        let a = RuleAnnotator::new();
        let out = filter_gen_seq(&a, "One. Two. Three.", &FilterMode::Sentences(2)).unwrap();
        assert_eq!(out, "One. Two.");
    }

    #[test]
    fn test_filter_by_eos_token() {
        let a = RuleAnnotator::new();
        let eos: HashSet<String> = ["<EOS>".to_string(), ".".to_string()].into();
        let out = filter_gen_seq(&a, "he ran . then more", &FilterMode::EosTokens(eos.clone())).unwrap();
        assert_eq!(out, "he ran .");
        let out = filter_gen_seq(&a, "no end here", &FilterMode::EosTokens(eos)).unwrap();
        assert_eq!(out, "no end here");
    }
}
