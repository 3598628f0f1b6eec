// ============================================================
// Layer 4 — Clause Boundary Heuristic
// ============================================================
// Splits sentences into clauses along the dependency relations
// that usually separate causally linked events:
//
//   token.dep       ∈ { advcl, conj, pcomp }
//   token.head.dep  ∈ { ccomp, conj, ROOT, xcomp }
//
// When both hold, the token's subtree span (leftmost to
// rightmost descendant) is a candidate clause.
//
// Boundary bookkeeping per sentence:
//   1. Overlap    — if the last boundary reaches past the new
//                   span's left edge, pull it back to that edge
//   2. Open       — push the left edge unless it is at most one
//                   token after the last boundary (a lone token
//                   is not worth its own clause)
//   3. Close      — push right_edge + 1
//   4. A first boundary at 1 becomes 0; 0 is inserted if missing
//   5. The sentence length closes the last clause
//   6. A clause that is a single PUNCT token is glued onto the
//      previous clause instead of standing alone
//
// Example:
//   "He left because she cried."
//    advcl(cried → left)  subtree = "because she cried"
//   → ["He left", "because she cried."]

use anyhow::Result;

use crate::domain::error::PipelineError;
use crate::domain::token::Annotation;
use crate::domain::traits::Annotator;

const CLAUSE_DEPS: [&str; 3] = ["advcl", "conj", "pcomp"];
const HEAD_DEPS: [&str; 4] = ["ccomp", "conj", "ROOT", "xcomp"];

/// Segment text into clauses, sentence by sentence.
pub fn segment_into_clauses(annotator: &dyn Annotator, text: &str) -> Result<Vec<String>> {
    let mut clauses = Vec::new();
    for sentence in annotator.segment(text)? {
        let annotation = annotator.annotate(&sentence)?;
        clauses.extend(sentence_clauses(&annotation)?);
    }
    Ok(clauses)
}

/// Leftmost and rightmost token index of every token's subtree.
fn subtree_edges(annotation: &Annotation) -> Result<Vec<(usize, usize)>> {
    let n = annotation.len();
    let mut edges: Vec<(usize, usize)> = (0..n).map(|i| (i, i)).collect();

    for descendant in 0..n {
        let mut current = descendant;
        let mut steps = 0usize;
        loop {
            let (left, right) = &mut edges[current];
            *left = (*left).min(descendant);
            *right = (*right).max(descendant);

            let head = annotation.tokens[current].head;
            if head >= n {
                return Err(PipelineError::AnnotatorContract(format!(
                    "token {current} has head {head} outside a {n}-token sentence"
                ))
                .into());
            }
            if head == current {
                break;
            }
            current = head;
            steps += 1;
            if steps > n {
                return Err(PipelineError::AnnotatorContract(
                    "dependency heads form a cycle".to_string(),
                )
                .into());
            }
        }
    }
    Ok(edges)
}

/// Candidate boundaries before the start/end normalisation.
fn raw_boundaries(annotation: &Annotation, edges: &[(usize, usize)]) -> Vec<usize> {
    let mut bounds: Vec<usize> = Vec::new();

    for (idx, token) in annotation.tokens.iter().enumerate() {
        let head_dep = annotation.tokens[token.head].dep.as_str();
        if !CLAUSE_DEPS.contains(&token.dep.as_str()) || !HEAD_DEPS.contains(&head_dep) {
            continue;
        }
        let (left, right) = edges[idx];

        if let Some(last) = bounds.last_mut() {
            if *last >= left {
                *last = left;
            }
        }
        if bounds.last().map_or(true, |&last| last + 1 < left) {
            bounds.push(left);
        }
        bounds.push(right + 1);
    }
    bounds
}

/// Clause strings for one annotated sentence.
pub fn sentence_clauses(annotation: &Annotation) -> Result<Vec<String>> {
    let n = annotation.len();
    if n == 0 {
        return Ok(Vec::new());
    }

    let edges = subtree_edges(annotation)?;
    let mut bounds = raw_boundaries(annotation, &edges);

    if bounds.first() == Some(&1) {
        bounds[0] = 0;
    }
    if bounds.first() != Some(&0) {
        bounds.insert(0, 0);
    }
    if bounds.last().map_or(true, |&last| last < n) {
        bounds.push(n);
    }

    let mut clauses: Vec<String> = Vec::new();
    for window in bounds.windows(2) {
        let (start, end) = (window[0], window[1].min(n));
        if start >= end {
            continue;
        }
        let text = annotation.span_text(start, end);
        let lone_punct = end - start == 1 && annotation.tokens[start].pos == "PUNCT";

        match clauses.last_mut() {
            Some(previous) if lone_punct => previous.push_str(&text),
            _ => clauses.push(text),
        }
    }

    Ok(clauses
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect())
}
