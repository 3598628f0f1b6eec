// ============================================================
// Layer 4 — Entity Anonymizer
// ============================================================
// Replaces named entities with typed, numbered placeholders so
// the lexicon does not have to learn every character name:
//
//   "Bob Smith met Alice. Bob waved."
//   → "ENT_PERSON_0 met ENT_PERSON_1 . ENT_PERSON_0 waved ."
//
// Numbering (number_ents):
//   1. Rank entities by (count, surface, label), highest first
//   2. An entity sharing its label AND its first or last raw
//      token with an already-numbered entity reuses that
//      placeholder ("Bob" co-refers with "Bob Smith")
//   3. Otherwise it takes the next ordinal of its kind
//
// Re-instantiation (adapt_tok_seq_ents) goes the other way for
// generated sequences:
//   (a) exact placeholder match in the caller's entity map
//   (b) any remaining caller entity whose kind contains the
//       placeholder's kind
//   (c) weighted draw from corpus entity frequencies
//   (d) the unknown word
// Caller entities are consumed at most once across (a) and (b).

use std::collections::{BTreeMap, HashMap, HashSet};

use anyhow::Result;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::tokenizer::{tokenize, TokenizeOptions};
use crate::domain::entity::{EntityLabel, Gender, Placeholder};
use crate::domain::token::{ENT_PREFIX, JOIN_CHAR};
use crate::domain::traits::Annotator;

/// Entity surface string → value
pub type EntityMap<V> = BTreeMap<String, V>;

/// Entity label → (surface → probability)
pub type EntityProbs = BTreeMap<String, BTreeMap<String, f64>>;

/// Entity kinds anonymized unless configured otherwise
pub const DEFAULT_ENT_TYPES: [&str; 4] = ["PERSON", "NORP", "ORG", "GPE"];

/// How many of the most frequent entities per label are kept for sampling
pub const SAMPLE_LIMIT: usize = 5000;

const PERSON: &str = "PERSON";

// ─── Gender name lists ────────────────────────────────────────────────────────
/// First-name lists used to tag PERSON entities with a gender.
#[derive(Debug, Clone, Default)]
pub struct GenderNames {
    female: HashSet<String>,
    male:   HashSet<String>,
}

impl GenderNames {
    pub fn new<I, J, S>(female: I, male: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            female: female.into_iter().map(Into::into).collect(),
            male:   male.into_iter().map(Into::into).collect(),
        }
    }

    /// Gender of an entity's first whitespace token, only when exactly
    /// one list contains it.
    pub fn detect(&self, entity: &str) -> Option<Gender> {
        let first = entity.split_whitespace().next()?;
        match (self.female.contains(first), self.male.contains(first)) {
            (true, false) => Some(Gender::Female),
            (false, true) => Some(Gender::Male),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.female.len() + self.male.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ─── Frequency table ──────────────────────────────────────────────────────────
/// Corpus-cumulative entity frequencies, keyed by rendered label
/// (`PERSON`, `PERSON_FEMALE`, …).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityFrequencies {
    by_label: BTreeMap<String, BTreeMap<String, usize>>,
}

impl EntityFrequencies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one document's entities: +1 per distinct entity.
    pub fn record(&mut self, ents: &EntityMap<EntityLabel>) {
        for (surface, label) in ents {
            *self
                .by_label
                .entry(label.to_string())
                .or_default()
                .entry(surface.clone())
                .or_insert(0) += 1;
        }
    }

    pub fn get(&self, label: &str) -> Option<&BTreeMap<String, usize>> {
        self.by_label.get(label)
    }

    pub fn num_labels(&self) -> usize {
        self.by_label.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_label.is_empty()
    }

    /// Keep, per label, entities at least as frequent as the `limit`-th
    /// most frequent one. Labels with fewer entities are kept whole.
    pub fn filtered(&self, limit: usize) -> Self {
        let by_label = self
            .by_label
            .iter()
            .map(|(label, counts)| {
                let mut values: Vec<usize> = counts.values().copied().collect();
                values.sort_unstable();
                let threshold = values
                    .get(values.len().saturating_sub(limit.max(1)))
                    .copied()
                    .unwrap_or(0);
                let kept = counts
                    .iter()
                    .filter(|&(_, &c)| c >= threshold)
                    .map(|(e, &c)| (e.clone(), c))
                    .collect();
                (label.clone(), kept)
            })
            .collect();
        Self { by_label }
    }

    /// Normalise each label's counts into probabilities.
    pub fn to_probs(&self) -> EntityProbs {
        ent_counts_to_probs(&self.by_label)
    }
}

/// Per-label count table → per-label probability table.
pub fn ent_counts_to_probs(counts: &BTreeMap<String, BTreeMap<String, usize>>) -> EntityProbs {
    counts
        .iter()
        .map(|(label, ents)| {
            let total: usize = ents.values().sum();
            let probs = ents
                .iter()
                .map(|(e, &c)| (e.clone(), if total == 0 { 0.0 } else { c as f64 / total as f64 }))
                .collect();
            (label.clone(), probs)
        })
        .collect()
}

// ─── Anonymizer ───────────────────────────────────────────────────────────────
/// First and last raw token of an entity surface.
type EdgeTokens = (Option<String>, Option<String>);

/// Detects, numbers and substitutes named entities.
#[derive(Debug, Clone)]
pub struct EntityAnonymizer {
    include_types: HashSet<String>,
    genders:       Option<GenderNames>,
}

impl Default for EntityAnonymizer {
    fn default() -> Self {
        Self {
            include_types: DEFAULT_ENT_TYPES.iter().map(|s| s.to_string()).collect(),
            genders:       None,
        }
    }
}

impl EntityAnonymizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_include_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Enable gender tagging of PERSON entities.
    pub fn with_genders(mut self, genders: Option<GenderNames>) -> Self {
        self.genders = genders;
        self
    }

    pub fn recognizes_gender(&self) -> bool {
        self.genders.is_some()
    }

    /// Entities of allowed types with their labels and occurrence counts.
    pub fn get_ents(
        &self,
        annotator: &dyn Annotator,
        text: &str,
    ) -> Result<(EntityMap<EntityLabel>, EntityMap<usize>)> {
        let annotation = annotator.annotate(text)?;
        annotation.validate_entities()?;
        let mut ents = EntityMap::new();
        let mut counts = EntityMap::new();

        for span in &annotation.entities {
            if !self.include_types.contains(&span.label) {
                continue;
            }
            let surface = annotation.entity_text(span);
            if surface.is_empty() {
                continue;
            }
            let gender = match &self.genders {
                Some(names) if span.label == PERSON => names.detect(&surface),
                _ => None,
            };
            ents.insert(surface.clone(), EntityLabel::new(span.label.clone()).with_gender(gender));
            *counts.entry(surface).or_insert(0) += 1;
        }
        Ok((ents, counts))
    }

    fn edge_tokens(annotator: &dyn Annotator, surface: &str) -> Result<EdgeTokens> {
        let tokens = tokenize(annotator, surface, &TokenizeOptions::raw())?;
        Ok((tokens.first().cloned(), tokens.last().cloned()))
    }

    /// Assign a placeholder to every detected entity.
    pub fn number_ents(
        &self,
        annotator: &dyn Annotator,
        ents: &EntityMap<EntityLabel>,
        counts: &EntityMap<usize>,
    ) -> Result<EntityMap<Placeholder>> {
        let mut ranked: Vec<(usize, &String, &EntityLabel)> = counts
            .iter()
            .filter_map(|(surface, &count)| ents.get(surface).map(|label| (count, surface, label)))
            .collect();
        ranked.sort();
        ranked.reverse();

        let mut numbered: Vec<(&EntityLabel, EdgeTokens, Placeholder)> = Vec::new();
        let mut next_ordinal: HashMap<&str, usize> = HashMap::new();
        let mut result = EntityMap::new();

        for (_, surface, label) in ranked {
            let (first, last) = Self::edge_tokens(annotator, surface)?;
            let shares_edge = |edges: &EdgeTokens| {
                (first.is_some() && edges.0 == first) || (last.is_some() && edges.1 == last)
            };

            let placeholder = match numbered
                .iter()
                .find(|(other, edges, _)| *other == label && shares_edge(edges))
            {
                Some((_, _, placeholder)) => placeholder.clone(),
                None => {
                    let ordinal = next_ordinal.entry(label.kind.as_str()).or_insert(0);
                    let placeholder = Placeholder::new(label, *ordinal);
                    *ordinal += 1;
                    placeholder
                }
            };

            numbered.push((label, (first, last), placeholder.clone()));
            result.insert(surface.clone(), placeholder);
        }
        Ok(result)
    }

    /// Anonymize one text; returns the rewritten text and the mapping used.
    pub fn replace_ents_in_seq(
        &self,
        annotator: &dyn Annotator,
        text: &str,
    ) -> Result<(String, EntityMap<Placeholder>)> {
        let (ents, counts) = self.get_ents(annotator, text)?;
        let numbered = self.number_ents(annotator, &ents, &counts)?;

        let options = TokenizeOptions::raw().with_entities(true);
        let replaced = tokenize(annotator, text, &options)?
            .into_iter()
            .map(|token| match numbered.get(&token) {
                Some(placeholder) => placeholder.token(),
                None => token,
            })
            .collect::<Vec<_>>()
            .join(" ");

        debug!(entities = numbered.len(), "replaced entities");
        Ok((replaced, numbered))
    }
}

// ─── Re-instantiation ─────────────────────────────────────────────────────────
/// Kind used for loose matching: the parsed placeholder kind, or the
/// first `_` segment of an unparseable id.
fn loose_kind(id: &str) -> String {
    match Placeholder::parse(id) {
        Some(p) => p.kind,
        None => id.split(JOIN_CHAR).next().unwrap_or(id).to_string(),
    }
}

/// Frequency-table keys to try for an id, most specific first.
fn sample_keys(id: &str) -> Vec<String> {
    match Placeholder::parse(id) {
        Some(p) if p.gender.is_some() => vec![p.label().to_string(), p.kind],
        Some(p) => vec![p.kind],
        None => vec![loose_kind(id)],
    }
}

fn draw<R: Rng + ?Sized>(probs: &BTreeMap<String, f64>, rng: &mut R) -> Option<String> {
    let (ents, weights): (Vec<&String>, Vec<f64>) = probs.iter().map(|(e, &p)| (e, p)).unzip();
    let dist = WeightedIndex::new(&weights).ok()?;
    Some(ents[dist.sample(rng)].clone())
}

/// Replace the placeholders in a generated token sequence with real
/// entity strings.
///
/// `ents` maps surface → placeholder, as returned by
/// [`EntityAnonymizer::replace_ents_in_seq`]. When several surfaces
/// share a placeholder the longest one is used.
pub fn adapt_tok_seq_ents<R: Rng + ?Sized>(
    seq: &[String],
    ents: &EntityMap<Placeholder>,
    sub_ent_probs: &EntityProbs,
    rng: &mut R,
    unk_word: &str,
) -> Vec<String> {
    // Distinct placeholder ids in order of first appearance
    let mut ids: Vec<&str> = Vec::new();
    for token in seq {
        if let Some(id) = token.strip_prefix(ENT_PREFIX) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    if ids.is_empty() {
        return seq.to_vec();
    }

    // placeholder id → surface (longest surface wins on shared ids)
    let mut available: Vec<(String, String)> = Vec::new();
    for (surface, placeholder) in ents {
        let id = placeholder.to_string();
        match available.iter_mut().find(|(other, _)| *other == id) {
            Some(entry) if surface.len() > entry.1.len() => entry.1 = surface.clone(),
            Some(_) => {}
            None => available.push((id, surface.clone())),
        }
    }

    let mut resolved: HashMap<&str, String> = HashMap::new();

    // ── Step (a): exact id ──
    for &id in &ids {
        if let Some(pos) = available.iter().position(|(other, _)| other == id) {
            let (_, surface) = available.remove(pos);
            resolved.insert(id, surface);
        }
    }

    // ── Step (b): same kind ──
    for &id in &ids {
        if resolved.contains_key(id) {
            continue;
        }
        let kind = loose_kind(id);
        if let Some(pos) = available.iter().position(|(other, _)| loose_kind(other).contains(&kind)) {
            let (_, surface) = available.remove(pos);
            resolved.insert(id, surface);
        }
    }

    // ── Step (c): corpus sample, then (d) unknown ──
    for &id in &ids {
        if resolved.contains_key(id) {
            continue;
        }
        let sampled = sample_keys(id)
            .iter()
            .find_map(|key| sub_ent_probs.get(key).and_then(|probs| draw(probs, rng)));
        resolved.insert(id, sampled.unwrap_or_else(|| unk_word.to_string()));
    }

    seq.iter()
        .map(|token| {
            token
                .strip_prefix(ENT_PREFIX)
                .and_then(|id| resolved.get(id))
                .cloned()
                .unwrap_or_else(|| token.clone())
        })
        .collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::annotator::RuleAnnotator;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn annotator() -> RuleAnnotator {
        RuleAnnotator::new().with_gazetteer([
            ("Bob Smith", "PERSON"),
            ("Bob", "PERSON"),
            ("Alice", "PERSON"),
            ("Paris", "GPE"),
            ("Monday", "DATE"),
        ])
    }

    fn toks(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_get_ents_counts_and_filters_types() {
        let a = annotator();
        let anon = EntityAnonymizer::new();
        let (ents, counts) = anon
            .get_ents(&a, "Bob Smith met Alice in Paris on Monday. Bob Smith left.")
            .unwrap();
        assert_eq!(counts["Bob Smith"], 2);
        assert_eq!(counts["Alice"], 1);
        assert_eq!(ents["Paris"], EntityLabel::new("GPE"));
        assert!(!ents.contains_key("Monday"));
    }

    #[test]
    fn test_gender_requires_exactly_one_list() {
        let a = annotator();
        let names = GenderNames::new(vec!["Alice", "Bob"], vec!["Bob"]);
        let anon = EntityAnonymizer::new().with_genders(Some(names));
        let (ents, _) = anon.get_ents(&a, "Alice met Bob Smith.").unwrap();
        assert_eq!(ents["Alice"].to_string(), "PERSON_FEMALE");
        assert_eq!(ents["Bob Smith"].to_string(), "PERSON");
    }

    #[test]
    fn test_coreferring_entities_share_placeholder() {
        let a = annotator();
        let anon = EntityAnonymizer::new();
        let (ents, counts) = anon.get_ents(&a, "Bob Smith met Alice. Bob Smith and Bob left.").unwrap();
        let numbered = anon.number_ents(&a, &ents, &counts).unwrap();
        assert_eq!(numbered["Bob Smith"].to_string(), "PERSON_0");
        assert_eq!(numbered["Bob"], numbered["Bob Smith"]);
        assert_eq!(numbered["Alice"].to_string(), "PERSON_1");
    }

    #[test]
    fn test_shared_last_token_corefers() {
        let a = annotator();
        let anon = EntityAnonymizer::new();
        let person = EntityLabel::new("PERSON");
        let ents: EntityMap<EntityLabel> =
            [("Bob Smith".to_string(), person.clone()), ("Smith".to_string(), person)].into();
        let counts: EntityMap<usize> = [("Bob Smith".to_string(), 2), ("Smith".to_string(), 1)].into();
        let numbered = anon.number_ents(&a, &ents, &counts).unwrap();
        assert_eq!(numbered["Bob Smith"].to_string(), "PERSON_0");
        assert_eq!(numbered["Smith"], numbered["Bob Smith"]);
    }

    #[test]
    fn test_equal_counts_ranked_by_surface_descending() {
        let a = annotator();
        let anon = EntityAnonymizer::new();
        let person = EntityLabel::new("PERSON");
        let ents: EntityMap<EntityLabel> =
            [("Alice".to_string(), person.clone()), ("Carol".to_string(), person)].into();
        let counts: EntityMap<usize> = [("Alice".to_string(), 1), ("Carol".to_string(), 1)].into();
        let numbered = anon.number_ents(&a, &ents, &counts).unwrap();
        assert_eq!(numbered["Carol"].to_string(), "PERSON_0");
        assert_eq!(numbered["Alice"].to_string(), "PERSON_1");
    }

    #[test]
    fn test_get_ents_rejects_span_past_tokens() {
        use crate::data::annotator::ScriptedAnnotator;
        use crate::domain::error::PipelineError;
        use crate::domain::token::{AnnotatedToken, Annotation, EntitySpan};

        let mut ann = Annotation::new(vec![AnnotatedToken::new("Hi"), AnnotatedToken::new("there")]);
        ann.entities.push(EntitySpan { start: 5, end: 7, label: "PERSON".to_string() });
        let a = ScriptedAnnotator::new(RuleAnnotator::new()).with_annotation("Hi there", ann);

        let err = EntityAnonymizer::new().get_ents(&a, "Hi there").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::AnnotatorContract(_))
        ));
    }

    #[test]
    fn test_ordinals_are_per_kind() {
        let a = annotator();
        let anon = EntityAnonymizer::new();
        let (ents, counts) = anon.get_ents(&a, "Alice saw Paris.").unwrap();
        let numbered = anon.number_ents(&a, &ents, &counts).unwrap();
        assert_eq!(numbered["Alice"].to_string(), "PERSON_0");
        assert_eq!(numbered["Paris"].to_string(), "GPE_0");
    }

    #[test]
    fn test_replace_ents_in_seq() {
        let a = annotator();
        let anon = EntityAnonymizer::new();
        let (text, mapping) = anon.replace_ents_in_seq(&a, "Bob Smith met Alice. Bob waved.").unwrap();
        assert_eq!(text, "ENT_PERSON_0 met ENT_PERSON_1 . ENT_PERSON_0 waved .");
        assert_eq!(mapping.len(), 3);
    }

    #[test]
    fn test_adapt_resolution_order() {
        let mut rng = StdRng::seed_from_u64(7);
        let label = EntityLabel::new("PERSON");
        let mut ents = EntityMap::new();
        ents.insert("Tom".to_string(), Placeholder::new(&label, 0));
        ents.insert("Ann".to_string(), Placeholder::new(&label, 5));

        let mut probs = EntityProbs::new();
        probs.insert("GPE".to_string(), BTreeMap::from([("Paris".to_string(), 1.0)]));

        let seq = toks(&["ENT_PERSON_0", "saw", "ENT_PERSON_1", "in", "ENT_GPE_0", "at", "ENT_ORG_0", "ENT_PERSON_0"]);
        let adapted = adapt_tok_seq_ents(&seq, &ents, &probs, &mut rng, "<UNK>");
        assert_eq!(adapted, toks(&["Tom", "saw", "Ann", "in", "Paris", "at", "<UNK>", "Tom"]));
    }

    #[test]
    fn test_adapt_prefers_gendered_sample() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut probs = EntityProbs::new();
        probs.insert("PERSON_FEMALE".to_string(), BTreeMap::from([("Mary".to_string(), 1.0)]));
        probs.insert("PERSON".to_string(), BTreeMap::from([("Sam".to_string(), 1.0)]));
        let adapted = adapt_tok_seq_ents(
            &toks(&["ENT_PERSON_0_FEMALE", "ENT_PERSON_1"]),
            &EntityMap::new(),
            &probs,
            &mut rng,
            "<UNK>",
        );
        assert_eq!(adapted, toks(&["Mary", "Sam"]));
    }

    #[test]
    fn test_adapt_without_placeholders_is_identity() {
        let mut rng = StdRng::seed_from_u64(0);
        let seq = toks(&["a", "b"]);
        assert_eq!(adapt_tok_seq_ents(&seq, &EntityMap::new(), &EntityProbs::new(), &mut rng, "<UNK>"), seq);
    }

    #[test]
    fn test_frequencies_are_document_frequencies() {
        let label = EntityLabel::new("PERSON");
        let mut freqs = EntityFrequencies::new();
        let doc = EntityMap::from([("Bob".to_string(), label.clone())]);
        freqs.record(&doc);
        freqs.record(&doc);
        assert_eq!(freqs.get("PERSON").unwrap()["Bob"], 2);
    }

    #[test]
    fn test_filtered_keeps_top_entities() {
        let label = EntityLabel::new("ORG");
        let mut freqs = EntityFrequencies::new();
        for (name, n) in [("a", 5), ("b", 3), ("c", 3), ("d", 1)] {
            for _ in 0..n {
                freqs.record(&EntityMap::from([(name.to_string(), label.clone())]));
            }
        }
        let filtered = freqs.filtered(2);
        let kept: Vec<&String> = filtered.get("ORG").unwrap().keys().collect();
        assert_eq!(kept, vec!["a", "b", "c"]);
        // Fewer entities than the limit: nothing dropped
        assert_eq!(freqs.filtered(SAMPLE_LIMIT), freqs);
    }

    #[test]
    fn test_to_probs_normalises() {
        let mut counts = BTreeMap::new();
        counts.insert("GPE".to_string(), BTreeMap::from([("x".to_string(), 1), ("y".to_string(), 3)]));
        let probs = ent_counts_to_probs(&counts);
        assert!((probs["GPE"]["y"] - 0.75).abs() < 1e-9);
    }
}
