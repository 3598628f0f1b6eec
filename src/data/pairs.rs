// ============================================================
// Layer 4 — Adjacent Pair Sampler
// ============================================================
// Builds (context, continuation) training pairs from stories.
//
// For each unit i (sentence, clause, or pre-encoded sequence)
// and each of the next `max_distance` units j:
//
//   emit (i, j)   if both lengths are in 1..=max_sent_length
//   emit (j, i)   instead when `reverse` is set
//
// Example, three sentences [s0, s1, s2]:
//   max_distance = 1 → (s0,s1) (s1,s2)
//   max_distance = 2 → (s0,s1) (s0,s2) (s1,s2)
//
// get_adj_sent_pairs() fans one task per story out over the
// rayon pool. Output is concatenated in input order; a single
// failing story fails the batch.

use anyhow::Result;
use rand::seq::SliceRandom;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::data::tokenizer::{segment, tokenize, SegmentMode, TokenizeOptions};
use crate::domain::traits::Annotator;

// ─── Types ────────────────────────────────────────────────────────────────────
/// One side of a pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PairUnit {
    Text(String),
    Nums(Vec<u32>),
}

/// A story, either raw or already split into units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairSource {
    Raw(String),
    Segmented(Vec<PairUnit>),
}

pub type Pair = (PairUnit, PairUnit);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairConfig {
    /// Used only for `PairSource::Raw`
    pub mode:            SegmentMode,
    pub max_distance:    usize,
    pub reverse:         bool,
    pub max_sent_length: usize,
}

impl Default for PairConfig {
    fn default() -> Self {
        Self {
            mode:            SegmentMode::Sentences,
            max_distance:    1,
            reverse:         false,
            max_sent_length: 25,
        }
    }
}

/// Post-processing applied to a sampled batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PairOrder {
    #[default]
    Keep,
    Reverse,
    Randomize,
}

// ─── Sampling ─────────────────────────────────────────────────────────────────
fn unit_len(annotator: &dyn Annotator, unit: &PairUnit) -> Result<usize> {
    Ok(match unit {
        PairUnit::Text(text) => tokenize(annotator, text, &TokenizeOptions::default())?.len(),
        PairUnit::Nums(nums) => nums.len(),
    })
}

/// Adjacent pairs within one story.
pub fn get_adj_pair(annotator: &dyn Annotator, source: &PairSource, config: &PairConfig) -> Result<Vec<Pair>> {
    let units: Vec<PairUnit> = match source {
        PairSource::Raw(text) => segment(annotator, text, config.mode)?
            .into_iter()
            .map(PairUnit::Text)
            .collect(),
        PairSource::Segmented(units) => units.clone(),
    };

    let lens = units
        .iter()
        .map(|u| unit_len(annotator, u))
        .collect::<Result<Vec<_>>>()?;
    let fits = |len: usize| len > 0 && len <= config.max_sent_length;

    let mut pairs = Vec::new();
    for i in 0..units.len().saturating_sub(1) {
        if !fits(lens[i]) {
            continue;
        }
        for offset in 1..=config.max_distance {
            let j = i + offset;
            if j >= units.len() {
                break;
            }
            if !fits(lens[j]) {
                continue;
            }
            if config.reverse {
                pairs.push((units[j].clone(), units[i].clone()));
            } else {
                pairs.push((units[i].clone(), units[j].clone()));
            }
        }
    }
    Ok(pairs)
}

/// Adjacent pairs for a batch of stories, sampled in parallel.
pub fn get_adj_sent_pairs(
    annotator: &dyn Annotator,
    sources: &[PairSource],
    config: &PairConfig,
) -> Result<Vec<Pair>> {
    let per_source = sources
        .par_iter()
        .map(|source| get_adj_pair(annotator, source, config))
        .collect::<Result<Vec<_>>>()?;

    let pairs: Vec<Pair> = per_source.into_iter().flatten().collect();
    info!(sources = sources.len(), pairs = pairs.len(), "sampled adjacent pairs");
    Ok(pairs)
}

/// Every (word from `seq1`, word from `seq2`) combination, in
/// row-major order over `seq1`.
pub fn get_word_pairs<T: Clone>(seq1: &[T], seq2: &[T]) -> Vec<(T, T)> {
    seq1.iter()
        .flat_map(|a| seq2.iter().map(move |b| (a.clone(), b.clone())))
        .collect()
}

// ─── Reordering ───────────────────────────────────────────────────────────────
pub fn reverse_pairs(pairs: Vec<Pair>) -> Vec<Pair> {
    pairs.into_iter().map(|(a, b)| (b, a)).collect()
}

/// Shuffle every unit of the batch and pair them up again,
/// producing negative (non-adjacent) examples.
pub fn randomize_pairs<R: Rng + ?Sized>(pairs: Vec<Pair>, rng: &mut R) -> Vec<Pair> {
    let units: Vec<PairUnit> = pairs.into_iter().flat_map(|(a, b)| [a, b]).collect();
    let mut order: Vec<usize> = (0..units.len()).collect();
    order.shuffle(rng);

    order
        .chunks_exact(2)
        .map(|idx| (units[idx[0]].clone(), units[idx[1]].clone()))
        .collect()
}

pub fn apply_order<R: Rng + ?Sized>(pairs: Vec<Pair>, order: PairOrder, rng: &mut R) -> Vec<Pair> {
    match order {
        PairOrder::Keep => pairs,
        PairOrder::Reverse => reverse_pairs(pairs),
        PairOrder::Randomize => randomize_pairs(pairs, rng),
    }
}
