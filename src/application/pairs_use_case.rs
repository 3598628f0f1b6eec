// ============================================================
// Layer 2 — Pairs Use Case
// ============================================================
// Samples (unit, following unit) training pairs from a corpus:
//
//   Step 1: Load stories               (Layer 4 - data)
//   Step 2: Segment + pair in parallel (Layer 4 - data)
//   Step 3: Reorder the batch          (Layer 4 - data)
//
// With an optional transformer the units are encoded to lexicon
// indices before pairing, so the length limit counts encoded
// tokens rather than the annotator's raw tokens.

use anyhow::Result;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::application::build_use_case::AnnotatorConfig;
use crate::data::{
    loader::CorpusLoader,
    pairs::{apply_order, get_adj_sent_pairs, Pair, PairConfig, PairOrder, PairSource, PairUnit},
    tokenizer::{segment, SegmentMode},
};
use crate::domain::traits::{Annotator, DocumentSource};
use crate::infra::transformer_store::TransformerStore;
use crate::ml::lexicon::SequenceTransformer;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairsConfig {
    pub corpus_path:     PathBuf,
    /// Encode units with this transformer before pairing
    pub model_dir:       Option<PathBuf>,
    pub clauses:         bool,
    pub max_distance:    usize,
    pub reverse:         bool,
    pub max_sent_length: usize,
    pub randomize:       bool,
    pub seed:            u64,
    pub annotator:       AnnotatorConfig,
}

impl Default for PairsConfig {
    fn default() -> Self {
        let pair = PairConfig::default();
        Self {
            corpus_path:     PathBuf::from("data/stories"),
            model_dir:       None,
            clauses:         false,
            max_distance:    pair.max_distance,
            reverse:         pair.reverse,
            max_sent_length: pair.max_sent_length,
            randomize:       false,
            seed:            0,
            annotator:       AnnotatorConfig::default(),
        }
    }
}

impl PairsConfig {
    fn pair_config(&self) -> PairConfig {
        PairConfig {
            mode:            if self.clauses { SegmentMode::Clauses } else { SegmentMode::Sentences },
            max_distance:    self.max_distance,
            reverse:         self.reverse,
            max_sent_length: self.max_sent_length,
        }
    }
}

pub struct PairsUseCase {
    config: PairsConfig,
}

impl PairsUseCase {
    pub fn new(config: PairsConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<Vec<Pair>> {
        let cfg = &self.config;
        let annotator = cfg.annotator.build()?;
        let pair_config = cfg.pair_config();

        // ── Step 1: Stories ──────────────────────────────────────────────────
        let docs = CorpusLoader::new(&cfg.corpus_path).load_all()?;

        // ── Step 2: Pair ─────────────────────────────────────────────────────
        let sources: Vec<PairSource> = match &cfg.model_dir {
            Some(dir) => {
                let transformer = TransformerStore::new(dir).load(None, None)?;
                docs.iter()
                    .map(|doc| encode_units(&annotator, &transformer, &doc.text, pair_config.mode))
                    .collect::<Result<_>>()?
            }
            None => docs.into_iter().map(|doc| PairSource::Raw(doc.text)).collect(),
        };
        let pairs = get_adj_sent_pairs(&annotator, &sources, &pair_config)?;

        // ── Step 3: Order ────────────────────────────────────────────────────
        let order = if cfg.randomize { PairOrder::Randomize } else { PairOrder::Keep };
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        Ok(apply_order(pairs, order, &mut rng))
    }
}

/// Segment a story and encode every unit to lexicon indices.
fn encode_units(
    annotator: &dyn Annotator,
    transformer: &SequenceTransformer,
    text: &str,
    mode: SegmentMode,
) -> Result<PairSource> {
    let units = segment(annotator, text, mode)?
        .iter()
        .map(|unit| -> Result<PairUnit> {
            let tokens = transformer.text_to_tokens(annotator, unit)?;
            Ok(PairUnit::Nums(transformer.tok_seq_to_nums(&tokens)?))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(PairSource::Segmented(units))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::build_use_case::{BuildConfig, BuildUseCase};
    use std::fs;
    use tempfile::tempdir;

    fn corpus(dir: &std::path::Path) -> PathBuf {
        let path = dir.join("stories.txt");
        fs::write(&path, "A cat sat. The dog ran. A bird sang.\n\nOne more. And done.\n").unwrap();
        path
    }

    #[test]
    fn test_text_pairs_across_stories() {
        let dir = tempdir().unwrap();
        let config = PairsConfig { corpus_path: corpus(dir.path()), ..PairsConfig::default() };
        let pairs = PairsUseCase::new(config).execute().unwrap();
        assert_eq!(pairs.len(), 3);
        assert_eq!(
            pairs[0],
            (PairUnit::Text("A cat sat.".to_string()), PairUnit::Text("The dog ran.".to_string()))
        );
    }

    #[test]
    fn test_distance_and_reverse() {
        let dir = tempdir().unwrap();
        let config = PairsConfig {
            corpus_path: corpus(dir.path()),
            max_distance: 2,
            reverse: true,
            ..PairsConfig::default()
        };
        let pairs = PairsUseCase::new(config).execute().unwrap();
        assert_eq!(pairs.len(), 4);
        assert_eq!(pairs[0].0, PairUnit::Text("The dog ran.".to_string()));
    }

    #[test]
    fn test_encoded_pairs_use_lexicon_indices() {
        let dir = tempdir().unwrap();
        let corpus_path = corpus(dir.path());
        let model_dir = dir.path().join("model");
        BuildUseCase::new(BuildConfig {
            corpus_path: corpus_path.clone(),
            output_dir: model_dir.clone(),
            ..BuildConfig::default()
        })
        .execute()
        .unwrap();

        let config = PairsConfig { corpus_path, model_dir: Some(model_dir), ..PairsConfig::default() };
        let pairs = PairsUseCase::new(config).execute().unwrap();
        assert_eq!(pairs.len(), 3);
        assert!(matches!(&pairs[0].0, PairUnit::Nums(n) if n.len() == 4));
    }

    #[test]
    fn test_randomized_pairs_are_reproducible() {
        let dir = tempdir().unwrap();
        let config = PairsConfig {
            corpus_path: corpus(dir.path()),
            randomize: true,
            seed: 7,
            ..PairsConfig::default()
        };
        let first = PairsUseCase::new(config.clone()).execute().unwrap();
        let second = PairsUseCase::new(config).execute().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }
}
