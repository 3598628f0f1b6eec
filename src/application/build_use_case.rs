// ============================================================
// Layer 2 — BuildUseCase
// ============================================================
// Builds and persists a SequenceTransformer from a corpus:
//
//   Step 1: Assemble the annotator          (Layer 6 - infra)
//   Step 2: Load stories                    (Layer 4 - data)
//   Step 3: Load gender lists and phrases   (Layer 6 - infra)
//   Step 4: Attach stored word embeddings   (Layer 6 - infra)
//   Step 5: Build lexicon + statistics      (Layer 5 - ml)
//   Step 6: Save the transformer            (Layer 6 - infra)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, sync::Arc};

use crate::data::{annotator::ScriptedAnnotator, loader::CorpusLoader};
use crate::domain::traits::DocumentSource;
use crate::infra::{
    annotator_store::build_annotator,
    embedding_store::WordEmbeddings,
    names_store::{load_gender_names, load_word_list},
    transformer_store::TransformerStore,
};
use crate::ml::lexicon::{SequenceTransformer, TransformerConfig};

// ─── Annotator Resources ─────────────────────────────────────────────────────
/// Optional files that configure the in-crate annotator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnnotatorConfig {
    pub gazetteer:   Option<PathBuf>,
    pub annotations: Option<PathBuf>,
}

impl AnnotatorConfig {
    pub fn build(&self) -> Result<ScriptedAnnotator> {
        build_annotator(self.gazetteer.as_deref(), self.annotations.as_deref())
    }
}

/// Load a memory-mapped embedding table when a directory is given.
pub fn load_embeddings(dir: Option<&PathBuf>) -> Result<Option<Arc<WordEmbeddings>>> {
    dir.map(|d| WordEmbeddings::load(d).map(Arc::new)).transpose()
}

// ─── Build Configuration ─────────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// A story file or a directory of `.txt` / `.docx` stories
    pub corpus_path:    PathBuf,
    /// Where `transformer.json` is written
    pub output_dir:     PathBuf,
    /// Directory with `female_names.txt` / `male_names.txt`
    pub names_dir:      Option<PathBuf>,
    /// One phrase per line, words joined by `_`
    pub phrases_file:   Option<PathBuf>,
    pub embeddings_dir: Option<PathBuf>,
    pub annotator:      AnnotatorConfig,
    pub transformer:    TransformerConfig,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            corpus_path:    PathBuf::from("data/stories"),
            output_dir:     PathBuf::from("artifacts"),
            names_dir:      None,
            phrases_file:   None,
            embeddings_dir: None,
            annotator:      AnnotatorConfig::default(),
            transformer:    TransformerConfig::default(),
        }
    }
}

/// Summary returned to the CLI once the build is saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub stories:       usize,
    pub lexicon_size:  usize,
    pub entity_labels: usize,
}

// ─── BuildUseCase ─────────────────────────────────────────────────────────────
pub struct BuildUseCase {
    config: BuildConfig,
}

impl BuildUseCase {
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<BuildReport> {
        let cfg = &self.config;

        // ── Step 1: Annotator ────────────────────────────────────────────────
        let annotator = cfg.annotator.build()?;

        // ── Step 2: Corpus ───────────────────────────────────────────────────
        let stories: Vec<String> = CorpusLoader::new(&cfg.corpus_path)
            .load_all()?
            .into_iter()
            .map(|doc| doc.text)
            .collect();
        tracing::info!("Building lexicon from {} stories", stories.len());

        // ── Step 3: Gender lists and phrases ─────────────────────────────────
        let genders = match (&cfg.names_dir, cfg.transformer.recognize_gender) {
            (Some(dir), true) => load_gender_names(dir)?,
            (None, true) => {
                tracing::warn!("--recognize-gender set without a names directory");
                None
            }
            _ => None,
        };

        let mut transformer = SequenceTransformer::new(cfg.transformer.clone()).with_genders(genders);
        if let Some(path) = &cfg.phrases_file {
            let phrases = load_word_list(path)
                .with_context(|| format!("Cannot load phrases from '{}'", path.display()))?;
            tracing::info!("Loaded {} candidate phrases", phrases.len());
            transformer = transformer.with_phrases(phrases);
        }

        // ── Step 4: Stored embeddings ────────────────────────────────────────
        transformer.set_word_embeddings(load_embeddings(cfg.embeddings_dir.as_ref())?);

        // ── Step 5: Lexicon ──────────────────────────────────────────────────
        transformer.make_lexicon(&annotator, &stories)?;

        // ── Step 6: Save ─────────────────────────────────────────────────────
        TransformerStore::new(&cfg.output_dir).save(&transformer)?;

        Ok(BuildReport {
            stories:       stories.len(),
            lexicon_size:  transformer.lexicon_size().unwrap_or(0),
            entity_labels: transformer.ent_counts().num_labels(),
        })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_build_writes_loadable_transformer() {
        let dir = tempdir().unwrap();
        let corpus = dir.path().join("stories.txt");
        fs::write(&corpus, "Tom went home. He slept.\n\nTom ate ice cream.\n").unwrap();
        let gazetteer = dir.path().join("gazetteer.tsv");
        fs::write(&gazetteer, "Tom\tPERSON\n").unwrap();
        let phrases = dir.path().join("phrases.txt");
        fs::write(&phrases, "ice_cream\n").unwrap();

        let config = BuildConfig {
            corpus_path:  corpus,
            output_dir:   dir.path().join("out"),
            phrases_file: Some(phrases),
            annotator:    AnnotatorConfig { gazetteer: Some(gazetteer), annotations: None },
            transformer:  TransformerConfig { generalize_ents: true, ..TransformerConfig::default() },
            ..BuildConfig::default()
        };
        let report = BuildUseCase::new(config.clone()).execute().unwrap();
        assert_eq!(report.stories, 2);
        assert_eq!(report.entity_labels, 1);

        let loaded = TransformerStore::new(&config.output_dir).load(None, None).unwrap();
        assert_eq!(loaded.lexicon_size(), Some(report.lexicon_size));
        let lexicon = loaded.lexicon().unwrap();
        assert!(lexicon.contains("ENT_PERSON_0"));
        assert!(lexicon.contains("ice_cream"));
        assert!(!lexicon.contains("Tom"));
    }

    #[test]
    fn test_missing_corpus_builds_empty_lexicon() {
        let dir = tempdir().unwrap();
        let config = BuildConfig {
            corpus_path: dir.path().join("nowhere"),
            output_dir:  dir.path().join("out"),
            ..BuildConfig::default()
        };
        let report = BuildUseCase::new(config).execute().unwrap();
        assert_eq!(report.stories, 0);
        assert_eq!(report.entity_labels, 0);
    }
}
