// ============================================================
// Layer 6 — Transformer Store
// ============================================================
// Saves and restores a built SequenceTransformer.
//
// What gets saved:
//   <dir>/transformer.json — config, lexicon + lookup, word
//                            counts, entity counts (raw and
//                            filtered), pruned phrase list
//
// What does NOT get saved:
//   - word embeddings (large, stored separately; re-attached
//     on load from an embedding store directory)
//   - gender name lists (re-attached from their text files)
//
// Loading validates the lexicon so a hand-edited or truncated
// artifact fails early instead of mis-decoding later.

use anyhow::{Context, Result};
use std::{fs, path::PathBuf, sync::Arc};

use crate::data::entities::GenderNames;
use crate::infra::embedding_store::WordEmbeddings;
use crate::ml::lexicon::SequenceTransformer;

pub const TRANSFORMER_FILE: &str = "transformer.json";

/// Reads and writes `<dir>/transformer.json`.
pub struct TransformerStore {
    dir: PathBuf,
}

impl TransformerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(TRANSFORMER_FILE)
    }

    /// Write the transformer, creating the directory if needed.
    pub fn save(&self, transformer: &SequenceTransformer) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create directory '{}'", self.dir.display()))?;

        let path = self.path();
        let json = serde_json::to_string_pretty(transformer)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write transformer to '{}'", path.display()))?;

        tracing::info!(
            "Saved transformer ({} words) to '{}'",
            transformer.lexicon_size().unwrap_or(0),
            path.display()
        );
        Ok(())
    }

    /// Read the transformer back and re-attach its runtime resources.
    pub fn load(
        &self,
        word_embs: Option<Arc<WordEmbeddings>>,
        genders: Option<GenderNames>,
    ) -> Result<SequenceTransformer> {
        let path = self.path();
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read transformer from '{}'. Have you run 'build' first?",
                path.display()
            )
        })?;

        let mut transformer: SequenceTransformer = serde_json::from_str(&json)
            .with_context(|| format!("Malformed transformer file '{}'", path.display()))?;
        transformer
            .validate()
            .with_context(|| format!("Invalid lexicon in '{}'", path.display()))?;

        transformer.set_word_embeddings(word_embs);
        transformer.set_genders(genders);

        tracing::info!(
            "Loaded transformer with {} words from '{}'",
            transformer.lexicon_size().unwrap_or(0),
            path.display()
        );
        Ok(transformer)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::annotator::RuleAnnotator;
    use crate::domain::error::PipelineError;
    use crate::ml::lexicon::TransformerConfig;
    use tempfile::tempdir;

    fn built() -> SequenceTransformer {
        let a = RuleAnnotator::new().with_gazetteer([("Tom", "PERSON")]);
        let config = TransformerConfig { generalize_ents: true, ..TransformerConfig::default() };
        let mut t = SequenceTransformer::new(config).with_phrases(["ice_cream"]);
        t.make_lexicon(&a, &["Tom ate ice cream.", "Tom slept."]).unwrap();
        t
    }

    #[test]
    fn test_save_then_load_keeps_state() {
        let dir = tempdir().unwrap();
        let store = TransformerStore::new(dir.path().join("model"));
        let original = built();
        store.save(&original).unwrap();

        let loaded = store.load(None, None).unwrap();
        assert_eq!(loaded.config, original.config);
        assert_eq!(loaded.lexicon().unwrap(), original.lexicon().unwrap());
        assert_eq!(loaded.word_counts(), original.word_counts());
        assert_eq!(loaded.ent_counts(), original.ent_counts());
        assert_eq!(loaded.filtered_ent_counts(), original.filtered_ent_counts());
        assert_eq!(loaded.phrases(), original.phrases());
        assert!(loaded.word_embs().is_none());
    }

    #[test]
    fn test_missing_artifact_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(TransformerStore::new(dir.path()).load(None, None).is_err());
    }

    #[test]
    fn test_corrupted_lexicon_rejected() {
        let dir = tempdir().unwrap();
        let store = TransformerStore::new(dir.path());
        store.save(&built()).unwrap();

        // Drop the last lookup slot so lookup no longer has size + 1 entries
        let mut value: serde_json::Value = serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        value["lexicon"]["lookup"].as_array_mut().unwrap().pop();
        fs::write(store.path(), value.to_string()).unwrap();

        let err = store.load(None, None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::CorruptedLexicon { .. })
        ));
    }
}
