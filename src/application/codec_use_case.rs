// ============================================================
// Layer 2 — Codec Use Case
// ============================================================
// Loads a built transformer and runs it in either direction:
//
//   encode: text -> anonymized tokens -> lexicon indices
//           (plus the entity mapping needed to undo the
//           anonymization, and optionally POS tag indices)
//   decode: indices -> tokens -> placeholders re-instantiated
//           -> detokenized prose -> optional filtering
//
// Encoded records are serialisable so the CLI can write them as
// JSON lines and feed them back into decode unchanged.

use anyhow::Result;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, path::PathBuf};

use crate::application::build_use_case::{load_embeddings, AnnotatorConfig};
use crate::data::{
    annotator::ScriptedAnnotator,
    detokenizer::FilterMode,
    entities::EntityMap,
    pos::get_pos_num_seq,
    tokenizer::tokenize,
};
use crate::domain::entity::Placeholder;
use crate::infra::{names_store::load_gender_names, transformer_store::TransformerStore};
use crate::ml::{codec::DecodeOptions, lexicon::SequenceTransformer};

// ─── Configuration ───────────────────────────────────────────────────────────
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Directory holding `transformer.json`
    pub model_dir:      PathBuf,
    pub embeddings_dir: Option<PathBuf>,
    pub names_dir:      Option<PathBuf>,
    pub annotator:      AnnotatorConfig,
}

/// One encoded text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedText {
    pub tokens: Vec<String>,
    pub nums:   Vec<u32>,
    /// Surface -> placeholder, needed to re-instantiate entities
    #[serde(default)]
    pub ents:   EntityMap<Placeholder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos:    Option<Vec<u32>>,
}

/// Decode switches as they arrive from the CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecodeSettings {
    pub detokenize:      bool,
    pub adapt_ents:      bool,
    pub capitalize_ents: bool,
    /// Keep only the first n sentences
    pub max_sentences:   Option<usize>,
    /// Cut at the first of these tokens; takes precedence over max_sentences
    pub eos_tokens:      Vec<String>,
    pub seed:            u64,
}

impl DecodeSettings {
    fn filter(&self) -> Option<FilterMode> {
        if !self.eos_tokens.is_empty() {
            let eos: HashSet<String> = self.eos_tokens.iter().cloned().collect();
            return Some(FilterMode::EosTokens(eos));
        }
        self.max_sentences.map(FilterMode::Sentences)
    }
}

// ─── CodecUseCase ─────────────────────────────────────────────────────────────
pub struct CodecUseCase {
    annotator:   ScriptedAnnotator,
    transformer: SequenceTransformer,
}

impl CodecUseCase {
    pub fn new(config: CodecConfig) -> Result<Self> {
        let annotator = config.annotator.build()?;
        let genders = match &config.names_dir {
            Some(dir) => load_gender_names(dir)?,
            None => None,
        };
        let word_embs = load_embeddings(config.embeddings_dir.as_ref())?;
        let transformer = TransformerStore::new(&config.model_dir).load(word_embs, genders)?;
        Ok(Self::from_parts(annotator, transformer))
    }

    pub fn from_parts(annotator: ScriptedAnnotator, transformer: SequenceTransformer) -> Self {
        Self { annotator, transformer }
    }

    pub fn transformer(&self) -> &SequenceTransformer {
        &self.transformer
    }

    pub fn encode<S: AsRef<str>>(&self, texts: &[S], with_pos: bool) -> Result<Vec<EncodedText>> {
        let options = self.transformer.tokenize_options();
        let mut encoded = Vec::with_capacity(texts.len());

        for text in texts {
            let (prepared, ents) = self.transformer.prepare_text(&self.annotator, text.as_ref())?;
            let tokens = tokenize(&self.annotator, &prepared, &options)?;
            let nums = self.transformer.tok_seq_to_nums(&tokens)?;
            let pos = if with_pos { Some(get_pos_num_seq(&self.annotator, &prepared)?) } else { None };
            encoded.push(EncodedText { tokens, nums, ents, pos });
        }

        tracing::info!("Encoded {} texts", encoded.len());
        Ok(encoded)
    }

    pub fn decode(&self, encoded: &[EncodedText], settings: &DecodeSettings) -> Result<Vec<String>> {
        let seqs: Vec<Vec<u32>> = encoded.iter().map(|e| e.nums.clone()).collect();
        let options = DecodeOptions {
            detokenize:      settings.detokenize,
            filter:          settings.filter(),
            ents:            encoded.iter().map(|e| e.ents.clone()).collect(),
            adapt_ents:      settings.adapt_ents,
            capitalize_ents: settings.capitalize_ents,
        };

        let mut rng = StdRng::seed_from_u64(settings.seed);
        let decoded = self
            .transformer
            .decode_num_seqs(&self.annotator, &seqs, &options, &mut rng)?;
        tracing::info!("Decoded {} sequences", decoded.len());
        Ok(decoded)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::annotator::RuleAnnotator;
    use crate::ml::lexicon::TransformerConfig;

    fn use_case() -> CodecUseCase {
        let rules = RuleAnnotator::new().with_gazetteer([("Sarah", "PERSON")]);
        let config = TransformerConfig { generalize_ents: true, ..TransformerConfig::default() };
        let mut transformer = SequenceTransformer::new(config);
        transformer
            .make_lexicon(&rules, &["Sarah saw the cat.", "The cat sat."])
            .unwrap();
        CodecUseCase::from_parts(ScriptedAnnotator::new(rules), transformer)
    }

    #[test]
    fn test_encode_anonymizes_and_indexes() {
        let uc = use_case();
        let encoded = uc.encode(&["Sarah saw a dog."], false).unwrap();
        let first = &encoded[0];
        assert_eq!(first.tokens[0], "ENT_PERSON_0");
        assert_eq!(first.ents.get("Sarah"), Some(&Placeholder::parse("PERSON_0").unwrap()));
        // "a" and "dog" were never seen
        assert_eq!(first.nums[2], 1);
        assert_eq!(first.nums[3], 1);
        assert!(first.pos.is_none());
    }

    #[test]
    fn test_encode_with_pos() {
        let uc = use_case();
        let encoded = uc.encode(&["The cat sat."], true).unwrap();
        assert_eq!(encoded[0].pos.as_ref().map(Vec::len), Some(4));
    }

    #[test]
    fn test_decode_restores_entities() {
        let uc = use_case();
        let encoded = uc.encode(&["Sarah saw the cat."], false).unwrap();
        let settings = DecodeSettings {
            detokenize: true,
            adapt_ents: true,
            capitalize_ents: true,
            ..DecodeSettings::default()
        };
        let decoded = uc.decode(&encoded, &settings).unwrap();
        assert_eq!(decoded, vec!["Sarah saw the cat.".to_string()]);
    }

    #[test]
    fn test_filter_selection() {
        let settings = DecodeSettings { max_sentences: Some(2), ..DecodeSettings::default() };
        assert_eq!(settings.filter(), Some(FilterMode::Sentences(2)));

        let settings = DecodeSettings {
            max_sentences: Some(2),
            eos_tokens: vec!["<EOS>".to_string()],
            ..DecodeSettings::default()
        };
        assert!(matches!(settings.filter(), Some(FilterMode::EosTokens(_))));
        assert_eq!(DecodeSettings::default().filter(), None);
    }
}
