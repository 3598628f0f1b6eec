// ============================================================
// Layer 5 — Lexicon Builder
// ============================================================
// The SequenceTransformer owns the vocabulary and the corpus
// statistics gathered while building it.
//
// Index layout:
//   0  → empty slot (padding / "no word here")
//   1  → the unknown word (<UNK> by default)
//   2… → admitted words, in the order they were first seen
//
//   lookup[i] is the word with index i; lookup[0] is None, so
//   lookup.len() == size + 1 at all times.
//
// make_lexicon() per document:
//   1. (generalize_ents) record entity document frequencies,
//      then swap entities for ENT_ placeholders
//   2. (phrases) fold known phrases into "_"-joined tokens
//   3. tokenize with the configured options
//   4. add to the running word counts
// then rebuilds the lexicon from the cumulative counts.
//
// Word counts and entity counts persist across calls; the
// lexicon itself is rebuilt from scratch every time. Calling
// make_lexicon on two corpora in a row therefore yields the
// vocabulary of their union.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::data::entities::{
    EntityAnonymizer, EntityFrequencies, EntityMap, EntityProbs, GenderNames, DEFAULT_ENT_TYPES,
    SAMPLE_LIMIT,
};
use crate::data::phrases::combine_phrases_in_seq;
use crate::data::tokenizer::{tokenize, TokenizeOptions};
use crate::domain::entity::Placeholder;
use crate::domain::error::PipelineError;
use crate::domain::token::{ENT_PREFIX, UNK_WORD};
use crate::domain::traits::Annotator;
use crate::infra::embedding_store::WordEmbeddings;

/// Index reserved for empty slots
pub const EMPTY_INDEX: u32 = 0;
/// Index reserved for the unknown word
pub const UNK_INDEX: u32 = 1;

// ─── Lexicon ──────────────────────────────────────────────────────────────────
/// Word ↔ index mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lexicon {
    index:  BTreeMap<String, u32>,
    lookup: Vec<Option<String>>,
}

impl Lexicon {
    /// A lexicon holding only the unknown word at index 1.
    pub fn new(unk_word: &str) -> Self {
        Self {
            index:  BTreeMap::from([(unk_word.to_string(), UNK_INDEX)]),
            lookup: vec![None, Some(unk_word.to_string())],
        }
    }

    /// Add a word at the next free index; existing words keep theirs.
    pub fn admit(&mut self, word: &str) -> u32 {
        if let Some(&idx) = self.index.get(word) {
            return idx;
        }
        let idx = self.lookup.len() as u32;
        self.index.insert(word.to_string(), idx);
        self.lookup.push(Some(word.to_string()));
        idx
    }

    /// Number of words, including the unknown word
    pub fn size(&self) -> usize {
        self.index.len()
    }

    pub fn get(&self, word: &str) -> Option<u32> {
        self.index.get(word).copied()
    }

    pub fn contains(&self, word: &str) -> bool {
        self.index.contains_key(word)
    }

    /// Word for an index: `None` for the empty slot, error past the end.
    pub fn word(&self, idx: u32) -> Result<Option<&str>, PipelineError> {
        self.lookup
            .get(idx as usize)
            .map(|w| w.as_deref())
            .ok_or(PipelineError::IndexOutOfRange { index: idx as usize, size: self.size() })
    }

    /// Words in index order, starting at index 1.
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.lookup.iter().flatten().map(String::as_str)
    }

    /// Check that `index` and `lookup` describe the same mapping.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let corrupted = PipelineError::CorruptedLexicon {
            size:       self.size(),
            lookup_len: self.lookup.len(),
        };
        if self.lookup.len() != self.size() + 1 || self.lookup.first() != Some(&None) {
            return Err(corrupted);
        }
        let consistent = self.index.iter().all(|(word, &idx)| {
            self.lookup.get(idx as usize).and_then(|w| w.as_deref()) == Some(word.as_str())
        });
        if consistent { Ok(()) } else { Err(corrupted) }
    }
}

// ─── Word counts ──────────────────────────────────────────────────────────────
/// Word frequencies that remember first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<(String, usize)>", into = "Vec<(String, usize)>")]
pub struct WordCounts {
    entries: Vec<(String, usize)>,
    slots:   HashMap<String, usize>,
}

impl WordCounts {
    pub fn add(&mut self, word: &str) {
        match self.slots.get(word) {
            Some(&slot) => self.entries[slot].1 += 1,
            None => {
                self.slots.insert(word.to_string(), self.entries.len());
                self.entries.push((word.to_string(), 1));
            }
        }
    }

    pub fn get(&self, word: &str) -> usize {
        self.slots.get(word).map_or(0, |&slot| self.entries[slot].1)
    }

    /// (word, count) in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(w, c)| (w.as_str(), *c))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<(String, usize)>> for WordCounts {
    fn from(entries: Vec<(String, usize)>) -> Self {
        let mut counts = WordCounts::default();
        for (word, count) in entries {
            counts.add(&word);
            if let Some(&slot) = counts.slots.get(&word) {
                counts.entries[slot].1 += count.saturating_sub(1);
            }
        }
        counts
    }
}

impl From<WordCounts> for Vec<(String, usize)> {
    fn from(counts: WordCounts) -> Self {
        counts.entries
    }
}

// ─── Configuration ────────────────────────────────────────────────────────────
/// Everything that shapes how text becomes tokens and indices.
/// Persisted alongside the lexicon so encoding at inference time
/// matches encoding at build time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformerConfig {
    /// Minimum corpus count for a word to enter the lexicon
    pub min_freq:          usize,
    pub lemmatize:         bool,
    pub prepend_start:     bool,
    /// Fine tags to keep when tokenizing; empty keeps everything
    pub include_tags:      BTreeSet<String>,
    pub unk_word:          String,
    /// Also use the annotator's own word vectors for embeddings
    pub use_native_embs:   bool,
    /// Replace named entities with ENT_ placeholders
    pub generalize_ents:   bool,
    /// Tag PERSON placeholders with a gender (needs name lists)
    pub recognize_gender:  bool,
    pub include_ent_types: BTreeSet<String>,
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            min_freq:          1,
            lemmatize:         false,
            prepend_start:     false,
            include_tags:      BTreeSet::new(),
            unk_word:          UNK_WORD.to_string(),
            use_native_embs:   false,
            generalize_ents:   false,
            recognize_gender:  false,
            include_ent_types: DEFAULT_ENT_TYPES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

// ─── SequenceTransformer ──────────────────────────────────────────────────────
/// Vocabulary, corpus statistics and encoding configuration.
///
/// Embeddings and gender lists are runtime attachments: they are not
/// serialized and must be re-attached after loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceTransformer {
    pub config:          TransformerConfig,
    lexicon:             Option<Lexicon>,
    word_counts:         WordCounts,
    ent_counts:          EntityFrequencies,
    filtered_ent_counts: EntityFrequencies,
    phrases:             Option<BTreeSet<String>>,

    #[serde(skip)]
    word_embs: Option<Arc<WordEmbeddings>>,
    #[serde(skip)]
    genders:   Option<GenderNames>,
}

impl SequenceTransformer {
    pub fn new(config: TransformerConfig) -> Self {
        debug!(?config, "created transformer");
        Self {
            config,
            lexicon: None,
            word_counts: WordCounts::default(),
            ent_counts: EntityFrequencies::new(),
            filtered_ent_counts: EntityFrequencies::new(),
            phrases: None,
            word_embs: None,
            genders: None,
        }
    }

    /// Phrases to fold before tokenizing (e.g. `ice_cream`).
    pub fn with_phrases<I, S>(mut self, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.phrases = Some(phrases.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_word_embeddings(mut self, embs: Option<Arc<WordEmbeddings>>) -> Self {
        self.word_embs = embs;
        self
    }

    pub fn with_genders(mut self, genders: Option<GenderNames>) -> Self {
        self.genders = genders;
        self
    }

    pub fn set_word_embeddings(&mut self, embs: Option<Arc<WordEmbeddings>>) {
        self.word_embs = embs;
    }

    pub fn set_genders(&mut self, genders: Option<GenderNames>) {
        self.genders = genders;
    }

    // ── Accessors ──

    /// The built lexicon; errors if make_lexicon never ran.
    pub fn lexicon(&self) -> Result<&Lexicon, PipelineError> {
        self.lexicon.as_ref().ok_or(PipelineError::LexiconNotBuilt)
    }

    pub fn lexicon_size(&self) -> Option<usize> {
        self.lexicon.as_ref().map(Lexicon::size)
    }

    pub fn word_counts(&self) -> &WordCounts {
        &self.word_counts
    }

    pub fn ent_counts(&self) -> &EntityFrequencies {
        &self.ent_counts
    }

    pub fn filtered_ent_counts(&self) -> &EntityFrequencies {
        &self.filtered_ent_counts
    }

    /// Sampling distribution used to fill unresolved placeholders.
    pub fn sub_ent_probs(&self) -> EntityProbs {
        self.filtered_ent_counts.to_probs()
    }

    pub fn phrases(&self) -> Option<&BTreeSet<String>> {
        self.phrases.as_ref()
    }

    pub fn word_embs(&self) -> Option<&Arc<WordEmbeddings>> {
        self.word_embs.as_ref()
    }

    /// Validate the persisted state after loading.
    pub fn validate(&self) -> Result<(), PipelineError> {
        match &self.lexicon {
            Some(lexicon) => lexicon.validate(),
            None => Ok(()),
        }
    }

    // ── Text preparation ──

    pub fn tokenize_options(&self) -> TokenizeOptions {
        TokenizeOptions::default()
            .with_lemmatize(self.config.lemmatize)
            .with_include_tags(self.config.include_tags.iter().cloned())
            .with_prepend_start(self.config.prepend_start)
    }

    pub fn anonymizer(&self) -> EntityAnonymizer {
        let genders = if self.config.recognize_gender { self.genders.clone() } else { None };
        EntityAnonymizer::new()
            .with_include_types(self.config.include_ent_types.iter().cloned())
            .with_genders(genders)
    }

    /// Anonymize (when configured) and fold phrases; returns the
    /// rewritten text and the entity mapping used.
    pub fn prepare_text(
        &self,
        annotator: &dyn Annotator,
        text: &str,
    ) -> Result<(String, EntityMap<Placeholder>)> {
        let (mut text, ents) = if self.config.generalize_ents {
            self.anonymizer().replace_ents_in_seq(annotator, text)?
        } else {
            (text.to_string(), EntityMap::new())
        };
        if let Some(phrases) = &self.phrases {
            text = combine_phrases_in_seq(annotator, &text, phrases, self.config.lemmatize)?;
        }
        Ok((text, ents))
    }

    /// Text → configured token list.
    pub fn text_to_tokens(&self, annotator: &dyn Annotator, text: &str) -> Result<Vec<String>> {
        let (prepared, _) = self.prepare_text(annotator, text)?;
        tokenize(annotator, &prepared, &self.tokenize_options())
    }

    // ── Building ──

    /// Accumulate counts over `corpus` and rebuild the lexicon.
    pub fn make_lexicon<S: AsRef<str>>(&mut self, annotator: &dyn Annotator, corpus: &[S]) -> Result<()> {
        let unk = self.config.unk_word.clone();
        if self.config.recognize_gender && self.genders.is_none() {
            tracing::warn!("Gender recognition requested but no name lists attached; skipping");
        }

        for (idx, doc) in corpus.iter().enumerate() {
            let doc = doc.as_ref();
            if self.config.generalize_ents {
                let (ents, _) = self.anonymizer().get_ents(annotator, doc)?;
                self.ent_counts.record(&ents);
            }
            let tokens = self.text_to_tokens(annotator, doc)?;
            debug!(doc = idx, tokens = tokens.len(), "counted document");
            for token in &tokens {
                self.word_counts.add(token);
            }
        }

        let mut lexicon = Lexicon::new(&unk);
        for (word, count) in self.word_counts.iter() {
            if word == unk {
                continue;
            }
            let is_ent = self.config.generalize_ents && word.starts_with(ENT_PREFIX);
            if count >= self.config.min_freq || is_ent {
                lexicon.admit(word);
            }
        }
        lexicon.validate()?;

        if self.config.generalize_ents {
            self.filtered_ent_counts = self.ent_counts.filtered(SAMPLE_LIMIT);
        }
        if let Some(phrases) = &mut self.phrases {
            phrases.retain(|p| lexicon.contains(p));
        }

        info!(
            "Built lexicon of {} words with frequency >= {} from {} documents",
            lexicon.size(),
            self.config.min_freq,
            corpus.len()
        );
        self.lexicon = Some(lexicon);
        Ok(())
    }
}
