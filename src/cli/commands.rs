// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the four subcommands and their flags:
//
//   build   — corpus -> transformer.json
//   encode  — text lines -> JSON lines of tokens/indices
//   decode  — JSON lines from encode -> text
//   pairs   — corpus -> JSON lines of adjacent unit pairs
//
// Every *Args struct converts into an application config via
// From, so the application layer never sees clap types.

use clap::{Args, Subcommand};
use std::{collections::BTreeSet, path::PathBuf};

use crate::application::{
    build_use_case::{AnnotatorConfig, BuildConfig},
    codec_use_case::{CodecConfig, DecodeSettings},
    pairs_use_case::PairsConfig,
};
use crate::ml::lexicon::TransformerConfig;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a lexicon and entity statistics from a corpus
    Build(BuildArgs),

    /// Encode text (one text per line) into lexicon indices
    Encode(EncodeArgs),

    /// Decode index sequences produced by `encode`
    Decode(DecodeArgs),

    /// Sample adjacent sentence or clause pairs from a corpus
    Pairs(PairsArgs),
}

/// Resource files shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct AnnotatorArgs {
    /// Gazetteer TSV (surface<TAB>LABEL) for entity spans
    #[arg(long)]
    pub gazetteer: Option<PathBuf>,

    /// JSON dump of pre-computed annotations keyed by text
    #[arg(long)]
    pub annotations: Option<PathBuf>,
}

impl From<AnnotatorArgs> for AnnotatorConfig {
    fn from(a: AnnotatorArgs) -> Self {
        AnnotatorConfig { gazetteer: a.gazetteer, annotations: a.annotations }
    }
}

// ─── build ───────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Story file or directory of .txt / .docx stories
    #[arg(long, default_value = "data/stories")]
    pub corpus: PathBuf,

    /// Directory to write transformer.json into
    #[arg(long, default_value = "artifacts")]
    pub output_dir: PathBuf,

    /// Minimum count for a word to enter the lexicon
    #[arg(long, default_value_t = 1)]
    pub min_freq: usize,

    #[arg(long)]
    pub lemmatize: bool,

    /// Prepend the start marker to every token sequence
    #[arg(long)]
    pub prepend_start: bool,

    /// Keep only tokens with these fine tags (repeatable)
    #[arg(long = "include-tag")]
    pub include_tags: Vec<String>,

    #[arg(long, default_value = "<UNK>")]
    pub unk_word: String,

    /// Append the annotator's own vectors to stored embeddings
    #[arg(long)]
    pub use_native_embs: bool,

    /// Replace named entities with numbered placeholders
    #[arg(long)]
    pub generalize_ents: bool,

    /// Tag PERSON placeholders with a gender (needs --names-dir)
    #[arg(long)]
    pub recognize_gender: bool,

    /// Entity types to anonymize (repeatable); defaults to the standard set
    #[arg(long = "ent-type")]
    pub ent_types: Vec<String>,

    /// Directory with female_names.txt and male_names.txt
    #[arg(long)]
    pub names_dir: Option<PathBuf>,

    /// Phrase list, one `word_word` entry per line
    #[arg(long)]
    pub phrases: Option<PathBuf>,

    /// Embedding store directory (embeddings.bin + lexicon.json)
    #[arg(long)]
    pub embeddings_dir: Option<PathBuf>,

    #[command(flatten)]
    pub annotator: AnnotatorArgs,
}

impl From<BuildArgs> for BuildConfig {
    fn from(a: BuildArgs) -> Self {
        let defaults = TransformerConfig::default();
        let include_ent_types: BTreeSet<String> = if a.ent_types.is_empty() {
            defaults.include_ent_types
        } else {
            a.ent_types.into_iter().collect()
        };

        BuildConfig {
            corpus_path:    a.corpus,
            output_dir:     a.output_dir,
            names_dir:      a.names_dir,
            phrases_file:   a.phrases,
            embeddings_dir: a.embeddings_dir,
            annotator:      a.annotator.into(),
            transformer:    TransformerConfig {
                min_freq:          a.min_freq,
                lemmatize:         a.lemmatize,
                prepend_start:     a.prepend_start,
                include_tags:      a.include_tags.into_iter().collect(),
                unk_word:          a.unk_word,
                use_native_embs:   a.use_native_embs,
                generalize_ents:   a.generalize_ents,
                recognize_gender:  a.recognize_gender,
                include_ent_types,
            },
        }
    }
}

// ─── encode / decode ─────────────────────────────────────────────────────────
/// Where a saved transformer and its runtime attachments live.
#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// Directory holding transformer.json
    #[arg(long, default_value = "artifacts")]
    pub model_dir: PathBuf,

    #[arg(long)]
    pub embeddings_dir: Option<PathBuf>,

    #[arg(long)]
    pub names_dir: Option<PathBuf>,

    #[command(flatten)]
    pub annotator: AnnotatorArgs,
}

impl From<ModelArgs> for CodecConfig {
    fn from(a: ModelArgs) -> Self {
        CodecConfig {
            model_dir:      a.model_dir,
            embeddings_dir: a.embeddings_dir,
            names_dir:      a.names_dir,
            annotator:      a.annotator.into(),
        }
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Text file, one text per line (stdin when omitted)
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Also emit POS tag indices
    #[arg(long)]
    pub pos: bool,

    #[command(flatten)]
    pub model: ModelArgs,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// JSON lines written by `encode` (stdin when omitted)
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Render prose instead of space-joined tokens
    #[arg(long)]
    pub detokenize: bool,

    /// Re-instantiate entity placeholders
    #[arg(long)]
    pub adapt_ents: bool,

    /// Restore entity capitalisation while detokenizing
    #[arg(long)]
    pub capitalize_ents: bool,

    /// Keep only the first N sentences of each output
    #[arg(long)]
    pub max_sentences: Option<usize>,

    /// Cut each output at the first of these tokens (repeatable)
    #[arg(long = "eos")]
    pub eos_tokens: Vec<String>,

    /// Seed for placeholder sampling
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    #[command(flatten)]
    pub model: ModelArgs,
}

impl From<&DecodeArgs> for DecodeSettings {
    fn from(a: &DecodeArgs) -> Self {
        DecodeSettings {
            detokenize:      a.detokenize,
            adapt_ents:      a.adapt_ents,
            capitalize_ents: a.capitalize_ents,
            max_sentences:   a.max_sentences,
            eos_tokens:      a.eos_tokens.clone(),
            seed:            a.seed,
        }
    }
}

// ─── pairs ───────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct PairsArgs {
    #[arg(long, default_value = "data/stories")]
    pub corpus: PathBuf,

    /// Encode units with the transformer saved here
    #[arg(long)]
    pub model_dir: Option<PathBuf>,

    /// Pair clauses instead of sentences
    #[arg(long)]
    pub clauses: bool,

    /// Pair each unit with up to N following units
    #[arg(long, default_value_t = 1)]
    pub max_distance: usize,

    /// Emit (later, earlier) instead of (earlier, later)
    #[arg(long)]
    pub reverse: bool,

    /// Skip units longer than this many tokens
    #[arg(long, default_value_t = 25)]
    pub max_sent_length: usize,

    /// Shuffle units into random (negative) pairs
    #[arg(long)]
    pub randomize: bool,

    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    #[command(flatten)]
    pub annotator: AnnotatorArgs,
}

impl From<PairsArgs> for PairsConfig {
    fn from(a: PairsArgs) -> Self {
        PairsConfig {
            corpus_path:     a.corpus,
            model_dir:       a.model_dir,
            clauses:         a.clauses,
            max_distance:    a.max_distance,
            reverse:         a.reverse,
            max_sent_length: a.max_sent_length,
            randomize:       a.randomize,
            seed:            a.seed,
            annotator:       a.annotator.into(),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_build_args_into_config() {
        let cli = Cli::parse_from([
            "narrative-seq", "build", "--corpus", "stories", "--min-freq", "3",
            "--generalize-ents", "--include-tag", "NN", "--include-tag", "VBD", "--ent-type", "PERSON",
        ]);
        let Commands::Build(args) = cli.command else { panic!("expected build") };
        let config: BuildConfig = args.into();
        assert_eq!(config.corpus_path, PathBuf::from("stories"));
        assert_eq!(config.transformer.min_freq, 3);
        assert!(config.transformer.generalize_ents);
        assert_eq!(config.transformer.include_tags.len(), 2);
        assert_eq!(config.transformer.include_ent_types, BTreeSet::from(["PERSON".to_string()]));
    }

    #[test]
    fn test_default_entity_types_kept() {
        let cli = Cli::parse_from(["narrative-seq", "build"]);
        let Commands::Build(args) = cli.command else { panic!("expected build") };
        let config: BuildConfig = args.into();
        assert_eq!(config.transformer.include_ent_types, TransformerConfig::default().include_ent_types);
    }

    #[test]
    fn test_decode_settings() {
        let cli = Cli::parse_from(["narrative-seq", "decode", "--detokenize", "--eos", "<EOS>", "--seed", "9"]);
        let Commands::Decode(args) = cli.command else { panic!("expected decode") };
        let settings = DecodeSettings::from(&args);
        assert!(settings.detokenize);
        assert_eq!(settings.eos_tokens, vec!["<EOS>".to_string()]);
        assert_eq!(settings.seed, 9);
    }
}
