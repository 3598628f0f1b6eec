// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with `clap`.
// All work is delegated to Layer 2 (application); this layer
// only reads the command input and prints results.
//
// Output of encode, decode and pairs is JSON lines on stdout so
// the commands compose:
//
//   narrative-seq encode --input stories.txt > encoded.jsonl
//   narrative-seq decode --input encoded.jsonl --detokenize

pub mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use std::{
    fs,
    io::{self, Read},
    path::Path,
};

use commands::{BuildArgs, Commands, DecodeArgs, EncodeArgs, PairsArgs};

#[derive(Parser, Debug)]
#[command(
    name = "narrative-seq",
    version = "0.1.0",
    about = "Build lexicons from story corpora and encode, decode or pair token sequences."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Input text from a file, or stdin when no path is given.
fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Cannot read input '{}'", path.display())),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf).context("Cannot read stdin")?;
            Ok(buf)
        }
    }
}

fn non_empty_lines(raw: &str) -> impl Iterator<Item = &str> {
    raw.lines().map(str::trim).filter(|l| !l.is_empty())
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Build(args)  => run_build(args),
            Commands::Encode(args) => run_encode(args),
            Commands::Decode(args) => run_decode(args),
            Commands::Pairs(args)  => run_pairs(args),
        }
    }
}

fn run_build(args: BuildArgs) -> Result<()> {
    use crate::application::build_use_case::BuildUseCase;

    tracing::info!("Building transformer from: {}", args.corpus.display());
    let report = BuildUseCase::new(args.into()).execute()?;

    println!(
        "Build complete: {} stories, {} words, {} entity labels.",
        report.stories, report.lexicon_size, report.entity_labels
    );
    Ok(())
}

fn run_encode(args: EncodeArgs) -> Result<()> {
    use crate::application::codec_use_case::CodecUseCase;

    let raw = read_input(args.input.as_deref())?;
    let texts: Vec<&str> = non_empty_lines(&raw).collect();

    let use_case = CodecUseCase::new(args.model.into())?;
    for record in use_case.encode(&texts, args.pos)? {
        println!("{}", serde_json::to_string(&record)?);
    }
    Ok(())
}

fn run_decode(args: DecodeArgs) -> Result<()> {
    use crate::application::codec_use_case::{CodecUseCase, DecodeSettings, EncodedText};

    let raw = read_input(args.input.as_deref())?;
    let records = non_empty_lines(&raw)
        .enumerate()
        .map(|(i, line)| {
            serde_json::from_str::<EncodedText>(line)
                .with_context(|| format!("Malformed encoded record on line {}", i + 1))
        })
        .collect::<Result<Vec<_>>>()?;

    let settings = DecodeSettings::from(&args);
    let use_case = CodecUseCase::new(args.model.into())?;
    for text in use_case.decode(&records, &settings)? {
        println!("{}", text);
    }
    Ok(())
}

fn run_pairs(args: PairsArgs) -> Result<()> {
    use crate::application::pairs_use_case::PairsUseCase;

    let pairs = PairsUseCase::new(args.into()).execute()?;
    for pair in &pairs {
        println!("{}", serde_json::to_string(pair)?);
    }
    tracing::info!("Wrote {} pairs", pairs.len());
    Ok(())
}
