// ============================================================
// Layer 6 — Word Embedding Store
// ============================================================
// A read-only word → vector table backed by a memory-mapped
// file, so large pretrained tables are not copied into RAM.
//
// Directory layout:
//   <dir>/embeddings.bin   rows of little-endian f32,
//                          row-major, vector_size per row
//   <dir>/lexicon.json     {"vector_size": n, "rows": {word: row}}
//
// The table carries its own word → row lexicon; it is unrelated
// to the transformer's lexicon. Words missing from it are
// simply "not contained".
//
// Reference: memmap2 crate documentation

use anyhow::{bail, ensure, Context, Result};
use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, fs::File, io::Write, path::Path};

pub const EMBEDDINGS_FILE: &str = "embeddings.bin";
pub const LEXICON_FILE: &str = "lexicon.json";

const F32_BYTES: usize = std::mem::size_of::<f32>();

#[derive(Debug, Serialize, Deserialize)]
struct EmbeddingIndex {
    vector_size: usize,
    rows:        HashMap<String, usize>,
}

/// Memory-mapped word vectors.
#[derive(Debug)]
pub struct WordEmbeddings {
    mmap:        Mmap,
    vector_size: usize,
    rows:        HashMap<String, usize>,
}

impl WordEmbeddings {
    /// Map `<dir>/embeddings.bin` and read `<dir>/lexicon.json`.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let index_path = dir.join(LEXICON_FILE);
        let data_path = dir.join(EMBEDDINGS_FILE);

        let json = fs::read_to_string(&index_path)
            .with_context(|| format!("Cannot read embedding lexicon '{}'", index_path.display()))?;
        let index: EmbeddingIndex = serde_json::from_str(&json)
            .with_context(|| format!("Malformed embedding lexicon '{}'", index_path.display()))?;
        ensure!(index.vector_size > 0, "embedding vector_size must be positive");

        let file = File::open(&data_path)
            .with_context(|| format!("Cannot open embedding table '{}'", data_path.display()))?;
        // SAFETY: the table is opened read-only and never written while mapped
        let mmap = unsafe { Mmap::map(&file)? };

        let row_bytes = index.vector_size * F32_BYTES;
        if mmap.len() % row_bytes != 0 {
            bail!(
                "embedding table '{}' is {} bytes, not a multiple of {}-float rows",
                data_path.display(),
                mmap.len(),
                index.vector_size
            );
        }
        let n_rows = mmap.len() / row_bytes;
        if let Some((word, &row)) = index.rows.iter().find(|&(_, &row)| row >= n_rows) {
            bail!("embedding row {row} for '{word}' is beyond the {n_rows}-row table");
        }

        tracing::info!(
            "Loaded word embeddings with {} words ({} dims) from {}",
            index.rows.len(),
            index.vector_size,
            dir.display()
        );
        Ok(Self { mmap, vector_size: index.vector_size, rows: index.rows })
    }

    /// Write a table in the format [`WordEmbeddings::load`] reads.
    pub fn write(dir: impl AsRef<Path>, vectors: &[(String, Vec<f32>)]) -> Result<()> {
        let dir = dir.as_ref();
        let vector_size = vectors.first().map_or(0, |(_, v)| v.len());
        ensure!(vector_size > 0, "cannot write an empty embedding table");
        if let Some((word, v)) = vectors.iter().find(|(_, v)| v.len() != vector_size) {
            bail!("vector for '{word}' has {} dims, expected {vector_size}", v.len());
        }

        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;

        let mut data = File::create(dir.join(EMBEDDINGS_FILE))?;
        let mut rows = HashMap::with_capacity(vectors.len());
        for (row, (word, vector)) in vectors.iter().enumerate() {
            let bytes: Vec<u8> = vector.iter().flat_map(|x| x.to_le_bytes()).collect();
            data.write_all(&bytes)?;
            rows.insert(word.clone(), row);
        }
        data.flush()?;

        let index = EmbeddingIndex { vector_size, rows };
        fs::write(dir.join(LEXICON_FILE), serde_json::to_string(&index)?)
            .with_context(|| format!("Cannot write embedding lexicon in '{}'", dir.display()))?;
        Ok(())
    }

    pub fn vector_size(&self) -> usize {
        self.vector_size
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, word: &str) -> bool {
        self.rows.contains_key(word)
    }

    /// The vector for `word`, decoded from the mapped table.
    pub fn get(&self, word: &str) -> Option<Vec<f32>> {
        let row = *self.rows.get(word)?;
        let row_bytes = self.vector_size * F32_BYTES;
        let bytes = self.mmap.get(row * row_bytes..(row + 1) * row_bytes)?;
        Some(
            bytes
                .chunks_exact(F32_BYTES)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        )
    }
}
