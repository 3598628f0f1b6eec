// ============================================================
// Layer 5 — Dense Embeddings
// ============================================================
// Turns token sequences into matrices of word vectors.
//
// Vector sources (at least one must be configured):
//   - an attached WordEmbeddings table
//   - the annotator's own vectors (config.use_native_embs)
// With both, each word's vector is [table | native].
// A word a source does not know gets zeros for that part.
//
// Shapes:
//   one sequence           → (n_tokens, dim)   (empty → one zero row)
//   reduced sequence       → (dim,)            mean or sum over rows
//   batch, ragged          → Vec of (n_i, dim)
//   batch, reduced         → (n_seqs, dim)
//   batch, padded          → (n_seqs, max_len, dim)
//
// When phrases are configured, "ice_cream" is embedded as the
// two rows "ice" and "cream".

use anyhow::Result;
use ndarray::{s, Array1, Array2, Array3, Axis};

use crate::domain::error::PipelineError;
use crate::domain::token::{ENT_PREFIX, JOIN_CHAR};
use crate::domain::traits::Annotator;
use crate::ml::lexicon::SequenceTransformer;

/// How to collapse a sequence's rows into one vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceMode {
    Mean,
    Sum,
}

/// A batch of embedded sequences.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddedSeqs {
    /// One (n_tokens, dim) matrix per sequence
    Ragged(Vec<Array2<f32>>),
    /// One row per sequence
    Reduced(Array2<f32>),
}

impl EmbeddedSeqs {
    pub fn len(&self) -> usize {
        match self {
            EmbeddedSeqs::Ragged(seqs) => seqs.len(),
            EmbeddedSeqs::Reduced(rows) => rows.nrows(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn reduce(matrix: &Array2<f32>, mode: ReduceMode) -> Array1<f32> {
    match mode {
        ReduceMode::Mean => matrix
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(matrix.ncols())),
        ReduceMode::Sum => matrix.sum_axis(Axis(0)),
    }
}

fn stack_rows(rows: Vec<Array1<f32>>, dim: usize) -> Array2<f32> {
    let mut out = Array2::zeros((rows.len(), dim));
    for (i, row) in rows.iter().enumerate() {
        out.row_mut(i).assign(row);
    }
    out
}

impl SequenceTransformer {
    /// Width of one embedded token.
    pub fn n_embedding_nodes(&self, annotator: &dyn Annotator) -> Result<usize, PipelineError> {
        let table = self.word_embs().map_or(0, |e| e.vector_size());
        let native = if self.config.use_native_embs { annotator.vector_size() } else { 0 };
        match (self.word_embs().is_some(), self.config.use_native_embs) {
            (false, false) => Err(PipelineError::NoEmbeddingSource),
            _ => Ok(table + native),
        }
    }

    fn word_vector(&self, annotator: &dyn Annotator, word: &str, out: &mut Vec<f32>) {
        if let Some(table) = self.word_embs() {
            match table.get(word) {
                Some(v) => out.extend(v),
                None => out.extend(std::iter::repeat(0.0).take(table.vector_size())),
            }
        }
        if self.config.use_native_embs {
            let size = annotator.vector_size();
            match annotator.vector(word) {
                Some(v) if v.len() == size => out.extend(v),
                _ => out.extend(std::iter::repeat(0.0).take(size)),
            }
        }
    }

    /// Words to embed for one token.
    fn embedding_words<'a>(&self, token: &'a str) -> Vec<&'a str> {
        if self.phrases().is_some() && !token.starts_with(ENT_PREFIX) {
            token.split(JOIN_CHAR).filter(|w| !w.is_empty()).collect()
        } else {
            vec![token]
        }
    }

    /// One sequence → (n_words, dim); an empty sequence is one zero row.
    pub fn tok_seq_to_embs<S: AsRef<str>>(&self, annotator: &dyn Annotator, seq: &[S]) -> Result<Array2<f32>> {
        let dim = self.n_embedding_nodes(annotator)?;
        let words: Vec<&str> = seq.iter().flat_map(|t| self.embedding_words(t.as_ref())).collect();
        if words.is_empty() {
            return Ok(Array2::zeros((1, dim)));
        }

        let mut flat = Vec::with_capacity(words.len() * dim);
        for word in &words {
            self.word_vector(annotator, word, &mut flat);
        }
        Ok(Array2::from_shape_vec((words.len(), dim), flat)?)
    }

    fn collect_embs(&self, annotator: &dyn Annotator, mats: Vec<Array2<f32>>, mode: Option<ReduceMode>) -> Result<EmbeddedSeqs> {
        Ok(match mode {
            None => EmbeddedSeqs::Ragged(mats),
            Some(mode) => {
                let dim = self.n_embedding_nodes(annotator)?;
                let rows = mats.iter().map(|m| reduce(m, mode)).collect();
                EmbeddedSeqs::Reduced(stack_rows(rows, dim))
            }
        })
    }

    pub fn tok_seqs_to_embs<S: AsRef<str>>(
        &self,
        annotator: &dyn Annotator,
        seqs: &[Vec<S>],
        mode: Option<ReduceMode>,
    ) -> Result<EmbeddedSeqs> {
        let mats = seqs
            .iter()
            .map(|seq| self.tok_seq_to_embs(annotator, seq))
            .collect::<Result<Vec<_>>>()?;
        self.collect_embs(annotator, mats, mode)
    }

    /// Tokenize (with phrase folding) and embed.
    pub fn text_to_embs<S: AsRef<str>>(
        &self,
        annotator: &dyn Annotator,
        texts: &[S],
        mode: Option<ReduceMode>,
    ) -> Result<EmbeddedSeqs> {
        let tok_seqs = self.text_to_tok_seqs(annotator, texts)?;
        self.tok_seqs_to_embs(annotator, &tok_seqs, mode)
    }

    /// Numeric sequences → embeddings via the lexicon; index 0 is a zero row.
    pub fn nums_to_embs(
        &self,
        annotator: &dyn Annotator,
        seqs: &[Vec<u32>],
        mode: Option<ReduceMode>,
    ) -> Result<EmbeddedSeqs> {
        let dim = self.n_embedding_nodes(annotator)?;
        let lexicon = self.lexicon()?;

        let mut mats = Vec::with_capacity(seqs.len());
        for seq in seqs {
            let mut flat = Vec::with_capacity(seq.len().max(1) * dim);
            for &idx in seq {
                match lexicon.word(idx)? {
                    Some(word) => self.word_vector(annotator, word, &mut flat),
                    None => flat.extend(std::iter::repeat(0.0).take(dim)),
                }
            }
            let rows = seq.len();
            mats.push(if rows == 0 { Array2::zeros((1, dim)) } else { Array2::from_shape_vec((rows, dim), flat)? });
        }
        self.collect_embs(annotator, mats, mode)
    }

    /// Zero-pad ragged sequences into one (n, max_len, dim) tensor;
    /// longer sequences are cut at `max_length`.
    pub fn pad_embs(seqs: &[Array2<f32>], max_length: Option<usize>) -> Array3<f32> {
        let max_len = max_length.unwrap_or_else(|| seqs.iter().map(|s| s.nrows()).max().unwrap_or(0));
        let dim = seqs.first().map_or(0, |s| s.ncols());

        let mut padded = Array3::zeros((seqs.len(), max_len, dim));
        for (i, seq) in seqs.iter().enumerate() {
            let rows = seq.nrows().min(max_len);
            padded
                .slice_mut(s![i, ..rows, ..])
                .assign(&seq.slice(s![..rows, ..]));
        }
        padded
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::annotator::{RuleAnnotator, ScriptedAnnotator};
    use crate::infra::embedding_store::WordEmbeddings;
    use crate::ml::lexicon::TransformerConfig;
    use ndarray::array;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn table(dir: &std::path::Path) -> Arc<WordEmbeddings> {
        WordEmbeddings::write(
            dir,
            &[("cat".to_string(), vec![1.0, 2.0]), ("sat".to_string(), vec![3.0, 4.0])],
        )
        .unwrap();
        Arc::new(WordEmbeddings::load(dir).unwrap())
    }

    #[test]
    fn test_no_source_is_fatal() {
        let t = SequenceTransformer::new(TransformerConfig::default());
        let err = t.tok_seq_to_embs(&RuleAnnotator::new(), &["cat"]).unwrap_err();
        assert_eq!(err.downcast_ref::<PipelineError>(), Some(&PipelineError::NoEmbeddingSource));
    }

    #[test]
    fn test_table_lookup_with_zero_fill() {
        let dir = tempdir().unwrap();
        let t = SequenceTransformer::new(TransformerConfig::default()).with_word_embeddings(Some(table(dir.path())));
        let embs = t.tok_seq_to_embs(&RuleAnnotator::new(), &["cat", "emu", "sat"]).unwrap();
        assert_eq!(embs, array![[1.0f32, 2.0], [0.0, 0.0], [3.0, 4.0]]);

        let empty: [&str; 0] = [];
        assert_eq!(t.tok_seq_to_embs(&RuleAnnotator::new(), &empty).unwrap(), array![[0.0f32, 0.0]]);
    }

    #[test]
    fn test_concatenates_table_then_native() {
        let dir = tempdir().unwrap();
        let config = TransformerConfig { use_native_embs: true, ..TransformerConfig::default() };
        let t = SequenceTransformer::new(config).with_word_embeddings(Some(table(dir.path())));
        let a = ScriptedAnnotator::new(RuleAnnotator::new()).with_vector("cat", vec![9.0]);
        assert_eq!(t.n_embedding_nodes(&a).unwrap(), 3);
        let embs = t.tok_seq_to_embs(&a, &["cat", "sat"]).unwrap();
        assert_eq!(embs, array![[1.0f32, 2.0, 9.0], [3.0, 4.0, 0.0]]);
    }

    #[test]
    fn test_reduce_modes() {
        let dir = tempdir().unwrap();
        let t = SequenceTransformer::new(TransformerConfig::default()).with_word_embeddings(Some(table(dir.path())));
        let a = RuleAnnotator::new();
        let seqs = vec![vec!["cat", "sat"]];
        match t.tok_seqs_to_embs(&a, &seqs, Some(ReduceMode::Mean)).unwrap() {
            EmbeddedSeqs::Reduced(rows) => assert_eq!(rows, array![[2.0f32, 3.0]]),
            other => panic!("expected reduced, got {other:?}"),
        }
        match t.tok_seqs_to_embs(&a, &seqs, Some(ReduceMode::Sum)).unwrap() {
            EmbeddedSeqs::Reduced(rows) => assert_eq!(rows, array![[4.0f32, 6.0]]),
            other => panic!("expected reduced, got {other:?}"),
        }
    }

    #[test]
    fn test_phrases_split_into_words() {
        let dir = tempdir().unwrap();
        let t = SequenceTransformer::new(TransformerConfig::default())
            .with_phrases(["cat_sat"])
            .with_word_embeddings(Some(table(dir.path())));
        let embs = t.tok_seq_to_embs(&RuleAnnotator::new(), &["cat_sat"]).unwrap();
        assert_eq!(embs.nrows(), 2);
    }

    #[test]
    fn test_nums_to_embs_and_padding() {
        let dir = tempdir().unwrap();
        let mut t = SequenceTransformer::new(TransformerConfig::default()).with_word_embeddings(Some(table(dir.path())));
        let a = RuleAnnotator::new();
        t.make_lexicon(&a, &["cat sat"]).unwrap();
        // cat=2 sat=3
        let EmbeddedSeqs::Ragged(mats) = t.nums_to_embs(&a, &[vec![2, 0, 3], vec![3]], None).unwrap() else {
            panic!("expected ragged");
        };
        assert_eq!(mats[0], array![[1.0f32, 2.0], [0.0, 0.0], [3.0, 4.0]]);

        let padded = SequenceTransformer::pad_embs(&mats, None);
        assert_eq!(padded.shape(), &[2, 3, 2]);
        assert_eq!(padded[[1, 0, 1]], 4.0);
        assert_eq!(padded[[1, 2, 0]], 0.0);

        let cut = SequenceTransformer::pad_embs(&mats, Some(1));
        assert_eq!(cut.shape(), &[2, 1, 2]);
    }
}
