// ============================================================
// Layer 6 — Sequence Array Store
// ============================================================
// Encoded or embedded sequence batches saved as one flat,
// memory-mapped matrix so training code can page through
// corpora larger than RAM.
//
// File format: little-endian f64, row-major, no header.
// The reader supplies the shape; without one the file is read
// as a single row.
//
// Reference: memmap2 crate documentation

use anyhow::{bail, ensure, Context, Result};
use memmap2::Mmap;
use ndarray::Array2;
use std::{fs, fs::File, io::Write, path::Path};

const F64_BYTES: usize = std::mem::size_of::<f64>();

/// A read-only `rows × cols` matrix of f64 backed by a mapped file.
#[derive(Debug)]
pub struct SequenceArray {
    mmap: Mmap,
    rows: usize,
    cols: usize,
}

impl SequenceArray {
    /// Write `seqs` in the format [`SequenceArray::load`] maps.
    pub fn write(path: impl AsRef<Path>, seqs: &Array2<f64>) -> Result<()> {
        let path = path.as_ref();
        ensure!(!seqs.is_empty(), "cannot write an empty sequence array");
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create '{}'", parent.display()))?;
        }

        let mut file = File::create(path)
            .with_context(|| format!("Cannot create sequence file '{}'", path.display()))?;
        // iter() walks in logical (row-major) order whatever the memory layout
        let bytes: Vec<u8> = seqs.iter().flat_map(|x| x.to_le_bytes()).collect();
        file.write_all(&bytes)?;
        file.flush()?;

        tracing::info!("Saved {:?} sequence array to '{}'", seqs.dim(), path.display());
        Ok(())
    }

    /// Map a sequence file read-only.
    pub fn load(path: impl AsRef<Path>, shape: Option<(usize, usize)>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Cannot open sequence file '{}'", path.display()))?;
        let len = file.metadata()?.len() as usize;
        if len == 0 || len % F64_BYTES != 0 {
            bail!("sequence file '{}' is {} bytes, not a whole number of f64 values", path.display(), len);
        }
        let n_values = len / F64_BYTES;

        let (rows, cols) = shape.unwrap_or((1, n_values));
        if rows * cols != n_values {
            bail!(
                "sequence file '{}' holds {} values, shape {}x{} needs {}",
                path.display(),
                n_values,
                rows,
                cols,
                rows * cols
            );
        }

        // SAFETY: the file is opened read-only and never written while mapped
        let mmap = unsafe { Mmap::map(&file)? };
        tracing::info!("Loaded sequences from '{}' ({}x{})", path.display(), rows, cols);
        Ok(Self { mmap, rows, cols })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// One row, decoded from the mapped bytes.
    pub fn row(&self, idx: usize) -> Option<Vec<f64>> {
        if idx >= self.rows {
            return None;
        }
        let row_bytes = self.cols * F64_BYTES;
        let bytes = self.mmap.get(idx * row_bytes..(idx + 1) * row_bytes)?;
        Some(decode(bytes))
    }

    /// Copy the whole matrix into memory.
    pub fn to_array(&self) -> Result<Array2<f64>> {
        Ok(Array2::from_shape_vec((self.rows, self.cols), decode(&self.mmap))?)
    }
}

fn decode(bytes: &[u8]) -> Vec<f64> {
    bytes
        .chunks_exact(F64_BYTES)
        .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
        .collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tempfile::tempdir;

    #[test]
    fn test_write_then_map_with_shape() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seqs").join("train.bin");
        let seqs = array![[1.0f64, 2.0, 3.0], [4.0, 5.0, 6.0]];
        SequenceArray::write(&path, &seqs).unwrap();

        let mapped = SequenceArray::load(&path, Some((2, 3))).unwrap();
        assert_eq!(mapped.shape(), (2, 3));
        assert_eq!(mapped.row(1), Some(vec![4.0, 5.0, 6.0]));
        assert!(mapped.row(2).is_none());
        assert_eq!(mapped.to_array().unwrap(), seqs);
    }

    #[test]
    fn test_without_shape_reads_one_row() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flat.bin");
        SequenceArray::write(&path, &array![[1.0f64, 2.0], [3.0, 4.0]]).unwrap();

        let mapped = SequenceArray::load(&path, None).unwrap();
        assert_eq!(mapped.shape(), (1, 4));
        assert_eq!(mapped.row(0), Some(vec![1.0, 2.0, 3.0, 4.0]));
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seqs.bin");
        SequenceArray::write(&path, &array![[1.0f64, 2.0, 3.0]]).unwrap();
        assert!(SequenceArray::load(&path, Some((2, 2))).is_err());
    }

    #[test]
    fn test_partial_value_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seqs.bin");
        fs::write(&path, [0u8; 12]).unwrap();
        assert!(SequenceArray::load(&path, None).is_err());
    }
}
