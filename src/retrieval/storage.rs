//! Loader for the persisted product vector index.
//!
//! File format: a flat L2 index as written by the ANN library the product
//! vectors were built with. All integers little-endian.
//!
//! Header (37 bytes):
//! - fourcc: [u8; 4] ("IxF2")
//! - dimensions: i32
//! - entry_count: i64
//! - reserved: i64, i64 (ignored)
//! - is_trained: u8
//! - metric: i32 (1 = L2)
//!
//! Body:
//! - float_count: u64 (must equal dimensions * entry_count)
//! - vectors: [f32; float_count], row-major

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::retrieval::index::{FlatIndex, IndexError};

/// Type tag of a flat index using the L2 metric
const FLAT_L2_FOURCC: [u8; 4] = *b"IxF2";

/// Metric id for L2 in the header
const METRIC_L2: i32 = 1;

/// Header size in bytes: fourcc(4) + dimensions(4) + entry_count(8) + reserved(16) + is_trained(1) + metric(4)
const HEADER_SIZE: usize = 37;

/// Size of the float count that precedes the vector data
const COUNT_SIZE: usize = 8;

/// Errors that can occur while loading the index file.
#[derive(Debug, thiserror::Error)]
pub enum IndexStorageError {
    #[error("I/O error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported index type {0:?}, only flat L2 indexes are supported")]
    UnsupportedType(String),

    #[error("Unsupported metric {0}, only L2 (1) is supported")]
    UnsupportedMetric(i32),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Reads a persisted index from disk.
pub struct IndexStorage {
    path: PathBuf,
}

impl IndexStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the whole index into memory.
    pub fn load(&self) -> Result<FlatIndex, IndexStorageError> {
        let file = File::open(&self.path).map_err(|e| self.io_error(e))?;
        let file_len = file.metadata().map_err(|e| self.io_error(e))?.len();
        let mut reader = BufReader::new(file);

        let header = self.read_header(&mut reader)?;
        let body_len = file_len.saturating_sub((HEADER_SIZE + COUNT_SIZE) as u64);
        let data = self.read_vectors(&mut reader, &header, body_len)?;

        Ok(FlatIndex::from_raw(header.dimensions, data)?)
    }

    fn read_header(&self, reader: &mut impl Read) -> Result<Header, IndexStorageError> {
        let mut header_bytes = [0u8; HEADER_SIZE];
        reader
            .read_exact(&mut header_bytes)
            .map_err(|e| self.io_error(e))?;

        if header_bytes[0..4] != FLAT_L2_FOURCC {
            return Err(IndexStorageError::UnsupportedType(
                String::from_utf8_lossy(&header_bytes[0..4]).into_owned(),
            ));
        }

        let dimensions = i32::from_le_bytes(le_array(&header_bytes[4..8]));
        let entry_count = i64::from_le_bytes(le_array(&header_bytes[8..16]));
        // bytes 16..32 are reserved, 32 is is_trained
        let metric = i32::from_le_bytes(le_array(&header_bytes[33..37]));

        if metric != METRIC_L2 {
            return Err(IndexStorageError::UnsupportedMetric(metric));
        }

        let dimensions = usize::try_from(dimensions)
            .ok()
            .filter(|d| *d > 0)
            .ok_or_else(|| {
                IndexStorageError::InvalidFormat(format!("invalid dimension {dimensions}"))
            })?;
        let entry_count = usize::try_from(entry_count).map_err(|_| {
            IndexStorageError::InvalidFormat(format!("invalid entry count {entry_count}"))
        })?;

        Ok(Header {
            dimensions,
            entry_count,
        })
    }

    fn read_vectors(
        &self,
        reader: &mut impl Read,
        header: &Header,
        body_len: u64,
    ) -> Result<Vec<f32>, IndexStorageError> {
        let mut count_bytes = [0u8; COUNT_SIZE];
        reader
            .read_exact(&mut count_bytes)
            .map_err(|e| self.io_error(e))?;
        let float_count = u64::from_le_bytes(count_bytes);

        let expected = header
            .dimensions
            .checked_mul(header.entry_count)
            .ok_or_else(|| IndexStorageError::InvalidFormat("index too large".to_string()))?;

        if float_count != expected as u64 {
            return Err(IndexStorageError::InvalidFormat(format!(
                "header declares {} vectors of {} floats but body holds {} floats",
                header.entry_count, header.dimensions, float_count
            )));
        }

        // never allocate more than the file can hold
        let byte_len = expected
            .checked_mul(std::mem::size_of::<f32>())
            .filter(|len| *len as u64 <= body_len)
            .ok_or_else(|| {
                IndexStorageError::InvalidFormat(format!(
                    "header declares {expected} floats but only {body_len} bytes follow"
                ))
            })?;
        if byte_len as u64 != body_len {
            log::warn!(
                "{} has {} trailing bytes after the vectors",
                self.path.display(),
                body_len - byte_len as u64
            );
        }

        let mut bytes = vec![0u8; byte_len];
        reader.read_exact(&mut bytes).map_err(|e| self.io_error(e))?;

        Ok(bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes(le_array(chunk)))
            .collect())
    }

    fn io_error(&self, source: std::io::Error) -> IndexStorageError {
        IndexStorageError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Parsed file header.
#[derive(Debug)]
struct Header {
    dimensions: usize,
    entry_count: usize,
}

fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::index::VectorSearch;
    use crate::tests::fixtures::{encode_flat_index, write_flat_index};

    #[test]
    fn test_load_with_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("products.index");
        write_flat_index(&path, 3, &[vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);

        let storage = IndexStorage::new(path);
        assert!(storage.exists());

        let index = storage.load().unwrap();
        assert_eq!(index.dimensions(), 3);
        assert_eq!(index.len(), 2);

        let hits = index.search(&[0.0, 1.0, 0.0], 1).unwrap();
        assert_eq!(hits[0].id, 1);
        assert_eq!(hits[0].distance, 0.0);
    }

    #[test]
    fn test_load_empty_index() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("empty.index");
        write_flat_index(&path, 768, &[]);

        let index = IndexStorage::new(path).load().unwrap();
        assert_eq!(index.dimensions(), 768);
        assert!(index.is_empty());
    }

    #[test]
    fn test_missing_file() {
        let storage = IndexStorage::new(PathBuf::from("/nonexistent/products.index"));
        assert!(!storage.exists());
        assert!(matches!(storage.load(), Err(IndexStorageError::Io { .. })));
    }

    #[test]
    fn test_rejects_other_index_types() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ip.index");
        let mut bytes = encode_flat_index(2, &[vec![1.0, 0.0]]);
        bytes[0..4].copy_from_slice(b"IxFI");
        std::fs::write(&path, bytes).unwrap();

        let result = IndexStorage::new(path).load();
        assert!(matches!(result, Err(IndexStorageError::UnsupportedType(t)) if t == "IxFI"));
    }

    #[test]
    fn test_rejects_non_l2_metric() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("metric.index");
        let mut bytes = encode_flat_index(2, &[vec![1.0, 0.0]]);
        bytes[33..37].copy_from_slice(&0i32.to_le_bytes());
        std::fs::write(&path, bytes).unwrap();

        let result = IndexStorage::new(path).load();
        assert!(matches!(result, Err(IndexStorageError::UnsupportedMetric(0))));
    }

    #[test]
    fn test_detects_count_mismatch() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("count.index");
        let mut bytes = encode_flat_index(2, &[vec![1.0, 0.0], vec![0.0, 1.0]]);
        // claim three vectors
        bytes[8..16].copy_from_slice(&3i64.to_le_bytes());
        std::fs::write(&path, bytes).unwrap();

        let result = IndexStorage::new(path).load();
        assert!(matches!(result, Err(IndexStorageError::InvalidFormat(_))));
    }

    #[test]
    fn test_truncated_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("short.index");
        let bytes = encode_flat_index(4, &[vec![0.5; 4], vec![0.25; 4]]);
        std::fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();

        let result = IndexStorage::new(path).load();
        assert!(matches!(result, Err(IndexStorageError::InvalidFormat(_))));
    }

    #[test]
    fn test_truncated_header() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("stub.index");
        std::fs::write(&path, &encode_flat_index(4, &[])[..20]).unwrap();

        let result = IndexStorage::new(path).load();
        assert!(matches!(result, Err(IndexStorageError::Io { .. })));
    }

    /// One-vector index file with its header counts overwritten.
    fn corrupt_counts(path: &Path, dimensions: i32, entries: i64, floats: u64) {
        let mut bytes = encode_flat_index(1, &[vec![0.5]]);
        bytes[4..8].copy_from_slice(&dimensions.to_le_bytes());
        bytes[8..16].copy_from_slice(&entries.to_le_bytes());
        bytes[37..45].copy_from_slice(&floats.to_le_bytes());
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_overflowing_counts_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("overflow.index");
        corrupt_counts(&path, 1, 1 << 62, 1 << 62);

        let result = IndexStorage::new(path).load();
        assert!(matches!(result, Err(IndexStorageError::InvalidFormat(_))));
    }

    #[test]
    fn test_counts_larger_than_file_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("huge.index");
        // ~4 TiB of vectors declared, 4 bytes present
        corrupt_counts(&path, 1024, 1 << 30, 1 << 40);

        let result = IndexStorage::new(path).load();
        assert!(matches!(result, Err(IndexStorageError::InvalidFormat(_))));
    }
}
