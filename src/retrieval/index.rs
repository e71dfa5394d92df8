//! Read-only vector index with exact L2 search.
//!
//! Holds the pre-embedded product vectors in one contiguous buffer, row `i`
//! belonging to catalog row `i`.

use std::cmp::Ordering;

/// One retrieval hit: a row id and its distance from the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Squared Euclidean distance to the query
    pub distance: f32,
    /// Row id in the index (and catalog) id space
    pub id: i64,
}

/// Nearest-neighbor lookup over a fixed set of vectors.
///
/// Implementations are immutable once built and safe to query from many
/// threads at once.
pub trait VectorSearch: Send + Sync {
    /// Vector length the index was built with.
    fn dimensions(&self) -> usize;

    /// Number of indexed vectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return at most `k` neighbors of `query`, nearest first.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError>;
}

/// Exhaustive L2 index.
///
/// Distances are squared Euclidean, matching the files the index is loaded
/// from. On unit vectors this is `2 - 2 * cosine`.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimensions: usize,
    /// Row-major, `len * dimensions` floats
    data: Vec<f32>,
}

impl FlatIndex {
    /// Build an index from row-major vector data.
    pub fn from_raw(dimensions: usize, data: Vec<f32>) -> Result<Self, IndexError> {
        if dimensions == 0 {
            return Err(IndexError::ZeroDimensions);
        }
        if data.len() % dimensions != 0 {
            return Err(IndexError::RaggedData {
                dimensions,
                floats: data.len(),
            });
        }

        Ok(Self { dimensions, data })
    }

    /// Build an index from individual vectors, each becoming the next row.
    pub fn from_rows(dimensions: usize, rows: &[Vec<f32>]) -> Result<Self, IndexError> {
        let mut data = Vec::with_capacity(dimensions * rows.len());
        for row in rows {
            if row.len() != dimensions {
                return Err(IndexError::DimensionMismatch {
                    expected: dimensions,
                    got: row.len(),
                });
            }
            data.extend_from_slice(row);
        }

        Self::from_raw(dimensions, data)
    }

    fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.dimensions)
    }

    fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| {
                let d = x - y;
                d * d
            })
            .sum()
    }
}

impl VectorSearch for FlatIndex {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn len(&self) -> usize {
        self.data.len() / self.dimensions
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        if query.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: query.len(),
            });
        }

        if k == 0 {
            return Ok(vec![]);
        }

        let mut neighbors: Vec<Neighbor> = self
            .rows()
            .enumerate()
            .map(|(id, row)| Neighbor {
                distance: Self::squared_l2(query, row),
                id: id as i64,
            })
            .collect();

        // Nearest first; equal distances keep the lower id first
        let by_distance = |a: &Neighbor, b: &Neighbor| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(Ordering::Equal)
                .then(a.id.cmp(&b.id))
        };

        if k < neighbors.len() {
            neighbors.select_nth_unstable_by(k - 1, by_distance);
            neighbors.truncate(k);
        }
        neighbors.sort_by(by_distance);

        Ok(neighbors)
    }
}

/// Errors that can occur during index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Index dimension must be greater than zero")]
    ZeroDimensions,

    #[error("{floats} floats do not divide into rows of {dimensions}")]
    RaggedData { dimensions: usize, floats: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_axes() -> FlatIndex {
        FlatIndex::from_rows(
            3,
            &[
                vec![1.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0],
                vec![0.0, 0.0, 1.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_new_index() {
        let index = unit_axes();
        assert_eq!(index.dimensions(), 3);
        assert_eq!(index.len(), 3);
        assert!(!index.is_empty());
    }

    #[test]
    fn test_from_rows_dimension_mismatch() {
        let result = FlatIndex::from_rows(3, &[vec![1.0, 0.0, 0.0], vec![1.0, 0.0]]);
        assert!(matches!(
            result,
            Err(IndexError::DimensionMismatch { expected: 3, got: 2 })
        ));
    }

    #[test]
    fn test_from_raw_rejects_ragged_data() {
        let result = FlatIndex::from_raw(3, vec![0.0; 7]);
        assert!(matches!(result, Err(IndexError::RaggedData { .. })));
        assert!(matches!(
            FlatIndex::from_raw(0, vec![]),
            Err(IndexError::ZeroDimensions)
        ));
    }

    #[test]
    fn test_search_exact_match_is_zero_distance() {
        let index = unit_axes();
        let results = index.search(&[0.0, 1.0, 0.0], 1).unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 1);
        assert_eq!(results[0].distance, 0.0);
    }

    #[test]
    fn test_search_reports_squared_distances_nearest_first() {
        let index = unit_axes();
        let results = index.search(&[0.6, 0.8, 0.0], 3).unwrap();

        let ids: Vec<i64> = results.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 0, 2]);
        // |(0.6, -0.2, 0)|^2
        assert!((results[0].distance - 0.4).abs() < 1e-6);
        // |(-0.4, 0.8, 0)|^2
        assert!((results[1].distance - 0.8).abs() < 1e-6);
        assert!((results[2].distance - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_search_with_limit() {
        let rows: Vec<Vec<f32>> = (0..10).map(|i| vec![1.0, i as f32 * 0.1]).collect();
        let index = FlatIndex::from_rows(2, &rows).unwrap();

        let results = index.search(&[1.0, 0.0], 3).unwrap();
        let ids: Vec<i64> = results.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_k_larger_than_index_returns_everything() {
        let index = unit_axes();
        let results = index.search(&[1.0, 0.0, 0.0], 50).unwrap();
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn test_ties_keep_lower_id_first() {
        let rows = [vec![0.0, 1.0], vec![1.0, 0.0], vec![0.0, 1.0]];
        let index = FlatIndex::from_rows(2, &rows).unwrap();
        let results = index.search(&[0.0, 1.0], 2).unwrap();
        let ids: Vec<i64> = results.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![0, 2]);
    }

    #[test]
    fn test_search_dimension_mismatch() {
        let index = unit_axes();
        let result = index.search(&[1.0, 0.0], 1);
        assert!(matches!(result, Err(IndexError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_empty_index_and_zero_k() {
        let index = FlatIndex::from_raw(4, vec![]).unwrap();
        assert!(index.is_empty());
        assert!(index.search(&[0.0; 4], 5).unwrap().is_empty());
        assert!(unit_axes().search(&[1.0, 0.0, 0.0], 0).unwrap().is_empty());
    }
}
