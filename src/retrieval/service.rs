//! Retrieval service for product search.
//!
//! Runs the whole pipeline for one query:
//! - Encodes the query text with the shared, lazily loaded model
//! - Searches the read-only index for the nearest product vectors
//! - Scores, joins and filters the hits against the catalog
//!
//! Everything the service holds is immutable after construction, so one
//! instance is shared across threads behind an `Arc`.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::retrieval::encoder::{EncodingError, TextEncoder};
use crate::retrieval::index::{IndexError, VectorSearch};
use crate::retrieval::ranker::{rank, GenderFilter, RankedResult};

/// How many more candidates to fetch when refilling filtered results
const REFILL_FACTOR: usize = 4;

/// A single search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    pub k: usize,
    #[serde(default)]
    pub gender: GenderFilter,
}

impl Query {
    pub fn new(text: impl Into<String>, k: usize, gender: GenderFilter) -> Self {
        Self {
            text: text.into(),
            k,
            gender,
        }
    }
}

/// Errors that fail a single query. None of them affect other queries.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("k must be at least 1")]
    InvalidK,

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error("index search failed: {0}")]
    Index(#[from] IndexError),
}

/// Service answering product queries.
pub struct RetrievalService {
    encoder: TextEncoder,
    index: Arc<dyn VectorSearch>,
    catalog: Arc<Catalog>,
    /// Over-fetch when a gender filter is set so filtering can still fill k
    refill_filtered: bool,
}

impl RetrievalService {
    /// Create a service over a loaded index and catalog.
    ///
    /// Fails if the encoder's vectors cannot be compared with the index.
    pub fn new(
        encoder: TextEncoder,
        index: Arc<dyn VectorSearch>,
        catalog: Arc<Catalog>,
    ) -> Result<Self, IndexError> {
        if encoder.dimensions() != index.dimensions() {
            return Err(IndexError::DimensionMismatch {
                expected: index.dimensions(),
                got: encoder.dimensions(),
            });
        }

        if index.len() > catalog.len() {
            log::warn!(
                "index holds {} vectors but catalog only {} rows, extra hits will be dropped",
                index.len(),
                catalog.len()
            );
        }

        Ok(Self {
            encoder,
            index,
            catalog,
            refill_filtered: false,
        })
    }

    pub fn with_refill_filtered(mut self, refill_filtered: bool) -> Self {
        self.refill_filtered = refill_filtered;
        self
    }

    pub fn model_name(&self) -> &str {
        self.encoder.name()
    }

    pub fn dimensions(&self) -> usize {
        self.index.dimensions()
    }

    pub fn indexed_count(&self) -> usize {
        self.index.len()
    }

    pub fn product_count(&self) -> usize {
        self.catalog.len()
    }

    pub fn is_model_loaded(&self) -> bool {
        self.encoder.is_loaded()
    }

    /// Load the embedding model now rather than on the first query.
    pub fn warm_up(&self) -> Result<(), EncodingError> {
        self.encoder.warm_up()
    }

    /// Find the products closest to the query text.
    ///
    /// # Returns
    /// At most `k` rows, highest score first. An empty result is a valid
    /// answer, e.g. when the filter removes every candidate.
    pub fn search(&self, query: &Query) -> Result<RankedResult, QueryError> {
        if query.k == 0 {
            return Err(QueryError::InvalidK);
        }

        let vector = self.encoder.encode(&query.text)?;

        let fetch = if self.refill_filtered && query.gender != GenderFilter::All {
            query.k.saturating_mul(REFILL_FACTOR)
        } else {
            query.k
        };

        let neighbors = self.index.search(vector.as_slice(), fetch)?;
        let mut results = rank(&neighbors, fetch, &self.catalog, query.gender);
        results.truncate(query.k);

        log::debug!(
            "query k={} gender={} fetched={} returned={}",
            query.k,
            query.gender,
            neighbors.len(),
            results.len()
        );

        Ok(results)
    }
}
