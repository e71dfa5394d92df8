//! Query text encoder.
//!
//! Wraps an [`Embedder`] with:
//! - Lazy, at-most-once model loading shared by every caller
//! - L2 normalization so query vectors match the indexed vectors' convention

use once_cell::sync::OnceCell;
use std::path::PathBuf;

use crate::retrieval::embeddings::{Embedder, EmbeddingError, EmbeddingModel, ModelSpec};

type Loader = Box<dyn Fn() -> Result<Box<dyn Embedder>, EmbeddingError> + Send + Sync>;

/// Errors surfaced to a single query when its text cannot be encoded.
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    #[error("embedding model unavailable: {0}")]
    ModelUnavailable(#[source] EmbeddingError),

    #[error("failed to encode query: {0}")]
    Failed(#[source] EmbeddingError),

    #[error("model returned {got} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// A unit-length query embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryVector(Vec<f32>);

impl QueryVector {
    /// Normalize `values` in place and wrap them.
    ///
    /// A zero vector stays zero; there is no direction to preserve.
    pub fn normalized(mut values: Vec<f32>) -> Self {
        l2_normalize_in_place(&mut values);
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn dimensions(&self) -> usize {
        self.0.len()
    }

    pub fn norm(&self) -> f32 {
        self.0.iter().map(|x| x * x).sum::<f32>().sqrt()
    }
}

/// Encodes query text into [`QueryVector`]s.
///
/// The model is created by a loader on first use. Concurrent first calls
/// block on one another and the loader runs at most once; if it fails the
/// cell stays empty and the next call tries again.
pub struct TextEncoder {
    name: String,
    dimensions: usize,
    loader: Loader,
    model: OnceCell<Box<dyn Embedder>>,
}

impl TextEncoder {
    /// Encoder backed by fastembed, downloading into `cache_dir` if needed.
    pub fn fastembed(spec: ModelSpec, cache_dir: PathBuf) -> Self {
        let name = spec.name().to_string();
        let dimensions = spec.dimensions();

        Self::with_loader(name, dimensions, move || {
            let model = EmbeddingModel::load(spec.clone(), cache_dir.clone())?;
            Ok(Box::new(model) as Box<dyn Embedder>)
        })
    }

    /// Encoder with a custom loader. `dimensions` is what the loaded model
    /// is expected to produce.
    pub fn with_loader<F>(name: impl Into<String>, dimensions: usize, loader: F) -> Self
    where
        F: Fn() -> Result<Box<dyn Embedder>, EmbeddingError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            dimensions,
            loader: Box::new(loader),
            model: OnceCell::new(),
        }
    }

    /// Encoder around an already loaded embedder.
    pub fn from_embedder(embedder: Box<dyn Embedder>) -> Self {
        let encoder = Self {
            name: embedder.name().to_string(),
            dimensions: embedder.dimensions(),
            loader: Box::new(|| {
                Err(EmbeddingError::InitFailed(
                    "encoder was built from a preloaded embedder".to_string(),
                ))
            }),
            model: OnceCell::new(),
        };
        let _ = encoder.model.set(embedder);
        encoder
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dimensions every encoded vector will have.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn is_loaded(&self) -> bool {
        self.model.get().is_some()
    }

    /// Load the model now instead of on the first query.
    pub fn warm_up(&self) -> Result<(), EncodingError> {
        self.model().map(|_| ())
    }

    /// Encode `text` into a unit-length vector.
    ///
    /// Empty text is accepted; the model still produces a vector for it.
    pub fn encode(&self, text: &str) -> Result<QueryVector, EncodingError> {
        let model = self.model()?;
        let raw = model.embed(text).map_err(EncodingError::Failed)?;

        if raw.len() != self.dimensions {
            return Err(EncodingError::DimensionMismatch {
                expected: self.dimensions,
                got: raw.len(),
            });
        }

        Ok(QueryVector::normalized(raw))
    }

    fn model(&self) -> Result<&dyn Embedder, EncodingError> {
        self.model
            .get_or_try_init(|| {
                (self.loader)().inspect(|_| log::info!("Embedding model '{}' ready", self.name))
            })
            .map(|model| model.as_ref())
            .map_err(EncodingError::ModelUnavailable)
    }
}

/// In-place L2 normalization. Zero vectors are left untouched.
pub(crate) fn l2_normalize_in_place(v: &mut [f32]) {
    let norm_sq: f32 = v.iter().map(|x| x * x).sum();
    if norm_sq > 0.0 {
        let inv_norm = norm_sq.sqrt().recip();
        for x in v.iter_mut() {
            *x *= inv_norm;
        }
    }
}
