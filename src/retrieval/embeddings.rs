//! Embedding model wrapper for fastembed.
//!
//! Provides a high-level interface for generating raw embeddings:
//! - Model name resolution to a known fastembed model and its dimensions
//! - Model download into a configurable cache directory on first use
//! - Single-text embedding behind a lock (fastembed needs `&mut self`)

use fastembed::{InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Something that maps text to a dense vector of a fixed length.
///
/// The production implementation is [`EmbeddingModel`]; tests swap in
/// deterministic doubles.
pub trait Embedder: Send + Sync {
    /// Model identifier, for logs and health output.
    fn name(&self) -> &str;

    /// Length of every vector returned by [`Embedder::embed`].
    fn dimensions(&self) -> usize;

    /// Embed a single text. The result is not required to be normalized.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Error type for embedding operations
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Invalid model name: {0}")]
    InvalidModel(String),
}

/// A resolved model name: which fastembed model to load and the vector
/// length it produces. Resolving does not touch the network or disk, so it
/// can run at startup to check the model against the index.
#[derive(Debug, Clone)]
pub struct ModelSpec {
    name: String,
    model: fastembed::EmbeddingModel,
    dimensions: usize,
}

impl ModelSpec {
    /// Parse a model name into a known fastembed model.
    pub fn parse(name: &str) -> Result<Self, EmbeddingError> {
        let (model, dimensions) = match name.to_lowercase().as_str() {
            "all-mpnet-base-v2" | "allmpnetbasev2" => {
                (fastembed::EmbeddingModel::AllMpnetBaseV2, 768)
            }
            "all-minilm-l6-v2" | "allminiml6v2" => {
                (fastembed::EmbeddingModel::AllMiniLML6V2, 384)
            }
            "all-minilm-l6-v2-q" | "allminiml6v2q" => {
                (fastembed::EmbeddingModel::AllMiniLML6V2Q, 384)
            }
            "bge-small-en-v1.5" | "bgesmallenv15" => {
                (fastembed::EmbeddingModel::BGESmallENV15, 384)
            }
            "bge-base-en-v1.5" | "bgebaseenv15" => {
                (fastembed::EmbeddingModel::BGEBaseENV15, 768)
            }
            "bge-large-en-v1.5" | "bgelargeenv15" => {
                (fastembed::EmbeddingModel::BGELargeENV15, 1024)
            }
            _ => {
                return Err(EmbeddingError::InvalidModel(format!(
                    "Unknown model: {}. Supported models: all-mpnet-base-v2, all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5",
                    name
                )))
            }
        };

        Ok(Self {
            name: name.to_string(),
            model,
            dimensions,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Wrapper around fastembed's TextEmbedding model.
/// Uses a Mutex because fastembed's embed() requires &mut self.
pub struct EmbeddingModel {
    model: Mutex<TextEmbedding>,
    spec: ModelSpec,
}

impl EmbeddingModel {
    /// Load the model described by `spec`.
    ///
    /// The model will be downloaded on first use if not cached.
    /// Models are cached in the `models/` subdirectory of `cache_dir`.
    ///
    /// # Arguments
    /// * `spec` - Resolved model name
    /// * `cache_dir` - Directory to cache downloaded models
    pub fn load(spec: ModelSpec, cache_dir: PathBuf) -> Result<Self, EmbeddingError> {
        let models_dir = cache_dir.join("models");
        std::fs::create_dir_all(&models_dir).map_err(|e| {
            EmbeddingError::InitFailed(format!("Failed to create models directory: {}", e))
        })?;

        log::info!("Loading embedding model '{}'", spec.name);

        let options = InitOptions::new(spec.model.clone())
            .with_cache_dir(models_dir)
            .with_show_download_progress(false);

        let model = TextEmbedding::try_new(options)
            .map_err(|e| EmbeddingError::InitFailed(e.to_string()))?;

        Ok(Self {
            model: Mutex::new(model),
            spec,
        })
    }
}

impl Embedder for EmbeddingModel {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn dimensions(&self) -> usize {
        self.spec.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut model = lock_recovering(&self.model);

        let embeddings = model
            .embed(vec![text], None)
            .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))?;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::EmbeddingFailed("No embedding returned".to_string()))
    }
}

/// Lock the model even if an earlier embed panicked while holding it.
///
/// The session keeps no per-call state, so a poisoned lock still guards a
/// usable model and later queries must not fail forever.
fn lock_recovering<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        log::warn!("embedding model lock was poisoned, recovering");
        PoisonError::into_inner(poisoned)
    })
}
