use crate::{
    catalog::CatalogError,
    config::ConfigError,
    retrieval::{EmbeddingError, EncodingError, IndexStorageError},
};

/// Failures that stop the service before any query is accepted.
#[derive(thiserror::Error, Debug)]
pub enum StartupError {
    #[error("could not determine home directory, set STYLE_GURU_BASE_PATH")]
    NoHomeDir,

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("embedding model cannot be resolved: {0}")]
    Model(#[source] EmbeddingError),

    #[error("embedding model failed to load: {0}")]
    ModelLoad(#[source] EncodingError),

    #[error("vector index unavailable: {0}")]
    Index(#[from] IndexStorageError),

    #[error("product catalog unavailable: {0}")]
    Catalog(#[from] CatalogError),

    #[error("model '{model}' produces {model_dims}-dimensional vectors but the index holds {index_dims}-dimensional vectors")]
    DimensionMismatch {
        model: String,
        model_dims: usize,
        index_dims: usize,
    },
}
