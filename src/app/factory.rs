use crate::{
    app::errors::StartupError,
    catalog::Catalog,
    config::Config,
    retrieval::{
        IndexError, IndexStorage, IndexStorageError, ModelSpec, RetrievalService, TextEncoder,
        VectorSearch,
    },
};
use homedir::my_home;
use std::path::PathBuf;
use std::sync::Arc;

/// Application factory for loading configuration and building the
/// retrieval service.
///
/// Everything here runs once at startup. Any error means no query may be
/// served.
pub struct AppFactory;

impl AppFactory {
    /// Load config and build a ready service from the default base path.
    pub fn create_service() -> Result<(Config, RetrievalService), StartupError> {
        let base_path = Self::get_base_path()?;
        let config = Config::load_with(&base_path)?;
        let service = Self::build_service(&config)?;
        Ok((config, service))
    }

    /// Build the service with the configured fastembed model.
    ///
    /// The model name is resolved and checked against the index before
    /// anything is downloaded. With `preload_model` the model is loaded here
    /// too, otherwise on the first query.
    pub fn build_service(config: &Config) -> Result<RetrievalService, StartupError> {
        let spec = ModelSpec::parse(&config.retrieval.model).map_err(StartupError::Model)?;
        let encoder = TextEncoder::fastembed(spec, config.base_path().to_path_buf());

        let service = Self::build_service_with(config, encoder)?;

        if config.retrieval.preload_model {
            service.warm_up().map_err(StartupError::ModelLoad)?;
        }

        Ok(service)
    }

    /// Build the service around the given encoder: load the index and the
    /// catalog and check that they fit together.
    pub fn build_service_with(
        config: &Config,
        encoder: TextEncoder,
    ) -> Result<RetrievalService, StartupError> {
        let storage = IndexStorage::new(config.index_path());
        if !storage.exists() {
            log::error!(
                "No vector index at {}, set retrieval.index_path in {}",
                storage.path().display(),
                config.base_path().join("config.yaml").display()
            );
        }
        let index = storage.load()?;
        log::info!(
            "Loaded {} vectors ({} dimensions) from {}",
            index.len(),
            index.dimensions(),
            storage.path().display()
        );

        let catalog = Catalog::load(&config.dataset_path(), config.retrieval.dataset_limit)?;
        log::info!("Loaded {} products", catalog.len());

        let model = encoder.name().to_string();
        let service = RetrievalService::new(encoder, Arc::new(index), Arc::new(catalog))
            .map_err(|err| match err {
                IndexError::DimensionMismatch { expected, got } => {
                    StartupError::DimensionMismatch {
                        model,
                        model_dims: got,
                        index_dims: expected,
                    }
                }
                other => StartupError::Index(IndexStorageError::from(other)),
            })?
            .with_refill_filtered(config.retrieval.refill_filtered);

        Ok(service)
    }

    /// Get the base path for the application
    pub fn get_base_path() -> Result<PathBuf, StartupError> {
        if let Ok(base_path) = std::env::var("STYLE_GURU_BASE_PATH") {
            return Ok(PathBuf::from(base_path));
        }

        let home = my_home().ok().flatten().ok_or(StartupError::NoHomeDir)?;
        Ok(home.join(".local/share/style-guru"))
    }
}
