use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::retrieval::DEFAULT_MODEL;

const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_INDEX_PATH: &str = "vector_store/myntra_embedding_vector_store.index";
const DEFAULT_DATASET_PATH: &str = "Dataset/Myntra Fasion Clothing.csv";
/// The index was built from the first 500 dataset rows
const DEFAULT_DATASET_LIMIT: usize = 500;
const DEFAULT_K: usize = 3;
const MAX_K: usize = 10;
const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config is malformed: {0}")]
    Malformed(#[from] serde_yml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Configuration for the retrieval pipeline
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Model name for embeddings (e.g., "all-mpnet-base-v2")
    #[serde(default = "default_model")]
    pub model: String,

    /// Persisted vector index, relative to the base path unless absolute
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    /// Product dataset (CSV), relative to the base path unless absolute
    #[serde(default = "default_dataset_path")]
    pub dataset_path: PathBuf,

    /// Only the first `dataset_limit` rows are loaded; `null` loads all
    #[serde(default = "default_dataset_limit")]
    pub dataset_limit: Option<usize>,

    #[serde(default = "default_k")]
    pub default_k: usize,

    #[serde(default = "max_k")]
    pub max_k: usize,

    /// Load the embedding model at startup instead of on the first query
    #[serde(default = "default_true")]
    pub preload_model: bool,

    /// Fetch extra candidates when a gender filter is set
    #[serde(default)]
    pub refill_filtered: bool,

    /// Per-query deadline for the daemon
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            index_path: default_index_path(),
            dataset_path: default_dataset_path(),
            dataset_limit: default_dataset_limit(),
            default_k: DEFAULT_K,
            max_k: MAX_K,
            preload_model: true,
            refill_filtered: false,
            query_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
        }
    }
}

impl RetrievalConfig {
    /// Clamp a requested result count into `1..=max_k`, falling back to
    /// `default_k` when none was given.
    pub fn clamp_k(&self, k: Option<usize>) -> usize {
        k.unwrap_or(self.default_k).clamp(1, self.max_k)
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_index_path() -> PathBuf {
    PathBuf::from(DEFAULT_INDEX_PATH)
}

fn default_dataset_path() -> PathBuf {
    PathBuf::from(DEFAULT_DATASET_PATH)
}

fn default_dataset_limit() -> Option<usize> {
    Some(DEFAULT_DATASET_LIMIT)
}

fn default_k() -> usize {
    DEFAULT_K
}

fn max_k() -> usize {
    MAX_K
}

fn default_true() -> bool {
    true
}

fn default_query_timeout_secs() -> u64 {
    DEFAULT_QUERY_TIMEOUT_SECS
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Config {
    fn validate(&self) -> Result<(), ConfigError> {
        let r = &self.retrieval;

        if r.max_k == 0 {
            return Err(ConfigError::Invalid(
                "retrieval.max_k must be greater than 0".to_string(),
            ));
        }

        if !(1..=r.max_k).contains(&r.default_k) {
            return Err(ConfigError::Invalid(format!(
                "retrieval.default_k must be between 1 and {}, got {}",
                r.max_k, r.default_k
            )));
        }

        if r.query_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "retrieval.query_timeout_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Load `config.yaml` from `base_path`, writing the defaults first if
    /// the file does not exist.
    pub fn load_with(base_path: &Path) -> Result<Self, ConfigError> {
        std::fs::create_dir_all(base_path)?;
        let path = base_path.join(CONFIG_FILE);

        // create new if does not exist
        if !path.exists() {
            std::fs::write(&path, serde_yml::to_string(&Self::default())?)?;
        }

        let config_str = std::fs::read_to_string(&path)?;
        let mut config: Self = serde_yml::from_str(&config_str)?;

        config.base_path = base_path.to_path_buf();
        config.validate()?;

        Ok(config)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolve a configured path against the base path.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }

    pub fn index_path(&self) -> PathBuf {
        self.resolve(&self.retrieval.index_path)
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.resolve(&self.retrieval.dataset_path)
    }
}
