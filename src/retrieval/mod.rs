//! Nearest-neighbor retrieval for product search.
//!
//! Turns a free-text query into a ranked list of catalog products:
//! text → unit vector → nearest indexed vectors → scored, joined, filtered rows.
//!
//! # Architecture
//!
//! - `embeddings`: Wraps fastembed for embedding generation
//! - `encoder`: Lazily loads the model once and L2-normalizes its output
//! - `index`: Read-only flat L2 index with exhaustive top-k search
//! - `storage`: Loader for the persisted flat index file
//! - `ranker`: Distance → score, catalog join, gender filter
//! - `service`: High-level retrieval service tying the pieces together

pub mod embeddings;
pub mod encoder;
pub mod index;
pub mod ranker;
mod service;
mod storage;

pub use embeddings::{EmbeddingError, EmbeddingModel, ModelSpec};
pub use encoder::{EncodingError, QueryVector, TextEncoder};
pub use index::{FlatIndex, IndexError, Neighbor, VectorSearch};
pub use ranker::{rank, score, CandidateMatch, GenderFilter, RankedResult, RankedRow};
pub use service::{Query, QueryError, RetrievalService};
pub use storage::{IndexStorage, IndexStorageError};

/// Default embedding model name (the model the product vectors were built with)
pub const DEFAULT_MODEL: &str = "all-mpnet-base-v2";
