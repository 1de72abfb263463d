//! Stormwatch Common Library
//!
//! Shared code for all Stormwatch crates including:
//! - Alert, document, and chunk models
//! - Embedding provider abstraction
//! - Persisted vector index
//! - Error types and handling
//! - Configuration management
//! - Metrics and logging setup

pub mod config;
pub mod embeddings;
pub mod errors;
pub mod index;
pub mod metrics;
pub mod models;
pub mod telemetry;

// Re-export commonly used types
pub use errors::{AppError, Result};
pub use config::AppConfig;
pub use embeddings::Embedder;
pub use index::{BuildMode, IndexEntry, ScoredChunk, VectorIndex};
pub use models::{AlertRecord, Chunk, Document, DocumentMetadata};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "hashing-v1";

/// Default embedding dimension
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 384;

/// Default number of chunks handed to the generation step
pub const DEFAULT_TOP_K: usize = 3;
