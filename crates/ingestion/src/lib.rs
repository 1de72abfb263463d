//! Stormwatch Ingestion Library
//!
//! Offline build phase of the alert RAG pipeline:
//! records → documents → chunks → embeddings → vector index.

pub mod chunker;
pub mod document;
pub mod errors;
pub mod loader;
pub mod processor;

pub use chunker::Chunker;
pub use document::build_document;
pub use errors::IngestionError;
pub use loader::{load_records, read_records};
pub use processor::{BuildReport, IndexBuilder};
