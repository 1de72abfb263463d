//! Stormwatch Search Library
//!
//! Read-only top-k retrieval over a persisted alert vector index.

pub mod retrieval;

pub use retrieval::{open_retriever, RetrievalResult, Retriever, VectorRetriever};
