//! Retrieval over the alert vector index
//!
//! A retriever embeds the query with the same provider that built the index
//! and returns the `k` most similar chunks.

mod vector;

pub use vector::{open_retriever, VectorRetriever};

use serde::{Deserialize, Serialize};
use stormwatch_common::errors::Result;
use stormwatch_common::index::ScoredChunk;

/// Chunks retrieved for one query, most to least similar
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Query text
    pub query: String,

    /// Retrieved chunks with their similarity scores
    pub hits: Vec<ScoredChunk>,
}

impl RetrievalResult {
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Most similar chunk
    pub fn top(&self) -> Option<&ScoredChunk> {
        self.hits.first()
    }

    /// Chunk texts in rank order
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.hits.iter().map(|hit| hit.chunk.text.as_str())
    }
}

/// Common trait for retrievers
#[async_trait::async_trait]
pub trait Retriever: Send + Sync {
    /// Retrieve at most `k()` chunks for the query
    async fn retrieve(&self, query: &str) -> Result<RetrievalResult>;

    /// Fixed result bound
    fn k(&self) -> usize;
}
