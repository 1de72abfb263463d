//! Vector similarity retrieval
//!
//! Composes an embedding provider with a persisted vector index.

use super::{RetrievalResult, Retriever};
use std::sync::Arc;
use std::time::Instant;
use stormwatch_common::config::AppConfig;
use stormwatch_common::embeddings::{create_embedder, Embedder};
use stormwatch_common::errors::{AppError, Result};
use stormwatch_common::index::VectorIndex;
use tracing::{debug, info, instrument};

/// Top-k retriever over a vector index
pub struct VectorRetriever {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    k: usize,
}

impl VectorRetriever {
    /// Create a retriever. Fails if `k` is zero or the index was built by a
    /// different embedding model.
    pub fn new(index: Arc<VectorIndex>, embedder: Arc<dyn Embedder>, k: usize) -> Result<Self> {
        if k == 0 {
            return Err(AppError::config("retrieval k must be at least 1"));
        }
        index.ensure_model(&embedder.identity(), embedder.dimension())?;

        Ok(Self { index, embedder, k })
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }
}

#[async_trait::async_trait]
impl Retriever for VectorRetriever {
    #[instrument(level = "debug", skip(self), fields(k = self.k))]
    async fn retrieve(&self, query: &str) -> Result<RetrievalResult> {
        let start = Instant::now();

        self.index
            .ensure_model(&self.embedder.identity(), self.embedder.dimension())?;

        let embedding = self.embedder.embed(query).await?;
        let hits = self.index.query(&embedding, self.k)?;

        debug!(
            hits = hits.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Vector retrieval complete"
        );

        Ok(RetrievalResult {
            query: query.to_string(),
            hits,
        })
    }

    fn k(&self) -> usize {
        self.k
    }
}

/// Open the configured index with the configured embedding provider
pub async fn open_retriever(config: &AppConfig) -> Result<VectorRetriever> {
    let embedder = create_embedder(&config.embedding)?;
    let index = VectorIndex::open(&config.index.path).await?;

    info!(
        path = %config.index.path.display(),
        model = %embedder.identity(),
        entries = index.len(),
        k = config.retrieval.top_k,
        "Retriever ready"
    );

    VectorRetriever::new(Arc::new(index), embedder, config.retrieval.top_k)
}
