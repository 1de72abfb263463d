//! Index build pipeline
//!
//! Drives one offline build: load records, build documents, chunk, embed in
//! batches and persist the vector index. Every record is validated before
//! the index location is touched.

use crate::chunker::Chunker;
use crate::document::build_document;
use crate::errors::Result;
use crate::loader::load_records;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use stormwatch_common::config::AppConfig;
use stormwatch_common::embeddings::{create_embedder, ensure_dimensions, Embedder};
use stormwatch_common::index::{BuildMode, IndexEntry, VectorIndex};
use stormwatch_common::metrics;
use stormwatch_common::models::{AlertRecord, Document};
use tracing::{debug, info, instrument};

/// Summary of a completed build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub records: usize,
    pub documents: usize,
    pub chunks: usize,
    pub index_path: PathBuf,
    pub model: String,
}

/// Offline index builder
pub struct IndexBuilder {
    embedder: Arc<dyn Embedder>,
    chunker: Chunker,
    batch_size: usize,
    mode: BuildMode,
}

impl IndexBuilder {
    pub fn new(embedder: Arc<dyn Embedder>, chunker: Chunker) -> Self {
        Self {
            embedder,
            chunker,
            batch_size: 64,
            mode: BuildMode::default(),
        }
    }

    /// Builder wired from application configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let chunker = Chunker::new(config.ingestion.chunk_size, config.ingestion.chunk_overlap)?;
        Ok(Self::new(embedder, chunker)
            .with_batch_size(config.embedding.batch_size)
            .with_mode(config.ingestion.build_mode))
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_mode(mut self, mode: BuildMode) -> Self {
        self.mode = mode;
        self
    }

    /// Build the index at `index_dir` from the CSV at `csv_path`
    #[instrument(skip(self, csv_path, index_dir), fields(csv = %csv_path.display(), index = %index_dir.display()))]
    pub async fn run(&self, csv_path: &Path, index_dir: &Path) -> Result<BuildReport> {
        let records = load_records(csv_path)?;
        self.build(&records, index_dir).await
    }

    /// Build the index from already-loaded records
    pub async fn build(&self, records: &[AlertRecord], index_dir: &Path) -> Result<BuildReport> {
        let start = Instant::now();

        let documents = records
            .iter()
            .map(build_document)
            .collect::<std::result::Result<Vec<Document>, _>>()?;
        info!(documents = documents.len(), "Documents built");

        let chunks = self.chunker.chunk_all(&documents);
        info!(chunks = chunks.len(), "Documents chunked");

        let mut entries = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;
            ensure_dimensions(&embeddings, self.embedder.dimension())?;

            entries.extend(
                batch
                    .iter()
                    .cloned()
                    .zip(embeddings)
                    .map(|(chunk, embedding)| IndexEntry::new(chunk, embedding)),
            );
            debug!(embedded = entries.len(), total = chunks.len(), "Embedding batch complete");
        }

        let chunk_count = entries.len();
        VectorIndex::build(
            index_dir,
            &self.embedder.identity(),
            self.embedder.dimension(),
            entries,
            self.mode,
        )
        .await?;

        metrics::record_build(start.elapsed().as_secs_f64(), chunk_count, self.mode.as_str());

        let report = BuildReport {
            records: records.len(),
            documents: documents.len(),
            chunks: chunk_count,
            index_path: index_dir.to_path_buf(),
            model: self.embedder.identity(),
        };

        info!(
            records = report.records,
            chunks = report.chunks,
            model = %report.model,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Index build complete"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::IngestionError;
    use stormwatch_common::embeddings::HashingEmbedder;
    use stormwatch_common::errors::AppError;
    use stormwatch_search::retrieval::{Retriever, VectorRetriever};
    use tokio_test::assert_ok;

    const HEADER: &str = "id,event,severity,areaDesc,headline,description";

    fn embedder(model: &str) -> Arc<dyn Embedder> {
        Arc::new(HashingEmbedder::new(model, 256).unwrap())
    }

    fn builder() -> IndexBuilder {
        IndexBuilder::new(embedder("hashing-v1"), Chunker::new(500, 50).unwrap())
    }

    fn write_csv(dir: &Path, rows: &[&str]) -> PathBuf {
        let path = dir.join("alerts.csv");
        let mut contents = format!("{}\n", HEADER);
        for row in rows {
            contents.push_str(row);
            contents.push('\n');
        }
        std::fs::write(&path, contents).unwrap();
        path
    }

    async fn retriever(index_dir: &Path, model: &str, k: usize) -> stormwatch_common::Result<VectorRetriever> {
        let index = Arc::new(VectorIndex::open(index_dir).await?);
        VectorRetriever::new(index, embedder(model), k)
    }

    #[tokio::test]
    async fn test_single_alert_is_retrieved() {
        let dir = tempfile::tempdir().unwrap();
        let csv = write_csv(
            dir.path(),
            &["A1,Winter Storm Watch,Severe,Test County,Test Alert,Heavy snow expected"],
        );
        let index_dir = dir.path().join("index");

        let report = assert_ok!(builder().run(&csv, &index_dir).await);
        assert_eq!(report.records, 1);
        assert_eq!(report.chunks, 1);
        assert_eq!(report.model, "hashing:hashing-v1");

        let retriever = retriever(&index_dir, "hashing-v1", 3).await.unwrap();
        let result = retriever.retrieve("snow in Test County").await.unwrap();
        assert_eq!(result.top().map(|hit| hit.chunk.metadata.id.as_str()), Some("A1"));
    }

    #[tokio::test]
    async fn test_zero_records_query_is_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let csv = write_csv(dir.path(), &[]);
        let index_dir = dir.path().join("index");

        let report = builder().run(&csv, &index_dir).await.unwrap();
        assert_eq!(report.chunks, 0);

        let retriever = retriever(&index_dir, "hashing-v1", 3).await.unwrap();
        assert!(matches!(
            retriever.retrieve("snow").await,
            Err(AppError::EmptyIndex)
        ));
    }

    #[tokio::test]
    async fn test_self_retrieval_and_k_bound() {
        let dir = tempfile::tempdir().unwrap();
        let csv = write_csv(
            dir.path(),
            &[
                "A1,Winter Storm Watch,Severe,Test County,Test Alert,Heavy snow expected",
                "A2,Excessive Heat Warning,Extreme,Maricopa,Heat Alert,Dangerous heat index values",
                "A3,Flood Warning,Moderate,Lee County,Flood Alert,River flooding along the banks",
                "A4,Red Flag Warning,Severe,Big Sur,Fire Alert,Gusty winds and low humidity",
            ],
        );
        let index_dir = dir.path().join("index");
        builder().run(&csv, &index_dir).await.unwrap();

        let index = VectorIndex::open(&index_dir).await.unwrap();
        let target = index.entries()[2].chunk.clone();
        let vector = embedder("hashing-v1").embed(&target.text).await.unwrap();
        let hits = index.query(&vector, 1).unwrap();
        assert_eq!(hits[0].chunk, target);

        let retriever = retriever(&index_dir, "hashing-v1", 2).await.unwrap();
        let result = retriever.retrieve("weather").await.unwrap();
        assert!(result.len() <= 2);
    }

    #[tokio::test]
    async fn test_model_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let csv = write_csv(
            dir.path(),
            &["A1,Winter Storm Watch,Severe,Test County,Test Alert,Heavy snow expected"],
        );
        let index_dir = dir.path().join("index");
        builder().run(&csv, &index_dir).await.unwrap();

        assert!(matches!(
            retriever(&index_dir, "hashing-v2", 3).await,
            Err(AppError::IndexModelMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_schema_leaves_index_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let index_dir = dir.path().join("index");
        let good = write_csv(
            dir.path(),
            &["A1,Winter Storm Watch,Severe,Test County,Test Alert,Heavy snow expected"],
        );
        builder().run(&good, &index_dir).await.unwrap();

        let bad = dir.path().join("bad.csv");
        std::fs::write(&bad, "id,event\nA9,Tornado Warning\n").unwrap();
        let err = builder().run(&bad, &index_dir).await.unwrap_err();
        assert!(matches!(err, IngestionError::App(AppError::Validation { .. })));

        let index = VectorIndex::open(&index_dir).await.unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.entries()[0].chunk.metadata.id, "A1");
    }

    #[tokio::test]
    async fn test_append_keeps_duplicates_and_replace_does_not() {
        let dir = tempfile::tempdir().unwrap();
        let csv = write_csv(
            dir.path(),
            &["A1,Winter Storm Watch,Severe,Test County,Test Alert,Heavy snow expected"],
        );
        let index_dir = dir.path().join("index");

        let appending = builder().with_mode(BuildMode::Append);
        appending.run(&csv, &index_dir).await.unwrap();
        appending.run(&csv, &index_dir).await.unwrap();
        let index = VectorIndex::open(&index_dir).await.unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.entries()[0].id, index.entries()[1].id);

        builder().run(&csv, &index_dir).await.unwrap();
        assert_eq!(VectorIndex::open(&index_dir).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_long_description_is_chunked_and_batched() {
        let dir = tempfile::tempdir().unwrap();
        let description = "Heavy snow expected. ".repeat(60);
        let row = format!("A1,Winter Storm Watch,Severe,Test County,Test Alert,{}", description);
        let csv = write_csv(dir.path(), &[row.as_str()]);
        let index_dir = dir.path().join("index");

        let report = builder().with_batch_size(1).run(&csv, &index_dir).await.unwrap();
        assert!(report.chunks > 1);

        let index = VectorIndex::open(&index_dir).await.unwrap();
        assert_eq!(index.len(), report.chunks);
        assert!(index.entries().iter().all(|entry| entry.chunk.metadata.id == "A1"));
    }
}
