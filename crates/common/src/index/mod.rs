//! Persisted vector index
//!
//! On-disk layout of an index directory:
//! - `manifest.json`: format version, embedding model identity, dimension,
//!   similarity function, entry count, build timestamp
//! - `entries.jsonl`: one `IndexEntry` per line, in insertion order
//!
//! An opened index is immutable and safe to share across threads for
//! concurrent queries. Builds are one-shot batch jobs; concurrent builds
//! into the same directory are unsupported.

use crate::errors::{AppError, Result};
use crate::models::Chunk;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

/// Current on-disk format version
pub const FORMAT_VERSION: u32 = 1;

const MANIFEST_FILE: &str = "manifest.json";
const ENTRIES_FILE: &str = "entries.jsonl";

/// What a build does with entries already persisted at the location
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildMode {
    /// Discard prior entries
    #[default]
    Replace,
    /// Keep prior entries and add the new ones after them; duplicates accumulate
    Append,
}

impl BuildMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildMode::Replace => "replace",
            BuildMode::Append => "append",
        }
    }
}

/// Self-describing header of a persisted index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    /// Embedding identity (`provider:model`) that produced every stored vector
    pub model: String,
    pub dimension: usize,
    pub similarity: String,
    pub entry_count: usize,
    pub built_at: DateTime<Utc>,
}

/// A chunk together with its embedding, keyed by a stable identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

impl IndexEntry {
    pub fn new(chunk: Chunk, embedding: Vec<f32>) -> Self {
        Self {
            id: entry_id(&chunk),
            chunk,
            embedding,
        }
    }
}

/// Stable identifier derived from the source alert id, the chunk position
/// and the chunk text. The same input always maps to the same id.
pub fn entry_id(chunk: &Chunk) -> String {
    let digest = Sha256::new()
        .chain_update(chunk.metadata.id.as_bytes())
        .chain_update([0u8])
        .chain_update(chunk.index.to_le_bytes())
        .chain_update(chunk.text.as_bytes())
        .finalize();
    hex::encode(&digest[..16])
}

/// Query hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Cosine similarity in [-1, 1]
    pub score: f32,
}

/// Cosine similarity; zero when either vector has no magnitude
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Nearest-neighbour index over embedded chunks
#[derive(Debug)]
pub struct VectorIndex {
    manifest: IndexManifest,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Persist `entries` at `dir` and return the resulting index.
    ///
    /// Every entry is checked against `dimension` before anything is
    /// written. In `Append` mode an existing index must share the model
    /// identity and dimension.
    #[instrument(skip(entries, dir), fields(dir = %dir.display(), count = entries.len()))]
    pub async fn build(
        dir: &Path,
        model: &str,
        dimension: usize,
        entries: Vec<IndexEntry>,
        mode: BuildMode,
    ) -> Result<Self> {
        if let Some(bad) = entries.iter().find(|e| e.embedding.len() != dimension) {
            return Err(AppError::DimensionMismatch {
                expected: dimension,
                actual: bad.embedding.len(),
            });
        }

        tokio::fs::create_dir_all(dir).await?;

        let mut all_entries = match mode {
            BuildMode::Replace => Vec::new(),
            BuildMode::Append => match read_manifest(dir).await {
                Ok(existing) => {
                    ensure_identity(&existing, model, dimension)?;
                    read_entries(dir, &existing).await?
                }
                Err(AppError::IndexNotFound { .. }) => Vec::new(),
                Err(e) => return Err(e),
            },
        };

        let previous = all_entries.len();
        if previous > 0 {
            warn!(
                existing = previous,
                appended = entries.len(),
                "Appending to existing index; duplicate inputs are kept"
            );
        }

        let entries_path = dir.join(ENTRIES_FILE);
        match mode {
            BuildMode::Replace => {
                let tmp_path = dir.join(format!("{}.tmp", ENTRIES_FILE));
                let mut file = tokio::fs::File::create(&tmp_path).await?;
                write_entries(&mut file, &entries).await?;
                file.flush().await?;
                drop(file);
                tokio::fs::rename(&tmp_path, &entries_path).await?;
            }
            BuildMode::Append => {
                let mut file = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&entries_path)
                    .await?;
                write_entries(&mut file, &entries).await?;
                file.flush().await?;
            }
        }

        all_entries.extend(entries);

        let manifest = IndexManifest {
            format_version: FORMAT_VERSION,
            model: model.to_string(),
            dimension,
            similarity: "cosine".to_string(),
            entry_count: all_entries.len(),
            built_at: Utc::now(),
        };
        let manifest_json = serde_json::to_vec_pretty(&manifest)?;
        tokio::fs::write(dir.join(MANIFEST_FILE), manifest_json).await?;

        info!(
            model = %manifest.model,
            dimension = manifest.dimension,
            entry_count = manifest.entry_count,
            mode = mode.as_str(),
            "Vector index persisted"
        );

        Ok(Self {
            manifest,
            entries: all_entries,
        })
    }

    /// Reopen a persisted index for querying
    #[instrument(skip(dir), fields(dir = %dir.display()))]
    pub async fn open(dir: &Path) -> Result<Self> {
        let manifest = read_manifest(dir).await?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(AppError::Internal {
                message: format!(
                    "Unsupported index format version {} (expected {})",
                    manifest.format_version, FORMAT_VERSION
                ),
            });
        }

        let entries = read_entries(dir, &manifest).await?;

        info!(
            model = %manifest.model,
            entry_count = entries.len(),
            "Vector index opened"
        );

        Ok(Self {
            manifest,
            entries,
        })
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Fail unless the index was built by the embedding identity `model`
    /// with `dimension`-sized vectors
    pub fn ensure_model(&self, model: &str, dimension: usize) -> Result<()> {
        ensure_identity(&self.manifest, model, dimension)
    }

    /// Return at most `k` chunks ordered by descending cosine similarity.
    /// Equal scores keep insertion order.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if self.entries.is_empty() {
            return Err(AppError::EmptyIndex);
        }
        if vector.len() != self.manifest.dimension {
            return Err(AppError::DimensionMismatch {
                expected: self.manifest.dimension,
                actual: vector.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (position, cosine_similarity(vector, &entry.embedding)))
            .collect();

        // sort_by is stable, so ties stay in insertion order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        let hits: Vec<ScoredChunk> = scored
            .into_iter()
            .take(k)
            .map(|(position, score)| ScoredChunk {
                chunk: self.entries[position].chunk.clone(),
                score,
            })
            .collect();

        debug!(k, hits = hits.len(), "Vector index queried");
        Ok(hits)
    }
}

fn ensure_identity(manifest: &IndexManifest, model: &str, dimension: usize) -> Result<()> {
    if manifest.model != model {
        return Err(AppError::IndexModelMismatch {
            index_model: manifest.model.clone(),
            provider_model: model.to_string(),
        });
    }
    if manifest.dimension != dimension {
        return Err(AppError::DimensionMismatch {
            expected: manifest.dimension,
            actual: dimension,
        });
    }
    Ok(())
}

async fn read_manifest(dir: &Path) -> Result<IndexManifest> {
    let path = dir.join(MANIFEST_FILE);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::IndexNotFound {
                path: dir.display().to_string(),
            });
        }
        Err(e) => return Err(e.into()),
    };
    Ok(serde_json::from_slice(&bytes)?)
}

async fn read_entries(dir: &Path, manifest: &IndexManifest) -> Result<Vec<IndexEntry>> {
    let path = dir.join(ENTRIES_FILE);
    let contents = match tokio::fs::read_to_string(&path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && manifest.entry_count == 0 => {
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut entries = Vec::with_capacity(manifest.entry_count);
    for line in contents.lines().filter(|line| !line.trim().is_empty()) {
        let entry: IndexEntry = serde_json::from_str(line)?;
        if entry.embedding.len() != manifest.dimension {
            return Err(AppError::DimensionMismatch {
                expected: manifest.dimension,
                actual: entry.embedding.len(),
            });
        }
        entries.push(entry);
    }

    if entries.len() != manifest.entry_count {
        return Err(AppError::Internal {
            message: format!(
                "Index at {} is inconsistent: manifest lists {} entries, found {}",
                dir.display(),
                manifest.entry_count,
                entries.len()
            ),
        });
    }

    Ok(entries)
}

async fn write_entries(file: &mut tokio::fs::File, entries: &[IndexEntry]) -> Result<()> {
    let mut buffer = Vec::new();
    for entry in entries {
        serde_json::to_writer(&mut buffer, entry)?;
        buffer.push(b'\n');
    }
    file.write_all(&buffer).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentMetadata;

    fn chunk(id: &str, text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            index: 0,
            start: 0,
            metadata: DocumentMetadata {
                id: id.to_string(),
                ..Default::default()
            },
        }
    }

    fn entry(id: &str, embedding: Vec<f32>) -> IndexEntry {
        IndexEntry::new(chunk(id, id), embedding)
    }

    #[test]
    fn test_entry_id_is_stable() {
        let a = entry_id(&chunk("A1", "Heavy snow"));
        let b = entry_id(&chunk("A1", "Heavy snow"));
        let c = entry_id(&chunk("A2", "Heavy snow"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_build_then_open_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let entries = vec![entry("A1", vec![1.0, 0.0]), entry("A2", vec![0.0, 1.0])];

        let built = VectorIndex::build(dir.path(), "hashing-v1", 2, entries, BuildMode::Replace)
            .await
            .unwrap();
        assert_eq!(built.len(), 2);

        let opened = VectorIndex::open(dir.path()).await.unwrap();
        assert_eq!(opened.manifest().model, "hashing-v1");
        assert_eq!(opened.manifest().dimension, 2);
        assert_eq!(opened.entries(), built.entries());
    }

    #[tokio::test]
    async fn test_query_orders_by_similarity_and_limits() {
        let dir = tempfile::tempdir().unwrap();
        let entries = vec![
            entry("far", vec![0.0, 1.0]),
            entry("near", vec![1.0, 0.1]),
            entry("mid", vec![1.0, 1.0]),
        ];
        let index = VectorIndex::build(dir.path(), "m", 2, entries, BuildMode::Replace)
            .await
            .unwrap();

        let hits = index.query(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.metadata.id, "near");
        assert_eq!(hits[1].chunk.metadata.id, "mid");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let entries = vec![
            entry("first", vec![1.0, 0.0]),
            entry("second", vec![2.0, 0.0]),
            entry("third", vec![3.0, 0.0]),
        ];
        let index = VectorIndex::build(dir.path(), "m", 2, entries, BuildMode::Replace)
            .await
            .unwrap();

        let ids: Vec<String> = index
            .query(&[1.0, 0.0], 3)
            .unwrap()
            .into_iter()
            .map(|hit| hit.chunk.metadata.id)
            .collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_empty_index_query_fails() {
        let dir = tempfile::tempdir().unwrap();
        VectorIndex::build(dir.path(), "m", 2, Vec::new(), BuildMode::Replace)
            .await
            .unwrap();

        let index = VectorIndex::open(dir.path()).await.unwrap();
        assert!(matches!(index.query(&[1.0, 0.0], 3), Err(AppError::EmptyIndex)));
    }

    #[tokio::test]
    async fn test_query_dimension_checked() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::build(dir.path(), "m", 2, vec![entry("A1", vec![1.0, 0.0])], BuildMode::Replace)
            .await
            .unwrap();
        assert!(matches!(
            index.query(&[1.0, 0.0, 0.0], 1),
            Err(AppError::DimensionMismatch { expected: 2, actual: 3 })
        ));
    }

    #[tokio::test]
    async fn test_build_rejects_wrong_dimension_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let result = VectorIndex::build(
            dir.path(),
            "m",
            2,
            vec![entry("A1", vec![1.0, 0.0, 0.0])],
            BuildMode::Replace,
        )
        .await;

        assert!(matches!(result, Err(AppError::DimensionMismatch { .. })));
        assert!(matches!(
            VectorIndex::open(dir.path()).await,
            Err(AppError::IndexNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_replace_discards_previous_entries() {
        let dir = tempfile::tempdir().unwrap();
        for _ in 0..2 {
            VectorIndex::build(dir.path(), "m", 2, vec![entry("A1", vec![1.0, 0.0])], BuildMode::Replace)
                .await
                .unwrap();
        }
        let index = VectorIndex::open(dir.path()).await.unwrap();
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn test_append_accumulates_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        for _ in 0..2 {
            VectorIndex::build(dir.path(), "m", 2, vec![entry("A1", vec![1.0, 0.0])], BuildMode::Append)
                .await
                .unwrap();
        }
        let index = VectorIndex::open(dir.path()).await.unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.entries()[0].id, index.entries()[1].id);
    }

    #[tokio::test]
    async fn test_append_requires_same_model() {
        let dir = tempfile::tempdir().unwrap();
        VectorIndex::build(dir.path(), "model-a", 2, vec![entry("A1", vec![1.0, 0.0])], BuildMode::Replace)
            .await
            .unwrap();

        let result = VectorIndex::build(
            dir.path(),
            "model-b",
            2,
            vec![entry("A2", vec![0.0, 1.0])],
            BuildMode::Append,
        )
        .await;
        assert!(matches!(result, Err(AppError::IndexModelMismatch { .. })));
    }

    #[tokio::test]
    async fn test_open_missing_index() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            VectorIndex::open(&missing).await,
            Err(AppError::IndexNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_ensure_model() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::build(dir.path(), "hashing-v1", 2, Vec::new(), BuildMode::Replace)
            .await
            .unwrap();
        assert!(index.ensure_model("hashing-v1", 2).is_ok());
        assert!(matches!(
            index.ensure_model("text-embedding-3-small", 2),
            Err(AppError::IndexModelMismatch { .. })
        ));
        assert!(matches!(
            index.ensure_model("openai:hashing-v1", 2),
            Err(AppError::IndexModelMismatch { .. })
        ));
        assert!(matches!(
            index.ensure_model("hashing-v1", 3),
            Err(AppError::DimensionMismatch { .. })
        ));
    }
}
