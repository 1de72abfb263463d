//! Embedding service abstraction
//!
//! Provides a unified interface for embedding providers:
//! - Hashing (local, deterministic feature hashing; the default)
//! - OpenAI-compatible `/embeddings` endpoints
//!
//! The same provider and model must be used when building an index and when
//! querying it; `identity()` is what the index records.

use crate::config::EmbeddingConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Trait for embedding generation
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings.into_iter().next().ok_or_else(|| AppError::EmbeddingError {
            message: "Empty response".to_string(),
        })
    }

    /// Generate embeddings for multiple texts, one vector per text, in order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Provider family that produced the vectors
    fn provider(&self) -> &str;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Provider and model together, as recorded in an index manifest
    fn identity(&self) -> String {
        format!("{}:{}", self.provider(), self.model_name())
    }

    /// Get the embedding dimension
    fn dimension(&self) -> usize;
}

/// Verify every vector has the provider's dimensionality.
pub fn ensure_dimensions(vectors: &[Vec<f32>], expected: usize) -> Result<()> {
    match vectors.iter().find(|v| v.len() != expected) {
        Some(bad) => Err(AppError::DimensionMismatch {
            expected,
            actual: bad.len(),
        }),
        None => Ok(()),
    }
}

/// Local embedder based on signed feature hashing.
///
/// Word tokens (runs of Unicode letters and digits) and their character
/// trigrams are hashed with SHA-256 into
/// `dimension` buckets and the result is L2-normalised, so identical text
/// always yields a bit-identical vector.
pub struct HashingEmbedder {
    model: String,
    dimension: usize,
}

const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

impl HashingEmbedder {
    /// Create a new hashing embedder
    pub fn new(model: impl Into<String>, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(AppError::config("embedding dimension must be at least 1"));
        }
        Ok(Self {
            model: model.into(),
            dimension,
        })
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();

        let tokens = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty());

        for token in tokens {
            self.add_feature(&mut vector, "w", token, WORD_WEIGHT);

            let padded: Vec<char> = format!(" {} ", token).chars().collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                self.add_feature(&mut vector, "t", &trigram, TRIGRAM_WEIGHT);
            }
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in vector.iter_mut() {
                *value /= norm;
            }
        }
        vector
    }

    fn add_feature(&self, vector: &mut [f32], kind: &str, feature: &str, weight: f32) {
        let digest = Sha256::new()
            .chain_update(kind.as_bytes())
            .chain_update([0u8])
            .chain_update(feature.as_bytes())
            .finalize();

        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };

        vector[bucket] += sign * weight;
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }

    fn provider(&self) -> &str {
        "hashing"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// OpenAI embedding client
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dimension: usize,
    base_url: String,
    batch_size: usize,
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    data: Vec<OpenAIEmbedding>,
}

#[derive(Deserialize)]
struct OpenAIEmbedding {
    embedding: Vec<f32>,
    index: usize,
}

const MAX_RETRIES: u32 = 3;

impl OpenAIEmbedder {
    /// Create a new OpenAI embedder
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| AppError::config("embedding.api_key is required for the openai provider"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            dimension: config.dimension,
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            batch_size: config.batch_size.max(1),
        })
    }

    /// Make request with retry
    async fn request_with_retry(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff
                let delay = Duration::from_millis(100 * (2_u64.pow(attempt)));
                tokio::time::sleep(delay).await;
            }

            let start = Instant::now();
            match self.make_request(texts).await {
                Ok(embeddings) => {
                    metrics::record_embedding(start.elapsed().as_secs_f64(), &self.model, texts.len(), true);
                    return Ok(embeddings);
                }
                Err(e) => {
                    metrics::record_embedding(start.elapsed().as_secs_f64(), &self.model, texts.len(), false);
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = MAX_RETRIES,
                        error = %e,
                        "Embedding request failed, retrying"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AppError::EmbeddingError {
            message: "Unknown error after retries".to_string(),
        }))
    }

    async fn make_request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));

        let request = OpenAIRequest {
            input: texts,
            model: &self.model,
        };

        let response = self.client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::EmbeddingError {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::EmbeddingError {
                message: format!("API error {}: {}", status, body),
            });
        }

        let mut result: OpenAIResponse = response.json().await.map_err(|e| {
            AppError::EmbeddingError {
                message: format!("Failed to parse response: {}", e),
            }
        })?;

        if result.data.len() != texts.len() {
            return Err(AppError::EmbeddingError {
                message: format!(
                    "Provider returned {} embeddings for {} inputs",
                    result.data.len(),
                    texts.len()
                ),
            });
        }

        result.data.sort_by_key(|entry| entry.index);
        Ok(result.data.into_iter().map(|e| e.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(self.batch_size) {
            let embeddings = self.request_with_retry(chunk).await?;
            ensure_dimensions(&embeddings, self.dimension)?;
            all_embeddings.extend(embeddings);
        }

        Ok(all_embeddings)
    }

    fn provider(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Create an embedder based on configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "hashing" => Ok(Arc::new(HashingEmbedder::new(config.model.clone(), config.dimension)?)),
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        other => Err(AppError::config(format!("Unknown embedding provider: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_hashing_is_deterministic() {
        let embedder = HashingEmbedder::new("hashing-v1", 384).unwrap();
        let first = embedder.embed("Heavy snow expected in Test County").await.unwrap();
        let second = embedder.embed("Heavy snow expected in Test County").await.unwrap();
        assert_eq!(first.len(), 384);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_hashing_batch_preserves_order() {
        let embedder = HashingEmbedder::new("hashing-v1", 64).unwrap();
        let texts = vec!["flood".to_string(), "heat".to_string(), "flood".to_string()];
        let embeddings = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(embeddings.len(), 3);
        assert_eq!(embeddings[0], embeddings[2]);
        assert_ne!(embeddings[0], embeddings[1]);
    }

    #[tokio::test]
    async fn test_hashing_similarity_tracks_overlap() {
        let embedder = HashingEmbedder::new("hashing-v1", 384).unwrap();
        let query = embedder.embed("snow in Test County").await.unwrap();
        let winter = embedder.embed("Event: Winter Storm Watch. Heavy snow expected in Test County").await.unwrap();
        let heat = embedder.embed("Event: Excessive Heat Warning. Dangerous heat in Maricopa").await.unwrap();
        assert!(cosine(&query, &winter) > cosine(&query, &heat));
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new("hashing-v1", 16).unwrap();
        let embedding = embedder.embed("").await.unwrap();
        assert!(embedding.iter().all(|v| *v == 0.0));
    }

    #[tokio::test]
    async fn test_non_latin_text_is_embedded() {
        let embedder = HashingEmbedder::new("hashing-v1", 64).unwrap();
        let snow = embedder.embed("Сильный снегопад в округе").await.unwrap();
        let heat = embedder.embed("猛暑 警報").await.unwrap();
        assert!(snow.iter().any(|v| *v != 0.0));
        assert!(heat.iter().any(|v| *v != 0.0));
        assert!(cosine(&snow, &snow) > cosine(&snow, &heat));
    }

    #[test]
    fn test_identity_includes_provider() {
        let embedder = HashingEmbedder::new("text-embedding-3-small", 8).unwrap();
        assert_eq!(embedder.identity(), "hashing:text-embedding-3-small");

        let config = EmbeddingConfig {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        let remote = OpenAIEmbedder::new(&config).unwrap();
        assert_eq!(remote.identity(), "openai:text-embedding-3-small");
        assert_ne!(embedder.identity(), remote.identity());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let config = EmbeddingConfig {
            provider: "word2vec".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            create_embedder(&config),
            Err(AppError::Configuration { .. })
        ));
    }

    #[test]
    fn test_openai_requires_key() {
        let config = EmbeddingConfig {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            ..Default::default()
        };
        assert!(create_embedder(&config).is_err());
    }

    #[test]
    fn test_dimension_check() {
        let vectors = vec![vec![0.0; 4], vec![0.0; 3]];
        assert!(matches!(
            ensure_dimensions(&vectors, 4),
            Err(AppError::DimensionMismatch { expected: 4, actual: 3 })
        ));
    }
}
