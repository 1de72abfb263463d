//! Configuration management for Stormwatch
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{APP_ENV}.toml)
//! - Default values
//!
//! The generation backend credential is read from the process environment
//! exactly once, here, and travels with the config from then on.

use crate::errors::{AppError, Result};
use crate::index::BuildMode;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Offline index build configuration
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// Vector index location
    #[serde(default)]
    pub index: IndexConfig,

    /// Embedding provider configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Generation backend configuration
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestionConfig {
    /// Tabular alert records to index
    #[serde(default = "default_csv_path")]
    pub csv_path: PathBuf,

    /// Maximum chunk length in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Whether a build replaces or appends to an existing index
    #[serde(default)]
    pub build_mode: BuildMode,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    /// Directory holding the persisted vector index
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: hashing, openai
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for remote embedding providers
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Batch size for embedding requests
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Number of chunks retrieved per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    /// Environment variable whose presence selects the cloud backend
    #[serde(default = "default_credential_env")]
    pub credential_env: String,

    /// Cloud credential, resolved once at load time
    pub cloud_api_key: Option<String>,

    /// Cloud chat model
    #[serde(default = "default_cloud_model")]
    pub cloud_model: String,

    /// Cloud API base URL
    #[serde(default = "default_cloud_api_base")]
    pub cloud_api_base: String,

    /// Local (Ollama) model
    #[serde(default = "default_local_model")]
    pub local_model: String,

    /// Local (Ollama) base URL
    #[serde(default = "default_local_base_url")]
    pub local_base_url: String,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: f32,

    /// Backend request timeout in seconds
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default)]
    pub metrics_port: u16,

    /// Service name for logs
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 5000 }
fn default_request_timeout() -> u64 { 120 }
fn default_csv_path() -> PathBuf { PathBuf::from("data/alerts.csv") }
fn default_chunk_size() -> usize { 500 }
fn default_chunk_overlap() -> usize { 50 }
fn default_index_path() -> PathBuf { PathBuf::from("data/index") }
fn default_embedding_provider() -> String { "hashing".to_string() }
fn default_embedding_model() -> String { crate::DEFAULT_EMBEDDING_MODEL.to_string() }
fn default_embedding_dimension() -> usize { crate::DEFAULT_EMBEDDING_DIMENSION }
fn default_embedding_timeout() -> u64 { 30 }
fn default_batch_size() -> usize { 64 }
fn default_top_k() -> usize { crate::DEFAULT_TOP_K }
fn default_credential_env() -> String { "OPENAI_API_KEY".to_string() }
fn default_cloud_model() -> String { "gpt-3.5-turbo".to_string() }
fn default_cloud_api_base() -> String { "https://api.openai.com/v1".to_string() }
fn default_local_model() -> String { "mistral".to_string() }
fn default_local_base_url() -> String { "http://localhost:11434".to_string() }
fn default_generation_timeout() -> u64 { 60 }
fn default_log_level() -> String { "info".to_string() }
fn default_service_name() -> String { "stormwatch".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            csv_path: default_csv_path(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            build_mode: BuildMode::default(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { path: default_index_path() }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: default_top_k() }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            credential_env: default_credential_env(),
            cloud_api_key: None,
            cloud_model: default_cloud_model(),
            cloud_api_base: default_cloud_api_base(),
            local_model: default_local_model(),
            local_base_url: default_local_base_url(),
            temperature: 0.0,
            timeout_secs: default_generation_timeout(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: false,
            metrics_port: 0,
            service_name: default_service_name(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            ingestion: IngestionConfig::default(),
            index: IndexConfig::default(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            generation: GenerationConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files, then validate it
    pub fn load() -> Result<Self> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__RETRIEVAL__TOP_K=5
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        let mut loaded: AppConfig = config.try_deserialize()?;
        loaded.resolve_credential(|name| std::env::var(name).ok());
        loaded.validate()?;
        Ok(loaded)
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        let mut loaded: AppConfig = config.try_deserialize()?;
        loaded.resolve_credential(|name| std::env::var(name).ok());
        loaded.validate()?;
        Ok(loaded)
    }

    /// Fill the cloud credential from `lookup(credential_env)` unless it was
    /// configured explicitly. Blank values count as absent.
    pub fn resolve_credential<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let configured = self
            .generation
            .cloud_api_key
            .take()
            .filter(|key| !key.trim().is_empty());

        self.generation.cloud_api_key = configured.or_else(|| {
            lookup(&self.generation.credential_env).filter(|key| !key.trim().is_empty())
        });
    }

    /// Reject parameter combinations that cannot produce a working pipeline
    pub fn validate(&self) -> Result<()> {
        validate_chunking(self.ingestion.chunk_size, self.ingestion.chunk_overlap)?;

        if self.retrieval.top_k == 0 {
            return Err(AppError::config("retrieval.top_k must be at least 1"));
        }
        if self.embedding.dimension == 0 {
            return Err(AppError::config("embedding.dimension must be at least 1"));
        }
        if self.embedding.batch_size == 0 {
            return Err(AppError::config("embedding.batch_size must be at least 1"));
        }
        // A generation timeout must surface as an answer before the HTTP layer gives up
        if self.server.request_timeout_secs <= self.generation.timeout_secs {
            return Err(AppError::config(format!(
                "server.request_timeout_secs ({}) must exceed generation.timeout_secs ({})",
                self.server.request_timeout_secs, self.generation.timeout_secs
            )));
        }
        Ok(())
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}

impl GenerationConfig {
    /// Per-request timeout for generation backends
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Chunking parameters are valid when the window is non-empty and the
/// overlap is strictly smaller than it.
pub fn validate_chunking(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(AppError::config("chunk_size must be at least 1"));
    }
    if chunk_overlap >= chunk_size {
        return Err(AppError::config(format!(
            "chunk_overlap ({}) must be smaller than chunk_size ({})",
            chunk_overlap, chunk_size
        )));
    }
    Ok(())
}
