//! Text-generation backends
//!
//! - Cloud: OpenAI-compatible chat completions
//! - Local: Ollama `/api/generate`
//!
//! Which one serves a process is decided once, from the credential resolved
//! at configuration load.

mod cloud;
mod local;

pub use cloud::CloudBackend;
pub use local::LocalBackend;

use serde::Serialize;
use std::sync::Arc;
use stormwatch_common::config::GenerationConfig;
use stormwatch_common::errors::Result;

/// Trait for text generation
#[async_trait::async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate a completion for a fully rendered prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    fn kind(&self) -> BackendKind;

    fn model(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Cloud,
    Local,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Cloud => "cloud",
            BackendKind::Local => "local",
        }
    }
}

/// Backend choice recorded for the lifetime of an orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendSelection {
    pub kind: BackendKind,
    pub model: String,
}

impl BackendSelection {
    /// Cloud when a non-blank credential is present, local otherwise
    pub fn resolve(config: &GenerationConfig) -> Self {
        let has_credential = config
            .cloud_api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty());

        if has_credential {
            Self {
                kind: BackendKind::Cloud,
                model: config.cloud_model.clone(),
            }
        } else {
            Self {
                kind: BackendKind::Local,
                model: config.local_model.clone(),
            }
        }
    }
}

/// Construct the selected backend
pub fn create_backend(
    selection: &BackendSelection,
    config: &GenerationConfig,
) -> Result<Arc<dyn GenerationBackend>> {
    match selection.kind {
        BackendKind::Cloud => Ok(Arc::new(CloudBackend::new(config)?)),
        BackendKind::Local => Ok(Arc::new(LocalBackend::new(config)?)),
    }
}
