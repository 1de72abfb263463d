//! Local Ollama backend

use super::{BackendKind, GenerationBackend};
use serde::{Deserialize, Serialize};
use stormwatch_common::config::GenerationConfig;
use stormwatch_common::errors::{AppError, Result};
use tracing::debug;

pub struct LocalBackend {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl LocalBackend {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::BackendInit {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/generate", config.local_base_url.trim_end_matches('/')),
            model: config.local_model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait::async_trait]
impl GenerationBackend for LocalBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Generation {
                message: format!("Ollama request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Generation {
                message: format!("Ollama error {}: {}", status, body),
            });
        }

        let generated: GenerateResponse = response.json().await.map_err(|e| AppError::Generation {
            message: format!("Failed to parse Ollama response: {}", e),
        })?;

        debug!(model = %self.model, answer_len = generated.response.len(), "Local generation complete");
        Ok(generated.response)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn model(&self) -> &str {
        &self.model
    }
}
