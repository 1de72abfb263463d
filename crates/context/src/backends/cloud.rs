//! OpenAI-compatible chat completions backend

use super::{BackendKind, GenerationBackend};
use serde::{Deserialize, Serialize};
use stormwatch_common::config::GenerationConfig;
use stormwatch_common::errors::{AppError, Result};
use tracing::debug;

pub struct CloudBackend {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

impl CloudBackend {
    /// Requires a non-blank credential
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = config
            .cloud_api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| AppError::BackendInit {
                message: format!("{} is not set", config.credential_env),
            })?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::BackendInit {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/chat/completions", config.cloud_api_base.trim_end_matches('/')),
            model: config.cloud_model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait::async_trait]
impl GenerationBackend for CloudBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Generation {
                message: format!("LLM API request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Generation {
                message: format!("LLM API error {}: {}", status, body),
            });
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| AppError::Generation {
            message: format!("Failed to parse LLM response: {}", e),
        })?;

        let answer = chat_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| AppError::Generation {
                message: "Empty response from LLM".to_string(),
            })?;

        debug!(model = %self.model, answer_len = answer.len(), "Cloud generation complete");
        Ok(answer)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Cloud
    }

    fn model(&self) -> &str {
        &self.model
    }
}
