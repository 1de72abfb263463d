//! Question answering handler

use crate::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use stormwatch_common::errors::{AppError, Result};
use validator::Validate;

/// Query request
#[derive(Debug, Deserialize, Validate)]
pub struct QueryRequest {
    #[validate(length(min = 1, max = 2000))]
    pub query: String,
}

/// Query response; `answer` carries either the generated text or the
/// error message shown to the person asking
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub query: String,
    pub answer: String,
}

/// Answer a question about the indexed alerts
pub async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    let start = Instant::now();

    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("query".to_string()),
    })?;

    let query = request.query.trim().to_string();
    if query.is_empty() {
        return Err(AppError::Validation {
            message: "query must not be blank".to_string(),
            field: Some("query".to_string()),
        });
    }

    let answer = state.orchestrator.respond(&query).await;

    tracing::info!(
        answer_len = answer.len(),
        latency_ms = start.elapsed().as_millis() as u64,
        "Query answered"
    );
    tracing::debug!(query = %query, "Query text");

    Ok(Json(QueryResponse { query, answer }))
}
