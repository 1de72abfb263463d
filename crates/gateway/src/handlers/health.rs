//! Health check handlers

use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use stormwatch_context::{BackendSelection, StageName};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub stage: StageName,
    pub backend: BackendSelection,
}

/// Liveness probe - never touches the orchestrator
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness probe - reports the orchestrator stage without triggering
/// initialisation. Only a cached initialisation failure is not ready.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let stage = state.orchestrator.stage();
    let (status, code) = match stage {
        StageName::Failed => ("not_ready", StatusCode::SERVICE_UNAVAILABLE),
        _ => ("ready", StatusCode::OK),
    };

    (
        code,
        Json(ReadyResponse {
            status: status.to_string(),
            stage,
            backend: state.orchestrator.selection().clone(),
        }),
    )
}
