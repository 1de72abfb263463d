//! Error types for Stormwatch
//!
//! Provides a single error enum shared by the library crates with:
//! - Distinct error types for build-time and query-time failures
//! - HTTP status code mapping
//! - Structured error responses
//! - Conversion to the user-visible answer string

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,

    // Index errors (4xxx)
    IndexNotFound,
    EmptyIndex,
    IndexModelMismatch,
    DimensionMismatch,

    // External service errors (8xxx)
    UpstreamError,
    EmbeddingError,
    BackendInitError,
    GenerationError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "validation_error",
            ErrorCode::IndexNotFound => "index_not_found",
            ErrorCode::EmptyIndex => "empty_index",
            ErrorCode::IndexModelMismatch => "index_model_mismatch",
            ErrorCode::DimensionMismatch => "dimension_mismatch",
            ErrorCode::UpstreamError => "upstream_error",
            ErrorCode::EmbeddingError => "embedding_error",
            ErrorCode::BackendInitError => "backend_init_error",
            ErrorCode::GenerationError => "generation_error",
            ErrorCode::InternalError => "internal_error",
            ErrorCode::ConfigurationError => "configuration_error",
            ErrorCode::SerializationError => "serialization_error",
        }
    }

    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,

            ErrorCode::IndexNotFound => 4001,
            ErrorCode::EmptyIndex => 4002,
            ErrorCode::IndexModelMismatch => 4003,
            ErrorCode::DimensionMismatch => 4004,

            ErrorCode::UpstreamError => 8001,
            ErrorCode::EmbeddingError => 8002,
            ErrorCode::BackendInitError => 8003,
            ErrorCode::GenerationError => 8004,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Input errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    // Index errors
    #[error("Vector index not found at {path}")]
    IndexNotFound { path: String },

    #[error("Vector index is empty")]
    EmptyIndex,

    #[error("Index was built with embedding model '{index_model}' but the active provider is '{provider_model}'")]
    IndexModelMismatch {
        index_model: String,
        provider_model: String,
    },

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    // External service errors
    #[error("Embedding service error: {message}")]
    EmbeddingError { message: String },

    #[error("LLM initialization failed: {message}")]
    BackendInit { message: String },

    #[error("Generation failed: {message}")]
    Generation { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        AppError::Configuration {
            message: message.into(),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::IndexNotFound { .. } => ErrorCode::IndexNotFound,
            AppError::EmptyIndex => ErrorCode::EmptyIndex,
            AppError::IndexModelMismatch { .. } => ErrorCode::IndexModelMismatch,
            AppError::DimensionMismatch { .. } => ErrorCode::DimensionMismatch,
            AppError::EmbeddingError { .. } => ErrorCode::EmbeddingError,
            AppError::BackendInit { .. } => ErrorCode::BackendInitError,
            AppError::Generation { .. } => ErrorCode::GenerationError,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,

            // 404 Not Found
            AppError::IndexNotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::IndexModelMismatch { .. } |
            AppError::DimensionMismatch { .. } => StatusCode::CONFLICT,

            // 500 Internal Server Error
            AppError::Configuration { .. } |
            AppError::Internal { .. } |
            AppError::Serialization(_) |
            AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::EmbeddingError { .. } |
            AppError::Generation { .. } |
            AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            AppError::EmptyIndex |
            AppError::BackendInit { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Render the error as the answer shown to the person asking.
    ///
    /// A failed backend initialisation is a standing condition and is shown
    /// verbatim; everything else is a per-request failure prefixed `Error: `.
    pub fn as_answer(&self) -> String {
        match self {
            AppError::BackendInit { .. } => self.to_string(),
            _ => format!("Error: {}", self),
        }
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let field = match &self {
            AppError::Validation { field, .. } => field.clone(),
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                field,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::EmptyIndex;
        assert_eq!(err.code(), ErrorCode::EmptyIndex);
        assert_eq!(err.code().as_code(), 4002);
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::Validation {
            message: "Missing required columns: [\"headline\"]".into(),
            field: Some("headline".into()),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_server_error());
        assert!(err.is_client_error());
    }

    #[test]
    fn test_model_mismatch_message() {
        let err = AppError::IndexModelMismatch {
            index_model: "hashing-v1".into(),
            provider_model: "text-embedding-3-small".into(),
        };
        let message = err.to_string();
        assert!(message.contains("hashing-v1"));
        assert!(message.contains("text-embedding-3-small"));
    }

    #[test]
    fn test_answer_rendering() {
        let generation = AppError::Generation {
            message: "connection refused".into(),
        };
        assert_eq!(
            generation.as_answer(),
            "Error: Generation failed: connection refused"
        );

        let init = AppError::BackendInit {
            message: "missing credential".into(),
        };
        assert_eq!(init.as_answer(), "LLM initialization failed: missing credential");
    }
}
