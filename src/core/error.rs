//! Error type system for LunaTV
//!
//! This module provides the crate-wide error type with:
//! - Classification of storage, network and request failures
//! - HTTP status code mapping
//! - Retryability for the remote backend
//! - Error responses carrying trace IDs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Main error type for the LunaTV backend
#[derive(Debug, thiserror::Error)]
pub enum LunaError {
    // System-level errors
    #[error("System initialization failed: {0}")]
    InitializationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Storage errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Storage backend unavailable: {0}")]
    TransientStorageError(String),

    // API-related errors
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    // I/O errors
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Network error: {0}")]
    NetworkError(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Task error: {0}")]
    TaskError(String),

    #[error("Event error: {0}")]
    EventError(String),
}

impl LunaError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            LunaError::InvalidRequest(_)
            | LunaError::SerializationError(_)
            | LunaError::DeserializationError(_)
            | LunaError::ValidationError(_) => StatusCode::BAD_REQUEST,

            LunaError::AuthenticationError(_) => StatusCode::UNAUTHORIZED,

            LunaError::PermissionDenied(_) => StatusCode::FORBIDDEN,

            LunaError::NotFound(_) => StatusCode::NOT_FOUND,

            LunaError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,

            LunaError::TransientStorageError(_) => StatusCode::SERVICE_UNAVAILABLE,

            LunaError::InitializationError(_)
            | LunaError::ConfigError(_)
            | LunaError::DatabaseError(_)
            | LunaError::StorageError(_)
            | LunaError::IoError(_)
            | LunaError::NetworkError(_)
            | LunaError::TaskError(_)
            | LunaError::EventError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error type name for API responses
    pub fn error_type(&self) -> &'static str {
        match self {
            LunaError::InitializationError(_) => "InitializationError",
            LunaError::ConfigError(_) => "ConfigError",
            LunaError::DatabaseError(_) => "DatabaseError",
            LunaError::StorageError(_) => "StorageError",
            LunaError::TransientStorageError(_) => "TransientStorageError",
            LunaError::InvalidRequest(_) => "InvalidRequest",
            LunaError::AuthenticationError(_) => "AuthenticationError",
            LunaError::NotFound(_) => "NotFound",
            LunaError::PermissionDenied(_) => "PermissionDenied",
            LunaError::ValidationError(_) => "ValidationError",
            LunaError::Timeout(_) => "Timeout",
            LunaError::IoError(_) => "IoError",
            LunaError::NetworkError(_) => "NetworkError",
            LunaError::SerializationError(_) => "SerializationError",
            LunaError::DeserializationError(_) => "DeserializationError",
            LunaError::TaskError(_) => "TaskError",
            LunaError::EventError(_) => "EventError",
        }
    }

    /// Check if this error is worth retrying against a remote backend
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LunaError::TransientStorageError(_) | LunaError::NetworkError(_) | LunaError::Timeout(_)
        )
    }
}

impl From<serde_json::Error> for LunaError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            LunaError::DeserializationError(err.to_string())
        } else {
            LunaError::SerializationError(err.to_string())
        }
    }
}

/// Error response structure for API endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error type identifier
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Unique trace ID for this error
    pub trace_id: String,
}

impl ErrorResponse {
    /// Create a new error response with a generated trace ID
    pub fn new(error: String, message: String) -> Self {
        Self {
            error,
            message,
            trace_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an error response from a LunaError
    pub fn from_error(error: &LunaError) -> Self {
        Self::new(error.error_type().to_string(), error.to_string())
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} (trace_id: {})", self.error, self.message, self.trace_id)
    }
}

impl IntoResponse for LunaError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        let error_response = ErrorResponse::from_error(&self);

        if status_code.is_server_error() {
            tracing::error!(
                error_type = self.error_type(),
                trace_id = %error_response.trace_id,
                status_code = %status_code,
                "Request failed: {}",
                self
            );
        } else {
            tracing::debug!(
                error_type = self.error_type(),
                trace_id = %error_response.trace_id,
                status_code = %status_code,
                "Request rejected: {}",
                self
            );
        }

        (status_code, Json(error_response)).into_response()
    }
}

/// Result type alias for operations that can fail with LunaError
pub type Result<T> = std::result::Result<T, LunaError>;
