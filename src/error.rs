//! Error types for a3s-activity

use thiserror::Error;

/// Errors that can occur in the activity log
#[derive(Debug, Error)]
pub enum ActivityError {
    /// Filesystem failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Relational backend failure
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Backend could not confirm an operation
    #[error("Storage error ({backend}): {reason}")]
    Storage { backend: String, reason: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML deserialization failure
    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization failure
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// Owner, action type, or event kind failed validation
    #[error("Invalid {what} '{value}': {reason}")]
    InvalidKey {
        what: &'static str,
        value: String,
        reason: String,
    },

    /// Caller lacks the capability required to read logs
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// CSV output failure
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl ActivityError {
    /// Build a storage error tagged with the backend name
    pub fn storage(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Storage {
            backend: backend.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for activity log operations
pub type Result<T> = std::result::Result<T, ActivityError>;

impl From<ActivityError> for axum::response::Response {
    fn from(err: ActivityError) -> Self {
        use axum::http::StatusCode;
        use axum::response::IntoResponse;

        let (status, code) = match &err {
            ActivityError::Unauthorized(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ActivityError::Storage { .. }
            | ActivityError::Io(_)
            | ActivityError::Database(_) => (StatusCode::SERVICE_UNAVAILABLE, "STORAGE_UNAVAILABLE"),
            ActivityError::InvalidKey { .. } => (StatusCode::BAD_REQUEST, "INVALID"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
        };

        let body = serde_json::json!({
            "error": { "code": code, "message": err.to_string() }
        });
        (status, axum::Json(body)).into_response()
    }
}

impl axum::response::IntoResponse for ActivityError {
    fn into_response(self) -> axum::response::Response {
        self.into()
    }
}
