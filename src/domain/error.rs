//! Error types for schema synthesis and route construction

use thiserror::Error;

/// Structural errors surfaced to the immediate caller.
///
/// Recoverable conditions (reference cycles, external `$ref` targets, unmatched
/// patterns) never show up here; the synthesizer substitutes a value and logs.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Missing or malformed request input (no schema, non-object body)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Schema document that cannot be interpreted
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// Internal `$ref` pointing at a segment that does not exist
    #[error("Reference error: segment '{segment}' of '{pointer}' not found")]
    Reference { pointer: String, segment: String },

    /// Route declared with a method outside get/post/put/delete/patch
    #[error("Unsupported method: {0}")]
    UnsupportedMethod(String),
}

impl EngineError {
    /// Convert to HTTP status code for API responses
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::InvalidSchema(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Reference { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::UnsupportedMethod(_) => StatusCode::METHOD_NOT_ALLOWED,
        }
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
