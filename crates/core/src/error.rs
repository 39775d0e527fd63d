use chrono::{DateTime, Utc};
use thiserror::Error;

pub type IntelResult<T> = Result<T, IntelError>;

#[derive(Error, Debug)]
pub enum IntelError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded, window resets at {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },

    #[error("AI service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntelError {
    /// Stable machine-readable code surfaced to API callers.
    pub fn code(&self) -> &'static str {
        match self {
            IntelError::Validation(_) => "BAD_REQUEST",
            IntelError::NotFound(_) => "NOT_FOUND",
            IntelError::RateLimited { .. } => "RATE_LIMITED",
            IntelError::ServiceUnavailable(_) => "AI_UNAVAILABLE",
            IntelError::Data(_) => "DATA_ERROR",
            IntelError::Config(_) => "CONFIG_ERROR",
            IntelError::Serialization(_) | IntelError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the caller can expect a different outcome by retrying later
    /// without changing the request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IntelError::RateLimited { .. } | IntelError::ServiceUnavailable(_)
        )
    }
}
