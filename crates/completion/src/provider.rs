use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompletionError {
    /// Connection-level failure or a 5xx/529 response; worth one retry.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("completion timed out after {0} ms")]
    Timeout(u64),

    #[error("provider rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl CompletionError {
    pub fn is_transient(&self) -> bool {
        matches!(self, CompletionError::Transport(_))
    }

    /// Classify an HTTP error status from the provider.
    pub fn from_status(status: u16, body: String) -> Self {
        if status >= 500 || status == 429 {
            CompletionError::Transport(format!("HTTP {status}: {body}"))
        } else {
            CompletionError::Rejected { status, body }
        }
    }
}

/// A stateless text-completion service.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, CompletionError>;
}
