//! Completion-service boundary: a provider trait, an HTTP provider, and a
//! gateway that applies the timeout/retry policy and reports a tri-state
//! outcome instead of surfacing a missing credential as an error.

pub mod anthropic;
pub mod gateway;
pub mod provider;

pub use anthropic::AnthropicProvider;
pub use gateway::{CompletionGateway, CompletionStatus};
pub use provider::{CompletionError, CompletionProvider};
