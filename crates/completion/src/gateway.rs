//! Completion gateway: capability check, timeout and a single bounded retry.
//!
//! The gateway never returns an error. Every call resolves to one of three
//! states so callers can pick their own degradation policy.

use std::sync::Arc;
use std::time::{Duration, Instant};

use intel_core::config::CompletionConfig;
use intel_core::error::IntelError;
use tracing::{info, warn};

use crate::anthropic::AnthropicProvider;
use crate::provider::{CompletionError, CompletionProvider};

#[derive(Debug, Clone, PartialEq)]
pub enum CompletionStatus {
    /// No credential configured; the provider was never contacted.
    Unconfigured,
    Available(String),
    Failed(CompletionError),
}

impl CompletionStatus {
    pub fn text(&self) -> Option<&str> {
        match self {
            CompletionStatus::Available(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionStatus::Unconfigured => "unconfigured",
            CompletionStatus::Available(_) => "available",
            CompletionStatus::Failed(_) => "failed",
        }
    }
}

pub struct CompletionGateway {
    provider: Option<Arc<dyn CompletionProvider>>,
    timeout: Duration,
    max_tokens: u32,
    retry_transport_errors: bool,
}

impl CompletionGateway {
    pub fn new(
        provider: Option<Arc<dyn CompletionProvider>>,
        timeout: Duration,
        max_tokens: u32,
        retry_transport_errors: bool,
    ) -> Self {
        Self {
            provider,
            timeout,
            max_tokens,
            retry_transport_errors,
        }
    }

    /// Build from configuration. A missing or blank credential yields an
    /// unconfigured gateway, not an error.
    pub fn from_config(config: &CompletionConfig) -> Result<Self, IntelError> {
        let provider: Option<Arc<dyn CompletionProvider>> = match config.credential() {
            Some(key) => {
                let provider = AnthropicProvider::new(key, &config.base_url, config.model.clone())
                    .map_err(|e| IntelError::Config(format!("completion client: {e}")))?;
                info!(model = %config.model, base_url = %config.base_url, "Completion provider configured");
                Some(Arc::new(provider))
            }
            None => {
                warn!("No completion credential configured; generative operations are disabled");
                None
            }
        };

        Ok(Self::new(
            provider,
            Duration::from_millis(config.timeout_ms),
            config.max_tokens,
            config.retry_transport_errors,
        ))
    }

    pub fn unconfigured() -> Self {
        Self::new(None, Duration::from_secs(30), 1024, false)
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    pub fn provider_name(&self) -> Option<&str> {
        self.provider.as_ref().map(|p| p.name())
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    /// Complete `prompt` with the configured token ceiling.
    pub async fn complete(&self, prompt: &str) -> CompletionStatus {
        self.complete_with(prompt, self.max_tokens).await
    }

    pub async fn complete_with(&self, prompt: &str, max_tokens: u32) -> CompletionStatus {
        let Some(provider) = &self.provider else {
            return CompletionStatus::Unconfigured;
        };

        let start = Instant::now();
        let mut result = self.attempt(provider.as_ref(), prompt, max_tokens).await;

        if self.retry_transport_errors {
            if let Err(err) = &result {
                if err.is_transient() {
                    warn!(provider = provider.name(), error = %err, "Transient completion failure, retrying once");
                    metrics::counter!("intel.completion.retries").increment(1);
                    result = self.attempt(provider.as_ref(), prompt, max_tokens).await;
                }
            }
        }

        metrics::histogram!("intel.completion.latency_ms").record(start.elapsed().as_millis() as f64);

        match result {
            Ok(text) => CompletionStatus::Available(text),
            Err(err) => {
                warn!(provider = provider.name(), error = %err, "Completion failed");
                metrics::counter!("intel.completion.failures").increment(1);
                CompletionStatus::Failed(err)
            }
        }
    }

    async fn attempt(
        &self,
        provider: &dyn CompletionProvider,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, CompletionError> {
        match tokio::time::timeout(self.timeout, provider.complete(prompt, max_tokens)).await {
            Ok(result) => result,
            Err(_) => Err(CompletionError::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Replays scripted outcomes in order, repeating the last one.
    struct ScriptedProvider {
        script: Mutex<Vec<Result<String, CompletionError>>>,
        calls: AtomicU32,
        delay: Duration,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Result<String, CompletionError>>) -> Arc<Self> {
            Self::slow(script, Duration::ZERO)
        }

        fn slow(script: Vec<Result<String, CompletionError>>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script),
                calls: AtomicU32::new(0),
                delay,
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String, CompletionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.remove(0)
            } else {
                script[0].clone()
            }
        }
    }

    fn gateway(provider: Arc<ScriptedProvider>, timeout_ms: u64) -> CompletionGateway {
        CompletionGateway::new(Some(provider), Duration::from_millis(timeout_ms), 256, true)
    }

    #[tokio::test]
    async fn test_unconfigured_never_calls_out() {
        let gw = CompletionGateway::unconfigured();
        assert!(!gw.is_configured());
        assert_eq!(gw.complete("hi").await, CompletionStatus::Unconfigured);
    }

    #[tokio::test]
    async fn test_from_config_without_credential_is_unconfigured() {
        let config = CompletionConfig {
            api_key: Some("  ".to_string()),
            ..Default::default()
        };
        let gw = CompletionGateway::from_config(&config).unwrap();
        assert!(!gw.is_configured());
    }

    #[tokio::test]
    async fn test_success() {
        let provider = ScriptedProvider::new(vec![Ok("answer".to_string())]);
        let gw = gateway(provider.clone(), 1_000);
        assert_eq!(gw.complete("q").await.text(), Some("answer"));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_single_retry_on_transport_error() {
        let provider = ScriptedProvider::new(vec![
            Err(CompletionError::Transport("reset".to_string())),
            Ok("second time".to_string()),
        ]);
        let gw = gateway(provider.clone(), 1_000);
        assert_eq!(gw.complete("q").await, CompletionStatus::Available("second time".to_string()));
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_retry_is_bounded() {
        let provider = ScriptedProvider::new(vec![Err(CompletionError::Transport("down".to_string()))]);
        let gw = gateway(provider.clone(), 1_000);
        assert!(matches!(gw.complete("q").await, CompletionStatus::Failed(CompletionError::Transport(_))));
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_rejection_is_not_retried() {
        let provider = ScriptedProvider::new(vec![Err(CompletionError::Rejected {
            status: 400,
            body: "bad".to_string(),
        })]);
        let gw = gateway(provider.clone(), 1_000);
        assert!(matches!(gw.complete("q").await, CompletionStatus::Failed(_)));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_failure_and_not_retried() {
        let provider = ScriptedProvider::slow(vec![Ok("late".to_string())], Duration::from_millis(500));
        let gw = gateway(provider.clone(), 20);
        assert_eq!(gw.complete("q").await, CompletionStatus::Failed(CompletionError::Timeout(20)));
        assert_eq!(provider.calls(), 1);
    }
}
