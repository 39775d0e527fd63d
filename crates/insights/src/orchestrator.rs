//! Intelligence orchestrator.
//!
//! Every operation follows the same steps: validate, admit through the rate
//! limiter, build context, call the completion gateway, normalize. Alerts
//! degrade to threshold checks when generation is unavailable; insight and
//! query fail with `ServiceUnavailable` instead.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use intel_completion::{CompletionGateway, CompletionStatus};
use intel_core::error::{IntelError, IntelResult};
use intel_core::types::{Alert, HealthScore};
use intel_platform::RateLimiter;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::alerts::threshold_alerts;
use crate::context::{ContextBuilder, RequestKind, Subject};
use crate::prompts;

pub const MAX_QUERY_CHARS: usize = 2_000;
pub const MAX_NOTES_CHARS: usize = 4_000;

// ─── Request ────────────────────────────────────────────────────────────────

/// Caller-facing request body. Every field is optional on the wire so that
/// shape errors surface as `BAD_REQUEST` rather than a decoding failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntelligenceRequest {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default, alias = "customerId")]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatedRequest {
    Query {
        question: String,
        customer_id: Option<String>,
        notes: Option<String>,
    },
    Insight {
        customer_id: String,
        notes: Option<String>,
    },
    Alerts {
        notes: Option<String>,
    },
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl IntelligenceRequest {
    pub fn validate(&self) -> IntelResult<ValidatedRequest> {
        let raw_kind = non_blank(&self.kind)
            .ok_or_else(|| IntelError::Validation("missing field `type`".to_string()))?;
        let kind = RequestKind::parse(&raw_kind).ok_or_else(|| {
            IntelError::Validation(format!(
                "unknown type `{raw_kind}`; expected query, insight or alerts"
            ))
        })?;

        let notes = non_blank(&self.context);
        if notes.as_ref().is_some_and(|n| n.chars().count() > MAX_NOTES_CHARS) {
            return Err(IntelError::Validation(format!(
                "`context` exceeds {MAX_NOTES_CHARS} characters"
            )));
        }
        let customer_id = non_blank(&self.customer_id);

        match kind {
            RequestKind::Query => {
                let question = non_blank(&self.query).ok_or_else(|| {
                    IntelError::Validation("`query` is required for type query".to_string())
                })?;
                if question.chars().count() > MAX_QUERY_CHARS {
                    return Err(IntelError::Validation(format!(
                        "`query` exceeds {MAX_QUERY_CHARS} characters"
                    )));
                }
                Ok(ValidatedRequest::Query {
                    question,
                    customer_id,
                    notes,
                })
            }
            RequestKind::Insight => {
                let customer_id = customer_id.ok_or_else(|| {
                    IntelError::Validation("`customer_id` is required for type insight".to_string())
                })?;
                Ok(ValidatedRequest::Insight { customer_id, notes })
            }
            RequestKind::Alerts => Ok(ValidatedRequest::Alerts { notes }),
        }
    }
}

impl ValidatedRequest {
    pub fn kind(&self) -> RequestKind {
        match self {
            ValidatedRequest::Query { .. } => RequestKind::Query,
            ValidatedRequest::Insight { .. } => RequestKind::Insight,
            ValidatedRequest::Alerts { .. } => RequestKind::Alerts,
        }
    }
}

// ─── Response ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AlertOutcome {
    pub alerts: Vec<Alert>,
    /// True when generated alerts were wanted but not obtained.
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded_reason: Option<String>,
    pub generated_count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntelligenceResult {
    Query {
        answer: String,
    },
    Insight {
        customer_id: String,
        health: HealthScore,
        insight: String,
    },
    Alerts(AlertOutcome),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IntelligenceResponse {
    pub result: IntelligenceResult,
    pub generated_at: DateTime<Utc>,
    pub context_truncated: bool,
    pub rate_limit_remaining: u32,
}

// ─── Engine ─────────────────────────────────────────────────────────────────

pub struct IntelligenceEngine {
    limiter: Arc<RateLimiter>,
    context: ContextBuilder,
    gateway: Arc<CompletionGateway>,
}

impl IntelligenceEngine {
    pub fn new(limiter: Arc<RateLimiter>, context: ContextBuilder, gateway: Arc<CompletionGateway>) -> Self {
        Self {
            limiter,
            context,
            gateway,
        }
    }

    pub fn context(&self) -> &ContextBuilder {
        &self.context
    }

    pub fn gateway(&self) -> &CompletionGateway {
        &self.gateway
    }

    /// Run one intelligence request on behalf of `caller`, which is also the
    /// rate-limit key. Rejected admissions do no further work.
    pub async fn handle(&self, caller: &str, request: &IntelligenceRequest) -> IntelResult<IntelligenceResponse> {
        let validated = request.validate()?;
        let kind = validated.kind();

        let decision = self.limiter.check(caller);
        if !decision.allowed {
            warn!(caller, kind = kind.as_str(), reset_at = %decision.reset_at, "Rate limit exceeded");
            metrics::counter!("intel.rate_limited").increment(1);
            return Err(IntelError::RateLimited {
                reset_at: decision.reset_at,
            });
        }

        let outcome = self.dispatch(validated).await;
        let status = match &outcome {
            Ok(_) => "ok",
            Err(e) => e.code(),
        };
        metrics::counter!("intel.requests", "kind" => kind.as_str(), "status" => status).increment(1);

        match outcome {
            Ok((result, context_truncated)) => {
                info!(caller, kind = kind.as_str(), context_truncated, "Intelligence request served");
                Ok(IntelligenceResponse {
                    result,
                    generated_at: self.context.now(),
                    context_truncated,
                    rate_limit_remaining: decision.remaining,
                })
            }
            Err(e) => {
                warn!(caller, kind = kind.as_str(), code = e.code(), error = %e, "Intelligence request failed");
                Err(e)
            }
        }
    }

    async fn dispatch(&self, request: ValidatedRequest) -> IntelResult<(IntelligenceResult, bool)> {
        let max_chars = self.context.limits().max_context_chars;

        match request {
            ValidatedRequest::Insight { customer_id, notes } => {
                let bundle = self
                    .context
                    .build(RequestKind::Insight, &Subject::Customer(customer_id.clone()))
                    .await?
                    .with_notes(notes);
                let rendered = bundle.render(max_chars);
                let (name, health) = match &bundle.customer {
                    Some(c) => (c.snapshot.customer.name.clone(), c.snapshot.health),
                    None => return Err(IntelError::NotFound(format!("customer {customer_id}"))),
                };

                let prompt = prompts::insight_prompt(&rendered.text, &name);
                let insight = require_text(self.gateway.complete(&prompt).await)?;
                Ok((
                    IntelligenceResult::Insight {
                        customer_id,
                        health,
                        insight,
                    },
                    rendered.truncated,
                ))
            }
            ValidatedRequest::Query {
                question,
                customer_id,
                notes,
            } => {
                let subject = customer_id.map_or(Subject::Population, Subject::Customer);
                let bundle = self
                    .context
                    .build(RequestKind::Query, &subject)
                    .await?
                    .with_notes(notes);
                let rendered = bundle.render(max_chars);

                let prompt = prompts::query_prompt(&rendered.text, &question);
                let answer = require_text(self.gateway.complete(&prompt).await)?;
                Ok((IntelligenceResult::Query { answer }, rendered.truncated))
            }
            ValidatedRequest::Alerts { notes } => {
                let bundle = self
                    .context
                    .build(RequestKind::Alerts, &Subject::Population)
                    .await?
                    .with_notes(notes);
                let rendered = bundle.render(max_chars);
                let mut alerts = threshold_alerts(&bundle, self.context.thresholds());

                let prompt = prompts::alerts_prompt(&rendered.text, &alerts);
                let status = self.gateway.complete(&prompt).await;
                let degraded_reason = match &status {
                    CompletionStatus::Available(text) => {
                        match prompts::parse_alerts(text, bundle.generated_at) {
                            Some(generated) => {
                                let before = alerts.len();
                                for alert in generated {
                                    if !alerts.iter().any(|a| a.title.eq_ignore_ascii_case(&alert.title)) {
                                        alerts.push(alert);
                                    }
                                }
                                alerts.sort_by(|a, b| b.severity.cmp(&a.severity));
                                return Ok((
                                    IntelligenceResult::Alerts(AlertOutcome {
                                        generated_count: alerts.len() - before,
                                        alerts,
                                        degraded: false,
                                        degraded_reason: None,
                                    }),
                                    rendered.truncated,
                                ));
                            }
                            None => "generated alerts could not be parsed".to_string(),
                        }
                    }
                    CompletionStatus::Unconfigured => "completion service not configured".to_string(),
                    CompletionStatus::Failed(e) => format!("completion failed: {e}"),
                };

                info!(reason = %degraded_reason, alerts = alerts.len(), "Serving threshold alerts only");
                metrics::counter!("intel.alerts.degraded").increment(1);
                Ok((
                    IntelligenceResult::Alerts(AlertOutcome {
                        alerts,
                        degraded: true,
                        degraded_reason: Some(degraded_reason),
                        generated_count: 0,
                    }),
                    rendered.truncated,
                ))
            }
        }
    }
}

fn require_text(status: CompletionStatus) -> IntelResult<String> {
    match status {
        CompletionStatus::Available(text) => Ok(text.trim().to_string()),
        CompletionStatus::Unconfigured => Err(IntelError::ServiceUnavailable(
            "completion service not configured".to_string(),
        )),
        CompletionStatus::Failed(e) => Err(IntelError::ServiceUnavailable(e.to_string())),
    }
}
