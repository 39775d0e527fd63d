//! Prompt templates and lenient parsing of generated alerts.

use chrono::{DateTime, Utc};
use intel_core::types::{Alert, AlertSeverity};
use serde::Deserialize;
use tracing::debug;

const MAX_GENERATED_ALERTS: usize = 8;

const SYSTEM_PREAMBLE: &str = "You are a retail analytics assistant for a store administrator. \
Base every statement on the context below. If the context does not contain the answer, say so \
plainly instead of guessing. Use concrete numbers from the context.";

pub fn insight_prompt(context: &str, customer_name: &str) -> String {
    format!(
        "{SYSTEM_PREAMBLE}\n\n{context}\n\
         Write a short health insight for {customer_name}: where they stand, what changed \
         recently, and one concrete retention or growth action. Keep it under 150 words."
    )
}

pub fn query_prompt(context: &str, question: &str) -> String {
    format!(
        "{SYSTEM_PREAMBLE}\n\n{context}\n\
         Question from the administrator:\n{question}\n\n\
         Answer concisely."
    )
}

pub fn alerts_prompt(context: &str, threshold_alerts: &[Alert]) -> String {
    let mut fired = String::new();
    for alert in threshold_alerts {
        fired.push_str(&format!("- [{:?}] {}: {}\n", alert.severity, alert.title, alert.body));
    }
    format!(
        "{SYSTEM_PREAMBLE}\n\n{context}\n\
         Automated checks already reported:\n{fired}\n\
         Suggest up to {MAX_GENERATED_ALERTS} additional alerts the administrator should see. \
         Do not repeat the automated checks. Respond with only a JSON array of objects with \
         \"severity\" (info, warning or critical), \"title\" and \"body\" fields."
    )
}

#[derive(Deserialize)]
struct GeneratedAlert {
    #[serde(default)]
    severity: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    body: String,
}

/// Pull alerts out of a completion. Accepts surrounding prose or code fences
/// around the JSON array; unknown severities become `Info`. `None` when no
/// usable alert could be read.
pub fn parse_alerts(raw: &str, generated_at: DateTime<Utc>) -> Option<Vec<Alert>> {
    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
    if end <= start {
        return None;
    }

    let parsed: Vec<GeneratedAlert> = match serde_json::from_str(&raw[start..=end]) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!(error = %e, "Generated alerts were not valid JSON");
            return None;
        }
    };

    let alerts: Vec<Alert> = parsed
        .into_iter()
        .filter(|a| !a.title.trim().is_empty())
        .take(MAX_GENERATED_ALERTS)
        .map(|a| Alert {
            severity: AlertSeverity::parse(&a.severity).unwrap_or(AlertSeverity::Info),
            title: a.title.trim().to_string(),
            body: a.body.trim().to_string(),
            generated_at,
        })
        .collect();

    (!alerts.is_empty()).then_some(alerts)
}
