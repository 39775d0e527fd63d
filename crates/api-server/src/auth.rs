//! Admin bearer-token guard.
//!
//! Whether a caller is an administrator is decided by an `AdminGuard`. The
//! default guard accepts the static tokens listed in `api.admin_tokens`,
//! written either as `name:token` or as a bare token.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{debug, warn};

use crate::rest::ErrorResponse;

/// Authenticated admin. Also used as the rate-limit key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity(pub String);

impl CallerIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub trait AdminGuard: Send + Sync {
    /// The admin identity for a bearer token, if it belongs to one.
    fn authorize(&self, token: &str) -> Option<CallerIdentity>;
}

pub struct StaticTokenGuard {
    tokens: HashMap<String, CallerIdentity>,
}

impl StaticTokenGuard {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tokens = HashMap::new();
        for (i, entry) in entries.into_iter().enumerate() {
            let entry = entry.as_ref().trim();
            if entry.is_empty() {
                continue;
            }
            let (name, token) = match entry.split_once(':') {
                Some((name, token)) if !name.trim().is_empty() && !token.trim().is_empty() => {
                    (name.trim().to_string(), token.trim())
                }
                _ => (format!("admin-{}", i + 1), entry),
            };
            tokens.insert(token.to_string(), CallerIdentity(name));
        }
        if tokens.is_empty() {
            warn!("No admin tokens configured; every protected request will be rejected");
        }
        Self { tokens }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl AdminGuard for StaticTokenGuard {
    fn authorize(&self, token: &str) -> Option<CallerIdentity> {
        self.tokens.get(token).cloned()
    }
}

fn unauthorized(error: &str, message: &str) -> Response {
    metrics::counter!("api.unauthorized").increment(1);
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
            reset_at: None,
        }),
    )
        .into_response()
}

/// Reject non-admin callers with 401; otherwise attach their identity as a
/// request extension.
pub async fn require_admin(
    State(guard): State<Arc<dyn AdminGuard>>,
    mut req: Request,
    next: Next,
) -> Response {
    let bearer = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    let Some(token) = bearer else {
        return unauthorized(
            "UNAUTHORIZED",
            "Authorization header with Bearer token required",
        );
    };

    match guard.authorize(token) {
        Some(identity) => {
            debug!(caller = identity.as_str(), path = %req.uri().path(), "Admin authorized");
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        None => unauthorized("UNAUTHORIZED", "Invalid bearer token"),
    }
}
