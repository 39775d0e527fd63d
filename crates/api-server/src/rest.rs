//! REST handlers for intelligence requests, customer health, segments and
//! operational probes.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use intel_core::error::IntelError;
use intel_core::types::HealthScore;
use intel_insights::{IntelligenceEngine, IntelligenceRequest, IntelligenceResponse};
use intel_segmentation::{RuleNode, SegmentDefinition, SegmentRegistry};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

use crate::auth::CallerIdentity;

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<IntelligenceEngine>,
    pub segments: Arc<SegmentRegistry>,
    pub start_time: Instant,
}

// ─── Errors ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_at: Option<DateTime<Utc>>,
}

/// An `IntelError` on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub IntelError);

impl From<IntelError> for ApiError {
    fn from(err: IntelError) -> Self {
        ApiError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(IntelError::Validation(rejection.body_text()))
    }
}

pub fn status_for(err: &IntelError) -> StatusCode {
    match err {
        IntelError::Validation(_) => StatusCode::BAD_REQUEST,
        IntelError::NotFound(_) => StatusCode::NOT_FOUND,
        IntelError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        IntelError::ServiceUnavailable(_) | IntelError::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
        IntelError::Data(_) | IntelError::Serialization(_) | IntelError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = status_for(&err);
        metrics::counter!("api.errors", "code" => err.code()).increment(1);

        let message = match &err {
            IntelError::Serialization(_) | IntelError::Internal(_) => {
                error!(error = %err, "Request failed");
                "Internal processing error".to_string()
            }
            IntelError::Data(_) => {
                error!(error = %err, "Repository read failed");
                err.to_string()
            }
            _ => err.to_string(),
        };

        let reset_at = match &err {
            IntelError::RateLimited { reset_at } => Some(*reset_at),
            _ => None,
        };

        let mut response = (
            status,
            Json(ErrorResponse {
                error: err.code().to_string(),
                message,
                reset_at,
            }),
        )
            .into_response();

        if let Some(reset_at) = reset_at {
            let retry_after = (reset_at - Utc::now()).num_seconds().max(1);
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ─── Intelligence ───────────────────────────────────────────────────────────

/// POST /v1/intelligence: insight, query or alerts.
pub async fn handle_intelligence(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    payload: Result<Json<IntelligenceRequest>, JsonRejection>,
) -> ApiResult<Json<IntelligenceResponse>> {
    let Json(request) = payload.map_err(|rejection| {
        warn!(caller = caller.as_str(), error = %rejection.body_text(), "Malformed intelligence request");
        ApiError::from(rejection)
    })?;
    let response = state.engine.handle(caller.as_str(), &request).await?;
    Ok(Json(response))
}

// ─── Customers ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct CustomerHealthResponse {
    pub customer_id: String,
    pub name: String,
    pub health: HealthScore,
    pub days_since_last_order: Option<i64>,
    pub segments: Vec<String>,
}

/// GET /v1/customers/:id/health
pub async fn handle_customer_health(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
) -> ApiResult<Json<CustomerHealthResponse>> {
    let ctx = state.engine.context().customer_context(&customer_id).await?;
    metrics::counter!("api.customer_health").increment(1);
    Ok(Json(CustomerHealthResponse {
        customer_id: ctx.snapshot.customer.id.clone(),
        name: ctx.snapshot.customer.name.clone(),
        health: ctx.snapshot.health,
        days_since_last_order: ctx.snapshot.days_since_last_order,
        segments: ctx.segments,
    }))
}

// ─── Segments ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSegmentRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub rule: RuleNode,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SegmentMembersResponse {
    pub segment_id: Uuid,
    pub name: String,
    pub members: Vec<String>,
    pub customers_scanned: usize,
    pub truncated: bool,
}

fn parse_segment_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw)
        .map_err(|_| ApiError(IntelError::Validation(format!("`{raw}` is not a segment id"))))
}

fn segment_not_found(id: &Uuid) -> ApiError {
    ApiError(IntelError::NotFound(format!("segment {id}")))
}

/// GET /v1/segments
pub async fn handle_list_segments(State(state): State<AppState>) -> Json<Vec<SegmentDefinition>> {
    Json(state.segments.list())
}

/// POST /v1/segments
pub async fn handle_create_segment(
    State(state): State<AppState>,
    payload: Result<Json<CreateSegmentRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SegmentDefinition>)> {
    let Json(request) = payload?;
    let definition = state
        .segments
        .create(request.name, request.description, request.rule)
        .map_err(IntelError::from)?;
    metrics::counter!("api.segments_created").increment(1);
    Ok((StatusCode::CREATED, Json(definition)))
}

/// GET /v1/segments/:id
pub async fn handle_get_segment(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<SegmentDefinition>> {
    let id = parse_segment_id(&raw_id)?;
    state
        .segments
        .get(&id)
        .map(Json)
        .ok_or_else(|| segment_not_found(&id))
}

/// DELETE /v1/segments/:id
pub async fn handle_delete_segment(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_segment_id(&raw_id)?;
    if state.segments.delete(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(segment_not_found(&id))
    }
}

/// GET /v1/segments/:id/members: materialize against current data.
pub async fn handle_segment_members(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<SegmentMembersResponse>> {
    let id = parse_segment_id(&raw_id)?;
    let definition = state.segments.get(&id).ok_or_else(|| segment_not_found(&id))?;

    let scan = state.engine.context().scan().await?;
    let members = state
        .segments
        .materialize(&id, &scan.snapshots())
        .ok_or_else(|| segment_not_found(&id))?;

    Ok(Json(SegmentMembersResponse {
        segment_id: id,
        name: definition.name,
        members: members.into_iter().collect(),
        customers_scanned: scan.customers.len(),
        truncated: scan.truncated,
    }))
}

// ─── Operational ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub completion: String,
    pub segments: usize,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let completion = if state.engine.gateway().is_configured() {
        "configured"
    } else {
        "unconfigured"
    };
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        completion: completion.to_string(),
        segments: state.segments.len(),
    })
}

/// GET /ready: ready as soon as state is wired; generation being
/// unconfigured does not make the service unready.
pub async fn readiness() -> StatusCode {
    StatusCode::OK
}

/// GET /live
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}
