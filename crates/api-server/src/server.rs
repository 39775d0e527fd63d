//! API server: HTTP routes plus a separate Prometheus metrics listener.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use intel_core::config::AppConfig;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::{require_admin, AdminGuard};
use crate::rest::{self, AppState};

/// Build the router. Everything under `/v1` requires an admin; probes do not.
pub fn router(state: AppState, guard: Arc<dyn AdminGuard>) -> Router {
    let admin = Router::new()
        .route("/v1/intelligence", post(rest::handle_intelligence))
        .route("/v1/customers/:id/health", get(rest::handle_customer_health))
        .route(
            "/v1/segments",
            get(rest::handle_list_segments).post(rest::handle_create_segment),
        )
        .route(
            "/v1/segments/:id",
            get(rest::handle_get_segment).delete(rest::handle_delete_segment),
        )
        .route("/v1/segments/:id/members", get(rest::handle_segment_members))
        .route_layer(middleware::from_fn_with_state(guard, require_admin));

    Router::new()
        .merge(admin)
        // Operational endpoints
        .route("/health", get(rest::health_check))
        .route("/ready", get(rest::readiness))
        .route("/live", get(rest::liveness))
        // Middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub struct ApiServer {
    config: AppConfig,
    state: AppState,
    guard: Arc<dyn AdminGuard>,
}

impl ApiServer {
    pub fn new(config: AppConfig, state: AppState, guard: Arc<dyn AdminGuard>) -> Self {
        Self {
            config,
            state,
            guard,
        }
    }

    /// Start the HTTP REST server.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let app = router(self.state.clone(), self.guard.clone());

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);
        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;
        Ok(())
    }

    /// Start the metrics exporter on its own port.
    pub fn start_metrics(&self) -> anyhow::Result<()> {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.api.metrics_port,
            ))
            .install()?;

        info!(port = self.config.api.metrics_port, "Metrics exporter started");
        Ok(())
    }
}
