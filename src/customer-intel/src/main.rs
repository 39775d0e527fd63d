//! Customer Intelligence: RFM health scoring, rule-based segments and
//! rate-limited generative insights for store administrators.
//!
//! Main entry point that wires all subsystems and starts the server.

use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use intel_api::{ApiServer, AppState, StaticTokenGuard};
use intel_completion::CompletionGateway;
use intel_core::config::AppConfig;
use intel_insights::{ContextBuilder, IntelligenceEngine};
use intel_platform::{Clock, RateLimiter, SystemClock};
use intel_scoring::ScoreCache;
use intel_segmentation::SegmentRegistry;
use intel_store::InMemoryRepository;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "customer-intel")]
#[command(about = "Customer health scoring, segmentation and AI insights")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML/YAML/JSON), layered under environment variables
    #[arg(long, env = "CUSTOMER_INTEL_CONFIG")]
    config: Option<String>,

    /// Bind address (overrides config)
    #[arg(long, env = "CUSTOMER_INTEL__API__HOST")]
    host: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "CUSTOMER_INTEL__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Metrics port (overrides config)
    #[arg(long, env = "CUSTOMER_INTEL__API__METRICS_PORT")]
    metrics_port: Option<u16>,

    /// Completion service credential
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Customer/order seed file for the in-memory repository
    #[arg(long, env = "CUSTOMER_INTEL__DATA__SEED_PATH")]
    seed: Option<String>,

    /// Stored segment definitions to register at startup
    #[arg(long, env = "CUSTOMER_INTEL__DATA__SEGMENTS_PATH")]
    segments: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "customer_intel=info,intel_=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Customer Intelligence starting up");

    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;

    // Apply CLI overrides
    if let Some(host) = cli.host {
        config.api.host = host;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(port) = cli.metrics_port {
        config.api.metrics_port = port;
    }
    if cli.api_key.is_some() {
        config.completion.api_key = cli.api_key;
    }
    if cli.seed.is_some() {
        config.data.seed_path = cli.seed;
    }
    if cli.segments.is_some() {
        config.data.segments_path = cli.segments;
    }

    info!(
        host = %config.api.host,
        http_port = config.api.http_port,
        metrics_port = config.api.metrics_port,
        rate_limit = config.rate_limit.max_requests,
        window_secs = config.rate_limit.window_secs,
        completion = config.completion.credential().is_some(),
        "Configuration loaded"
    );

    let repository = match &config.data.seed_path {
        Some(path) => InMemoryRepository::load_seed_file(path).await?,
        None => {
            warn!("No seed file configured; starting with an empty repository");
            InMemoryRepository::new()
        }
    };

    let segments = Arc::new(SegmentRegistry::new());
    if let Some(path) = &config.data.segments_path {
        let raw = tokio::fs::read_to_string(path).await?;
        let loaded = segments.load_json(&raw)?;
        info!(path = %path, loaded, "Stored segments registered");
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let limiter = Arc::new(RateLimiter::new(&config.rate_limit, clock.clone()));
    let scores = Arc::new(ScoreCache::new(config.scoring.score_cache_ttl_secs));
    let gateway = Arc::new(CompletionGateway::from_config(&config.completion)?);

    let context = ContextBuilder::new(
        Arc::new(repository),
        segments.clone(),
        scores.clone(),
        clock.clone(),
    )
    .with_limits(config.context.clone())
    .with_order_history_limit(config.scoring.order_history_limit)
    .with_thresholds(config.alerts.clone());

    let state = AppState {
        engine: Arc::new(IntelligenceEngine::new(limiter, context, gateway)),
        segments,
        start_time: Instant::now(),
    };
    let guard = Arc::new(StaticTokenGuard::new(&config.api.admin_tokens));
    info!(admins = guard.len(), "Admin guard configured");

    let api_server = ApiServer::new(config.clone(), state, guard);

    if let Err(e) = api_server.start_metrics() {
        error!(error = %e, "Failed to start metrics exporter");
    }

    // Spawn score cache maintenance task
    let sweep_secs = config.scoring.score_cache_ttl_secs.clamp(1, 3600);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(sweep_secs));
        loop {
            interval.tick().await;
            let evicted = scores.evict_expired(clock.now());
            if evicted > 0 {
                tracing::debug!(evicted, "Expired health scores evicted");
            }
        }
    });

    info!("Customer Intelligence is ready to serve traffic");

    // Start HTTP server (blocks until shutdown)
    api_server.start_http().await?;

    Ok(())
}
