use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `CUSTOMER_INTEL__` and an optional TOML config file.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub alerts: AlertThresholds,
    #[serde(default)]
    pub data: DataConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
    /// Bearer tokens accepted as admin credentials.
    #[serde(default)]
    pub admin_tokens: Vec<String>,
}

// Default functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_port() -> u16 {
    9091
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            metrics_port: default_metrics_port(),
            admin_tokens: Vec::new(),
        }
    }
}

// ─── Rate Limit Config ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

fn default_max_requests() -> u32 { 20 }
fn default_window_secs() -> u64 { 3600 }

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
        }
    }
}

// ─── Completion Service Config ──────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionConfig {
    /// Provider credential. `None` means the service is unconfigured.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_completion_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_retry_transport_errors")]
    pub retry_transport_errors: bool,
}

fn default_base_url() -> String { "https://api.anthropic.com".to_string() }
fn default_model() -> String { "claude-3-5-haiku-latest".to_string() }
fn default_completion_timeout_ms() -> u64 { 30_000 }
fn default_max_tokens() -> u32 { 1024 }
fn default_retry_transport_errors() -> bool { true }

impl CompletionConfig {
    /// A blank credential counts as absent.
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            timeout_ms: default_completion_timeout_ms(),
            max_tokens: default_max_tokens(),
            retry_transport_errors: default_retry_transport_errors(),
        }
    }
}

// ─── Context Builder Config ─────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_max_recent_orders")]
    pub max_recent_orders: usize,
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
    #[serde(default = "default_max_segments")]
    pub max_segments: usize,
    #[serde(default = "default_max_customers_scanned")]
    pub max_customers_scanned: usize,
}

fn default_max_recent_orders() -> usize { 10 }
fn default_max_context_chars() -> usize { 8000 }
fn default_max_segments() -> usize { 20 }
fn default_max_customers_scanned() -> usize { 5000 }

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_recent_orders: default_max_recent_orders(),
            max_context_chars: default_max_context_chars(),
            max_segments: default_max_segments(),
            max_customers_scanned: default_max_customers_scanned(),
        }
    }
}

// ─── Scoring Config ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_score_cache_ttl_secs")]
    pub score_cache_ttl_secs: u64,
    #[serde(default = "default_order_history_limit")]
    pub order_history_limit: usize,
}

fn default_score_cache_ttl_secs() -> u64 { 300 }
fn default_order_history_limit() -> usize { 500 }

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            score_cache_ttl_secs: default_score_cache_ttl_secs(),
            order_history_limit: default_order_history_limit(),
        }
    }
}

// ─── Alert Thresholds ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct AlertThresholds {
    /// Warn when the At Risk population grows by at least this percentage.
    #[serde(default = "default_at_risk_growth_pct")]
    pub at_risk_growth_pct: f64,
    /// Critical when Lost customers make up at least this share of the base.
    #[serde(default = "default_lost_share_pct")]
    pub lost_share_pct: f64,
    /// Warn when the Champion population shrinks by at least this percentage.
    #[serde(default = "default_champion_drop_pct")]
    pub champion_drop_pct: f64,
    /// Spend above this multiple of the average marks a customer high-value.
    #[serde(default = "default_high_value_multiple")]
    pub high_value_multiple: f64,
    #[serde(default = "default_dormant_days")]
    pub dormant_days: i64,
    #[serde(default = "default_comparison_window_days")]
    pub comparison_window_days: i64,
}

fn default_at_risk_growth_pct() -> f64 { 10.0 }
fn default_lost_share_pct() -> f64 { 25.0 }
fn default_champion_drop_pct() -> f64 { 10.0 }
fn default_high_value_multiple() -> f64 { 2.0 }
fn default_dormant_days() -> i64 { 60 }
fn default_comparison_window_days() -> i64 { 7 }

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            at_risk_growth_pct: default_at_risk_growth_pct(),
            lost_share_pct: default_lost_share_pct(),
            champion_drop_pct: default_champion_drop_pct(),
            high_value_multiple: default_high_value_multiple(),
            dormant_days: default_dormant_days(),
            comparison_window_days: default_comparison_window_days(),
        }
    }
}

// ─── Data Config ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DataConfig {
    /// JSON file used to seed the in-memory repository.
    #[serde(default)]
    pub seed_path: Option<String>,
    /// JSON array of persisted segment definitions registered at startup.
    #[serde(default)]
    pub segments_path: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables and optional config file.
    pub fn load(config_file: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = config_file {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("CUSTOMER_INTEL")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("api.admin_tokens"),
            )
            .build()?;
        config.try_deserialize()
    }

    /// Load for startup. A file named explicitly must load, so its errors
    /// are returned; an environment-only load that fails falls back to
    /// defaults with a warning.
    pub fn load_or_default(config_file: Option<&str>) -> Result<Self, config::ConfigError> {
        match Self::load(config_file) {
            Ok(config) => Ok(config),
            Err(e) if config_file.is_none() => {
                tracing::warn!(error = %e, "Failed to load config from environment, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }
}
