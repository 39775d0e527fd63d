//! Context builder: assembles the grounded, size-bounded summary handed to
//! the completion service.
//!
//! Everything here is read-only against the repository. Scores come from the
//! scoring engine (through the TTL cache) and memberships from the segment
//! registry; nothing is written back.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use intel_core::config::{AlertThresholds, ContextConfig, ScoringConfig};
use intel_core::error::{IntelError, IntelResult};
use intel_core::types::{HealthLabel, Order, OrderStatus, PopulationStats};
use intel_platform::Clock;
use intel_scoring::{CachedScore, HealthScorer, ScoreCache};
use intel_segmentation::engine::evaluate;
use intel_segmentation::{CustomerSnapshot, SegmentRegistry};
use intel_store::{CustomerFilter, CustomerRepository};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ─── Request shape ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Query,
    Insight,
    Alerts,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Query => "query",
            RequestKind::Insight => "insight",
            RequestKind::Alerts => "alerts",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "query" => Some(RequestKind::Query),
            "insight" => Some(RequestKind::Insight),
            "alerts" => Some(RequestKind::Alerts),
            _ => None,
        }
    }
}

/// What a context is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    Population,
    Customer(String),
}

// ─── Bundle ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LabelCount {
    pub label: HealthLabel,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    pub id: String,
    pub placed_at: DateTime<Utc>,
    pub total: f64,
    pub status: OrderStatus,
    pub item_count: u32,
}

impl From<&Order> for OrderSummary {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.clone(),
            placed_at: order.placed_at,
            total: order.total,
            status: order.status,
            item_count: order.items.iter().map(|i| i.quantity).sum(),
        }
    }
}

/// The subject customer of an insight (or a customer-scoped query).
#[derive(Debug, Clone, Serialize)]
pub struct CustomerContext {
    pub snapshot: CustomerSnapshot,
    pub segments: Vec<String>,
    /// Most recent first, capped.
    pub recent_orders: Vec<OrderSummary>,
    pub older_orders_omitted: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SegmentSize {
    pub name: String,
    pub size: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DormantCustomer {
    pub id: String,
    pub name: String,
    pub lifetime_spend: f64,
    pub days_since_last_order: i64,
}

/// Label distribution `window_days` ago, for week-over-week alerting.
#[derive(Debug, Clone, Serialize)]
pub struct TrendSummary {
    pub window_days: i64,
    pub previous: Vec<LabelCount>,
    pub previous_total: usize,
    pub dormant_high_value: Vec<DormantCustomer>,
}

impl TrendSummary {
    pub fn previous_count(&self, label: HealthLabel) -> usize {
        count_of(&self.previous, label)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ContextBundle {
    pub kind: RequestKind,
    pub generated_at: DateTime<Utc>,
    pub population: PopulationStats,
    pub customers_scanned: usize,
    pub distribution: Vec<LabelCount>,
    pub segments: Vec<SegmentSize>,
    pub customer: Option<CustomerContext>,
    pub trend: Option<TrendSummary>,
    pub notes: Option<String>,
    /// Set when the builder already capped something (scan size, orders,
    /// segment list).
    pub truncated: bool,
}

/// Text form of a bundle fitted to a character budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedContext {
    pub text: String,
    pub truncated: bool,
}

impl ContextBundle {
    pub fn count(&self, label: HealthLabel) -> usize {
        count_of(&self.distribution, label)
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        self
    }

    /// Render to at most `max_chars` characters.
    ///
    /// Over budget, the oldest recent orders go first, then trailing
    /// segments, then the admin notes; a hard cut is the last resort. The
    /// result depends only on the bundle, so a fixed snapshot always renders
    /// identically.
    pub fn render(&self, max_chars: usize) -> RenderedContext {
        let mut orders: Vec<String> = self
            .customer
            .as_ref()
            .map(|c| c.recent_orders.iter().map(render_order).collect())
            .unwrap_or_default();
        let mut segments: Vec<String> = self.segments.iter().map(render_segment).collect();
        let mut notes = self.notes.as_deref();
        let mut omitted_orders = self.customer.as_ref().map_or(0, |c| c.older_orders_omitted);
        let mut omitted_segments = 0usize;
        let mut dropped = false;

        loop {
            let text = self.compose(&segments, omitted_segments, notes, &orders, omitted_orders);
            if text.chars().count() <= max_chars {
                return RenderedContext {
                    text,
                    truncated: self.truncated || dropped,
                };
            }

            dropped = true;
            if orders.pop().is_some() {
                omitted_orders += 1;
            } else if segments.pop().is_some() {
                omitted_segments += 1;
            } else if notes.is_some() {
                notes = None;
            } else {
                return RenderedContext {
                    text: text.chars().take(max_chars).collect(),
                    truncated: true,
                };
            }
        }
    }

    fn compose(
        &self,
        segments: &[String],
        omitted_segments: usize,
        notes: Option<&str>,
        orders: &[String],
        omitted_orders: usize,
    ) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Customer intelligence context ({})", self.kind.as_str());
        let _ = writeln!(out, "Generated at: {}", self.generated_at.to_rfc3339());

        let _ = writeln!(out, "\n## Population");
        let _ = writeln!(
            out,
            "Customers: {} (scanned {})",
            self.population.customer_count, self.customers_scanned
        );
        let _ = writeln!(out, "Average lifetime spend: {:.2}", self.population.average_spend);
        let _ = writeln!(out, "Average orders per customer: {:.1}", self.population.average_order_count);

        let _ = writeln!(out, "\n## Health distribution");
        for entry in &self.distribution {
            let _ = writeln!(
                out,
                "{}: {} ({:.1}%)",
                entry.label,
                entry.count,
                percent(entry.count, self.customers_scanned)
            );
        }

        if let Some(trend) = &self.trend {
            let _ = writeln!(out, "\n## Change over the last {} days", trend.window_days);
            for entry in &self.distribution {
                let _ = writeln!(
                    out,
                    "{}: {} -> {}",
                    entry.label,
                    trend.previous_count(entry.label),
                    entry.count
                );
            }
            let _ = writeln!(
                out,
                "Dormant high-value customers: {}",
                trend.dormant_high_value.len()
            );
        }

        if !segments.is_empty() || omitted_segments > 0 {
            let _ = writeln!(out, "\n## Segments");
            for line in segments {
                let _ = writeln!(out, "{line}");
            }
            if omitted_segments > 0 {
                let _ = writeln!(out, "({omitted_segments} more segments omitted)");
            }
        }

        if let Some(customer) = &self.customer {
            let snap = &customer.snapshot;
            let view = &snap.customer;
            let health = &snap.health;
            let _ = writeln!(out, "\n## Customer {}", view.id);
            let _ = writeln!(out, "Name: {}", view.name);
            let _ = writeln!(
                out,
                "Health: {} ({}), recency {}, frequency {}, monetary {}",
                health.composite, health.label, health.recency, health.frequency, health.monetary
            );
            let _ = writeln!(
                out,
                "Orders: {}, lifetime spend {:.2}",
                view.order_count, view.lifetime_spend
            );
            match snap.days_since_last_order {
                Some(days) => {
                    let _ = writeln!(out, "Last order: {days} days ago");
                }
                None => {
                    let _ = writeln!(out, "Last order: never");
                }
            }
            if !view.tags.is_empty() {
                let _ = writeln!(out, "Tags: {}", view.tags.join(", "));
            }
            if !customer.segments.is_empty() {
                let _ = writeln!(out, "Segments: {}", customer.segments.join(", "));
            }
        }

        if let Some(notes) = notes {
            let _ = writeln!(out, "\n## Admin notes\n{notes}");
        }

        if !orders.is_empty() || omitted_orders > 0 {
            let _ = writeln!(out, "\n## Recent orders (most recent first)");
            for line in orders {
                let _ = writeln!(out, "{line}");
            }
            if omitted_orders > 0 {
                let _ = writeln!(out, "({omitted_orders} older orders omitted)");
            }
        }

        out
    }
}

fn render_order(order: &OrderSummary) -> String {
    format!(
        "- {} {} {:.2} {:?} ({} items)",
        order.id,
        order.placed_at.format("%Y-%m-%d"),
        order.total,
        order.status,
        order.item_count
    )
}

fn render_segment(segment: &SegmentSize) -> String {
    format!("- {}: {} members", segment.name, segment.size)
}

fn count_of(distribution: &[LabelCount], label: HealthLabel) -> usize {
    distribution
        .iter()
        .find(|c| c.label == label)
        .map_or(0, |c| c.count)
}

pub(crate) fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn distribution(labels: impl Iterator<Item = HealthLabel>) -> Vec<LabelCount> {
    let mut counts = [0usize; 5];
    for label in labels {
        counts[label_index(label)] += 1;
    }
    HealthLabel::ALL
        .into_iter()
        .map(|label| LabelCount {
            label,
            count: counts[label_index(label)],
        })
        .collect()
}

fn label_index(label: HealthLabel) -> usize {
    match label {
        HealthLabel::Champion => 0,
        HealthLabel::Loyal => 1,
        HealthLabel::Promising => 2,
        HealthLabel::AtRisk => 3,
        HealthLabel::Lost => 4,
    }
}

// ─── Population scan ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ScannedCustomer {
    pub snapshot: CustomerSnapshot,
    /// Most recent first, capped at the order history limit.
    pub orders: Vec<Order>,
}

/// Every customer (up to the scan cap) scored at one instant.
#[derive(Debug, Clone)]
pub struct PopulationScan {
    pub scanned_at: DateTime<Utc>,
    pub stats: PopulationStats,
    pub customers: Vec<ScannedCustomer>,
    pub truncated: bool,
}

impl PopulationScan {
    pub fn snapshots(&self) -> Vec<CustomerSnapshot> {
        self.customers.iter().map(|c| c.snapshot.clone()).collect()
    }

    pub fn distribution(&self) -> Vec<LabelCount> {
        distribution(self.customers.iter().map(|c| c.snapshot.health.label))
    }
}

// ─── Builder ────────────────────────────────────────────────────────────────

pub struct ContextBuilder {
    repository: Arc<dyn CustomerRepository>,
    segments: Arc<SegmentRegistry>,
    scores: Arc<ScoreCache>,
    clock: Arc<dyn Clock>,
    limits: ContextConfig,
    order_history_limit: usize,
    thresholds: AlertThresholds,
}

impl ContextBuilder {
    pub fn new(
        repository: Arc<dyn CustomerRepository>,
        segments: Arc<SegmentRegistry>,
        scores: Arc<ScoreCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            segments,
            scores,
            clock,
            limits: ContextConfig::default(),
            order_history_limit: ScoringConfig::default().order_history_limit,
            thresholds: AlertThresholds::default(),
        }
    }

    pub fn with_limits(mut self, limits: ContextConfig) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_order_history_limit(mut self, limit: usize) -> Self {
        self.order_history_limit = limit;
        self
    }

    pub fn with_thresholds(mut self, thresholds: AlertThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn limits(&self) -> &ContextConfig {
        &self.limits
    }

    pub fn thresholds(&self) -> &AlertThresholds {
        &self.thresholds
    }

    pub fn segments(&self) -> &Arc<SegmentRegistry> {
        &self.segments
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Assemble the bundle for one request. A customer subject that does not
    /// exist fails with `NotFound` before the population is scanned.
    pub async fn build(&self, kind: RequestKind, subject: &Subject) -> IntelResult<ContextBundle> {
        let customer = match subject {
            Subject::Customer(id) => Some(self.customer_context(id).await?),
            Subject::Population => None,
        };

        let scan = self.scan().await?;
        let snapshots = scan.snapshots();

        let definitions = self.segments.list();
        let segments_capped = definitions.len() > self.limits.max_segments;
        let segments: Vec<SegmentSize> = definitions
            .into_iter()
            .take(self.limits.max_segments)
            .map(|def| SegmentSize {
                size: evaluate(&snapshots, &def.rule).len(),
                name: def.name,
            })
            .collect();

        let trend = (kind == RequestKind::Alerts).then(|| self.trend(&scan));
        let truncated = scan.truncated
            || segments_capped
            || customer.as_ref().is_some_and(|c| c.older_orders_omitted > 0);

        debug!(
            kind = kind.as_str(),
            scanned = scan.customers.len(),
            segments = segments.len(),
            truncated,
            "Context assembled"
        );

        Ok(ContextBundle {
            kind,
            generated_at: scan.scanned_at,
            population: scan.stats,
            customers_scanned: scan.customers.len(),
            distribution: scan.distribution(),
            segments,
            customer,
            trend,
            notes: None,
            truncated,
        })
    }

    /// Score one customer and collect its memberships and recent orders.
    pub async fn customer_context(&self, customer_id: &str) -> IntelResult<CustomerContext> {
        let now = self.clock.now();
        let view = self
            .repository
            .get_customer(customer_id)
            .await?
            .ok_or_else(|| IntelError::NotFound(format!("customer {customer_id}")))?;
        let stats = self.repository.population_stats().await?;
        let scorer = HealthScorer::new(&stats);
        let orders = self
            .repository
            .list_orders(customer_id, self.order_history_limit)
            .await?;

        let cached = self.cached_score(&scorer, customer_id, &orders, now);
        let snapshot = CustomerSnapshot::new(view, cached.score, cached.scored_at);
        let mut segments = self.segments.memberships(&snapshot);
        segments.truncate(self.limits.max_segments);

        let recent_orders: Vec<OrderSummary> = orders
            .iter()
            .take(self.limits.max_recent_orders)
            .map(OrderSummary::from)
            .collect();
        let older_orders_omitted = orders.len().saturating_sub(recent_orders.len());

        Ok(CustomerContext {
            snapshot,
            segments,
            recent_orders,
            older_orders_omitted,
        })
    }

    /// Score every customer up to the scan cap, ordered by id.
    pub async fn scan(&self) -> IntelResult<PopulationScan> {
        let now = self.clock.now();
        let stats = self.repository.population_stats().await?;
        let scorer = HealthScorer::new(&stats);

        let cap = self.limits.max_customers_scanned;
        let filter = CustomerFilter {
            limit: Some(cap.saturating_add(1)),
            ..Default::default()
        };
        let mut views = self.repository.list_customers(Some(&filter)).await?;
        let truncated = views.len() > cap;
        views.truncate(cap);

        let mut customers = Vec::with_capacity(views.len());
        for view in views {
            let orders = self
                .repository
                .list_orders(&view.id, self.order_history_limit)
                .await?;
            let cached = self.cached_score(&scorer, &view.id, &orders, now);
            customers.push(ScannedCustomer {
                snapshot: CustomerSnapshot::new(view, cached.score, cached.scored_at),
                orders,
            });
        }

        Ok(PopulationScan {
            scanned_at: now,
            stats,
            customers,
            truncated,
        })
    }

    /// A score still fresh at `now`, or a new one scored at `now`. The
    /// snapshot must use the returned `scored_at` as its reference time so
    /// its day counts agree with the score's recency.
    fn cached_score(
        &self,
        scorer: &HealthScorer,
        customer_id: &str,
        orders: &[Order],
        now: DateTime<Utc>,
    ) -> CachedScore {
        if let Some(cached) = self.scores.get(customer_id, now) {
            return cached;
        }
        let score = scorer.score(orders, now);
        self.scores.put(customer_id, score, now);
        CachedScore {
            score,
            scored_at: now,
        }
    }

    fn trend(&self, scan: &PopulationScan) -> TrendSummary {
        let window_days = self.thresholds.comparison_window_days.max(1);
        let as_of = scan.scanned_at - Duration::days(window_days);
        let scorer = HealthScorer::new(&scan.stats);

        // Customers with no qualifying order yet at `as_of` did not exist
        // as scored customers then.
        let previous_labels: Vec<HealthLabel> = scan
            .customers
            .iter()
            .filter(|c| c.orders.iter().any(|o| o.is_countable() && o.placed_at <= as_of))
            .map(|c| scorer.score_as_of(&c.orders, as_of).label)
            .collect();

        let spend_floor = scan.stats.average_spend * self.thresholds.high_value_multiple;
        let mut dormant_high_value: Vec<DormantCustomer> = if scan.stats.average_spend > 0.0 {
            scan.customers
                .iter()
                .filter_map(|c| {
                    let days = c.snapshot.days_since_last_order?;
                    let view = &c.snapshot.customer;
                    (view.lifetime_spend >= spend_floor && days >= self.thresholds.dormant_days).then(|| {
                        DormantCustomer {
                            id: view.id.clone(),
                            name: view.name.clone(),
                            lifetime_spend: view.lifetime_spend,
                            days_since_last_order: days,
                        }
                    })
                })
                .collect()
        } else {
            Vec::new()
        };
        dormant_high_value.sort_by(|a, b| {
            b.lifetime_spend
                .total_cmp(&a.lifetime_spend)
                .then_with(|| a.id.cmp(&b.id))
        });

        TrendSummary {
            window_days,
            previous_total: previous_labels.len(),
            previous: distribution(previous_labels.into_iter()),
            dormant_high_value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intel_core::types::LineItem;
    use intel_platform::ManualClock;
    use intel_segmentation::SegmentBuilder;
    use intel_store::memory::{CustomerProfile, SeedData};
    use intel_store::InMemoryRepository;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn order(id: &str, customer: &str, days_ago: i64, total: f64) -> Order {
        Order {
            id: id.to_string(),
            customer_id: customer.to_string(),
            placed_at: t0() - Duration::days(days_ago),
            total,
            items: vec![LineItem {
                sku: "SKU-1".to_string(),
                name: "Widget".to_string(),
                quantity: 2,
                unit_price: total / 2.0,
            }],
            status: OrderStatus::Delivered,
        }
    }

    fn profile(id: &str, name: &str, tags: &[&str]) -> CustomerProfile {
        CustomerProfile {
            id: id.to_string(),
            name: name.to_string(),
            email: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn builder() -> ContextBuilder {
        let mut orders: Vec<Order> = (0..12)
            .map(|i| order(&format!("a-{i:02}"), "c-ada", 3 + i * 12, 50.0))
            .collect();
        orders.push(order("b-1", "c-bob", 200, 20.0));
        let repo = InMemoryRepository::from_seed(SeedData {
            customers: vec![
                profile("c-ada", "Ada", &["vip"]),
                profile("c-bob", "Bob", &[]),
                profile("c-cy", "Cy", &[]),
            ],
            orders,
        });
        let registry = SegmentRegistry::new();
        registry
            .register(SegmentBuilder::new("VIPs").tagged("vip").build().unwrap())
            .unwrap();
        registry
            .register(SegmentBuilder::new("Lost").label_is(HealthLabel::Lost).build().unwrap())
            .unwrap();

        ContextBuilder::new(
            Arc::new(repo),
            Arc::new(registry),
            Arc::new(ScoreCache::new(300)),
            Arc::new(ManualClock::new(t0())),
        )
        .with_limits(ContextConfig {
            max_recent_orders: 5,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_customer_context_caps_recent_orders() {
        let ctx = builder().customer_context("c-ada").await.unwrap();
        assert_eq!(ctx.recent_orders.len(), 5);
        assert_eq!(ctx.older_orders_omitted, 7);
        assert_eq!(ctx.recent_orders[0].id, "a-00");
        assert!(ctx
            .recent_orders
            .windows(2)
            .all(|w| w[0].placed_at >= w[1].placed_at));
        assert_eq!(ctx.segments, vec!["VIPs".to_string()]);
        assert_eq!(ctx.recent_orders[0].item_count, 2);
    }

    #[tokio::test]
    async fn test_cached_score_follows_injected_clock() {
        let repo = InMemoryRepository::from_seed(SeedData {
            customers: vec![profile("c-dee", "Dee", &[])],
            orders: vec![order("d-1", "c-dee", 1, 120.0)],
        });
        let clock = Arc::new(ManualClock::new(t0()));
        let builder = ContextBuilder::new(
            Arc::new(repo),
            Arc::new(SegmentRegistry::new()),
            Arc::new(ScoreCache::new(300)),
            clock.clone(),
        );

        let first = builder.customer_context("c-dee").await.unwrap();
        assert_eq!(first.snapshot.health.recency, 33);
        assert_eq!(first.snapshot.days_since_last_order, Some(1));

        // Within the TTL the cached score is served with its own reference time.
        clock.advance(Duration::seconds(60));
        let cached = builder.customer_context("c-dee").await.unwrap();
        assert_eq!(cached.snapshot.health, first.snapshot.health);
        assert_eq!(cached.snapshot.days_since_last_order, Some(1));

        clock.advance(Duration::days(400));
        let later = builder.customer_context("c-dee").await.unwrap();
        assert_eq!(later.snapshot.days_since_last_order, Some(401));
        assert_eq!(later.snapshot.health.recency, 0);
        assert_ne!(later.snapshot.health.label, first.snapshot.health.label);
    }

    #[tokio::test]
    async fn test_unknown_customer_is_not_found() {
        let err = builder()
            .build(RequestKind::Insight, &Subject::Customer("ghost".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_population_bundle() {
        let bundle = builder().build(RequestKind::Query, &Subject::Population).await.unwrap();
        assert_eq!(bundle.customers_scanned, 3);
        assert_eq!(bundle.distribution.iter().map(|c| c.count).sum::<usize>(), 3);
        assert!(bundle.count(HealthLabel::Lost) >= 1);
        assert!(bundle.trend.is_none());
        assert!(bundle.segments.contains(&SegmentSize {
            name: "VIPs".to_string(),
            size: 1
        }));
        assert!(!bundle.truncated);
    }

    #[tokio::test]
    async fn test_scan_cap_marks_truncated() {
        let bundle = builder()
            .with_limits(ContextConfig {
                max_customers_scanned: 2,
                ..Default::default()
            })
            .build(RequestKind::Query, &Subject::Population)
            .await
            .unwrap();
        assert_eq!(bundle.customers_scanned, 2);
        assert!(bundle.truncated);
    }

    #[tokio::test]
    async fn test_alerts_bundle_carries_trend() {
        let bundle = builder().build(RequestKind::Alerts, &Subject::Population).await.unwrap();
        let trend = bundle.trend.expect("alerts context has a trend");
        assert_eq!(trend.window_days, 7);
        // Cy has no orders, so only Ada and Bob existed a week ago.
        assert_eq!(trend.previous_total, 2);
    }

    #[tokio::test]
    async fn test_render_is_deterministic_and_drops_oldest_first() {
        let bundle = builder()
            .build(RequestKind::Insight, &Subject::Customer("c-ada".to_string()))
            .await
            .unwrap()
            .with_notes(Some("Focus on retention".to_string()));

        let full = bundle.render(100_000);
        assert_eq!(full, bundle.render(100_000));
        assert!(full.text.contains("a-04"));
        assert!(full.text.contains("Focus on retention"));
        // The builder already omitted seven older orders.
        assert!(full.truncated);

        let budget = full.text.chars().count() - 10;
        let tight = bundle.render(budget);
        assert!(tight.text.chars().count() <= budget);
        assert!(tight.truncated);
        assert!(!tight.text.contains("a-04"));
        assert!(tight.text.contains("a-00"));
    }

    #[tokio::test]
    async fn test_render_hard_cuts_when_nothing_left_to_drop() {
        let bundle = builder().build(RequestKind::Query, &Subject::Population).await.unwrap();
        let rendered = bundle.render(40);
        assert_eq!(rendered.text.chars().count(), 40);
        assert!(rendered.truncated);
    }

    #[test]
    fn test_request_kind_parse() {
        assert_eq!(RequestKind::parse(" Alerts "), Some(RequestKind::Alerts));
        assert_eq!(RequestKind::parse("summary"), None);
    }
}
