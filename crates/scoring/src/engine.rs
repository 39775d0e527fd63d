//! Health scoring engine: stateless computation over a customer's order history.
//!
//! Scoring never fails. Empty or malformed histories degrade to the lowest
//! score (0/0/0, `Lost`) so dashboards always have something to render.

use chrono::{DateTime, Utc};
use intel_core::types::{CustomerView, HealthScore, Order, PopulationStats};
use tracing::debug;

/// Recency bands: (max days since last order, points). Non-increasing.
const RECENCY_BANDS: [(i64, u8); 4] = [(7, 33), (30, 25), (90, 15), (180, 5)];

/// Frequency points per order-per-month of active lifetime.
const FREQUENCY_POINTS_PER_MONTHLY_ORDER: f64 = 11.0;

/// Monetary points awarded for spending exactly the population average.
/// Twice the average (or more) earns the maximum.
const MONETARY_POINTS_AT_AVERAGE: f64 = 17.0;

/// Absolute spend bands used when no population average is available:
/// (minimum lifetime spend, points). Checked top-down.
const MONETARY_FALLBACK_BANDS: [(f64, u8); 5] = [
    (1000.0, 34),
    (500.0, 26),
    (250.0, 18),
    (100.0, 10),
    (0.01, 5),
];

const DAYS_PER_MONTH: f64 = 30.44;

/// Computes RFM health scores relative to a population's average spend.
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthScorer {
    average_spend: Option<f64>,
}

impl HealthScorer {
    pub fn new(population: &PopulationStats) -> Self {
        Self::with_average_spend(Some(population.average_spend))
    }

    /// Build a scorer from an optional average; non-positive or non-finite
    /// averages select the absolute fallback scale.
    pub fn with_average_spend(average_spend: Option<f64>) -> Self {
        Self {
            average_spend: average_spend.filter(|avg| avg.is_finite() && *avg > 0.0),
        }
    }

    pub fn average_spend(&self) -> Option<f64> {
        self.average_spend
    }

    /// Score an order history at `reference_time`.
    pub fn score(&self, orders: &[Order], reference_time: DateTime<Utc>) -> HealthScore {
        let countable: Vec<&Order> = orders.iter().filter(|o| o.is_countable()).collect();

        let (Some(first), Some(last)) = (
            countable.iter().map(|o| o.placed_at).min(),
            countable.iter().map(|o| o.placed_at).max(),
        ) else {
            return HealthScore::lowest();
        };

        let days_since_last = (reference_time - last).num_days().max(0);
        let days_since_first = (reference_time - first).num_days().max(0);
        let spend: f64 = countable.iter().map(|o| o.total).sum();

        let score = HealthScore::from_parts(
            recency_score(Some(days_since_last)),
            frequency_score(countable.len(), days_since_first),
            monetary_score(spend, self.average_spend),
        );

        debug!(
            orders = countable.len(),
            skipped = orders.len() - countable.len(),
            days_since_last,
            spend,
            composite = score.composite,
            label = %score.label,
            "Health score computed"
        );

        score
    }

    /// Score using only orders placed at or before `as_of`, as the history
    /// would have looked at that instant.
    pub fn score_as_of(&self, orders: &[Order], as_of: DateTime<Utc>) -> HealthScore {
        let visible: Vec<Order> = orders
            .iter()
            .filter(|o| o.placed_at <= as_of)
            .cloned()
            .collect();
        self.score(&visible, as_of)
    }

    /// Score from the repository's aggregate view alone, for callers that
    /// have no order list at hand.
    pub fn score_view(&self, customer: &CustomerView, reference_time: DateTime<Utc>) -> HealthScore {
        let (Some(first), Some(last)) = (customer.first_order_at, customer.last_order_at) else {
            return HealthScore::lowest();
        };
        if customer.order_count == 0 || !customer.lifetime_spend.is_finite() {
            return HealthScore::lowest();
        }

        HealthScore::from_parts(
            recency_score(Some((reference_time - last).num_days().max(0))),
            frequency_score(
                customer.order_count as usize,
                (reference_time - first).num_days().max(0),
            ),
            monetary_score(customer.lifetime_spend.max(0.0), self.average_spend),
        )
    }
}

/// Recency points for days elapsed since the most recent order.
/// `None` (no orders) scores zero.
pub fn recency_score(days_since_last: Option<i64>) -> u8 {
    let Some(days) = days_since_last else {
        return 0;
    };
    let days = days.max(0);
    RECENCY_BANDS
        .iter()
        .find(|(max_days, _)| days <= *max_days)
        .map(|(_, points)| *points)
        .unwrap_or(0)
}

/// Frequency points from orders per month over the active lifetime.
/// Lifetimes shorter than a month count as one month.
pub fn frequency_score(order_count: usize, days_since_first: i64) -> u8 {
    if order_count == 0 {
        return 0;
    }
    let months = (days_since_first.max(0) as f64 / DAYS_PER_MONTH).max(1.0);
    let per_month = order_count as f64 / months;
    clamp_points(per_month * FREQUENCY_POINTS_PER_MONTHLY_ORDER, HealthScore::MAX_FREQUENCY)
}

/// Monetary points from lifetime spend, relative to the population average
/// when one is known, otherwise against fixed spend bands.
pub fn monetary_score(lifetime_spend: f64, average_spend: Option<f64>) -> u8 {
    if !lifetime_spend.is_finite() || lifetime_spend <= 0.0 {
        return 0;
    }
    match average_spend.filter(|avg| avg.is_finite() && *avg > 0.0) {
        Some(avg) => clamp_points(
            lifetime_spend / avg * MONETARY_POINTS_AT_AVERAGE,
            HealthScore::MAX_MONETARY,
        ),
        None => MONETARY_FALLBACK_BANDS
            .iter()
            .find(|(min_spend, _)| lifetime_spend >= *min_spend)
            .map(|(_, points)| *points)
            .unwrap_or(0),
    }
}

fn clamp_points(raw: f64, max: u8) -> u8 {
    if !raw.is_finite() {
        return 0;
    }
    raw.round().clamp(0.0, max as f64) as u8
}
