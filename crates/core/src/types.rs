//! Shared domain types: customers, orders, health scores, and alerts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Orders ─────────────────────────────────────────────────────────────────

/// A placed order. Immutable once created; read-only input to scoring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: String,
    pub customer_id: String,
    pub placed_at: DateTime<Utc>,
    pub total: f64,
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub status: OrderStatus,
}

impl Order {
    /// Whether the order should count toward a customer's value.
    /// Cancelled/refunded orders and malformed totals are skipped.
    pub fn is_countable(&self) -> bool {
        !matches!(self.status, OrderStatus::Cancelled | OrderStatus::Refunded)
            && self.total.is_finite()
            && self.total >= 0.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    pub sku: String,
    pub name: String,
    pub quantity: u32,
    pub unit_price: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    #[default]
    Paid,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

// ─── Customers ──────────────────────────────────────────────────────────────

/// Read-only customer projection owned by the repository.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerView {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub order_count: u32,
    pub lifetime_spend: f64,
    #[serde(default)]
    pub first_order_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_order_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Population-wide aggregates used to normalize monetary scores.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct PopulationStats {
    pub customer_count: usize,
    pub average_spend: f64,
    pub average_order_count: f64,
}

// ─── Health Score ───────────────────────────────────────────────────────────

/// RFM health label derived from the composite score.
///
/// On the wire a label is its display name ("Champion", "At Risk", ...).
/// Deserialization accepts any spelling `parse` accepts, so `at_risk` and
/// `AtRisk` also read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HealthLabel {
    Lost,
    AtRisk,
    Promising,
    Loyal,
    Champion,
}

impl HealthLabel {
    pub const ALL: [HealthLabel; 5] = [
        HealthLabel::Champion,
        HealthLabel::Loyal,
        HealthLabel::Promising,
        HealthLabel::AtRisk,
        HealthLabel::Lost,
    ];

    /// Lower bound (inclusive) of the composite band for this label.
    pub fn lower_bound(&self) -> u8 {
        match self {
            HealthLabel::Champion => 80,
            HealthLabel::Loyal => 60,
            HealthLabel::Promising => 40,
            HealthLabel::AtRisk => 20,
            HealthLabel::Lost => 0,
        }
    }

    /// Map a composite score to its label. Values above 100 are treated as 100.
    pub fn from_composite(composite: u8) -> Self {
        Self::ALL
            .into_iter()
            .find(|label| composite >= label.lower_bound())
            .unwrap_or(HealthLabel::Lost)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthLabel::Champion => "Champion",
            HealthLabel::Loyal => "Loyal",
            HealthLabel::Promising => "Promising",
            HealthLabel::AtRisk => "At Risk",
            HealthLabel::Lost => "Lost",
        }
    }

    /// Lenient parse: case-insensitive, ignores spaces, `-` and `_`.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "champion" => Some(HealthLabel::Champion),
            "loyal" => Some(HealthLabel::Loyal),
            "promising" => Some(HealthLabel::Promising),
            "atrisk" => Some(HealthLabel::AtRisk),
            "lost" => Some(HealthLabel::Lost),
            _ => None,
        }
    }
}

impl Serialize for HealthLabel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for HealthLabel {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        HealthLabel::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown health label `{raw}`")))
    }
}

impl std::fmt::Display for HealthLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recency/frequency/monetary score. Always recomputed from order history.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthScore {
    pub recency: u8,
    pub frequency: u8,
    pub monetary: u8,
    pub composite: u8,
    pub label: HealthLabel,
}

impl HealthScore {
    pub const MAX_RECENCY: u8 = 33;
    pub const MAX_FREQUENCY: u8 = 33;
    pub const MAX_MONETARY: u8 = 34;

    /// Build a score from sub-scores, clamping each to its range so that
    /// `composite == recency + frequency + monetary` always holds.
    pub fn from_parts(recency: u8, frequency: u8, monetary: u8) -> Self {
        let recency = recency.min(Self::MAX_RECENCY);
        let frequency = frequency.min(Self::MAX_FREQUENCY);
        let monetary = monetary.min(Self::MAX_MONETARY);
        let composite = recency + frequency + monetary;
        Self {
            recency,
            frequency,
            monetary,
            composite,
            label: HealthLabel::from_composite(composite),
        }
    }

    /// The floor score: no recency, frequency or monetary signal.
    pub fn lowest() -> Self {
        Self::from_parts(0, 0, 0)
    }
}

// ─── Alerts ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl AlertSeverity {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "info" => Some(AlertSeverity::Info),
            "warning" | "warn" => Some(AlertSeverity::Warning),
            "critical" => Some(AlertSeverity::Critical),
            _ => None,
        }
    }
}

/// Ephemeral dashboard alert; produced per request, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub severity: AlertSeverity,
    pub title: String,
    pub body: String,
    pub generated_at: DateTime<Utc>,
}
