//! Core segmentation engine: evaluates customer membership on demand.
//!
//! Member sets are never stored; `materialize` recomputes them from the
//! snapshots it is handed, so the same segment yields different members as
//! customer data changes.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use intel_core::types::{CustomerView, HealthScore};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::rules::{AttributeSource, AttributeValue, CustomerField, RuleNode};
use crate::schema::{SchemaError, SegmentDefinition};

/// A customer as seen by the rule evaluator at a fixed reference time.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerSnapshot {
    pub customer: CustomerView,
    pub health: HealthScore,
    pub days_since_last_order: Option<i64>,
}

impl CustomerSnapshot {
    pub fn new(customer: CustomerView, health: HealthScore, reference_time: DateTime<Utc>) -> Self {
        let days_since_last_order = customer
            .last_order_at
            .map(|last| (reference_time - last).num_days().max(0));
        Self {
            customer,
            health,
            days_since_last_order,
        }
    }

    pub fn id(&self) -> &str {
        &self.customer.id
    }
}

impl AttributeSource for CustomerSnapshot {
    fn attribute(&self, field: CustomerField) -> AttributeValue<'_> {
        match field {
            CustomerField::HealthLabel => AttributeValue::Label(self.health.label),
            CustomerField::CompositeScore => AttributeValue::Number(self.health.composite as f64),
            CustomerField::LifetimeSpend if self.customer.lifetime_spend.is_finite() => {
                AttributeValue::Number(self.customer.lifetime_spend)
            }
            CustomerField::LifetimeSpend => AttributeValue::Missing,
            CustomerField::OrderCount => AttributeValue::Number(self.customer.order_count as f64),
            CustomerField::DaysSinceLastOrder => self
                .days_since_last_order
                .map(|d| AttributeValue::Number(d as f64))
                .unwrap_or(AttributeValue::Missing),
            CustomerField::SegmentTags => AttributeValue::Tags(&self.customer.tags),
        }
    }
}

/// Whether a single customer satisfies a rule.
pub fn matches(snapshot: &CustomerSnapshot, rule: &RuleNode) -> bool {
    rule.evaluate(snapshot)
}

/// Ids of every customer satisfying a rule, in sorted order.
pub fn evaluate<'a, I>(customers: I, rule: &RuleNode) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a CustomerSnapshot>,
{
    customers
        .into_iter()
        .filter(|c| matches(c, rule))
        .map(|c| c.id().to_string())
        .collect()
}

/// In-process store of segment definitions.
pub struct SegmentRegistry {
    segments: dashmap::DashMap<Uuid, SegmentDefinition>,
}

impl SegmentRegistry {
    pub fn new() -> Self {
        Self {
            segments: dashmap::DashMap::new(),
        }
    }

    /// Validate and create a new segment.
    pub fn create(
        &self,
        name: impl Into<String>,
        description: Option<String>,
        rule: RuleNode,
    ) -> Result<SegmentDefinition, SchemaError> {
        let definition = SegmentDefinition::new(name, description, rule)?;
        self.segments.insert(definition.id, definition.clone());
        info!(segment_id = %definition.id, name = %definition.name, "Segment created");
        Ok(definition)
    }

    /// Register an already-persisted definition (e.g. loaded from disk).
    pub fn register(&self, definition: SegmentDefinition) -> Result<(), SchemaError> {
        definition.validate()?;
        self.segments.insert(definition.id, definition);
        Ok(())
    }

    /// Register every definition in a JSON array. Entries that fail to parse
    /// or validate are skipped with a warning; returns how many were loaded.
    pub fn load_json(&self, raw: &str) -> Result<usize, SchemaError> {
        let entries: Vec<serde_json::Value> = serde_json::from_str(raw)?;
        let mut loaded = 0;
        for (index, entry) in entries.into_iter().enumerate() {
            let parsed = serde_json::from_value::<SegmentDefinition>(entry)
                .map_err(SchemaError::from)
                .and_then(|definition| self.register(definition));
            match parsed {
                Ok(()) => loaded += 1,
                Err(e) => warn!(index, error = %e, "Skipping stored segment"),
            }
        }
        Ok(loaded)
    }

    /// All definitions as a JSON array, in `list` order.
    pub fn export_json(&self) -> Result<String, SchemaError> {
        Ok(serde_json::to_string_pretty(&self.list())?)
    }

    pub fn get(&self, id: &Uuid) -> Option<SegmentDefinition> {
        self.segments.get(id).map(|s| s.clone())
    }

    /// All definitions, oldest first (ties broken by name).
    pub fn list(&self) -> Vec<SegmentDefinition> {
        let mut all: Vec<SegmentDefinition> =
            self.segments.iter().map(|s| s.value().clone()).collect();
        all.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        all
    }

    pub fn delete(&self, id: &Uuid) -> bool {
        self.segments.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Names of every segment the customer currently belongs to, sorted.
    pub fn memberships(&self, snapshot: &CustomerSnapshot) -> Vec<String> {
        let mut names: Vec<String> = self
            .segments
            .iter()
            .filter(|entry| matches(snapshot, &entry.value().rule))
            .map(|entry| entry.value().name.clone())
            .collect();
        names.sort();
        names
    }

    /// Compute the current member set of a segment. `None` if unknown.
    pub fn materialize(
        &self,
        id: &Uuid,
        customers: &[CustomerSnapshot],
    ) -> Option<BTreeSet<String>> {
        let definition = self.get(id)?;
        let members = evaluate(customers, &definition.rule);
        debug!(
            segment_id = %id,
            scanned = customers.len(),
            members = members.len(),
            "Segment materialized"
        );
        Some(members)
    }
}

impl Default for SegmentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
