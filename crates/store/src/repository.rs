//! Repository collaborator contract consumed by the intelligence engine.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use intel_core::error::IntelError;
use intel_core::types::{CustomerView, Order, PopulationStats};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("repository unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("failed to read seed data: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse seed data: {0}")]
    Parse(#[from] serde_json::Error),
}

impl From<RepositoryError> for IntelError {
    fn from(err: RepositoryError) -> Self {
        IntelError::Data(err.to_string())
    }
}

/// Optional narrowing for `list_customers`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerFilter {
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub min_orders: Option<u32>,
    /// Only customers whose last order is at or after this instant.
    #[serde(default)]
    pub active_since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl CustomerFilter {
    pub fn accepts(&self, customer: &CustomerView) -> bool {
        if let Some(tag) = &self.tag {
            if !customer.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
                return false;
            }
        }
        if let Some(min) = self.min_orders {
            if customer.order_count < min {
                return false;
            }
        }
        if let Some(since) = self.active_since {
            if customer.last_order_at.map_or(true, |last| last < since) {
                return false;
            }
        }
        true
    }
}

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn get_customer(&self, id: &str) -> Result<Option<CustomerView>, RepositoryError>;

    /// Up to `limit` orders for a customer, most recent first.
    async fn list_orders(&self, customer_id: &str, limit: usize)
        -> Result<Vec<Order>, RepositoryError>;

    /// Customers ordered by id.
    async fn list_customers(
        &self,
        filter: Option<&CustomerFilter>,
    ) -> Result<Vec<CustomerView>, RepositoryError>;

    async fn population_stats(&self) -> Result<PopulationStats, RepositoryError>;
}
