//! In-memory repository backed by DashMap, optionally seeded from a JSON file.
//! Customer aggregates are derived from the stored orders on every read.

use std::path::Path;

use async_trait::async_trait;
use dashmap::DashMap;
use intel_core::types::{CustomerView, Order, PopulationStats};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::repository::{CustomerFilter, CustomerRepository, RepositoryError};

/// Identity fields of a customer; order aggregates are computed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// On-disk seed format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub customers: Vec<CustomerProfile>,
    #[serde(default)]
    pub orders: Vec<Order>,
}

struct CustomerRecord {
    profile: CustomerProfile,
    orders: Vec<Order>,
}

impl CustomerRecord {
    fn view(&self) -> CustomerView {
        let countable: Vec<&Order> = self.orders.iter().filter(|o| o.is_countable()).collect();
        CustomerView {
            id: self.profile.id.clone(),
            name: self.profile.name.clone(),
            email: self.profile.email.clone(),
            order_count: countable.len() as u32,
            lifetime_spend: countable.iter().map(|o| o.total).sum(),
            first_order_at: countable.iter().map(|o| o.placed_at).min(),
            last_order_at: countable.iter().map(|o| o.placed_at).max(),
            tags: self.profile.tags.clone(),
        }
    }
}

pub struct InMemoryRepository {
    customers: DashMap<String, CustomerRecord>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            customers: DashMap::new(),
        }
    }

    pub fn from_seed(seed: SeedData) -> Self {
        let repo = Self::new();
        for profile in seed.customers {
            repo.upsert_customer(profile);
        }
        let mut orphaned = 0usize;
        for order in seed.orders {
            if repo.record_order(order).is_err() {
                orphaned += 1;
            }
        }
        if orphaned > 0 {
            warn!(orphaned, "Seed orders referenced unknown customers and were skipped");
        }
        repo
    }

    /// Load a JSON seed file (`{"customers": [...], "orders": [...]}`).
    pub async fn load_seed_file(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        let seed: SeedData = serde_json::from_str(&raw)?;
        let repo = Self::from_seed(seed);
        info!(
            path = %path.as_ref().display(),
            customers = repo.len(),
            "Repository seeded"
        );
        Ok(repo)
    }

    /// Insert or replace a customer's identity fields, keeping its orders.
    pub fn upsert_customer(&self, profile: CustomerProfile) {
        self.customers
            .entry(profile.id.clone())
            .and_modify(|record| record.profile = profile.clone())
            .or_insert_with(|| CustomerRecord {
                profile,
                orders: Vec::new(),
            });
    }

    /// Append an order to an existing customer.
    pub fn record_order(&self, order: Order) -> Result<(), RepositoryError> {
        let mut record = self.customers.get_mut(&order.customer_id).ok_or_else(|| {
            RepositoryError::Corrupt(format!(
                "order {} references unknown customer {}",
                order.id, order.customer_id
            ))
        })?;
        record.orders.push(order);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.customers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CustomerRepository for InMemoryRepository {
    async fn get_customer(&self, id: &str) -> Result<Option<CustomerView>, RepositoryError> {
        Ok(self.customers.get(id).map(|r| r.view()))
    }

    async fn list_orders(
        &self,
        customer_id: &str,
        limit: usize,
    ) -> Result<Vec<Order>, RepositoryError> {
        let Some(record) = self.customers.get(customer_id) else {
            return Ok(Vec::new());
        };
        let mut orders = record.orders.clone();
        drop(record);
        orders.sort_by(|a, b| b.placed_at.cmp(&a.placed_at).then_with(|| a.id.cmp(&b.id)));
        orders.truncate(limit);
        Ok(orders)
    }

    async fn list_customers(
        &self,
        filter: Option<&CustomerFilter>,
    ) -> Result<Vec<CustomerView>, RepositoryError> {
        let mut views: Vec<CustomerView> = self
            .customers
            .iter()
            .map(|r| r.view())
            .filter(|v| filter.map_or(true, |f| f.accepts(v)))
            .collect();
        views.sort_by(|a, b| a.id.cmp(&b.id));
        if let Some(limit) = filter.and_then(|f| f.limit) {
            views.truncate(limit);
        }
        Ok(views)
    }

    async fn population_stats(&self) -> Result<PopulationStats, RepositoryError> {
        let views: Vec<CustomerView> = self.customers.iter().map(|r| r.view()).collect();
        let customer_count = views.len();
        if customer_count == 0 {
            return Ok(PopulationStats::default());
        }
        let total_spend: f64 = views.iter().map(|v| v.lifetime_spend).sum();
        let total_orders: u64 = views.iter().map(|v| v.order_count as u64).sum();
        Ok(PopulationStats {
            customer_count,
            average_spend: total_spend / customer_count as f64,
            average_order_count: total_orders as f64 / customer_count as f64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use intel_core::types::OrderStatus;
    use std::io::Write;

    fn profile(id: &str) -> CustomerProfile {
        CustomerProfile {
            id: id.to_string(),
            name: format!("Customer {id}"),
            email: None,
            tags: Vec::new(),
        }
    }

    fn order(id: &str, customer: &str, days_ago: i64, total: f64) -> Order {
        Order {
            id: id.to_string(),
            customer_id: customer.to_string(),
            placed_at: Utc::now() - Duration::days(days_ago),
            total,
            items: Vec::new(),
            status: OrderStatus::Delivered,
        }
    }

    fn seeded() -> InMemoryRepository {
        InMemoryRepository::from_seed(SeedData {
            customers: vec![profile("c-2"), profile("c-1"), profile("c-3")],
            orders: vec![
                order("o-1", "c-1", 30, 100.0),
                order("o-2", "c-1", 2, 50.0),
                order("o-3", "c-2", 10, 150.0),
                order("o-4", "ghost", 1, 999.0),
            ],
        })
    }

    #[tokio::test]
    async fn test_views_aggregate_orders() {
        let repo = seeded();
        let c1 = repo.get_customer("c-1").await.unwrap().unwrap();
        assert_eq!(c1.order_count, 2);
        assert_eq!(c1.lifetime_spend, 150.0);
        assert!(c1.first_order_at.unwrap() < c1.last_order_at.unwrap());

        let c3 = repo.get_customer("c-3").await.unwrap().unwrap();
        assert_eq!(c3.order_count, 0);
        assert!(c3.last_order_at.is_none());

        assert!(repo.get_customer("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_orders_most_recent_first_and_limited() {
        let repo = seeded();
        let orders = repo.list_orders("c-1", 10).await.unwrap();
        assert_eq!(orders.iter().map(|o| o.id.as_str()).collect::<Vec<_>>(), vec!["o-2", "o-1"]);
        assert_eq!(repo.list_orders("c-1", 1).await.unwrap().len(), 1);
        assert!(repo.list_orders("ghost", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_customers_sorted_and_filtered() {
        let repo = seeded();
        let all = repo.list_customers(None).await.unwrap();
        assert_eq!(all.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(), vec!["c-1", "c-2", "c-3"]);

        let filter = CustomerFilter {
            min_orders: Some(1),
            limit: Some(1),
            ..Default::default()
        };
        let some = repo.list_customers(Some(&filter)).await.unwrap();
        assert_eq!(some.len(), 1);
        assert_eq!(some[0].id, "c-1");
    }

    #[tokio::test]
    async fn test_population_stats() {
        let repo = seeded();
        let stats = repo.population_stats().await.unwrap();
        assert_eq!(stats.customer_count, 3);
        assert_eq!(stats.average_spend, 100.0);
        assert!((stats.average_order_count - 1.0).abs() < f64::EPSILON);

        let empty = InMemoryRepository::new().population_stats().await.unwrap();
        assert_eq!(empty.average_spend, 0.0);
    }

    #[tokio::test]
    async fn test_load_seed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"customers":[{{"id":"c-9","name":"Grace","tags":["vip"]}}],
                "orders":[{{"id":"o-9","customer_id":"c-9","placed_at":"2024-03-01T12:00:00Z","total":75.5}}]}}"#
        )
        .unwrap();

        let repo = InMemoryRepository::load_seed_file(file.path()).await.unwrap();
        let view = repo.get_customer("c-9").await.unwrap().unwrap();
        assert_eq!(view.order_count, 1);
        assert_eq!(view.tags, vec!["vip"]);
    }

    #[tokio::test]
    async fn test_load_seed_file_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            InMemoryRepository::load_seed_file(file.path()).await,
            Err(RepositoryError::Parse(_))
        ));
    }
}
