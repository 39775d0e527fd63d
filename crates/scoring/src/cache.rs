//! In-process health score cache backed by DashMap.
//! Scores are derived data; entries expire after an explicit TTL so a cached
//! score never drifts far from the order history it was computed from.
//!
//! The cache never reads a clock itself. Callers pass the instant they are
//! working at, and every entry remembers the instant it was scored at, so a
//! hit can be paired with the reference time its recency was measured from.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use intel_core::types::HealthScore;

/// A score together with the instant it was computed for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachedScore {
    pub score: HealthScore,
    pub scored_at: DateTime<Utc>,
}

/// Lock-free cache of recently computed scores, keyed by customer id.
pub struct ScoreCache {
    store: DashMap<String, CachedScore>,
    ttl: Duration,
}

impl ScoreCache {
    pub fn new(ttl_secs: u64) -> Self {
        let ttl = i64::try_from(ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        Self {
            store: DashMap::new(),
            ttl,
        }
    }

    fn is_fresh(&self, entry: &CachedScore, now: DateTime<Utc>) -> bool {
        // An entry from the future (clock moved back) is never served.
        now >= entry.scored_at && now - entry.scored_at <= self.ttl
    }

    /// Get a score as of `now`; None if missing, expired, or scored after `now`.
    pub fn get(&self, customer_id: &str, now: DateTime<Utc>) -> Option<CachedScore> {
        let entry = *self.store.get(customer_id)?;
        if !self.is_fresh(&entry, now) {
            self.store.remove(customer_id);
            return None;
        }
        Some(entry)
    }

    pub fn put(&self, customer_id: impl Into<String>, score: HealthScore, scored_at: DateTime<Utc>) {
        self.store
            .insert(customer_id.into(), CachedScore { score, scored_at });
    }

    pub fn invalidate(&self, customer_id: &str) {
        self.store.remove(customer_id);
    }

    /// Remove entries that are stale as of `now`. Call this periodically
    /// from a background task.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.store.len();
        self.store.retain(|_, entry| self.is_fresh(entry, now));
        before - self.store.len()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}
