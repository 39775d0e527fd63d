//! Fixed-window rate limiter backed by DashMap.
//!
//! Each key owns one entry. The read-modify-write of an entry happens under
//! the DashMap shard lock for that key, so two concurrent admissions for the
//! same key can never both observe spare quota when only one slot is left.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use intel_core::config::RateLimitConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::Clock;

/// Per-key fixed-window counter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub key: String,
    pub count: u32,
    pub window_reset_at: DateTime<Utc>,
}

/// Result returned by `check`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
    pub limit: u32,
}

/// Longest admission window accepted; longer configured windows are clamped.
pub const MAX_WINDOW_SECS: u64 = 366 * 24 * 60 * 60;

/// In-memory admission gate. A quota of zero rejects everything.
pub struct RateLimiter {
    entries: DashMap<String, RateLimitEntry>,
    max_requests: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            max_requests: config.max_requests,
            window: window_duration(config.window_secs),
            clock,
        }
    }

    pub fn limit(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    fn window_end(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(self.window)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Admit (and consume) one request for `key` at `now`.
    pub fn admit(&self, key: &str, now: DateTime<Utc>) -> bool {
        self.decide(key, now).allowed
    }

    /// Admit one request for `key` at the limiter's clock time and report
    /// the remaining quota and window reset time.
    pub fn check(&self, key: &str) -> RateLimitDecision {
        self.decide(key, self.clock.now())
    }

    fn decide(&self, key: &str, now: DateTime<Utc>) -> RateLimitDecision {
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| RateLimitEntry {
                key: key.to_string(),
                count: 0,
                window_reset_at: self.window_end(now),
            });

        if now > entry.window_reset_at {
            entry.count = 0;
            entry.window_reset_at = self.window_end(now);
        }

        if entry.count < self.max_requests {
            entry.count += 1;
            RateLimitDecision {
                allowed: true,
                remaining: self.max_requests - entry.count,
                reset_at: entry.window_reset_at,
                limit: self.max_requests,
            }
        } else {
            debug!(key, count = entry.count, reset_at = %entry.window_reset_at, "Admission rejected");
            RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_at: entry.window_reset_at,
                limit: self.max_requests,
            }
        }
    }

    /// Read current usage for a key (if any).
    pub fn usage(&self, key: &str) -> Option<RateLimitEntry> {
        self.entries.get(key).map(|e| e.value().clone())
    }
}

fn window_duration(window_secs: u64) -> Duration {
    let secs = window_secs.min(MAX_WINDOW_SECS);
    if secs < window_secs {
        warn!(window_secs, clamped_to = secs, "Rate limit window clamped");
    }
    // MAX_WINDOW_SECS fits comfortably in a TimeDelta.
    Duration::try_seconds(secs as i64).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Barrier;

    fn limiter(max_requests: u32, window_secs: u64) -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let limiter = RateLimiter::new(
            &RateLimitConfig {
                max_requests,
                window_secs,
            },
            clock.clone(),
        );
        (limiter, clock)
    }

    #[test]
    fn test_window_quota_and_rollover() {
        let (limiter, clock) = limiter(20, 3600);
        let t0 = clock.now();

        for i in 0..20 {
            assert!(limiter.admit("admin:1", t0), "request {i} should be allowed");
        }
        assert!(!limiter.admit("admin:1", t0 + Duration::seconds(10)));

        let usage = limiter.usage("admin:1").unwrap();
        assert_eq!(usage.count, 20);
        assert_eq!(usage.window_reset_at, t0 + Duration::seconds(3600));

        // After the window elapses the counter starts over at 1.
        let later = t0 + Duration::seconds(3601);
        assert!(limiter.admit("admin:1", later));
        let usage = limiter.usage("admin:1").unwrap();
        assert_eq!(usage.count, 1);
        assert_eq!(usage.window_reset_at, later + Duration::seconds(3600));
    }

    #[test]
    fn test_rejections_do_not_extend_window() {
        let (limiter, clock) = limiter(2, 60);
        let t0 = clock.now();
        assert!(limiter.admit("k", t0));
        assert!(limiter.admit("k", t0));

        for s in 1..=60 {
            assert!(!limiter.admit("k", t0 + Duration::seconds(s)));
        }
        assert_eq!(limiter.usage("k").unwrap().window_reset_at, t0 + Duration::seconds(60));
        assert!(limiter.admit("k", t0 + Duration::seconds(61)));
    }

    #[test]
    fn test_check_uses_injected_clock() {
        let (limiter, clock) = limiter(3, 60);
        assert_eq!(limiter.check("k").remaining, 2);
        assert_eq!(limiter.check("k").remaining, 1);
        assert_eq!(limiter.check("k").remaining, 0);

        let rejected = limiter.check("k");
        assert!(!rejected.allowed);
        assert_eq!(rejected.limit, 3);

        clock.advance(Duration::seconds(61));
        let fresh = limiter.check("k");
        assert!(fresh.allowed);
        assert_eq!(fresh.remaining, 2);
    }

    #[test]
    fn test_keys_are_independent() {
        let (limiter, clock) = limiter(1, 60);
        let now = clock.now();
        assert!(limiter.admit("a", now));
        assert!(!limiter.admit("a", now));
        assert!(limiter.admit("b", now));
    }

    #[test]
    fn test_zero_quota_rejects() {
        let (limiter, clock) = limiter(0, 60);
        assert!(!limiter.admit("k", clock.now()));
    }

    #[test]
    fn test_oversized_window_is_clamped() {
        let (limiter, clock) = limiter(1, u64::MAX);
        assert_eq!(limiter.window(), Duration::seconds(MAX_WINDOW_SECS as i64));

        let now = clock.now();
        assert!(limiter.admit("k", now));
        assert_eq!(
            limiter.usage("k").unwrap().window_reset_at,
            now + Duration::seconds(MAX_WINDOW_SECS as i64)
        );
        assert!(!limiter.admit("k", now + Duration::days(300)));
    }

    #[test]
    fn test_window_end_saturates_at_latest_instant() {
        let (limiter, _clock) = limiter(1, 3600);
        let near_end = DateTime::<Utc>::MAX_UTC - Duration::seconds(10);

        assert!(limiter.admit("k", near_end));
        assert_eq!(limiter.usage("k").unwrap().window_reset_at, DateTime::<Utc>::MAX_UTC);
        assert!(!limiter.admit("k", near_end));
    }

    #[test]
    fn test_concurrent_admissions_never_exceed_quota() {
        const THREADS: usize = 32;
        const ATTEMPTS: usize = 20;
        const QUOTA: u32 = 25;

        for _round in 0..20 {
            let (limiter, clock) = limiter(QUOTA, 3600);
            let now = clock.now();
            let admitted = AtomicU32::new(0);
            let barrier = Barrier::new(THREADS);

            std::thread::scope(|scope| {
                for _ in 0..THREADS {
                    scope.spawn(|| {
                        barrier.wait();
                        for _ in 0..ATTEMPTS {
                            if limiter.admit("shared", now) {
                                admitted.fetch_add(1, Ordering::SeqCst);
                            }
                        }
                    });
                }
            });

            assert_eq!(admitted.load(Ordering::SeqCst), QUOTA);
            assert_eq!(limiter.usage("shared").unwrap().count, QUOTA);
        }
    }
}
