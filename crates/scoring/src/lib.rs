//! RFM health scoring: recency, frequency, and monetary sub-scores combined
//! into a 0–100 composite with a label, plus a TTL cache for computed scores.

pub mod cache;
pub mod engine;

pub use cache::{CachedScore, ScoreCache};
pub use engine::HealthScorer;
