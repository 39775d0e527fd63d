//! Shared runtime plumbing: an injectable clock and the per-key admission
//! gate guarding calls to the completion service.

pub mod clock;
pub mod rate_limit;

pub use clock::{Clock, ManualClock, SystemClock};
pub use rate_limit::RateLimiter;
