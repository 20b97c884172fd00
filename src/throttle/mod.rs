//! Distributed rate limiting with in-process fallback.

mod storage;
mod types;


pub use storage::ThrottleStorage;
pub use types::{RateLimitRecord, ThrottleHealth, ThrottleMetrics};
