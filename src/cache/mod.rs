//! Tiered caching: in-process L1 plus external L2 with promotion,
//! pattern invalidation, metrics and health reporting.

pub mod error;
mod l1;
mod metrics;
mod tiered;
mod types;

#[cfg(test)]
mod tiered_tests;

pub use error::CacheError;
pub use metrics::CacheMetrics;
pub use tiered::TieredCache;
pub use types::{CacheLevel, CacheOptions, CacheSource, GetResult, HealthState, HealthStatus};
