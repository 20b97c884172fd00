//! Strata library crate: a two-tier cache engine with declarative cache
//! bindings and a distributed rate-limiter counter store.
//!
//! # Public API Surface
//!
//! The exports are organized by module:
//!
//! ## Cache
//! - [`TieredCache`] - L1 (in-process) + L2 (external store) read-through cache
//! - [`CacheOptions`], [`CacheLevel`] - Per-operation TTL, tier and namespace
//! - [`GetResult`], [`CacheSource`] - Lookup metadata
//! - [`CacheMetrics`], [`HealthStatus`], [`HealthState`] - Observability
//!
//! ## Declarative Bindings
//! - [`CacheBinding`], [`Cacheable`], [`Invalidate`] - Wrap operations with
//!   cache rules resolved from positional key templates
//! - [`KeyArg`], [`resolve_template`] - Template argument rendering
//!
//! ## Rate Limiting
//! - [`ThrottleStorage`] - Shared-budget counters with in-process fallback
//! - [`RateLimitRecord`], [`ThrottleHealth`], [`ThrottleMetrics`]
//!
//! ## Infrastructure
//! - [`Config`], [`ConfigError`] - Environment-backed configuration
//! - [`KvBackend`], [`RedisBackend`] - External store interface
//! - [`Flag`], [`FlagSource`], [`EnvFlagSource`], [`StaticFlags`] - Runtime flags
//! - [`KeyBuilder`], [`pattern_to_matcher`] - Key namespacing
//! - [`spawn_cache_sweep`], [`spawn_throttle_sweep`] - Background reclamation
//!
//! ## Test/Mock Support
//! [`MemoryBackend`] is available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod backend;
pub mod binding;
pub mod cache;
pub mod config;
pub mod constants;
pub mod flags;
pub mod keys;
pub mod maintenance;
pub mod throttle;

pub use backend::{BackendError, BackendResult, KvBackend, RedisBackend};
#[cfg(any(test, feature = "mock"))]
pub use backend::MemoryBackend;

pub use binding::{CacheBinding, Cacheable, Invalidate, KeyArg, resolve_template};
pub use cache::{
    CacheError, CacheLevel, CacheMetrics, CacheOptions, CacheSource, GetResult, HealthState,
    HealthStatus, TieredCache,
};
pub use config::{Config, ConfigError, DEFAULT_REDIS_URL};
pub use flags::{EnvFlagSource, Flag, FlagSource, StaticFlags};
pub use keys::{KeyBuilder, pattern_to_matcher};
pub use maintenance::{spawn_cache_sweep, spawn_throttle_sweep};
pub use throttle::{RateLimitRecord, ThrottleHealth, ThrottleMetrics, ThrottleStorage};
