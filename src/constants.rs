//! Crate-wide defaults and health thresholds.

use std::time::Duration;

/// Default TTL applied when an operation gives no explicit TTL.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Default capacity bound for the in-memory L1 store.
pub const DEFAULT_L1_MAX_ITEMS: usize = 1_000;

/// Default namespace prepended to every cache key.
pub const DEFAULT_GLOBAL_PREFIX: &str = "strata:";

/// Default namespace prepended to every rate-limiter key.
pub const DEFAULT_THROTTLE_PREFIX: &str = "strata:throttle:";

/// Default period for the L1 expiry sweep and the throttle memory sweep.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Hit rate below this is `Unhealthy` (only evaluated once gets exist).
pub const MIN_DEGRADED_HIT_RATE: f64 = 0.2;

/// Hit rate below this (but at or above [`MIN_DEGRADED_HIT_RATE`]) is `Degraded`.
pub const MIN_HEALTHY_HIT_RATE: f64 = 0.5;

/// Key read by the health probe to measure L2 round-trip latency.
pub const HEALTH_PROBE_KEY: &str = "health:ping";

/// Batch size passed to the L2 cursor scan during pattern deletes.
pub const SCAN_BATCH_SIZE: usize = 100;
