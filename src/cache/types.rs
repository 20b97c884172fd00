//! Public value types for the tiered cache.

use std::time::Duration;

use serde::Serialize;

/// Which tiers an operation may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheLevel {
    /// In-process tier only; no external-store calls.
    L1Only,
    /// External store only; the in-process tier is neither read nor written.
    L2Only,
    /// Both tiers, with L2 hits promoted into L1.
    #[default]
    Both,
}

impl CacheLevel {
    #[inline]
    pub(crate) fn allows_l1(self) -> bool {
        !matches!(self, CacheLevel::L2Only)
    }

    #[inline]
    pub(crate) fn allows_l2(self) -> bool {
        !matches!(self, CacheLevel::L1Only)
    }
}

/// Per-operation options for get/set.
#[derive(Debug, Clone, Default)]
pub struct CacheOptions {
    /// TTL override; the configured default applies when `None`.
    pub ttl: Option<Duration>,
    /// Tier selection.
    pub level: CacheLevel,
    /// Namespace override replacing the global prefix.
    pub prefix: Option<String>,
}

impl CacheOptions {
    /// Options with an explicit TTL and defaults elsewhere.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            ..Self::default()
        }
    }

    /// Options restricted to a tier.
    pub fn with_level(level: CacheLevel) -> Self {
        Self {
            level,
            ..Self::default()
        }
    }
}

/// Which tier served a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheSource {
    L1,
    L2,
    None,
}

/// A lookup result with tier and latency metadata.
#[derive(Debug, Clone)]
pub struct GetResult<T> {
    /// The value, absent on miss.
    pub value: Option<T>,
    /// Whether any tier served the request.
    pub hit: bool,
    /// Tier that served the request.
    pub source: CacheSource,
    /// Wall time spent inside the cache (including any L2 round trip).
    pub latency: Duration,
}

impl<T> GetResult<T> {
    pub(crate) fn miss(latency: Duration) -> Self {
        Self {
            value: None,
            hit: false,
            source: CacheSource::None,
            latency,
        }
    }

    pub(crate) fn hit(value: T, source: CacheSource, latency: Duration) -> Self {
        Self {
            value: Some(value),
            hit: true,
            source,
            latency,
        }
    }
}

/// Overall component health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Point-in-time health report, derived from metrics plus a live L2 probe.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: HealthState,
    pub l1_available: bool,
    pub l1_items: usize,
    pub l2_available: bool,
    /// Probe round-trip in milliseconds; `None` when the probe failed or L2
    /// is unavailable.
    pub l2_latency_ms: Option<u64>,
    pub hit_rate: f64,
    pub total_operations: u64,
}
