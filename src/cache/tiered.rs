//! Two-tier read-through cache.
//!
//! Lookups consult the in-process L1 store first, then the external L2
//! store, promoting L2 hits back into L1. The L2 tier is best-effort: any
//! backend failure is logged, counted, and absorbed — callers see a miss,
//! never an error. Feature flags can disable the whole cache or just the
//! L2 tier at runtime without a restart.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::backend::KvBackend;
use crate::config::Config;
use crate::constants::{
    HEALTH_PROBE_KEY, MIN_DEGRADED_HIT_RATE, MIN_HEALTHY_HIT_RATE, SCAN_BATCH_SIZE,
};
use crate::flags::{Flag, FlagSource};
use crate::keys::{pattern_to_matcher, KeyBuilder};

use super::error::CacheError;
use super::l1::L1Store;
use super::metrics::{CacheMetrics, MetricsRegistry};
use super::types::{CacheOptions, CacheSource, GetResult, HealthState, HealthStatus};

/// Two-tier cache over an in-process store and a [`KvBackend`].
///
/// Values are stored as JSON, so one instance serves values of any
/// serializable type. Cloning is not supported; share via [`Arc`].
pub struct TieredCache<B: KvBackend> {
    backend: B,
    keys: KeyBuilder,
    l1: L1Store,
    metrics: MetricsRegistry,
    flags: Arc<dyn FlagSource>,
    default_ttl: Duration,
}

impl<B: KvBackend> std::fmt::Debug for TieredCache<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCache")
            .field("keys", &self.keys)
            .field("l1_len", &self.l1.len())
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

impl<B: KvBackend> TieredCache<B> {
    /// Builds a cache over `backend` using the configured prefix, TTL and
    /// L1 capacity.
    pub fn new(backend: B, config: &Config, flags: Arc<dyn FlagSource>) -> Self {
        Self {
            backend,
            keys: KeyBuilder::new(config.global_prefix.clone()),
            l1: L1Store::new(config.l1_max_items),
            metrics: MetricsRegistry::new(),
            flags,
            default_ttl: config.default_ttl,
        }
    }

    /// The key builder in use (shared namespace for external callers).
    pub fn key_builder(&self) -> &KeyBuilder {
        &self.keys
    }

    fn enabled(&self) -> bool {
        self.flags.is_enabled(Flag::CacheEnabled)
    }

    fn l2_enabled(&self) -> bool {
        self.flags.is_enabled(Flag::L2Enabled)
    }

    fn ttl_for(&self, options: &CacheOptions) -> Duration {
        options.ttl.unwrap_or(self.default_ttl)
    }

    /// Looks up `key`, returning the value alone. See
    /// [`TieredCache::get_with_metadata`] for tier and latency details.
    pub async fn get<T: DeserializeOwned>(&self, key: &str, options: &CacheOptions) -> Option<T> {
        self.get_with_metadata(key, options).await.value
    }

    /// Looks up `key`, reporting which tier served it and how long the
    /// lookup took.
    pub async fn get_with_metadata<T: DeserializeOwned>(
        &self,
        key: &str,
        options: &CacheOptions,
    ) -> GetResult<T> {
        let start = Instant::now();
        if !self.enabled() {
            return GetResult::miss(start.elapsed());
        }

        let full_key = self.keys.build_with(key, options.prefix.as_deref());

        if options.level.allows_l1() {
            if let Some(value) = self.l1.get(&full_key) {
                match serde_json::from_value::<T>(value) {
                    Ok(typed) => {
                        self.metrics.record_l1_hit();
                        debug!(key = %full_key, "L1 hit");
                        return GetResult::hit(typed, CacheSource::L1, start.elapsed());
                    }
                    Err(e) => {
                        // Stored under a different type; treat as corrupt.
                        warn!(key = %full_key, error = %e, "L1 value failed to deserialize");
                        self.metrics.record_error();
                        self.l1.remove(&full_key);
                    }
                }
            }
        }

        if options.level.allows_l2() && self.l2_enabled() {
            match self.backend.get(&full_key).await {
                Ok(Some(raw)) => match serde_json::from_str::<Value>(&raw) {
                    Ok(value) => {
                        if options.level.allows_l1() {
                            self.l1.insert(&full_key, value.clone(), self.ttl_for(options));
                        }
                        match serde_json::from_value::<T>(value) {
                            Ok(typed) => {
                                self.metrics.record_l2_hit();
                                debug!(key = %full_key, "L2 hit");
                                return GetResult::hit(typed, CacheSource::L2, start.elapsed());
                            }
                            Err(e) => {
                                warn!(key = %full_key, error = %e, "L2 value failed to deserialize");
                                self.metrics.record_error();
                            }
                        }
                    }
                    Err(e) => {
                        warn!(key = %full_key, error = %e, "L2 value is not valid JSON");
                        self.metrics.record_error();
                    }
                },
                Ok(None) => {}
                Err(e) => {
                    warn!(key = %full_key, error = %e, "L2 get failed, treating as miss");
                    self.metrics.record_error();
                }
            }
        }

        self.metrics.record_miss();
        GetResult::miss(start.elapsed())
    }

    /// Stores `value` under `key` in the tiers `options.level` allows.
    ///
    /// L2 write failures are absorbed; only serialization of the value
    /// itself can fail.
    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        options: &CacheOptions,
    ) -> Result<(), CacheError> {
        if !self.enabled() {
            return Ok(());
        }

        let json = serde_json::to_value(value)?;
        let full_key = self.keys.build_with(key, options.prefix.as_deref());
        let ttl = self.ttl_for(options);

        if options.level.allows_l1() {
            self.l1.insert(&full_key, json.clone(), ttl);
        }

        if options.level.allows_l2() && self.l2_enabled() {
            let raw = json.to_string();
            // Sub-second TTLs round up; the store rejects a zero expiry.
            let ttl_secs = ttl.as_secs().max(1);
            if let Err(e) = self.backend.set(&full_key, &raw, ttl_secs).await {
                warn!(key = %full_key, error = %e, "L2 set failed, value cached in L1 only");
                self.metrics.record_error();
            }
        }

        self.metrics.record_set();
        Ok(())
    }

    /// Removes `key` from both tiers.
    pub async fn delete(&self, key: &str, options: &CacheOptions) {
        if !self.enabled() {
            return;
        }

        let full_key = self.keys.build_with(key, options.prefix.as_deref());
        self.l1.remove(&full_key);

        if self.l2_enabled() {
            if let Err(e) = self.backend.del(&full_key).await {
                warn!(key = %full_key, error = %e, "L2 delete failed");
                self.metrics.record_error();
            }
        }

        self.metrics.record_delete();
    }

    /// Removes every key matching a glob `pattern` (`*` wildcards) from
    /// both tiers. Returns the number of L1 entries removed; L2 deletions
    /// happen via an iterative scan and are not counted.
    #[instrument(skip(self))]
    pub async fn delete_by_pattern(&self, pattern: &str, options: &CacheOptions) -> usize {
        if !self.enabled() {
            return 0;
        }

        let full_pattern = self.keys.build_with(pattern, options.prefix.as_deref());
        let matcher = pattern_to_matcher(&full_pattern);
        let removed = self.l1.remove_matching(&matcher);

        if self.l2_enabled() {
            let mut cursor = 0u64;
            loop {
                match self.backend.scan(cursor, &full_pattern, SCAN_BATCH_SIZE).await {
                    Ok((next, keys)) => {
                        if !keys.is_empty() {
                            if let Err(e) = self.backend.del_many(&keys).await {
                                warn!(pattern = %full_pattern, error = %e, "L2 batch delete failed");
                                self.metrics.record_error();
                                break;
                            }
                        }
                        if next == 0 {
                            break;
                        }
                        cursor = next;
                    }
                    Err(e) => {
                        warn!(pattern = %full_pattern, error = %e, "L2 scan failed");
                        self.metrics.record_error();
                        break;
                    }
                }
            }
        }

        debug!(pattern = %full_pattern, removed, "pattern delete");
        removed
    }

    /// Returns whether `key` is present in any allowed tier.
    pub async fn exists(&self, key: &str, options: &CacheOptions) -> bool {
        if !self.enabled() {
            return false;
        }

        let full_key = self.keys.build_with(key, options.prefix.as_deref());

        if options.level.allows_l1() && self.l1.contains(&full_key) {
            return true;
        }

        if options.level.allows_l2() && self.l2_enabled() {
            match self.backend.exists(&full_key).await {
                Ok(found) => return found,
                Err(e) => {
                    warn!(key = %full_key, error = %e, "L2 exists failed");
                    self.metrics.record_error();
                }
            }
        }

        false
    }

    /// Read-through helper: returns the cached value, or runs `load`,
    /// caches its result, and returns it.
    ///
    /// Loader errors propagate unchanged and nothing is cached. Cache write
    /// failures after a successful load are absorbed so the loaded value is
    /// always returned.
    pub async fn get_or_set<T, E, F, Fut>(
        &self,
        key: &str,
        options: &CacheOptions,
        load: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get(key, options).await {
            return Ok(value);
        }

        let value = load().await?;
        if let Err(e) = self.set(key, &value, options).await {
            warn!(key, error = %e, "failed to cache loaded value");
            self.metrics.record_error();
        }
        Ok(value)
    }

    /// Batch lookup; result positions mirror `keys`. Lookups run
    /// sequentially to keep ordering simple.
    pub async fn get_many<T: DeserializeOwned>(
        &self,
        keys: &[&str],
        options: &CacheOptions,
    ) -> Vec<Option<T>> {
        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            results.push(self.get(key, options).await);
        }
        results
    }

    /// Batch store; each entry uses the same options.
    pub async fn set_many<T: Serialize>(
        &self,
        entries: &[(&str, T)],
        options: &CacheOptions,
    ) -> Result<(), CacheError> {
        for (key, value) in entries {
            self.set(key, value, options).await?;
        }
        Ok(())
    }

    /// Drops expired L1 entries, returning the count.
    pub fn clean_expired_l1(&self) -> usize {
        self.l1.clean_expired()
    }

    /// Empties the L1 tier.
    pub fn clear_l1(&self) {
        self.l1.clear();
    }

    /// Current L1 entry count (live and expired-but-unswept).
    pub fn l1_len(&self) -> usize {
        self.l1.len()
    }

    /// Counter snapshot.
    pub fn metrics(&self) -> CacheMetrics {
        self.metrics.snapshot(self.l1.len())
    }

    /// Zeroes all counters and restarts the uptime clock.
    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    /// Probes L2 and combines connectivity with the observed hit rate.
    ///
    /// An unreachable L2 reports `Degraded` regardless of hit rate (L1
    /// still serves, so it is never `Unhealthy` on connectivity alone).
    /// With L2 up, a fresh instance with no recorded gets reports
    /// `Healthy`; the hit rate thresholds only apply once gets exist.
    #[instrument(skip(self))]
    pub async fn health_status(&self) -> HealthStatus {
        let (l2_available, l2_latency_ms) = self.probe_l2().await;

        let hit_rate = self.metrics.hit_rate();
        let requests = self.metrics.hits() + self.metrics.misses();

        let status = if !l2_available {
            HealthState::Degraded
        } else if requests == 0 {
            HealthState::Healthy
        } else if hit_rate < MIN_DEGRADED_HIT_RATE {
            HealthState::Unhealthy
        } else if hit_rate < MIN_HEALTHY_HIT_RATE {
            HealthState::Degraded
        } else {
            HealthState::Healthy
        };

        HealthStatus {
            status,
            l1_available: true,
            l1_items: self.l1.len(),
            l2_available,
            l2_latency_ms,
            hit_rate,
            total_operations: requests + self.metrics.sets() + self.metrics.deletes(),
        }
    }

    async fn probe_l2(&self) -> (bool, Option<u64>) {
        if !self.l2_enabled() {
            return (false, None);
        }

        let probe_key = self.keys.build(HEALTH_PROBE_KEY);
        let start = Instant::now();
        match self.backend.get(&probe_key).await {
            Ok(_) => (true, Some(start.elapsed().as_millis() as u64)),
            Err(e) => {
                debug!(error = %e, "L2 health probe failed");
                (false, None)
            }
        }
    }
}
