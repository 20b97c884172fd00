//! Rate-limiter storage with automatic in-process fallback.
//!
//! Counting normally runs against the external store so every process
//! enforces one shared budget (the increment is a single atomic script).
//! When the store is unreachable or the flag disables it, counting falls
//! back to a per-process map so limiting keeps working, just without
//! cross-process coordination.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, instrument, warn};

use crate::backend::KvBackend;
use crate::cache::HealthState;
use crate::config::Config;
use crate::flags::{Flag, FlagSource};

use super::types::{RateLimitRecord, ThrottleCounters, ThrottleHealth, ThrottleMetrics};

#[derive(Debug, Clone)]
struct MemoryRecord {
    total_hits: u64,
    expires_at: Instant,
    is_blocked: bool,
    block_expires_at: Option<Instant>,
}

impl MemoryRecord {
    fn is_expired(&self, now: Instant) -> bool {
        match self.block_expires_at {
            // Once a block is armed it governs the record's lifetime: the
            // record outlives its window while blocked and resets when the
            // block lapses.
            Some(at) => at <= now,
            None => self.expires_at <= now,
        }
    }
}

/// Shared-budget rate-limiter counter store over a [`KvBackend`], with a
/// per-process fallback map.
pub struct ThrottleStorage<B: KvBackend> {
    backend: B,
    flags: Arc<dyn FlagSource>,
    prefix: String,
    memory: Mutex<HashMap<String, MemoryRecord>>,
    counters: ThrottleCounters,
}

impl<B: KvBackend> std::fmt::Debug for ThrottleStorage<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThrottleStorage")
            .field("prefix", &self.prefix)
            .field("memory_records", &self.memory_len())
            .finish_non_exhaustive()
    }
}

impl<B: KvBackend> ThrottleStorage<B> {
    pub fn new(backend: B, config: &Config, flags: Arc<dyn FlagSource>) -> Self {
        Self {
            backend,
            flags,
            prefix: config.throttle_prefix.clone(),
            memory: Mutex::new(HashMap::new()),
            counters: ThrottleCounters::default(),
        }
    }

    fn full_key(&self, bucket: &str, key: &str) -> String {
        format!("{}{}:{}", self.prefix, bucket, key)
    }

    fn l2_enabled(&self) -> bool {
        self.flags.is_enabled(Flag::ThrottleL2Enabled)
    }

    /// Records one hit for `key` within the named `bucket`'s window.
    ///
    /// `ttl` is the counting window, `limit` the allowed hits per window,
    /// and `block_duration` how long an over-limit caller stays blocked
    /// (zero means no extended block). Never fails: an external-store error
    /// is counted and the hit is replayed against the fallback map.
    #[instrument(skip(self))]
    pub async fn increment(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
        limit: u64,
        block_duration: Duration,
    ) -> RateLimitRecord {
        let full_key = self.full_key(bucket, key);

        if self.l2_enabled() && self.backend.is_available() {
            match self.increment_l2(&full_key, ttl, limit, block_duration).await {
                Ok(record) => {
                    self.counters.record_l2();
                    return record;
                }
                Err(e) => {
                    warn!(key = %full_key, error = %e, "throttle store failed, using memory fallback");
                    self.counters.record_error();
                }
            }
        }

        self.counters.record_memory();
        self.increment_memory(&full_key, ttl, limit, block_duration)
    }

    async fn increment_l2(
        &self,
        full_key: &str,
        ttl: Duration,
        limit: u64,
        block_duration: Duration,
    ) -> crate::backend::BackendResult<RateLimitRecord> {
        let (total_hits, pttl) = self
            .backend
            .incr_with_ttl(full_key, ttl.as_millis() as i64)
            .await?;

        let time_to_expire = Duration::from_millis(pttl.max(0) as u64);
        let is_blocked = total_hits > limit;

        let time_to_block_expire = if is_blocked && !block_duration.is_zero() {
            // Re-arm the key so the block outlives the counting window.
            self.backend
                .pexpire(full_key, block_duration.as_millis() as i64)
                .await?;
            block_duration
        } else {
            Duration::ZERO
        };

        debug!(key = %full_key, total_hits, is_blocked, "throttle hit (L2)");
        Ok(RateLimitRecord {
            total_hits,
            time_to_expire,
            is_blocked,
            time_to_block_expire,
        })
    }

    fn increment_memory(
        &self,
        full_key: &str,
        ttl: Duration,
        limit: u64,
        block_duration: Duration,
    ) -> RateLimitRecord {
        let now = Instant::now();
        let mut memory = self.memory.lock();

        let record = memory
            .entry(full_key.to_string())
            .and_modify(|r| {
                if r.is_expired(now) {
                    r.total_hits = 1;
                    r.expires_at = now + ttl;
                    r.is_blocked = false;
                    r.block_expires_at = None;
                } else {
                    r.total_hits += 1;
                }
            })
            .or_insert_with(|| MemoryRecord {
                total_hits: 1,
                expires_at: now + ttl,
                is_blocked: false,
                block_expires_at: None,
            });

        if !record.is_blocked && record.total_hits > limit && !block_duration.is_zero() {
            record.is_blocked = true;
            record.block_expires_at = Some(now + block_duration);
        }

        let time_to_block_expire = record
            .block_expires_at
            .map_or(Duration::ZERO, |at| at.saturating_duration_since(now));

        debug!(
            key = %full_key,
            total_hits = record.total_hits,
            is_blocked = record.is_blocked,
            "throttle hit (memory)"
        );
        RateLimitRecord {
            total_hits: record.total_hits,
            time_to_expire: record.expires_at.saturating_duration_since(now),
            is_blocked: record.is_blocked || record.total_hits > limit,
            time_to_block_expire,
        }
    }

    /// Drops expired fallback records, returning the count.
    pub fn clean_expired_memory(&self) -> usize {
        let now = Instant::now();
        let mut memory = self.memory.lock();
        let before = memory.len();
        memory.retain(|_, record| !record.is_expired(now));
        before - memory.len()
    }

    /// Fallback records currently held (live and expired-but-unswept).
    pub fn memory_len(&self) -> usize {
        self.memory.lock().len()
    }

    /// Empties the fallback map.
    pub fn clear_memory(&self) {
        self.memory.lock().clear();
    }

    /// Counter snapshot.
    pub fn metrics(&self) -> ThrottleMetrics {
        self.counters.snapshot()
    }

    /// Current limiter health.
    ///
    /// Healthy when the shared store is in use and reachable. Degraded when
    /// limiting works but only per-process (flag off, or the store is down
    /// and the fallback has served hits). Unhealthy when the store is down
    /// and the fallback has not demonstrably served anything.
    pub fn health(&self) -> ThrottleHealth {
        let l2_available = self.backend.is_available();

        let status = if !self.l2_enabled() {
            HealthState::Degraded
        } else if l2_available {
            HealthState::Healthy
        } else if self.counters.memory_operations() > 0 {
            HealthState::Degraded
        } else {
            HealthState::Unhealthy
        };

        ThrottleHealth {
            status,
            l2_available,
            memory_records: self.memory_len(),
            metrics: self.counters.snapshot(),
        }
    }
}
