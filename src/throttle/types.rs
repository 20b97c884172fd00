//! Rate-limiter value types and counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::cache::HealthState;

/// Outcome of one rate-limit hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitRecord {
    /// Hits recorded in the current window, including this one.
    pub total_hits: u64,
    /// Remaining window lifetime.
    pub time_to_expire: Duration,
    /// Whether the caller is over the limit.
    pub is_blocked: bool,
    /// Remaining block lifetime; zero when not blocked.
    pub time_to_block_expire: Duration,
}

/// Snapshot of the limiter's operation counters.
#[derive(Debug, Clone, Serialize)]
pub struct ThrottleMetrics {
    /// Hits served by the external store.
    pub l2_operations: u64,
    /// Hits served by the in-process fallback.
    pub memory_operations: u64,
    /// External-store failures absorbed by the fallback.
    pub errors: u64,
}

/// Point-in-time limiter health.
#[derive(Debug, Clone, Serialize)]
pub struct ThrottleHealth {
    pub status: HealthState,
    pub l2_available: bool,
    /// Live records in the in-process fallback.
    pub memory_records: usize,
    pub metrics: ThrottleMetrics,
}

#[derive(Debug, Default)]
pub(crate) struct ThrottleCounters {
    l2_operations: AtomicU64,
    memory_operations: AtomicU64,
    errors: AtomicU64,
}

impl ThrottleCounters {
    pub(crate) fn record_l2(&self) {
        self.l2_operations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_memory(&self) {
        self.memory_operations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn memory_operations(&self) -> u64 {
        self.memory_operations.load(Ordering::Relaxed)
    }

    pub(crate) fn snapshot(&self) -> ThrottleMetrics {
        ThrottleMetrics {
            l2_operations: self.l2_operations.load(Ordering::Relaxed),
            memory_operations: self.memory_operations(),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}
