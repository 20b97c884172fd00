//! In-memory [`KvBackend`] fake for tests and offline development.
//!
//! Honors TTLs against a real clock and supports failure injection so the
//! fallback paths of the cache and throttle layers are testable without a
//! server.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::error::{BackendError, BackendResult};
use super::KvBackend;
use crate::keys::pattern_to_matcher;

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Per-operation call counters, used by tests to assert level isolation.
#[derive(Debug, Default)]
pub struct CallCounts {
    pub gets: AtomicU64,
    pub sets: AtomicU64,
    pub dels: AtomicU64,
    pub exists: AtomicU64,
    pub scans: AtomicU64,
    pub incrs: AtomicU64,
}

/// TTL-honoring in-memory backend.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    entries: Arc<Mutex<HashMap<String, StoredValue>>>,
    down: Arc<AtomicBool>,
    fail_next: Arc<AtomicU64>,
    calls: Arc<CallCounts>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the backend unreachable (`is_available` false, all ops error).
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::Relaxed);
    }

    /// Makes the next `n` operations fail with a connection error while
    /// `is_available` still reports `true` (a mid-flight outage).
    pub fn fail_next(&self, n: u64) {
        self.fail_next.store(n, Ordering::Relaxed);
    }

    /// Operation counters for assertions.
    pub fn calls(&self) -> &CallCounts {
        &self.calls
    }

    /// Number of live (unexpired) keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .values()
            .filter(|v| !v.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw view of a stored value, ignoring call counters.
    pub fn peek(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.entries
            .lock()
            .get(key)
            .filter(|v| !v.is_expired(now))
            .map(|v| v.value.clone())
    }

    /// Directly seeds a value, bypassing counters and failure injection.
    pub fn seed(&self, key: &str, value: &str, ttl: Option<Duration>) {
        self.entries.lock().insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at: ttl.map(|t| Instant::now() + t),
            },
        );
    }

    fn check_failure(&self) -> BackendResult<()> {
        if self.down.load(Ordering::Relaxed) {
            return Err(BackendError::Connection {
                message: "backend marked down".to_string(),
            });
        }
        let remaining = self.fail_next.load(Ordering::Relaxed);
        if remaining > 0 {
            self.fail_next.store(remaining - 1, Ordering::Relaxed);
            return Err(BackendError::Connection {
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

impl KvBackend for MemoryBackend {
    async fn get(&self, key: &str) -> BackendResult<Option<String>> {
        self.calls.gets.fetch_add(1, Ordering::Relaxed);
        self.check_failure()?;
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(stored) if stored.is_expired(now) => {
                entries.remove(key);
                Ok(None)
            }
            Some(stored) => Ok(Some(stored.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> BackendResult<()> {
        self.calls.sets.fetch_add(1, Ordering::Relaxed);
        self.check_failure()?;
        self.entries.lock().insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_secs)),
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> BackendResult<()> {
        self.calls.dels.fetch_add(1, Ordering::Relaxed);
        self.check_failure()?;
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn del_many(&self, keys: &[String]) -> BackendResult<()> {
        self.calls.dels.fetch_add(1, Ordering::Relaxed);
        self.check_failure()?;
        let mut entries = self.entries.lock();
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> BackendResult<bool> {
        self.calls.exists.fetch_add(1, Ordering::Relaxed);
        self.check_failure()?;
        let now = Instant::now();
        Ok(self
            .entries
            .lock()
            .get(key)
            .is_some_and(|v| !v.is_expired(now)))
    }

    async fn scan(
        &self,
        _cursor: u64,
        pattern: &str,
        _count: usize,
    ) -> BackendResult<(u64, Vec<String>)> {
        self.calls.scans.fetch_add(1, Ordering::Relaxed);
        self.check_failure()?;
        let matcher = pattern_to_matcher(pattern);
        let now = Instant::now();
        let keys = self
            .entries
            .lock()
            .iter()
            .filter(|(k, v)| !v.is_expired(now) && matcher.is_match(k))
            .map(|(k, _)| k.clone())
            .collect();
        // The whole keyspace fits in one batch; terminate immediately.
        Ok((0, keys))
    }

    async fn ping(&self) -> BackendResult<()> {
        self.check_failure()
    }

    async fn incr_with_ttl(&self, key: &str, ttl_ms: i64) -> BackendResult<(u64, i64)> {
        self.calls.incrs.fetch_add(1, Ordering::Relaxed);
        self.check_failure()?;
        let now = Instant::now();
        let mut entries = self.entries.lock();

        let stored = entries
            .get(key)
            .filter(|v| !v.is_expired(now))
            .cloned();

        let (count, expires_at) = match stored {
            Some(stored) => {
                let count = stored.value.parse::<u64>().unwrap_or(0) + 1;
                (count, stored.expires_at)
            }
            None => (1, None),
        };

        let expires_at =
            expires_at.unwrap_or_else(|| now + Duration::from_millis(ttl_ms.max(0) as u64));
        entries.insert(
            key.to_string(),
            StoredValue {
                value: count.to_string(),
                expires_at: Some(expires_at),
            },
        );

        let remaining_ms = expires_at.saturating_duration_since(now).as_millis() as i64;
        Ok((count, remaining_ms))
    }

    async fn pexpire(&self, key: &str, ms: i64) -> BackendResult<()> {
        self.check_failure()?;
        if let Some(stored) = self.entries.lock().get_mut(key) {
            stored.expires_at = Some(Instant::now() + Duration::from_millis(ms.max(0) as u64));
        }
        Ok(())
    }

    fn is_available(&self) -> bool {
        !self.down.load(Ordering::Relaxed)
    }
}
