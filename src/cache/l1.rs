//! In-process (L1) tier.
//!
//! A bounded key→entry map with TTL expiration and oldest-first eviction.
//! Entries hold [`serde_json::Value`] slots so one store serves values of
//! any serializable type. All methods are synchronous; the lock is never
//! held across an await point.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// One L1 slot. Expired entries are treated as absent by every reader.
#[derive(Debug, Clone)]
pub(crate) struct L1Entry {
    pub value: Value,
    pub created_at: Instant,
    pub expires_at: Instant,
}

impl L1Entry {
    fn new(value: Value, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            value,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    #[inline]
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// Bounded in-memory store. Size never exceeds `max_items` immediately
/// after an insert.
#[derive(Debug)]
pub(crate) struct L1Store {
    entries: RwLock<HashMap<String, L1Entry>>,
    max_items: usize,
}

impl L1Store {
    pub(crate) fn new(max_items: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_items,
        }
    }

    /// Returns the live value for `key`, removing it if expired.
    pub(crate) fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // Entry existed but expired; upgrade to a write lock to drop it.
        self.entries.write().remove(key);
        None
    }

    /// Returns whether `key` holds a live entry (without cloning the value).
    pub(crate) fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .read()
            .get(key)
            .is_some_and(|e| !e.is_expired(now))
    }

    /// Inserts (or overwrites) an entry, evicting first when at capacity.
    pub(crate) fn insert(&self, key: &str, value: Value, ttl: Duration) {
        let mut entries = self.entries.write();

        if entries.len() >= self.max_items && !entries.contains_key(key) {
            Self::evict_locked(&mut entries);
        }

        entries.insert(key.to_string(), L1Entry::new(value, ttl));
    }

    /// Removes an entry. Returns whether it was present.
    pub(crate) fn remove(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// Removes every key accepted by `matcher`, returning the count.
    pub(crate) fn remove_matching(&self, matcher: &Regex) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|key, _| !matcher.is_match(key));
        before - entries.len()
    }

    /// Removes every expired entry, returning the count.
    pub(crate) fn clean_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let cleaned = before - entries.len();
        if cleaned > 0 {
            debug!(cleaned, "expired L1 entries removed");
        }
        cleaned
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub(crate) fn clear(&self) {
        self.entries.write().clear();
    }

    /// Two-phase capacity reclaim: drop expired entries first; only when
    /// nothing was freed, evict the single entry with the smallest
    /// `created_at` (unconditional backstop, so a full map can never wedge
    /// an insert).
    fn evict_locked(entries: &mut HashMap<String, L1Entry>) {
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        if entries.len() < before {
            return;
        }

        let oldest = entries
            .iter()
            .min_by_key(|(_, entry)| entry.created_at)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            entries.remove(&key);
        }
    }
}
