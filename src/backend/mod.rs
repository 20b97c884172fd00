//! External key-value store collaborator (the L2 tier and the
//! rate-limiter's counter store).

pub mod error;
mod redis;

#[cfg(any(test, feature = "mock"))]
mod memory;

pub use error::{BackendError, BackendResult};
pub use self::redis::RedisBackend;

#[cfg(any(test, feature = "mock"))]
pub use memory::MemoryBackend;

/// Minimal async interface the cache and throttle layers consume.
///
/// Values are opaque strings; TTLs are native to the store. Implementations
/// must be safe to share across tasks.
pub trait KvBackend: Send + Sync {
    /// Reads a value. Absent keys (and expired ones) yield `None`.
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = BackendResult<Option<String>>> + Send;

    /// Writes a value with a TTL in seconds.
    fn set(
        &self,
        key: &str,
        value: &str,
        ttl_secs: u64,
    ) -> impl std::future::Future<Output = BackendResult<()>> + Send;

    /// Deletes a single key (absent keys are not an error).
    fn del(&self, key: &str) -> impl std::future::Future<Output = BackendResult<()>> + Send;

    /// Deletes a batch of keys in one round trip.
    fn del_many(
        &self,
        keys: &[String],
    ) -> impl std::future::Future<Output = BackendResult<()>> + Send;

    /// Returns whether a key currently exists.
    fn exists(&self, key: &str) -> impl std::future::Future<Output = BackendResult<bool>> + Send;

    /// One step of an iterative cursor scan. Returns the next cursor and a
    /// batch of matching keys; a returned cursor of `0` ends the scan.
    fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> impl std::future::Future<Output = BackendResult<(u64, Vec<String>)>> + Send;

    /// Lightweight liveness probe.
    fn ping(&self) -> impl std::future::Future<Output = BackendResult<()>> + Send;

    /// Atomically increments a counter, arming `ttl_ms` only if the key had
    /// no prior expiry. Returns the post-increment count and the remaining
    /// TTL in milliseconds (may be negative for keys without expiry).
    fn incr_with_ttl(
        &self,
        key: &str,
        ttl_ms: i64,
    ) -> impl std::future::Future<Output = BackendResult<(u64, i64)>> + Send;

    /// Re-arms a key's expiry to `ms` milliseconds from now.
    fn pexpire(
        &self,
        key: &str,
        ms: i64,
    ) -> impl std::future::Future<Output = BackendResult<()>> + Send;

    /// Current connectivity flag. Cheap and synchronous; updated by the
    /// implementation as commands succeed or fail.
    fn is_available(&self) -> bool;
}
