//! Redis-backed implementation of [`KvBackend`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use tracing::{debug, info, warn};

use super::error::{BackendError, BackendResult};
use super::KvBackend;

/// Atomic increment-and-get-ttl script.
///
/// INCR the key; arm the TTL only when the key has no prior expiry; return
/// the post-increment count and the remaining PTTL.
const INCR_WITH_TTL_SCRIPT: &str = r#"
local hits = redis.call('INCR', KEYS[1])
if redis.call('PTTL', KEYS[1]) == -1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
local ttl = redis.call('PTTL', KEYS[1])
return {hits, ttl}
"#;

/// Shared-state L2 store backed by Redis.
///
/// A [`ConnectionManager`] handles reconnection; the availability flag flips
/// on connection-level failures and recovers on the next successful command.
#[derive(Clone)]
pub struct RedisBackend {
    conn: ConnectionManager,
    incr_script: Arc<Script>,
    available: Arc<AtomicBool>,
    url: String,
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend")
            .field("url", &self.url)
            .field("available", &self.is_available())
            .finish_non_exhaustive()
    }
}

impl RedisBackend {
    /// Connects to `url` and verifies the connection with a PING.
    pub async fn connect(url: &str) -> BackendResult<Self> {
        let client = Client::open(url).map_err(|e| BackendError::Connection {
            message: e.to_string(),
        })?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| BackendError::Connection {
                message: e.to_string(),
            })?;

        let backend = Self {
            conn,
            incr_script: Arc::new(Script::new(INCR_WITH_TTL_SCRIPT)),
            available: Arc::new(AtomicBool::new(true)),
            url: url.to_string(),
        };

        backend.ping().await?;
        info!(url = %backend.url, "Redis backend connected");
        Ok(backend)
    }

    /// Returns the configured URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn map_err(&self, e: redis::RedisError) -> BackendError {
        if e.is_connection_refusal() || e.is_io_error() || e.is_timeout() {
            self.available.store(false, Ordering::Relaxed);
            warn!(url = %self.url, error = %e, "Redis connection failure");
            BackendError::Connection {
                message: e.to_string(),
            }
        } else {
            BackendError::Query {
                message: e.to_string(),
            }
        }
    }

    fn mark_ok(&self) {
        if !self.available.swap(true, Ordering::Relaxed) {
            info!(url = %self.url, "Redis backend recovered");
        }
    }
}

impl KvBackend for RedisBackend {
    async fn get(&self, key: &str) -> BackendResult<Option<String>> {
        let mut conn = self.conn.clone();
        let result: Option<String> = conn.get(key).await.map_err(|e| self.map_err(e))?;
        self.mark_ok();
        debug!(key, hit = result.is_some(), "redis GET");
        Ok(result)
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> BackendResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(key, value, ttl_secs)
            .await
            .map_err(|e| self.map_err(e))?;
        self.mark_ok();
        Ok(())
    }

    async fn del(&self, key: &str) -> BackendResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await.map_err(|e| self.map_err(e))?;
        self.mark_ok();
        Ok(())
    }

    async fn del_many(&self, keys: &[String]) -> BackendResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: () = conn.del(keys).await.map_err(|e| self.map_err(e))?;
        self.mark_ok();
        Ok(())
    }

    async fn exists(&self, key: &str) -> BackendResult<bool> {
        let mut conn = self.conn.clone();
        let result: bool = conn.exists(key).await.map_err(|e| self.map_err(e))?;
        self.mark_ok();
        Ok(result)
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> BackendResult<(u64, Vec<String>)> {
        let mut conn = self.conn.clone();
        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await
            .map_err(|e| self.map_err(e))?;
        self.mark_ok();
        Ok((next, keys))
    }

    async fn ping(&self) -> BackendResult<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| self.map_err(e))?;
        self.mark_ok();
        Ok(())
    }

    async fn incr_with_ttl(&self, key: &str, ttl_ms: i64) -> BackendResult<(u64, i64)> {
        let mut conn = self.conn.clone();
        let (hits, pttl): (u64, i64) = self
            .incr_script
            .key(key)
            .arg(ttl_ms)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| match self.map_err(e) {
                BackendError::Query { message } => BackendError::Script { message },
                other => other,
            })?;
        self.mark_ok();
        Ok((hits, pttl))
    }

    async fn pexpire(&self, key: &str, ms: i64) -> BackendResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("PEXPIRE")
            .arg(key)
            .arg(ms)
            .query_async(&mut conn)
            .await
            .map_err(|e| self.map_err(e))?;
        self.mark_ok();
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }
}
