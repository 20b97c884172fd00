//! Background expiry sweeps.
//!
//! Expired L1 entries and fallback throttle records are already invisible
//! to readers; these tasks exist to reclaim their memory on a fixed period.
//! Dropping the returned handle does not stop the task; abort it on
//! shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

use crate::backend::KvBackend;
use crate::cache::TieredCache;
use crate::throttle::ThrottleStorage;

/// Spawns a periodic sweep of expired L1 cache entries.
pub fn spawn_cache_sweep<B>(cache: Arc<TieredCache<B>>, period: Duration) -> JoinHandle<()>
where
    B: KvBackend + 'static,
{
    tokio::spawn(async move {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let cleaned = cache.clean_expired_l1();
            if cleaned > 0 {
                debug!(cleaned, "cache sweep reclaimed expired L1 entries");
            }
        }
    })
}

/// Spawns a periodic sweep of expired fallback throttle records.
pub fn spawn_throttle_sweep<B>(storage: Arc<ThrottleStorage<B>>, period: Duration) -> JoinHandle<()>
where
    B: KvBackend + 'static,
{
    tokio::spawn(async move {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let cleaned = storage.clean_expired_memory();
            if cleaned > 0 {
                debug!(cleaned, "throttle sweep reclaimed expired records");
            }
        }
    })
}
