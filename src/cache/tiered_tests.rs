use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::tiered::TieredCache;
use super::types::{CacheLevel, CacheOptions, CacheSource, HealthState};
use crate::backend::MemoryBackend;
use crate::config::Config;
use crate::flags::StaticFlags;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct User {
    id: u32,
    name: String,
}

fn user(id: u32) -> User {
    User {
        id,
        name: format!("user-{id}"),
    }
}

fn cache_with(flags: StaticFlags) -> (TieredCache<MemoryBackend>, MemoryBackend) {
    let backend = MemoryBackend::new();
    let cache = TieredCache::new(backend.clone(), &Config::default(), Arc::new(flags));
    (cache, backend)
}

fn cache() -> (TieredCache<MemoryBackend>, MemoryBackend) {
    cache_with(StaticFlags::all_enabled())
}

#[tokio::test]
async fn set_then_get_round_trips() {
    let (cache, _) = cache();
    let opts = CacheOptions::default();

    cache.set("user:1", &user(1), &opts).await.unwrap();
    let got: Option<User> = cache.get("user:1", &opts).await;
    assert_eq!(got, Some(user(1)));
}

#[tokio::test]
async fn l1_hit_skips_backend() {
    let (cache, backend) = cache();
    let opts = CacheOptions::default();

    cache.set("user:1", &user(1), &opts).await.unwrap();
    let _: Option<User> = cache.get("user:1", &opts).await;

    assert_eq!(
        backend.calls().gets.load(std::sync::atomic::Ordering::Relaxed),
        0
    );
    let metrics = cache.metrics();
    assert_eq!(metrics.l1_hits, 1);
    assert_eq!(metrics.l2_hits, 0);
}

#[tokio::test]
async fn l1_only_level_never_touches_backend() {
    let (cache, backend) = cache();
    let opts = CacheOptions::with_level(CacheLevel::L1Only);

    cache.set("user:1", &user(1), &opts).await.unwrap();
    let got: Option<User> = cache.get("user:1", &opts).await;

    assert_eq!(got, Some(user(1)));
    assert!(backend.is_empty());
    assert_eq!(
        backend.calls().gets.load(std::sync::atomic::Ordering::Relaxed),
        0
    );
}

#[tokio::test]
async fn l2_only_level_bypasses_l1() {
    let (cache, backend) = cache();
    let opts = CacheOptions::with_level(CacheLevel::L2Only);

    cache.set("user:1", &user(1), &opts).await.unwrap();
    assert_eq!(cache.l1_len(), 0);

    let result = cache.get_with_metadata::<User>("user:1", &opts).await;
    assert_eq!(result.source, CacheSource::L2);
    // An L2Only read must not promote.
    assert_eq!(cache.l1_len(), 0);
    assert!(backend.peek("strata:user:1").is_some());
}

#[tokio::test]
async fn l2_hit_promotes_into_l1() {
    let (cache, backend) = cache();
    let opts = CacheOptions::default();

    backend.seed("strata:user:7", &json!(user(7)).to_string(), None);

    let first = cache.get_with_metadata::<User>("user:7", &opts).await;
    assert_eq!(first.source, CacheSource::L2);
    assert!(first.hit);

    let second = cache.get_with_metadata::<User>("user:7", &opts).await;
    assert_eq!(second.source, CacheSource::L1);
    assert_eq!(
        backend.calls().gets.load(std::sync::atomic::Ordering::Relaxed),
        1
    );
}

#[tokio::test]
async fn backend_outage_reads_as_miss() {
    let (cache, backend) = cache();
    let opts = CacheOptions::default();

    cache.set("user:1", &user(1), &opts).await.unwrap();
    cache.clear_l1();
    backend.set_down(true);

    let got: Option<User> = cache.get("user:1", &opts).await;
    assert_eq!(got, None);

    let metrics = cache.metrics();
    assert_eq!(metrics.misses, 1);
    assert!(metrics.errors >= 1);
}

#[tokio::test]
async fn backend_outage_during_set_keeps_l1_copy() {
    let (cache, backend) = cache();
    let opts = CacheOptions::default();

    backend.set_down(true);
    cache.set("user:1", &user(1), &opts).await.unwrap();

    let got: Option<User> = cache.get("user:1", &opts).await;
    assert_eq!(got, Some(user(1)));
    assert!(cache.metrics().errors >= 1);
}

#[tokio::test]
async fn transient_failure_then_recovery() {
    let (cache, backend) = cache();
    let opts = CacheOptions::with_level(CacheLevel::L2Only);

    cache.set("user:1", &user(1), &opts).await.unwrap();
    backend.fail_next(1);

    let first: Option<User> = cache.get("user:1", &opts).await;
    assert_eq!(first, None);

    let second: Option<User> = cache.get("user:1", &opts).await;
    assert_eq!(second, Some(user(1)));
}

#[tokio::test]
async fn corrupt_l2_value_counts_error_and_misses() {
    let (cache, backend) = cache();
    let opts = CacheOptions::default();

    backend.seed("strata:bad", "{not json", None);

    let got: Option<User> = cache.get("bad", &opts).await;
    assert_eq!(got, None);

    let metrics = cache.metrics();
    assert_eq!(metrics.errors, 1);
    assert_eq!(metrics.misses, 1);
}

#[tokio::test]
async fn delete_removes_from_both_tiers() {
    let (cache, backend) = cache();
    let opts = CacheOptions::default();

    cache.set("user:1", &user(1), &opts).await.unwrap();
    cache.delete("user:1", &opts).await;

    let got: Option<User> = cache.get("user:1", &opts).await;
    assert_eq!(got, None);
    assert!(backend.peek("strata:user:1").is_none());
    assert_eq!(cache.metrics().deletes, 1);
}

#[tokio::test]
async fn delete_by_pattern_counts_l1_removals() {
    let (cache, backend) = cache();
    let opts = CacheOptions::default();

    cache.set("user:1", &user(1), &opts).await.unwrap();
    cache.set("user:2", &user(2), &opts).await.unwrap();
    cache.set("product:1", &json!({"sku": "a"}), &opts).await.unwrap();

    let removed = cache.delete_by_pattern("user:*", &opts).await;
    assert_eq!(removed, 2);

    assert!(backend.peek("strata:user:1").is_none());
    assert!(backend.peek("strata:user:2").is_none());
    assert!(backend.peek("strata:product:1").is_some());
    assert_eq!(cache.l1_len(), 1);
}

#[tokio::test]
async fn delete_by_pattern_survives_scan_failure() {
    let (cache, backend) = cache();
    let opts = CacheOptions::default();

    cache.set("user:1", &user(1), &opts).await.unwrap();
    backend.fail_next(1);

    // L1 is still purged even though the L2 scan errored.
    let removed = cache.delete_by_pattern("user:*", &opts).await;
    assert_eq!(removed, 1);
    assert!(cache.metrics().errors >= 1);
}

#[tokio::test]
async fn exists_checks_both_tiers() {
    let (cache, backend) = cache();
    let opts = CacheOptions::default();

    assert!(!cache.exists("user:1", &opts).await);

    backend.seed("strata:user:1", &json!(user(1)).to_string(), None);
    assert!(cache.exists("user:1", &opts).await);

    cache.set("user:2", &user(2), &opts).await.unwrap();
    assert!(cache.exists("user:2", &opts).await);
}

#[tokio::test]
async fn get_or_set_runs_loader_once() {
    let (cache, _) = cache();
    let opts = CacheOptions::default();

    let loaded: Result<User, &str> = cache
        .get_or_set("user:1", &opts, || async { Ok(user(1)) })
        .await;
    assert_eq!(loaded.unwrap(), user(1));

    // Second call is served from cache; a failing loader proves it never ran.
    let cached: Result<User, &str> = cache
        .get_or_set("user:1", &opts, || async { Err("loader ran") })
        .await;
    assert_eq!(cached.unwrap(), user(1));
}

#[tokio::test]
async fn get_or_set_propagates_loader_error() {
    let (cache, _) = cache();
    let opts = CacheOptions::default();

    let result: Result<User, &str> = cache
        .get_or_set("user:1", &opts, || async { Err("boom") })
        .await;
    assert_eq!(result.unwrap_err(), "boom");

    // Nothing was cached for the failed load.
    let got: Option<User> = cache.get("user:1", &opts).await;
    assert_eq!(got, None);
}

#[tokio::test]
async fn concurrent_misses_may_each_run_loader() {
    use std::sync::atomic::{AtomicU32, Ordering};

    let (cache, _) = cache();
    let opts = CacheOptions::default();
    let calls = AtomicU32::new(0);

    let load = || async {
        calls.fetch_add(1, Ordering::Relaxed);
        // Yield so both callers pass the miss check before either stores.
        tokio::task::yield_now().await;
        Ok::<_, &str>(user(1))
    };

    let (a, b) = futures::join!(
        cache.get_or_set::<User, _, _, _>("user:1", &opts, load),
        cache.get_or_set::<User, _, _, _>("user:1", &opts, load),
    );
    assert_eq!(a.unwrap(), user(1));
    assert_eq!(b.unwrap(), user(1));

    // No single-flight: both callers missed and both loaded.
    assert_eq!(calls.load(Ordering::Relaxed), 2);
}

#[tokio::test]
async fn get_many_mirrors_key_order() {
    let (cache, _) = cache();
    let opts = CacheOptions::default();

    cache
        .set_many(&[("user:1", user(1)), ("user:3", user(3))], &opts)
        .await
        .unwrap();

    let got: Vec<Option<User>> = cache.get_many(&["user:1", "user:2", "user:3"], &opts).await;
    assert_eq!(got, vec![Some(user(1)), None, Some(user(3))]);
}

#[tokio::test]
async fn metadata_reports_miss_source_none() {
    let (cache, _) = cache();
    let result = cache
        .get_with_metadata::<User>("absent", &CacheOptions::default())
        .await;

    assert!(!result.hit);
    assert_eq!(result.source, CacheSource::None);
    assert!(result.value.is_none());
}

#[tokio::test]
async fn hit_rate_reflects_traffic() {
    let (cache, _) = cache();
    let opts = CacheOptions::default();

    cache.set("a", &1u32, &opts).await.unwrap();
    for _ in 0..3 {
        let _: Option<u32> = cache.get("a", &opts).await;
    }
    let _: Option<u32> = cache.get("missing", &opts).await;

    let metrics = cache.metrics();
    assert_eq!(metrics.hits, 3);
    assert_eq!(metrics.misses, 1);
    assert!((metrics.hit_rate - 0.75).abs() < f64::EPSILON);
}

#[tokio::test]
async fn hit_rate_is_zero_without_traffic() {
    let (cache, _) = cache();
    assert_eq!(cache.metrics().hit_rate, 0.0);
}

#[tokio::test]
async fn reset_metrics_zeroes_counters() {
    let (cache, _) = cache();
    let opts = CacheOptions::default();

    cache.set("a", &1u32, &opts).await.unwrap();
    let _: Option<u32> = cache.get("a", &opts).await;
    cache.reset_metrics();

    let metrics = cache.metrics();
    assert_eq!(metrics.hits, 0);
    assert_eq!(metrics.sets, 0);
}

#[tokio::test]
async fn health_is_healthy_before_any_traffic() {
    let (cache, _) = cache();
    let health = cache.health_status().await;

    assert_eq!(health.status, HealthState::Healthy);
    assert!(health.l1_available);
    assert!(health.l2_available);
    assert!(health.l2_latency_ms.is_some());
    assert_eq!(health.total_operations, 0);
}

#[tokio::test]
async fn health_degrades_when_backend_is_down() {
    let (cache, backend) = cache();
    backend.set_down(true);

    let health = cache.health_status().await;
    assert_eq!(health.status, HealthState::Degraded);
    assert!(!health.l2_available);
    assert_eq!(health.l2_latency_ms, None);
}

#[tokio::test]
async fn health_down_backend_overrides_low_hit_rate() {
    let (cache, backend) = cache();
    let opts = CacheOptions::default();

    for i in 0..10 {
        let _: Option<u32> = cache.get(&format!("missing:{i}"), &opts).await;
    }
    backend.set_down(true);

    // Connectivity decides first: a down L2 is degraded, never unhealthy,
    // however bad the hit rate looks.
    let health = cache.health_status().await;
    assert_eq!(health.status, HealthState::Degraded);
    assert!(!health.l2_available);
}

#[tokio::test]
async fn health_total_operations_includes_writes() {
    let (cache, _) = cache();
    let opts = CacheOptions::default();

    cache.set("a", &1u32, &opts).await.unwrap();
    let _: Option<u32> = cache.get("a", &opts).await;
    let _: Option<u32> = cache.get("missing", &opts).await;
    cache.delete("a", &opts).await;

    // 1 hit + 1 miss + 1 set + 1 delete.
    let health = cache.health_status().await;
    assert_eq!(health.total_operations, 4);
}

#[tokio::test]
async fn delete_by_pattern_leaves_delete_counter_alone() {
    let (cache, _) = cache();
    let opts = CacheOptions::default();

    cache.set("user:1", &user(1), &opts).await.unwrap();
    cache.set("user:2", &user(2), &opts).await.unwrap();

    let removed = cache.delete_by_pattern("user:*", &opts).await;
    assert_eq!(removed, 2);
    assert_eq!(cache.metrics().deletes, 0);
}

#[tokio::test]
async fn health_unhealthy_on_low_hit_rate() {
    let (cache, _) = cache();
    let opts = CacheOptions::default();

    cache.set("a", &1u32, &opts).await.unwrap();
    let _: Option<u32> = cache.get("a", &opts).await;
    for i in 0..9 {
        let _: Option<u32> = cache.get(&format!("missing:{i}"), &opts).await;
    }

    // 1 hit over 10 gets is below the unhealthy threshold.
    let health = cache.health_status().await;
    assert_eq!(health.status, HealthState::Unhealthy);
}

#[tokio::test]
async fn health_degraded_on_middling_hit_rate() {
    let (cache, _) = cache();
    let opts = CacheOptions::default();

    cache.set("a", &1u32, &opts).await.unwrap();
    for _ in 0..2 {
        let _: Option<u32> = cache.get("a", &opts).await;
    }
    for i in 0..3 {
        let _: Option<u32> = cache.get(&format!("missing:{i}"), &opts).await;
    }

    // 2 hits over 5 gets sits between the thresholds.
    let health = cache.health_status().await;
    assert_eq!(health.status, HealthState::Degraded);
}

#[tokio::test]
async fn disabled_cache_is_inert() {
    let (cache, backend) = cache_with(StaticFlags {
        cache_enabled: false,
        ..StaticFlags::all_enabled()
    });
    let opts = CacheOptions::default();

    cache.set("user:1", &user(1), &opts).await.unwrap();
    let got: Option<User> = cache.get("user:1", &opts).await;

    assert_eq!(got, None);
    assert_eq!(cache.l1_len(), 0);
    assert!(backend.is_empty());

    let metrics = cache.metrics();
    assert_eq!(metrics.sets, 0);
    assert_eq!(metrics.misses, 0);
}

#[tokio::test]
async fn disabled_l2_keeps_cache_l1_only() {
    let (cache, backend) = cache_with(StaticFlags {
        l2_enabled: false,
        ..StaticFlags::all_enabled()
    });
    let opts = CacheOptions::default();

    cache.set("user:1", &user(1), &opts).await.unwrap();
    assert!(backend.is_empty());

    let result = cache.get_with_metadata::<User>("user:1", &opts).await;
    assert_eq!(result.source, CacheSource::L1);

    let health = cache.health_status().await;
    assert!(!health.l2_available);
}

#[tokio::test]
async fn prefix_override_namespaces_keys() {
    let (cache, backend) = cache();
    let opts = CacheOptions {
        prefix: Some("tenant:42:".to_string()),
        ..CacheOptions::default()
    };

    cache.set("user:1", &user(1), &opts).await.unwrap();
    assert!(backend.peek("tenant:42:user:1").is_some());
    assert!(backend.peek("strata:user:1").is_none());
}

#[tokio::test]
async fn ttl_override_expires_entry() {
    let (cache, _) = cache();
    let opts = CacheOptions {
        ttl: Some(Duration::from_millis(30)),
        level: CacheLevel::L1Only,
        prefix: None,
    };

    cache.set("short", &1u32, &opts).await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;

    let got: Option<u32> = cache.get("short", &opts).await;
    assert_eq!(got, None);
}

#[tokio::test]
async fn clean_expired_l1_reports_count() {
    let (cache, _) = cache();
    let opts = CacheOptions {
        ttl: Some(Duration::from_millis(20)),
        level: CacheLevel::L1Only,
        prefix: None,
    };

    cache.set("a", &1u32, &opts).await.unwrap();
    cache.set("b", &2u32, &opts).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(cache.clean_expired_l1(), 2);
    assert_eq!(cache.l1_len(), 0);
}
