use super::*;
use serial_test::serial;
use std::env;

fn with_env_vars<F, R>(vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, value) in vars {
        unsafe { env::set_var(key, value) };
    }

    let result = f();

    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, _) in vars {
        unsafe { env::remove_var(key) };
    }

    result
}

fn clear_strata_env() {
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    unsafe {
        env::remove_var("STRATA_REDIS_URL");
        env::remove_var("STRATA_DEFAULT_TTL_SECS");
        env::remove_var("STRATA_L1_MAX_ITEMS");
        env::remove_var("STRATA_GLOBAL_PREFIX");
        env::remove_var("STRATA_THROTTLE_PREFIX");
        env::remove_var("STRATA_SWEEP_INTERVAL_SECS");
    }
}

#[test]
#[serial]
fn test_default_config() {
    clear_strata_env();
    let config = Config::default();

    assert_eq!(config.redis_url, "redis://127.0.0.1:6379");
    assert_eq!(config.default_ttl, Duration::from_secs(300));
    assert_eq!(config.l1_max_items, 1_000);
    assert_eq!(config.global_prefix, "strata:");
    assert_eq!(config.throttle_prefix, "strata:throttle:");
    assert_eq!(config.sweep_interval, Duration::from_secs(60));
}

#[test]
#[serial]
fn test_from_env_uses_defaults_when_unset() {
    clear_strata_env();
    let config = Config::from_env().expect("defaults are valid");
    assert_eq!(config.redis_url, DEFAULT_REDIS_URL);
    assert_eq!(config.l1_max_items, 1_000);
}

#[test]
#[serial]
fn test_from_env_reads_overrides() {
    clear_strata_env();
    let config = with_env_vars(
        &[
            ("STRATA_REDIS_URL", "redis://cache.internal:6380"),
            ("STRATA_DEFAULT_TTL_SECS", "120"),
            ("STRATA_L1_MAX_ITEMS", "50"),
            ("STRATA_GLOBAL_PREFIX", "app:"),
        ],
        || Config::from_env().expect("overrides are valid"),
    );

    assert_eq!(config.redis_url, "redis://cache.internal:6380");
    assert_eq!(config.default_ttl, Duration::from_secs(120));
    assert_eq!(config.l1_max_items, 50);
    assert_eq!(config.global_prefix, "app:");
}

#[test]
#[serial]
fn test_from_env_rejects_bad_integers() {
    clear_strata_env();
    let result = with_env_vars(&[("STRATA_L1_MAX_ITEMS", "lots")], Config::from_env);
    assert!(matches!(
        result,
        Err(ConfigError::InvalidValue { var, .. }) if var == "STRATA_L1_MAX_ITEMS"
    ));
}

#[test]
#[serial]
fn test_validate_rejects_zero_capacity() {
    clear_strata_env();
    let config = Config {
        l1_max_items: 0,
        ..Config::default()
    };
    assert!(config.validate().is_err());
}

#[test]
#[serial]
fn test_validate_rejects_zero_ttl() {
    clear_strata_env();
    let config = Config {
        default_ttl: Duration::ZERO,
        ..Config::default()
    };
    assert!(config.validate().is_err());
}
