//! Environment-backed configuration.
//!
//! Every setting has a default. Override with `STRATA_*` environment
//! variables.

pub mod error;

#[cfg(test)]
mod tests;

pub use error::ConfigError;

use std::env;
use std::time::Duration;

use crate::constants::{
    DEFAULT_GLOBAL_PREFIX, DEFAULT_L1_MAX_ITEMS, DEFAULT_SWEEP_INTERVAL, DEFAULT_THROTTLE_PREFIX,
    DEFAULT_TTL,
};

/// Cache engine configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `STRATA_*` overrides on top of defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// External store (L2) connection URL. Default: `redis://127.0.0.1:6379`.
    pub redis_url: String,

    /// TTL applied when an operation gives none. Default: 300 seconds.
    pub default_ttl: Duration,

    /// Max entries in the in-memory L1 store. Default: `1_000`.
    pub l1_max_items: usize,

    /// Namespace prepended to every cache key. Default: `strata:`.
    pub global_prefix: String,

    /// Namespace prepended to every rate-limiter key. Default:
    /// `strata:throttle:`.
    pub throttle_prefix: String,

    /// Period for the background expiry sweeps. Default: 60 seconds.
    pub sweep_interval: Duration,
}

/// Default external store URL used when `STRATA_REDIS_URL` is not set.
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: DEFAULT_REDIS_URL.to_string(),
            default_ttl: DEFAULT_TTL,
            l1_max_items: DEFAULT_L1_MAX_ITEMS,
            global_prefix: DEFAULT_GLOBAL_PREFIX.to_string(),
            throttle_prefix: DEFAULT_THROTTLE_PREFIX.to_string(),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl Config {
    const ENV_REDIS_URL: &'static str = "STRATA_REDIS_URL";
    const ENV_DEFAULT_TTL_SECS: &'static str = "STRATA_DEFAULT_TTL_SECS";
    const ENV_L1_MAX_ITEMS: &'static str = "STRATA_L1_MAX_ITEMS";
    const ENV_GLOBAL_PREFIX: &'static str = "STRATA_GLOBAL_PREFIX";
    const ENV_THROTTLE_PREFIX: &'static str = "STRATA_THROTTLE_PREFIX";
    const ENV_SWEEP_INTERVAL_SECS: &'static str = "STRATA_SWEEP_INTERVAL_SECS";

    /// Loads configuration from environment variables (falling back to
    /// defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let redis_url = Self::parse_string_from_env(Self::ENV_REDIS_URL, defaults.redis_url);
        let default_ttl =
            Self::parse_secs_from_env(Self::ENV_DEFAULT_TTL_SECS, defaults.default_ttl)?;
        let l1_max_items =
            Self::parse_usize_from_env(Self::ENV_L1_MAX_ITEMS, defaults.l1_max_items)?;
        let global_prefix =
            Self::parse_string_from_env(Self::ENV_GLOBAL_PREFIX, defaults.global_prefix);
        let throttle_prefix =
            Self::parse_string_from_env(Self::ENV_THROTTLE_PREFIX, defaults.throttle_prefix);
        let sweep_interval =
            Self::parse_secs_from_env(Self::ENV_SWEEP_INTERVAL_SECS, defaults.sweep_interval)?;

        let config = Self {
            redis_url,
            default_ttl,
            l1_max_items,
            global_prefix,
            throttle_prefix,
            sweep_interval,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates basic invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.l1_max_items == 0 {
            return Err(ConfigError::InvalidValue {
                var: Self::ENV_L1_MAX_ITEMS,
                reason: "l1_max_items must be > 0".to_string(),
            });
        }
        if self.default_ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                var: Self::ENV_DEFAULT_TTL_SECS,
                reason: "default_ttl must be > 0".to_string(),
            });
        }
        Ok(())
    }

    fn parse_string_from_env(var_name: &str, default: String) -> String {
        env::var(var_name).unwrap_or(default)
    }

    fn parse_secs_from_env(var_name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        match env::var(var_name) {
            Ok(value) => {
                let secs: u64 = value.parse().map_err(|_| ConfigError::InvalidValue {
                    var: var_name,
                    reason: format!("expected integer seconds, got {value:?}"),
                })?;
                Ok(Duration::from_secs(secs))
            }
            Err(_) => Ok(default),
        }
    }

    fn parse_usize_from_env(var_name: &'static str, default: usize) -> Result<usize, ConfigError> {
        match env::var(var_name) {
            Ok(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
                var: var_name,
                reason: format!("expected integer, got {value:?}"),
            }),
            Err(_) => Ok(default),
        }
    }
}
