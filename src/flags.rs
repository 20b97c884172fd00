//! Runtime feature flags.
//!
//! Flags are read fresh on every check so an operator can flip them without
//! a restart. The textual value `"false"` disables a flag; anything else
//! (including absence) leaves it enabled.

use std::env;

/// Feature toggles consumed by the cache and throttle subsystems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    /// Master switch for the cache subsystem.
    CacheEnabled,
    /// Whether the cache may touch the external L2 store.
    L2Enabled,
    /// Whether the rate limiter may use the external store.
    ThrottleL2Enabled,
}

impl Flag {
    /// Environment variable backing this flag.
    pub fn env_var(&self) -> &'static str {
        match self {
            Flag::CacheEnabled => "STRATA_CACHE_ENABLED",
            Flag::L2Enabled => "STRATA_L2_ENABLED",
            Flag::ThrottleL2Enabled => "STRATA_THROTTLE_L2_ENABLED",
        }
    }
}

/// Source of feature-flag values. Implementations must not cache results.
pub trait FlagSource: Send + Sync {
    /// Returns whether the flag is currently enabled.
    fn is_enabled(&self, flag: Flag) -> bool;
}

/// Flag source backed by environment variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvFlagSource;

impl FlagSource for EnvFlagSource {
    fn is_enabled(&self, flag: Flag) -> bool {
        match env::var(flag.env_var()) {
            Ok(value) => value != "false",
            Err(_) => true,
        }
    }
}

/// Fixed flag values for tests and composition roots that do not want
/// environment lookups.
#[derive(Debug, Clone)]
pub struct StaticFlags {
    pub cache_enabled: bool,
    pub l2_enabled: bool,
    pub throttle_l2_enabled: bool,
}

impl Default for StaticFlags {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            l2_enabled: true,
            throttle_l2_enabled: true,
        }
    }
}

impl StaticFlags {
    /// All flags enabled.
    pub fn all_enabled() -> Self {
        Self::default()
    }
}

impl FlagSource for StaticFlags {
    fn is_enabled(&self, flag: Flag) -> bool {
        match flag {
            Flag::CacheEnabled => self.cache_enabled,
            Flag::L2Enabled => self.l2_enabled,
            Flag::ThrottleL2Enabled => self.throttle_l2_enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn env_flag_defaults_to_enabled() {
        // SAFETY: Test code only, we accept the thread-safety risk in tests.
        unsafe { env::remove_var("STRATA_L2_ENABLED") };
        assert!(EnvFlagSource.is_enabled(Flag::L2Enabled));
    }

    #[test]
    #[serial]
    fn env_flag_false_disables() {
        // SAFETY: Test code only, we accept the thread-safety risk in tests.
        unsafe { env::set_var("STRATA_L2_ENABLED", "false") };
        assert!(!EnvFlagSource.is_enabled(Flag::L2Enabled));
        unsafe { env::remove_var("STRATA_L2_ENABLED") };
    }

    #[test]
    #[serial]
    fn env_flag_other_values_stay_enabled() {
        // SAFETY: Test code only, we accept the thread-safety risk in tests.
        unsafe { env::set_var("STRATA_CACHE_ENABLED", "0") };
        assert!(EnvFlagSource.is_enabled(Flag::CacheEnabled));
        unsafe { env::remove_var("STRATA_CACHE_ENABLED") };
    }

    #[test]
    fn static_flags_respect_fields() {
        let flags = StaticFlags {
            l2_enabled: false,
            ..StaticFlags::all_enabled()
        };
        assert!(flags.is_enabled(Flag::CacheEnabled));
        assert!(!flags.is_enabled(Flag::L2Enabled));
    }
}
