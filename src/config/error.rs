use thiserror::Error;

/// Errors returned while loading or validating [`super::Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable held a value the setting cannot accept.
    #[error("invalid value for {var}: {reason}")]
    InvalidValue {
        /// Environment variable name.
        var: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}
