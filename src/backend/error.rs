use thiserror::Error;

/// Errors surfaced by an external key-value backend.
///
/// These never cross the cache or throttle boundary; callers of those
/// components see fallback behavior instead.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend is unreachable or the connection dropped.
    #[error("backend connection error: {message}")]
    Connection {
        /// Error message.
        message: String,
    },

    /// A command failed after the connection was established.
    #[error("backend query error: {message}")]
    Query {
        /// Error message.
        message: String,
    },

    /// The atomic counter script failed to execute.
    #[error("backend script error: {message}")]
    Script {
        /// Error message.
        message: String,
    },
}

/// Convenience result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;
