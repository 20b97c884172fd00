//! Cache operation errors.
//!
//! L2 outages are not errors at this layer; they are absorbed as misses and
//! surfaced through the error counter. Only caller-visible problems (a value
//! that cannot be serialized) become a [`CacheError`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    /// The value could not be serialized for storage.
    #[error("failed to serialize cache value: {message}")]
    Serialize { message: String },
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        CacheError::Serialize {
            message: e.to_string(),
        }
    }
}
