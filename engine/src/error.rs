//! Error types for the Stash engine.

use thiserror::Error;

/// All possible errors from the Stash engine.
///
/// None of these cross the engine's public boundary: the public operations
/// are best-effort and log-and-swallow. The error type exists for the
/// internal seams (stores, account store implementations) that need to
/// report failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("serialization failure for key '{key}': {reason}")]
    Serialization { key: String, reason: String },

    #[error("storage write failed for key '{key}': {reason}")]
    StorageWrite { key: String, reason: String },

    #[error("cookie write failed for '{name}': {reason}")]
    CookieWrite { name: String, reason: String },

    #[error("malformed identity record: {0}")]
    InvalidIdentity(String),

    #[error("account store error: {0}")]
    AccountStore(String),
}

impl Error {
    /// Build a serialization error from a serde_json failure.
    pub fn serialization(key: impl Into<String>, err: serde_json::Error) -> Self {
        Error::Serialization {
            key: key.into(),
            reason: err.to_string(),
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
