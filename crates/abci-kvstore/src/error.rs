//! Key/value store error types.

use thiserror::Error;

/// Errors raised by the key/value store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KvStoreError {
    /// A restored snapshot payload could not be decoded.
    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(&'static str),

    /// The configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A specialized Result type for key/value store operations.
pub type Result<T> = std::result::Result<T, KvStoreError>;
