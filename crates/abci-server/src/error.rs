//! Server error types.

use abci_client::codec::CodecError;
use thiserror::Error;

/// Errors that can occur while serving an application.
#[derive(Debug, Error)]
pub enum ServerError {
    /// I/O failure on a listener or connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame could not be decoded or encoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The listen address is not supported on this platform.
    #[error("unsupported address: {0}")]
    UnsupportedAddress(String),

    /// The peer went away before a response could be delivered.
    #[error("client disconnected")]
    Disconnected,
}

/// A specialized Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;
