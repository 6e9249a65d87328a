//! Client error types.

use abci_types::Method;
use thiserror::Error;

/// Errors surfaced by a client connection.
///
/// Every variant except [`ClientError::CallbackAlreadySet`] is terminal: once
/// a connection reports one, it is poisoned and every pending and future
/// call on it fails with the same error. The type is `Clone` so the one
/// poisoning error can be handed to each pending call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The connection was closed locally.
    #[error("connection closed")]
    Closed,

    /// The peer closed the connection.
    #[error("connection closed by peer")]
    Disconnected,

    /// I/O or framing failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with an exception.
    #[error("{method} failed on the server: {error}")]
    Exception {
        /// Method of the failed request.
        method: Method,
        /// Error reported by the server.
        error: String,
    },

    /// A response for a different method than the request it answers.
    #[error("unexpected response: expected {expected}, got {}", .got.map_or("exception", |m| m.as_str()))]
    UnexpectedResponse {
        /// Method of the pending request.
        expected: Method,
        /// Method of the received response.
        got: Option<Method>,
    },

    /// A response for a request id that is not pending.
    #[error("response for unknown request {0}")]
    UnknownResponse(u64),

    /// A second response for the same request id.
    #[error("duplicate response for request {0}")]
    DuplicateResponse(u64),

    /// A completion callback is already registered on the handle.
    #[error("completion callback already set")]
    CallbackAlreadySet,

    /// The address could not be parsed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}

impl From<crate::codec::CodecError> for ClientError {
    fn from(err: crate::codec::CodecError) -> Self {
        ClientError::Transport(err.to_string())
    }
}

/// A specialized Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
