//! Proxy error types.

use abci_client::ClientError;
use abci_types::LifecycleError;
use thiserror::Error;

/// Errors surfaced by the per-role connections.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyError {
    /// The underlying connection failed. The connection is poisoned.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// A method was called out of the order the protocol requires. This
    /// is a defect in the caller and is never retried.
    #[error("contract violation: {0}")]
    ContractViolation(#[from] LifecycleError),

    /// A connection could not be established.
    #[error("failed to start {connection} connection: {source}")]
    Connect {
        /// Role of the connection.
        connection: &'static str,
        /// Underlying error.
        source: ClientError,
    },
}

/// A specialized Result type for proxy operations.
pub type Result<T> = std::result::Result<T, ProxyError>;
