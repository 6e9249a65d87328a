//! Contract violation errors.

use crate::messages::Method;
use thiserror::Error;

/// A method invoked out of the order the protocol requires.
///
/// These are programming defects in the driving engine and are never
/// retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// The method is not permitted in the current phase.
    #[error("{method} not permitted while {phase}")]
    OutOfOrder {
        /// The rejected method.
        method: Method,
        /// Description of the current phase.
        phase: String,
    },

    /// A block height that does not follow the previous one.
    #[error("{method} at height {got}, expected {expected}")]
    UnexpectedHeight {
        /// The rejected method.
        method: Method,
        /// Height the lifecycle expects.
        expected: u64,
        /// Height supplied by the caller.
        got: u64,
    },

    /// A snapshot chunk was applied without an accepted snapshot.
    #[error("no snapshot has been accepted")]
    NoSnapshot,

    /// A chunk index beyond the accepted snapshot's declared count.
    #[error("chunk {index} out of range, snapshot has {chunks} chunks")]
    ChunkOutOfRange {
        /// The rejected chunk index.
        index: u32,
        /// Declared chunk count.
        chunks: u32,
    },
}

/// A specialized Result type for lifecycle checks.
pub type Result<T> = std::result::Result<T, LifecycleError>;
