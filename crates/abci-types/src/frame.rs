//! Connection framing.

use serde::{Deserialize, Serialize};

/// A message on a connection, tagged with the sequence number the client
/// assigned to the request. The server echoes the id on the response so the
/// client can match responses that arrive out of order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame<T> {
    /// Per-connection request sequence number.
    pub id: u64,
    /// The request or response.
    pub body: T,
}

impl<T> Frame<T> {
    /// Creates a frame.
    pub fn new(id: u64, body: T) -> Self {
        Self { id, body }
    }
}
