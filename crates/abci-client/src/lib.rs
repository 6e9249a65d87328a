//! # ABCI Client
//!
//! Ordered request/response pipeline between a replication engine and an
//! application.
//!
//! ## Overview
//!
//! A [`Pipeline`] owns one connection. Requests are submitted with
//! [`Client::submit_async`], which returns a [`ReqRes`] handle immediately,
//! or with [`Client::submit_sync`], which waits for the response.
//! [`Client::flush`] is a barrier over everything submitted before it.
//!
//! Completions are delivered strictly in submission order, even when the
//! transport answers out of order. Any transport failure, malformed frame
//! or server exception poisons the connection for good.
//!
//! ## Example
//!
//! ```rust,no_run
//! use abci_client::{connect, Client, ClientExt};
//! use abci_types::{RequestInfo, ResponseInfo};
//!
//! # async fn run() -> abci_client::Result<()> {
//! let client = connect(&"tcp://127.0.0.1:26658".parse()?).await?;
//! let info: ResponseInfo = client.call(RequestInfo::default()).await?;
//! println!("last block height: {}", info.last_block_height);
//! client.close();
//! # Ok(())
//! # }
//! ```

mod client;
pub mod codec;
mod error;
mod pipeline;
mod reqres;
pub mod transport;

pub use client::{Client, ClientExt, ResponseCallback};
pub use error::{ClientError, Result};
pub use pipeline::Pipeline;
pub use reqres::{CompletionCallback, ReqRes};
pub use transport::{memory, Address, MemoryEndpoint, MemoryTransport, Transport};

/// Connects to an application listening at `address`.
pub async fn connect(address: &Address) -> Result<Pipeline> {
    let transport = transport::connect(address).await?;
    tracing::debug!(%address, "connected to application");
    Ok(Pipeline::new(transport))
}
