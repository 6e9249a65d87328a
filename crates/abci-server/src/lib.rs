//! # ABCI Server
//!
//! Exposes a local [`Application`](abci_types::Application) to a remote
//! driver.
//!
//! Each connection is served serially: requests are dispatched 1:1 to the
//! application in arrival order and answered with the same frame id.
//! `Echo` and `Flush` are answered by the server itself, and requests for
//! methods outside the application surface get an explicit exception.
//!
//! ```rust,no_run
//! use abci_server::Server;
//! use abci_types::BaseApplication;
//! use std::sync::Arc;
//!
//! # async fn run() -> abci_server::Result<()> {
//! let address = "tcp://127.0.0.1:26658".parse().expect("valid address");
//! Server::bind(&address, Arc::new(BaseApplication::new()))
//!     .await?
//!     .run()
//!     .await
//! # }
//! ```

mod dispatch;
mod error;
mod server;

pub use dispatch::dispatch;
pub use error::{Result, ServerError};
pub use server::{serve_connection, serve_memory, Server};
