//! # ABCI Proxy
//!
//! Typed connections from a replication engine to one application.
//!
//! The engine talks to the application over four independent connections,
//! each exposing only the calls its role may make:
//!
//! | Connection | Calls |
//! |------------|-------|
//! | [`AppConnConsensus`] | InitChain, PrepareProposal, BeginBlock, DeliverTx, EndBlock, Commit, ExtendVote, VerifyVoteExtension |
//! | [`AppConnMempool`] | CheckTx, Flush |
//! | [`AppConnQuery`] | Echo, Info, Query |
//! | [`AppConnSnapshot`] | ListSnapshots, OfferSnapshot, LoadSnapshotChunk, ApplySnapshotChunk |
//!
//! The consensus connection enforces the block lifecycle and the snapshot
//! connection enforces the restore lifecycle; violations are reported as
//! [`ProxyError::ContractViolation`] without reaching the application.
//!
//! Calling a method through the wrong connection does not compile:
//!
//! ```rust,compile_fail
//! # async fn misuse(mempool: &abci_proxy::AppConnMempool) {
//! mempool.commit().await;
//! # }
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use abci_proxy::{AppConns, LocalClientCreator, Metrics};
//! use abci_types::{BaseApplication, RequestInfo};
//! use std::sync::Arc;
//!
//! # async fn run() -> abci_proxy::Result<()> {
//! let creator = LocalClientCreator::new(Arc::new(BaseApplication::new()));
//! let conns = AppConns::start(&creator, Metrics::nop()).await?;
//! let info = conns.handshake(RequestInfo::default()).await?;
//! println!("application at height {}", info.last_block_height);
//! # Ok(())
//! # }
//! ```

mod app_conn;
mod error;
mod instrumented;
pub mod metrics;
mod multi_app_conn;

pub use app_conn::{AppConnConsensus, AppConnMempool, AppConnQuery, AppConnSnapshot};
pub use error::{ProxyError, Result};
pub use instrumented::InstrumentedClient;
pub use metrics::{CallMode, Metrics};
pub use multi_app_conn::{AppConns, ClientCreator, LocalClientCreator, RemoteClientCreator};
