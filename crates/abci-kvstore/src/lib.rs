//! # ABCI Key/Value Store
//!
//! A deterministic reference application for the boundary protocol.
//!
//! Transactions have the form `key=value`. Committed state is hashed into
//! the app hash at every height, and the store periodically takes chunked
//! snapshots that another instance can restore through state sync.
//!
//! ```rust
//! use abci_kvstore::{KvStore, KvStoreConfig};
//! use abci_types::{Application, RequestBeginBlock, RequestDeliverTx, RequestEndBlock};
//! use bytes::Bytes;
//!
//! let app = KvStore::new(KvStoreConfig::without_snapshots());
//! app.begin_block(RequestBeginBlock::default());
//! app.deliver_tx(RequestDeliverTx { tx: Bytes::from_static(b"name=satoshi") });
//! app.end_block(RequestEndBlock::default());
//! app.commit();
//!
//! assert_eq!(app.get(b"name"), Some(Bytes::from_static(b"satoshi")));
//! ```

mod app;
mod config;
mod error;
pub mod store;

pub use app::{KvStore, APP_VERSION, SNAPSHOT_FORMAT};
pub use config::KvStoreConfig;
pub use error::{KvStoreError, Result};
