//! # ABCI Types
//!
//! Messages, the [`Application`] contract and the lifecycle state machines of
//! the boundary protocol between a replication engine and a deterministic
//! application.
//!
//! # Method groups
//!
//! | Connection | Methods |
//! |------------|---------|
//! | query      | `echo`, `info`, `query` |
//! | mempool    | `check_tx`, `flush` |
//! | consensus  | `init_chain`, `prepare_proposal`, `begin_block`, `deliver_tx`, `end_block`, `commit`, `extend_vote`, `verify_vote_extension` |
//! | snapshot   | `list_snapshots`, `offer_snapshot`, `load_snapshot_chunk`, `apply_snapshot_chunk` |
//!
//! A response reports application-level rejection through its `code` or
//! result enum; transport-level failure is never encoded in a response other
//! than [`Response::Exception`].

mod application;
mod error;
mod frame;
pub mod lifecycle;
mod messages;
mod types;

pub use application::{Application, BaseApplication};
pub use error::{LifecycleError, Result};
pub use frame::Frame;
pub use lifecycle::{ConsensusLifecycle, Phase, SnapshotRestore};
pub use messages::*;
pub use types::*;
