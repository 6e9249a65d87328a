//! Block and snapshot lifecycle state machines.
//!
//! [`ConsensusLifecycle`] tracks where the consensus connection is in the
//! InitChain → BeginBlock → DeliverTx* → EndBlock → Commit sequence and
//! rejects calls that break it. [`SnapshotRestore`] tracks the snapshot a
//! restoring application accepted and which of its chunks have been applied.

use crate::error::{LifecycleError, Result};
use crate::messages::{Method, ResponseApplySnapshotChunk};
use crate::types::{ApplySnapshotChunkResult, OfferSnapshotResult, Snapshot};
use std::collections::BTreeSet;

/// Phase of the consensus connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing has happened yet on this connection.
    Fresh,
    /// InitChain ran; the first block has not begun.
    Initialized {
        /// Height of the first block.
        initial_height: u64,
    },
    /// A block execution context is open.
    InBlock {
        /// Height of the open block.
        height: u64,
    },
    /// EndBlock ran; waiting for Commit.
    Ended {
        /// Height of the closed block.
        height: u64,
    },
    /// The block at `height` has been committed.
    Committed {
        /// Last committed height.
        height: u64,
    },
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Fresh => write!(f, "fresh"),
            Phase::Initialized { initial_height } => {
                write!(f, "initialized (first block {initial_height})")
            }
            Phase::InBlock { height } => write!(f, "in block {height}"),
            Phase::Ended { height } => write!(f, "block {height} ended"),
            Phase::Committed { height } => write!(f, "block {height} committed"),
        }
    }
}

/// Enforces the per-block call order on the consensus connection.
#[derive(Debug, Clone)]
pub struct ConsensusLifecycle {
    phase: Phase,
}

impl Default for ConsensusLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsensusLifecycle {
    /// Creates a lifecycle for a connection that has seen no calls.
    ///
    /// A fresh lifecycle accepts either InitChain or, when the engine
    /// resumes an existing chain, a BeginBlock at any height.
    pub fn new() -> Self {
        Self {
            phase: Phase::Fresh,
        }
    }

    /// Creates a lifecycle resuming after `height` was committed, e.g. after
    /// a handshake or a completed state sync.
    pub fn resume(height: u64) -> Self {
        Self {
            phase: Phase::Committed { height },
        }
    }

    /// Returns the current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Height the next BeginBlock must carry, if it is constrained. `None`
    /// on a fresh connection and once the last representable height is
    /// reached.
    pub fn next_height(&self) -> Option<u64> {
        match self.phase {
            Phase::Fresh => None,
            Phase::Initialized { initial_height } => Some(initial_height),
            Phase::InBlock { height } | Phase::Ended { height } | Phase::Committed { height } => {
                height.checked_add(1)
            }
        }
    }

    fn out_of_order(&self, method: Method) -> LifecycleError {
        LifecycleError::OutOfOrder {
            method,
            phase: self.phase.to_string(),
        }
    }

    /// Records InitChain. Only valid on a fresh connection; an initial
    /// height of zero means one.
    pub fn init_chain(&mut self, initial_height: u64) -> Result<()> {
        match self.phase {
            Phase::Fresh => {
                self.phase = Phase::Initialized {
                    initial_height: initial_height.max(1),
                };
                Ok(())
            }
            _ => Err(self.out_of_order(Method::InitChain)),
        }
    }

    /// Checks that a proposal may be prepared: never inside an open block.
    pub fn prepare_proposal(&self) -> Result<()> {
        match self.phase {
            Phase::InBlock { .. } | Phase::Ended { .. } => {
                Err(self.out_of_order(Method::PrepareProposal))
            }
            _ => Ok(()),
        }
    }

    /// Records BeginBlock at `height`.
    pub fn begin_block(&mut self, height: u64) -> Result<()> {
        let expected = match self.phase {
            Phase::Fresh if height >= 1 => height,
            Phase::Fresh => 1,
            Phase::Initialized { initial_height } => initial_height,
            Phase::Committed { height: last } => match last.checked_add(1) {
                Some(next) => next,
                None => return Err(self.out_of_order(Method::BeginBlock)),
            },
            Phase::InBlock { .. } | Phase::Ended { .. } => {
                return Err(self.out_of_order(Method::BeginBlock))
            }
        };
        if height != expected {
            return Err(LifecycleError::UnexpectedHeight {
                method: Method::BeginBlock,
                expected,
                got: height,
            });
        }
        self.phase = Phase::InBlock { height };
        Ok(())
    }

    /// Checks that a transaction may be delivered.
    pub fn deliver_tx(&self) -> Result<()> {
        match self.phase {
            Phase::InBlock { .. } => Ok(()),
            _ => Err(self.out_of_order(Method::DeliverTx)),
        }
    }

    /// Records EndBlock for `height`, which must be the open block.
    pub fn end_block(&mut self, height: u64) -> Result<()> {
        match self.phase {
            Phase::InBlock { height: open } if open == height => {
                self.phase = Phase::Ended { height };
                Ok(())
            }
            Phase::InBlock { height: open } => Err(LifecycleError::UnexpectedHeight {
                method: Method::EndBlock,
                expected: open,
                got: height,
            }),
            _ => Err(self.out_of_order(Method::EndBlock)),
        }
    }

    /// Records Commit and returns the committed height.
    pub fn commit(&mut self) -> Result<u64> {
        match self.phase {
            Phase::Ended { height } => {
                self.phase = Phase::Committed { height };
                Ok(height)
            }
            _ => Err(self.out_of_order(Method::Commit)),
        }
    }
}

#[derive(Debug, Clone)]
enum RestoreState {
    Idle,
    Restoring {
        snapshot: Snapshot,
        applied: BTreeSet<u32>,
    },
    Complete {
        snapshot: Snapshot,
    },
}

/// Tracks the snapshot being restored through the state-sync connection.
#[derive(Debug, Clone)]
pub struct SnapshotRestore {
    state: RestoreState,
}

impl Default for SnapshotRestore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotRestore {
    /// Creates an idle tracker.
    pub fn new() -> Self {
        Self {
            state: RestoreState::Idle,
        }
    }

    /// Records the application's verdict on an offered snapshot. Any offer
    /// abandons the restore in progress; only `Accept` starts a new one.
    pub fn offered(&mut self, snapshot: &Snapshot, result: OfferSnapshotResult) {
        self.state = match result {
            OfferSnapshotResult::Accept => RestoreState::Restoring {
                snapshot: snapshot.clone(),
                applied: BTreeSet::new(),
            },
            _ => RestoreState::Idle,
        };
    }

    /// Checks that chunk `index` may be applied.
    pub fn check_chunk(&self, index: u32) -> Result<()> {
        match &self.state {
            RestoreState::Restoring { snapshot, .. } if index < snapshot.chunks => Ok(()),
            RestoreState::Restoring { snapshot, .. } => Err(LifecycleError::ChunkOutOfRange {
                index,
                chunks: snapshot.chunks,
            }),
            _ => Err(LifecycleError::NoSnapshot),
        }
    }

    /// Records the application's verdict on chunk `index`.
    pub fn chunk_applied(&mut self, index: u32, response: &ResponseApplySnapshotChunk) {
        let RestoreState::Restoring { snapshot, applied } = &mut self.state else {
            return;
        };

        for refetch in &response.refetch_chunks {
            applied.remove(refetch);
        }

        match response.result {
            ApplySnapshotChunkResult::Accept => {
                applied.insert(index);
            }
            ApplySnapshotChunkResult::Complete => {
                let snapshot = snapshot.clone();
                self.state = RestoreState::Complete { snapshot };
            }
            ApplySnapshotChunkResult::Retry => {
                applied.remove(&index);
            }
            ApplySnapshotChunkResult::RetrySnapshot => applied.clear(),
            ApplySnapshotChunkResult::RejectSnapshot
            | ApplySnapshotChunkResult::Abort
            | ApplySnapshotChunkResult::Unknown => self.state = RestoreState::Idle,
        }
    }

    /// The snapshot being restored, if any.
    pub fn snapshot(&self) -> Option<&Snapshot> {
        match &self.state {
            RestoreState::Restoring { snapshot, .. } | RestoreState::Complete { snapshot } => {
                Some(snapshot)
            }
            RestoreState::Idle => None,
        }
    }

    /// Number of chunks still missing, if a restore is in progress.
    pub fn remaining(&self) -> Option<u32> {
        match &self.state {
            RestoreState::Restoring { snapshot, applied } => {
                Some(snapshot.chunks.saturating_sub(applied.len() as u32))
            }
            RestoreState::Complete { .. } => Some(0),
            RestoreState::Idle => None,
        }
    }

    /// Height of the completely restored snapshot.
    pub fn completed_height(&self) -> Option<u64> {
        match &self.state {
            RestoreState::Complete { snapshot } => Some(snapshot.height),
            _ => None,
        }
    }
}
