//! The Application contract.

use crate::messages::*;
use crate::types::CODE_TYPE_OK;

/// A deterministic state machine driven by a replication engine.
///
/// Methods are grouped by the connection that invokes them:
///
/// - **Info/Query**: [`info`](Self::info), [`query`](Self::query). Read-only.
/// - **Mempool**: [`check_tx`](Self::check_tx). Validates against the last
///   committed state.
/// - **Consensus**: [`init_chain`](Self::init_chain) once, then per block
///   [`prepare_proposal`](Self::prepare_proposal) →
///   [`begin_block`](Self::begin_block) → [`deliver_tx`](Self::deliver_tx)* →
///   [`end_block`](Self::end_block) → [`commit`](Self::commit), in strictly
///   increasing height order. [`extend_vote`](Self::extend_vote) and
///   [`verify_vote_extension`](Self::verify_vote_extension) run per round.
/// - **State sync**: [`list_snapshots`](Self::list_snapshots),
///   [`offer_snapshot`](Self::offer_snapshot),
///   [`load_snapshot_chunk`](Self::load_snapshot_chunk),
///   [`apply_snapshot_chunk`](Self::apply_snapshot_chunk).
///
/// Every method that influences replicated state must be deterministic.
/// Methods take `&self`: the four connections call in concurrently and the
/// implementation serializes access to its own state. Methods are
/// synchronous and may block; socket and in-process servers call them from
/// a blocking thread pool.
///
/// Every method has a trivial-success default, so an implementation only
/// overrides what it needs.
pub trait Application: Send + Sync + 'static {
    /// Returns application info for the handshake.
    fn info(&self, _request: RequestInfo) -> ResponseInfo {
        ResponseInfo::default()
    }

    /// Answers a point lookup against the last committed state.
    fn query(&self, _request: RequestQuery) -> ResponseQuery {
        ResponseQuery {
            code: CODE_TYPE_OK,
            ..Default::default()
        }
    }

    /// Validates a transaction for the mempool.
    fn check_tx(&self, _request: RequestCheckTx) -> ResponseCheckTx {
        ResponseCheckTx {
            code: CODE_TYPE_OK,
            ..Default::default()
        }
    }

    /// Bootstraps genesis state.
    fn init_chain(&self, _request: RequestInitChain) -> ResponseInitChain {
        ResponseInitChain::default()
    }

    /// Reorders or filters candidate transactions before proposing them.
    fn prepare_proposal(&self, request: RequestPrepareProposal) -> ResponsePrepareProposal {
        ResponsePrepareProposal { txs: request.txs }
    }

    /// Opens a block execution context.
    fn begin_block(&self, _request: RequestBeginBlock) -> ResponseBeginBlock {
        ResponseBeginBlock::default()
    }

    /// Applies one transaction in the open block.
    fn deliver_tx(&self, _request: RequestDeliverTx) -> ResponseDeliverTx {
        ResponseDeliverTx {
            code: CODE_TYPE_OK,
            ..Default::default()
        }
    }

    /// Closes the block execution context.
    fn end_block(&self, _request: RequestEndBlock) -> ResponseEndBlock {
        ResponseEndBlock::default()
    }

    /// Persists the block's effects and returns the new app hash.
    fn commit(&self) -> ResponseCommit {
        ResponseCommit::default()
    }

    /// Produces a vote extension for the given round.
    fn extend_vote(&self, _request: RequestExtendVote) -> ResponseExtendVote {
        ResponseExtendVote::default()
    }

    /// Verifies another validator's vote extension.
    fn verify_vote_extension(
        &self,
        _request: RequestVerifyVoteExtension,
    ) -> ResponseVerifyVoteExtension {
        ResponseVerifyVoteExtension::default()
    }

    /// Lists locally available snapshots.
    fn list_snapshots(&self, _request: RequestListSnapshots) -> ResponseListSnapshots {
        ResponseListSnapshots::default()
    }

    /// Decides whether to restore from an offered snapshot.
    fn offer_snapshot(&self, _request: RequestOfferSnapshot) -> ResponseOfferSnapshot {
        ResponseOfferSnapshot::default()
    }

    /// Serves one chunk of a local snapshot.
    fn load_snapshot_chunk(&self, _request: RequestLoadSnapshotChunk) -> ResponseLoadSnapshotChunk {
        ResponseLoadSnapshotChunk::default()
    }

    /// Applies one chunk of the accepted snapshot and classifies the outcome.
    fn apply_snapshot_chunk(
        &self,
        _request: RequestApplySnapshotChunk,
    ) -> ResponseApplySnapshotChunk {
        ResponseApplySnapshotChunk::default()
    }
}

/// An application that accepts everything and keeps no state.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseApplication;

impl BaseApplication {
    /// Creates a new base application.
    pub fn new() -> Self {
        Self
    }
}

impl Application for BaseApplication {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ApplySnapshotChunkResult, OfferSnapshotResult, VerifyStatus};
    use bytes::Bytes;

    #[test]
    fn test_base_application_accepts_transactions() {
        let app = BaseApplication::new();
        let tx = Bytes::from_static(b"tx");

        assert!(app
            .check_tx(RequestCheckTx {
                tx: tx.clone(),
                ..Default::default()
            })
            .is_ok());
        assert!(app.deliver_tx(RequestDeliverTx { tx }).is_ok());
        assert!(app.query(RequestQuery::default()).is_ok());
    }

    #[test]
    fn test_base_application_keeps_proposal() {
        let app = BaseApplication::new();
        let txs = vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")];
        let response = app.prepare_proposal(RequestPrepareProposal {
            txs: txs.clone(),
            ..Default::default()
        });
        assert_eq!(response.txs, txs);
    }

    #[test]
    fn test_base_application_leaves_state_sync_unclassified() {
        let app = BaseApplication::new();

        assert_eq!(
            app.offer_snapshot(RequestOfferSnapshot::default()).result,
            OfferSnapshotResult::Unknown
        );
        assert_eq!(
            app.apply_snapshot_chunk(RequestApplySnapshotChunk::default())
                .result,
            ApplySnapshotChunkResult::Unknown
        );
        assert_eq!(
            app.verify_vote_extension(RequestVerifyVoteExtension::default())
                .status,
            VerifyStatus::Unknown
        );
    }

    #[test]
    fn test_override_single_method() {
        struct Versioned;

        impl Application for Versioned {
            fn info(&self, _request: RequestInfo) -> ResponseInfo {
                ResponseInfo {
                    version: "1.2.3".into(),
                    ..Default::default()
                }
            }
        }

        let app = Versioned;
        assert_eq!(app.info(RequestInfo::default()).version, "1.2.3");
        assert!(app.commit().data.is_empty());
    }
}
