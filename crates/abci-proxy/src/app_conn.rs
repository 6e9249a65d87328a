//! Per-role connections.
//!
//! Each type exposes only the methods its role may call, so invoking a
//! consensus method through the mempool connection does not compile.

use crate::error::{ProxyError, Result};
use abci_client::{Client, ClientError, ClientExt, ReqRes, ResponseCallback};
use abci_types::*;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error};

fn violation(connection: &'static str, err: LifecycleError) -> ProxyError {
    error!(connection, error = %err, "contract violation");
    ProxyError::ContractViolation(err)
}

/// Block execution connection.
///
/// Tracks the block lifecycle and rejects calls that break it before they
/// reach the application.
pub struct AppConnConsensus {
    client: Arc<dyn Client>,
    lifecycle: Mutex<ConsensusLifecycle>,
}

impl AppConnConsensus {
    /// Creates a connection for a chain that has not been initialized or
    /// resumed yet.
    pub fn new(client: Arc<dyn Client>) -> Self {
        Self {
            client,
            lifecycle: Mutex::new(ConsensusLifecycle::new()),
        }
    }

    /// Resets the lifecycle to continue after `height`, e.g. after a
    /// handshake or a completed state sync.
    pub fn resume(&self, height: u64) {
        debug!(height, "consensus lifecycle resumed");
        *self.lifecycle.lock() = ConsensusLifecycle::resume(height);
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.lifecycle.lock().phase()
    }

    /// The error that poisoned the connection, if any.
    pub fn error(&self) -> Option<ClientError> {
        self.client.error()
    }

    /// Registers the connection-wide response callback.
    pub fn set_response_callback(&self, callback: ResponseCallback) {
        self.client.set_response_callback(callback)
    }

    fn advance<T>(
        &self,
        step: impl FnOnce(&mut ConsensusLifecycle) -> abci_types::Result<T>,
    ) -> Result<T> {
        step(&mut self.lifecycle.lock()).map_err(|err| violation("consensus", err))
    }

    /// Bootstraps genesis state.
    pub async fn init_chain(&self, request: RequestInitChain) -> Result<ResponseInitChain> {
        self.advance(|lifecycle| lifecycle.init_chain(request.initial_height))?;
        Ok(self.client.call(request).await?)
    }

    /// Asks the application to reorder or filter a proposal.
    pub async fn prepare_proposal(
        &self,
        request: RequestPrepareProposal,
    ) -> Result<ResponsePrepareProposal> {
        self.advance(|lifecycle| lifecycle.prepare_proposal())?;
        Ok(self.client.call(request).await?)
    }

    /// Opens block `request.header.height`.
    pub async fn begin_block(&self, request: RequestBeginBlock) -> Result<ResponseBeginBlock> {
        self.advance(|lifecycle| lifecycle.begin_block(request.header.height))?;
        Ok(self.client.call(request).await?)
    }

    /// Submits a transaction for the open block without waiting.
    pub fn deliver_tx_async(&self, request: RequestDeliverTx) -> Result<ReqRes> {
        self.advance(|lifecycle| lifecycle.deliver_tx())?;
        Ok(self.client.submit_async(request.into())?)
    }

    /// Applies a transaction in the open block.
    pub async fn deliver_tx(&self, request: RequestDeliverTx) -> Result<ResponseDeliverTx> {
        self.advance(|lifecycle| lifecycle.deliver_tx())?;
        Ok(self.client.call(request).await?)
    }

    /// Closes the open block.
    pub async fn end_block(&self, request: RequestEndBlock) -> Result<ResponseEndBlock> {
        self.advance(|lifecycle| lifecycle.end_block(request.height))?;
        Ok(self.client.call(request).await?)
    }

    /// Persists the closed block.
    pub async fn commit(&self) -> Result<ResponseCommit> {
        let height = self.advance(|lifecycle| lifecycle.commit())?;
        let response: ResponseCommit = self.client.call(RequestCommit {}).await?;
        debug!(height, app_hash = %hex::encode(&response.data), "block committed");
        Ok(response)
    }

    /// Produces this node's vote extension.
    pub async fn extend_vote(&self, request: RequestExtendVote) -> Result<ResponseExtendVote> {
        Ok(self.client.call(request).await?)
    }

    /// Verifies another validator's vote extension.
    pub async fn verify_vote_extension(
        &self,
        request: RequestVerifyVoteExtension,
    ) -> Result<ResponseVerifyVoteExtension> {
        Ok(self.client.call(request).await?)
    }
}

/// Mempool validation connection.
pub struct AppConnMempool {
    client: Arc<dyn Client>,
}

impl AppConnMempool {
    /// Creates a mempool connection.
    pub fn new(client: Arc<dyn Client>) -> Self {
        Self { client }
    }

    /// The error that poisoned the connection, if any.
    pub fn error(&self) -> Option<ClientError> {
        self.client.error()
    }

    /// Registers the connection-wide response callback.
    pub fn set_response_callback(&self, callback: ResponseCallback) {
        self.client.set_response_callback(callback)
    }

    /// Submits a transaction for validation without waiting.
    pub fn check_tx_async(&self, request: RequestCheckTx) -> Result<ReqRes> {
        Ok(self.client.submit_async(request.into())?)
    }

    /// Validates a transaction.
    pub async fn check_tx(&self, request: RequestCheckTx) -> Result<ResponseCheckTx> {
        Ok(self.client.call(request).await?)
    }

    /// Submits a flush barrier without waiting.
    pub fn flush_async(&self) -> Result<ReqRes> {
        Ok(self.client.submit_async(Request::flush())?)
    }

    /// Waits until every earlier check has completed.
    pub async fn flush(&self) -> Result<()> {
        Ok(self.client.flush().await?)
    }
}

/// Read-only query connection.
pub struct AppConnQuery {
    client: Arc<dyn Client>,
}

impl AppConnQuery {
    /// Creates a query connection.
    pub fn new(client: Arc<dyn Client>) -> Self {
        Self { client }
    }

    /// The error that poisoned the connection, if any.
    pub fn error(&self) -> Option<ClientError> {
        self.client.error()
    }

    /// Liveness check.
    pub async fn echo(&self, message: impl Into<String>) -> Result<ResponseEcho> {
        Ok(self
            .client
            .call(RequestEcho {
                message: message.into(),
            })
            .await?)
    }

    /// Handshake information.
    pub async fn info(&self, request: RequestInfo) -> Result<ResponseInfo> {
        Ok(self.client.call(request).await?)
    }

    /// Point lookup against committed state.
    pub async fn query(&self, request: RequestQuery) -> Result<ResponseQuery> {
        Ok(self.client.call(request).await?)
    }
}

/// State sync connection.
///
/// Tracks the accepted snapshot so chunks are only applied against it and
/// within its declared chunk count.
pub struct AppConnSnapshot {
    client: Arc<dyn Client>,
    restore: Mutex<SnapshotRestore>,
}

impl AppConnSnapshot {
    /// Creates a snapshot connection.
    pub fn new(client: Arc<dyn Client>) -> Self {
        Self {
            client,
            restore: Mutex::new(SnapshotRestore::new()),
        }
    }

    /// The error that poisoned the connection, if any.
    pub fn error(&self) -> Option<ClientError> {
        self.client.error()
    }

    /// Lists local snapshots.
    pub async fn list_snapshots(
        &self,
        request: RequestListSnapshots,
    ) -> Result<ResponseListSnapshots> {
        Ok(self.client.call(request).await?)
    }

    /// Offers a snapshot for restoration.
    pub async fn offer_snapshot(
        &self,
        request: RequestOfferSnapshot,
    ) -> Result<ResponseOfferSnapshot> {
        let snapshot = request.snapshot.clone();
        let response: ResponseOfferSnapshot = self.client.call(request).await?;
        debug!(%snapshot, result = ?response.result, "snapshot offered");
        self.restore.lock().offered(&snapshot, response.result);
        Ok(response)
    }

    /// Loads a chunk of a local snapshot.
    pub async fn load_snapshot_chunk(
        &self,
        request: RequestLoadSnapshotChunk,
    ) -> Result<ResponseLoadSnapshotChunk> {
        Ok(self.client.call(request).await?)
    }

    /// Applies a chunk of the accepted snapshot.
    pub async fn apply_snapshot_chunk(
        &self,
        request: RequestApplySnapshotChunk,
    ) -> Result<ResponseApplySnapshotChunk> {
        let index = request.index;
        self.restore
            .lock()
            .check_chunk(index)
            .map_err(|err| violation("snapshot", err))?;

        let response: ResponseApplySnapshotChunk = self.client.call(request).await?;
        debug!(index, result = ?response.result, "snapshot chunk applied");
        self.restore.lock().chunk_applied(index, &response);
        Ok(response)
    }

    /// Height of the snapshot once every chunk has been applied.
    pub fn restored_height(&self) -> Option<u64> {
        self.restore.lock().completed_height()
    }

    /// Chunks still missing from the restore in progress.
    pub fn remaining_chunks(&self) -> Option<u32> {
        self.restore.lock().remaining()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abci_client::{memory, Pipeline};
    use abci_server::serve_memory;

    fn connect() -> Arc<dyn Client> {
        let (transport, endpoint) = memory();
        tokio::spawn(serve_memory(Arc::new(BaseApplication::new()), endpoint));
        Arc::new(Pipeline::new(transport))
    }

    fn begin(height: u64) -> RequestBeginBlock {
        RequestBeginBlock {
            header: Header {
                height,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_block_sequence_accepted() {
        let consensus = AppConnConsensus::new(connect());

        consensus
            .init_chain(RequestInitChain {
                initial_height: 1,
                ..Default::default()
            })
            .await
            .unwrap();
        for height in 1..=3 {
            consensus
                .prepare_proposal(RequestPrepareProposal::default())
                .await
                .unwrap();
            consensus.begin_block(begin(height)).await.unwrap();
            consensus.deliver_tx(RequestDeliverTx::default()).await.unwrap();
            consensus
                .end_block(RequestEndBlock { height })
                .await
                .unwrap();
            consensus.commit().await.unwrap();
        }

        assert_eq!(consensus.phase(), Phase::Committed { height: 3 });
    }

    #[tokio::test]
    async fn test_deliver_before_begin_is_violation() {
        let consensus = AppConnConsensus::new(connect());

        let err = consensus
            .deliver_tx(RequestDeliverTx::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::ContractViolation(_)));
        assert!(consensus.error().is_none());
    }

    #[tokio::test]
    async fn test_skipped_height_is_violation() {
        let consensus = AppConnConsensus::new(connect());
        consensus.resume(5);

        let err = consensus.begin_block(begin(7)).await.unwrap_err();
        assert_eq!(
            err,
            ProxyError::ContractViolation(LifecycleError::UnexpectedHeight {
                method: Method::BeginBlock,
                expected: 6,
                got: 7,
            })
        );
        consensus.begin_block(begin(6)).await.unwrap();
    }

    #[tokio::test]
    async fn test_chunk_without_snapshot_is_violation() {
        let snapshot = AppConnSnapshot::new(connect());

        let err = snapshot
            .apply_snapshot_chunk(RequestApplySnapshotChunk::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ProxyError::ContractViolation(LifecycleError::NoSnapshot)
        );
    }

    #[tokio::test]
    async fn test_mempool_flush_after_checks() {
        let mempool = AppConnMempool::new(connect());

        let first = mempool.check_tx_async(RequestCheckTx::default()).unwrap();
        let second = mempool.check_tx_async(RequestCheckTx::default()).unwrap();
        mempool.flush().await.unwrap();

        assert!(first.is_done());
        assert!(second.is_done());
    }

    #[tokio::test]
    async fn test_query_echo() {
        let query = AppConnQuery::new(connect());
        assert_eq!(query.echo("ping").await.unwrap().message, "ping");
    }
}
