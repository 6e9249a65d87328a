//! Connection set for one application.

use crate::app_conn::{AppConnConsensus, AppConnMempool, AppConnQuery, AppConnSnapshot};
use crate::error::{ProxyError, Result};
use crate::instrumented::InstrumentedClient;
use crate::metrics::Metrics;
use abci_client::{connect, memory, Address, Client, ClientError, Pipeline};
use abci_server::serve_memory;
use abci_types::{Application, RequestInfo, ResponseInfo};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Creates client connections to an application.
#[async_trait]
pub trait ClientCreator: Send + Sync {
    /// Opens a new connection.
    async fn new_client(&self) -> std::result::Result<Arc<dyn Client>, ClientError>;
}

/// Connects to an application running in the same process.
///
/// Every connection gets its own in-memory channel and serving task; the
/// application is shared and serializes its own state.
pub struct LocalClientCreator {
    app: Arc<dyn Application>,
}

impl LocalClientCreator {
    /// Creates a creator for `app`.
    pub fn new(app: Arc<dyn Application>) -> Self {
        Self { app }
    }
}

#[async_trait]
impl ClientCreator for LocalClientCreator {
    async fn new_client(&self) -> std::result::Result<Arc<dyn Client>, ClientError> {
        let (transport, endpoint) = memory();
        let app = self.app.clone();
        tokio::spawn(async move {
            if let Err(err) = serve_memory(app, endpoint).await {
                warn!(error = %err, "local connection failed");
            }
        });
        Ok(Arc::new(Pipeline::new(transport)))
    }
}

/// Connects to an application listening on a socket.
pub struct RemoteClientCreator {
    address: Address,
}

impl RemoteClientCreator {
    /// Creates a creator for the application at `address`.
    pub fn new(address: Address) -> Self {
        Self { address }
    }
}

#[async_trait]
impl ClientCreator for RemoteClientCreator {
    async fn new_client(&self) -> std::result::Result<Arc<dyn Client>, ClientError> {
        Ok(Arc::new(connect(&self.address).await?))
    }
}

/// The four connections to one application, each on its own client.
pub struct AppConns {
    consensus: AppConnConsensus,
    mempool: AppConnMempool,
    query: AppConnQuery,
    snapshot: AppConnSnapshot,
    clients: Vec<Arc<dyn Client>>,
}

impl AppConns {
    /// Opens every connection, recording call timings into `metrics`.
    pub async fn start(creator: &dyn ClientCreator, metrics: Metrics) -> Result<Self> {
        let mut clients = Vec::with_capacity(4);
        for connection in ["query", "snapshot", "mempool", "consensus"] {
            let client = creator
                .new_client()
                .await
                .map_err(|source| ProxyError::Connect { connection, source })?;
            debug!(connection, "application connection started");
            let client: Arc<dyn Client> = Arc::new(InstrumentedClient::new(client, metrics.clone()));
            clients.push(client);
        }

        Ok(Self {
            query: AppConnQuery::new(clients[0].clone()),
            snapshot: AppConnSnapshot::new(clients[1].clone()),
            mempool: AppConnMempool::new(clients[2].clone()),
            consensus: AppConnConsensus::new(clients[3].clone()),
            clients,
        })
    }

    /// Fetches application info and resumes the consensus lifecycle after
    /// the application's last committed height.
    pub async fn handshake(&self, request: RequestInfo) -> Result<ResponseInfo> {
        let info = self.query.info(request).await?;
        if info.last_block_height > 0 {
            self.consensus.resume(info.last_block_height);
        }
        info!(
            height = info.last_block_height,
            version = %info.version,
            app_hash = %hex::encode(&info.last_block_app_hash),
            "handshake complete"
        );
        Ok(info)
    }

    /// Resumes consensus after the snapshot connection completed a restore.
    /// Returns the restored height.
    pub fn finish_state_sync(&self) -> Option<u64> {
        let height = self.snapshot.restored_height()?;
        self.consensus.resume(height);
        info!(height, "state sync complete");
        Some(height)
    }

    /// The consensus connection.
    pub fn consensus(&self) -> &AppConnConsensus {
        &self.consensus
    }

    /// The mempool connection.
    pub fn mempool(&self) -> &AppConnMempool {
        &self.mempool
    }

    /// The query connection.
    pub fn query(&self) -> &AppConnQuery {
        &self.query
    }

    /// The snapshot connection.
    pub fn snapshot(&self) -> &AppConnSnapshot {
        &self.snapshot
    }

    /// Closes every connection.
    pub fn stop(&self) {
        for client in &self.clients {
            client.close();
        }
    }
}

impl Drop for AppConns {
    fn drop(&mut self) {
        self.stop();
    }
}
