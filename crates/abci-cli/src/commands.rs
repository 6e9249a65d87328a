//! Subcommand implementations.

use abci_client::Address;
use abci_kvstore::{KvStore, KvStoreConfig};
use abci_proxy::{AppConns, Metrics, RemoteClientCreator};
use abci_server::Server;
use abci_types::*;
use anyhow::{bail, Context, Result};
use bytes::Bytes;
use prometheus_client::registry::Registry;
use std::sync::Arc;
use tracing::info;

/// Decodes a command-line payload: `0x`-prefixed hex or raw text.
pub fn parse_payload(raw: &str) -> Result<Bytes> {
    match raw.strip_prefix("0x") {
        Some(hex) => Ok(Bytes::from(
            hex::decode(hex).with_context(|| format!("invalid hex payload {raw:?}"))?,
        )),
        None => Ok(Bytes::copy_from_slice(raw.as_bytes())),
    }
}

fn display(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) if !text.chars().any(char::is_control) => text.to_string(),
        _ => format!("0x{}", hex::encode(bytes)),
    }
}

/// Serves the key/value application until interrupted.
pub async fn kvstore(address: &Address, config: KvStoreConfig) -> Result<()> {
    let app = Arc::new(KvStore::new(config));
    let server = Server::bind(address, app)
        .await
        .with_context(|| format!("failed to listen on {address}"))?;
    info!(address = %server.local_address()?, "serving kvstore");

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    info!("kvstore stopped");
    Ok(())
}

/// A session against a running application.
pub struct Session {
    conns: AppConns,
    registry: Registry,
}

impl Session {
    /// Opens every connection to the application at `address`.
    pub async fn connect(address: Address) -> Result<Self> {
        let mut registry = Registry::default();
        let metrics = Metrics::new(&mut registry);
        let conns = AppConns::start(&RemoteClientCreator::new(address.clone()), metrics)
            .await
            .with_context(|| format!("failed to connect to {address}"))?;
        Ok(Self { conns, registry })
    }

    /// Call timings recorded so far, in the Prometheus text format.
    pub fn metrics(&self) -> Result<String> {
        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }

    /// Round-trips `message` through the query connection.
    pub async fn echo(&self, message: String) -> Result<()> {
        let response = self.conns.query().echo(message).await?;
        println!("-> data: {}", response.message);
        Ok(())
    }

    /// Prints application info.
    pub async fn info(&self) -> Result<()> {
        let response = self
            .conns
            .query()
            .info(RequestInfo {
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            })
            .await?;
        println!("-> data: {}", response.data);
        println!("-> version: {}", response.version);
        println!("-> app_version: {}", response.app_version);
        println!("-> last_block_height: {}", response.last_block_height);
        println!(
            "-> last_block_app_hash: 0x{}",
            hex::encode(&response.last_block_app_hash)
        );
        Ok(())
    }

    /// Queries `data` at `path`.
    pub async fn query(&self, data: Bytes, path: String) -> Result<()> {
        let response = self
            .conns
            .query()
            .query(RequestQuery {
                data,
                path,
                ..Default::default()
            })
            .await?;
        println!("-> code: {}", response.code);
        println!("-> log: {}", response.log);
        println!("-> height: {}", response.height);
        println!("-> key: {}", display(&response.key));
        println!("-> value: {}", display(&response.value));
        Ok(())
    }

    /// Validates a transaction through the mempool connection.
    pub async fn check_tx(&self, tx: Bytes) -> Result<()> {
        let response = self
            .conns
            .mempool()
            .check_tx(RequestCheckTx {
                tx,
                kind: CheckTxKind::New,
            })
            .await?;
        println!("-> code: {}", response.code);
        if !response.log.is_empty() {
            println!("-> log: {}", response.log);
        }
        Ok(())
    }

    /// Executes and commits one block holding `txs`.
    pub async fn deliver_block(&self, txs: Vec<Bytes>) -> Result<()> {
        if txs.is_empty() {
            bail!("at least one transaction is required");
        }

        let info = self.conns.handshake(RequestInfo::default()).await?;
        let Some(height) = info.last_block_height.checked_add(1) else {
            bail!("application is at the last height {}", info.last_block_height);
        };
        let consensus = self.conns.consensus();

        consensus
            .begin_block(RequestBeginBlock {
                header: Header {
                    height,
                    ..Default::default()
                },
                ..Default::default()
            })
            .await?;

        let pending = txs
            .into_iter()
            .map(|tx| consensus.deliver_tx_async(RequestDeliverTx { tx }))
            .collect::<abci_proxy::Result<Vec<_>>>()?;
        consensus.end_block(RequestEndBlock { height }).await?;

        for reqres in pending {
            let Response::DeliverTx(response) = reqres.wait().await? else {
                continue;
            };
            if let Request::DeliverTx(request) = reqres.request() {
                println!("-> tx: {}", display(&request.tx));
            }
            println!("   code: {}", response.code);
            if !response.log.is_empty() {
                println!("   log: {}", response.log);
            }
        }

        let commit = consensus.commit().await?;
        println!("-> height: {height}");
        println!("-> app_hash: 0x{}", hex::encode(&commit.data));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_payload() {
        assert_eq!(parse_payload("abc").unwrap(), Bytes::from_static(b"abc"));
        assert_eq!(
            parse_payload("0x6b3d76").unwrap(),
            Bytes::from_static(b"k=v")
        );
        assert!(parse_payload("0xzz").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(display(b"value"), "value");
        assert_eq!(display(&[0, 1, 255]), "0x0001ff");
    }

    #[tokio::test]
    async fn test_session_against_kvstore() {
        let server = Server::bind(
            &"tcp://127.0.0.1:0".parse().unwrap(),
            Arc::new(KvStore::default()),
        )
        .await
        .unwrap();
        let address = server.local_address().unwrap();
        tokio::spawn(server.run());

        let session = Session::connect(address).await.unwrap();
        session
            .deliver_block(vec![Bytes::from_static(b"k=v")])
            .await
            .unwrap();
        session
            .query(Bytes::from_static(b"k"), "/store".into())
            .await
            .unwrap();
        session.check_tx(Bytes::from_static(b"a=b=c")).await.unwrap();

        let metrics = session.metrics().unwrap();
        assert!(metrics.contains("method=\"commit\",type=\"sync\""));
        assert!(metrics.contains("method=\"deliver_tx\",type=\"async\""));
    }
}
