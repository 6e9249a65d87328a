//! Connection set behaviour against in-process applications.

use abci_client::{memory, ClientError, Pipeline};
use abci_proxy::{
    AppConnMempool, AppConns, LocalClientCreator, Metrics, ProxyError, RemoteClientCreator,
};
use abci_server::Server;
use abci_types::*;
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;

struct Resumed(u64);

impl Application for Resumed {
    fn info(&self, _request: RequestInfo) -> ResponseInfo {
        ResponseInfo {
            last_block_height: self.0,
            last_block_app_hash: Bytes::from_static(b"hash"),
            ..Default::default()
        }
    }
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
async fn test_mempool_callbacks_follow_submission_order() {
    let (transport, mut endpoint) = memory();
    let mempool = AppConnMempool::new(Arc::new(Pipeline::new(transport)));
    let outcomes = Arc::new(Mutex::new(Vec::new()));

    let txs = [b"A" as &'static [u8], b"B", b"C"];
    let mut handles = Vec::new();
    for tx in txs {
        let reqres = mempool
            .check_tx_async(RequestCheckTx {
                tx: Bytes::from_static(tx),
                kind: CheckTxKind::New,
            })
            .unwrap();
        let outcomes = outcomes.clone();
        reqres
            .set_callback(move |outcome| {
                if let Ok(Response::CheckTx(response)) = outcome {
                    outcomes.lock().push((response.data.clone(), response.code));
                }
            })
            .unwrap();
        handles.push(reqres);
    }

    // Answer B first: B is rejected, A and C accepted.
    let mut frames = Vec::new();
    for _ in 0..3 {
        frames.push(endpoint.requests.next().await.unwrap());
    }
    for index in [1, 0, 2] {
        let frame: &Frame<Request> = &frames[index];
        let Request::CheckTx(check) = &frame.body else {
            panic!("unexpected request: {:?}", frame.body);
        };
        let response = ResponseCheckTx {
            code: u32::from(check.tx.as_ref() == b"B"),
            data: check.tx.clone(),
            ..Default::default()
        };
        endpoint
            .responses
            .unbounded_send(Frame::new(frame.id, Response::from(response)))
            .unwrap();
    }
    for handle in &handles {
        handle.wait().await.unwrap();
    }

    assert_eq!(
        *outcomes.lock(),
        vec![
            (Bytes::from_static(b"A"), 0),
            (Bytes::from_static(b"B"), 1),
            (Bytes::from_static(b"C"), 0),
        ]
    );
}

#[tokio::test]
async fn test_handshake_resumes_consensus() {
    let creator = LocalClientCreator::new(Arc::new(Resumed(7)));
    let conns = AppConns::start(&creator, Metrics::nop()).await.unwrap();

    let info = conns.handshake(RequestInfo::default()).await.unwrap();
    assert_eq!(info.last_block_height, 7);
    assert_eq!(conns.consensus().phase(), Phase::Committed { height: 7 });

    assert!(matches!(
        conns.consensus().begin_block(begin(7)).await,
        Err(ProxyError::ContractViolation(_))
    ));
    conns.consensus().begin_block(begin(8)).await.unwrap();
}

#[tokio::test]
async fn test_handshake_at_last_height_refuses_blocks() {
    let creator = LocalClientCreator::new(Arc::new(Resumed(u64::MAX)));
    let conns = AppConns::start(&creator, Metrics::nop()).await.unwrap();

    conns.handshake(RequestInfo::default()).await.unwrap();
    assert_eq!(
        conns.consensus().phase(),
        Phase::Committed { height: u64::MAX }
    );
    assert!(matches!(
        conns.consensus().begin_block(begin(u64::MAX)).await,
        Err(ProxyError::ContractViolation(_))
    ));
    assert!(matches!(
        conns.consensus().begin_block(begin(0)).await,
        Err(ProxyError::ContractViolation(_))
    ));
    conns.query().echo("still serving").await.unwrap();
}

#[tokio::test]
async fn test_connections_are_independent() {
    let creator = LocalClientCreator::new(Arc::new(BaseApplication::new()));
    let conns = AppConns::start(&creator, Metrics::nop()).await.unwrap();

    conns.mempool().flush().await.unwrap();
    conns.stop();

    let err = conns
        .query()
        .info(RequestInfo::default())
        .await
        .unwrap_err();
    assert_eq!(err, ProxyError::Client(ClientError::Closed));
    assert_eq!(conns.mempool().error(), Some(ClientError::Closed));
}

#[tokio::test]
async fn test_remote_connections() {
    let address = "tcp://127.0.0.1:0".parse().unwrap();
    let server = Server::bind(&address, Arc::new(BaseApplication::new()))
        .await
        .unwrap();
    let address = server.local_address().unwrap();
    tokio::spawn(server.run());

    let conns = AppConns::start(&RemoteClientCreator::new(address), Metrics::nop())
        .await
        .unwrap();
    assert_eq!(conns.query().echo("hello").await.unwrap().message, "hello");

    let consensus = conns.consensus();
    consensus
        .init_chain(RequestInitChain::default())
        .await
        .unwrap();
    consensus.begin_block(begin(1)).await.unwrap();
    let pending = consensus
        .deliver_tx_async(RequestDeliverTx {
            tx: Bytes::from_static(b"tx"),
        })
        .unwrap();
    consensus
        .end_block(RequestEndBlock { height: 1 })
        .await
        .unwrap();
    assert!(pending.is_done());
    consensus.commit().await.unwrap();
}

#[tokio::test]
async fn test_remote_start_fails_without_server() {
    let creator = RemoteClientCreator::new("tcp://127.0.0.1:1".parse().unwrap());
    let err = AppConns::start(&creator, Metrics::nop()).await.err().unwrap();

    assert!(matches!(
        err,
        ProxyError::Connect {
            connection: "query",
            ..
        }
    ));
}
