//! End-to-end requests through a client pipeline and a socket server.

use abci_client::{connect, Address, Client, ClientError, ClientExt};
use abci_server::Server;
use abci_types::{
    Application, BaseApplication, Request, RequestCheckTx, RequestInfo, RequestProcessProposal,
    ResponseCheckTx, ResponseInfo,
};
use bytes::Bytes;
use std::sync::Arc;

struct Picky;

impl Application for Picky {
    fn info(&self, _request: RequestInfo) -> ResponseInfo {
        ResponseInfo {
            version: "picky".into(),
            ..Default::default()
        }
    }

    fn check_tx(&self, request: RequestCheckTx) -> ResponseCheckTx {
        ResponseCheckTx {
            code: u32::from(request.tx.is_empty()),
            ..Default::default()
        }
    }
}

async fn spawn_server(address: &str, app: Arc<dyn Application>) -> Address {
    let server = Server::bind(&address.parse().unwrap(), app).await.unwrap();
    let address = server.local_address().unwrap();
    tokio::spawn(server.run());
    address
}

#[tokio::test]
async fn test_tcp_roundtrip() {
    let address = spawn_server("tcp://127.0.0.1:0", Arc::new(Picky)).await;
    let client = connect(&address).await.unwrap();

    let info: ResponseInfo = client.call(RequestInfo::default()).await.unwrap();
    assert_eq!(info.version, "picky");

    let accepted: ResponseCheckTx = client
        .call(RequestCheckTx {
            tx: Bytes::from_static(b"tx"),
            ..Default::default()
        })
        .await
        .unwrap();
    let rejected: ResponseCheckTx = client.call(RequestCheckTx::default()).await.unwrap();
    assert!(accepted.is_ok());
    assert!(rejected.is_err());

    client.flush().await.unwrap();
    assert!(client.error().is_none());
}

#[tokio::test]
async fn test_pipelined_requests_complete_in_order() {
    let address = spawn_server("tcp://127.0.0.1:0", Arc::new(BaseApplication::new())).await;
    let client = connect(&address).await.unwrap();

    let handles: Vec<_> = (0..50)
        .map(|i| client.submit_async(Request::echo(format!("m{i}"))).unwrap())
        .collect();
    client.flush().await.unwrap();

    for (i, handle) in handles.iter().enumerate() {
        assert!(handle.is_done());
        match handle.outcome().unwrap().unwrap() {
            abci_types::Response::Echo(echo) => assert_eq!(echo.message, format!("m{i}")),
            other => panic!("unexpected response: {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_unimplemented_method_poisons_client() {
    let address = spawn_server("tcp://127.0.0.1:0", Arc::new(BaseApplication::new())).await;
    let client = connect(&address).await.unwrap();

    let err = client
        .submit_sync(Request::ProcessProposal(RequestProcessProposal::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Exception { .. }));
    assert_eq!(client.flush().await.unwrap_err(), err);
}

#[cfg(unix)]
#[tokio::test]
async fn test_unix_socket_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.sock");
    let address = spawn_server(&format!("unix://{}", path.display()), Arc::new(Picky)).await;

    let client = connect(&address).await.unwrap();
    let info: ResponseInfo = client.call(RequestInfo::default()).await.unwrap();
    assert_eq!(info.version, "picky");
}

#[cfg(unix)]
#[tokio::test]
async fn test_unix_socket_rebinds_after_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.sock");
    let address: Address = format!("unix://{}", path.display()).parse().unwrap();

    let first = Server::bind(&address, Arc::new(Picky)).await.unwrap();
    assert!(matches!(
        Server::bind(&address, Arc::new(Picky)).await,
        Err(abci_server::ServerError::Io(_))
    ));
    first.run_until(async {}).await.unwrap();
    assert!(!path.exists());

    // A socket file left by a server that exited without cleaning up.
    drop(std::os::unix::net::UnixListener::bind(&path).unwrap());
    assert!(path.exists());

    let address = spawn_server(&format!("unix://{}", path.display()), Arc::new(Picky)).await;
    let client = connect(&address).await.unwrap();
    let info: ResponseInfo = client.call(RequestInfo::default()).await.unwrap();
    assert_eq!(info.version, "picky");
}
