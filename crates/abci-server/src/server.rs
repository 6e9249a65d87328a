//! Listener and per-connection request loop.

use crate::dispatch::dispatch;
use crate::error::{Result, ServerError};
use abci_client::transport::server_framed;
use abci_client::{Address, MemoryEndpoint};
use abci_types::{Application, Frame, Request, Response};
use futures::{Sink, SinkExt, Stream, StreamExt, TryStreamExt};
use std::future::Future;
#[cfg(unix)]
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// A bound listener serving one application.
///
/// A Unix socket file is removed when the server is dropped.
pub struct Server {
    app: Arc<dyn Application>,
    listener: Listener,
}

enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(tokio::net::UnixListener, PathBuf),
}

impl Server {
    /// Binds a listener at `address`. A socket file left behind by a server
    /// that is no longer listening is replaced.
    pub async fn bind(address: &Address, app: Arc<dyn Application>) -> Result<Self> {
        let listener = match address {
            Address::Tcp(host) => Listener::Tcp(TcpListener::bind(host).await?),
            #[cfg(unix)]
            Address::Unix(path) => {
                remove_stale_socket(path)?;
                Listener::Unix(tokio::net::UnixListener::bind(path)?, path.clone())
            }
            #[cfg(not(unix))]
            Address::Unix(_) => return Err(ServerError::UnsupportedAddress(address.to_string())),
        };
        Ok(Self { app, listener })
    }

    /// The address the listener is bound to.
    pub fn local_address(&self) -> Result<Address> {
        match &self.listener {
            Listener::Tcp(listener) => Ok(Address::Tcp(listener.local_addr()?.to_string())),
            #[cfg(unix)]
            Listener::Unix(_, path) => Ok(Address::Unix(path.clone())),
        }
    }

    /// Accepts connections until an accept error occurs.
    pub async fn run(self) -> Result<()> {
        let address = self.local_address()?;
        info!(%address, "serving application");

        loop {
            match &self.listener {
                Listener::Tcp(listener) => {
                    let (stream, peer) = listener.accept().await?;
                    stream.set_nodelay(true)?;
                    debug!(%peer, "connection accepted");
                    spawn_connection(self.app.clone(), stream);
                }
                #[cfg(unix)]
                Listener::Unix(listener, _) => {
                    let (stream, _) = listener.accept().await?;
                    debug!("connection accepted");
                    spawn_connection(self.app.clone(), stream);
                }
            }
        }
    }

    /// Accepts connections until `shutdown` resolves.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            result = self.run() => result,
            _ = shutdown => {
                info!("server shutting down");
                Ok(())
            }
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Listener::Unix(_, path) = &self.listener {
            if let Err(err) = std::fs::remove_file(path) {
                debug!(path = %path.display(), error = %err, "failed to remove socket");
            }
        }
    }
}

/// Removes `path` if it is a socket nobody accepts on.
#[cfg(unix)]
fn remove_stale_socket(path: &Path) -> Result<()> {
    use std::os::unix::fs::FileTypeExt;

    let Ok(metadata) = std::fs::symlink_metadata(path) else {
        return Ok(());
    };
    if metadata.file_type().is_socket() && std::os::unix::net::UnixStream::connect(path).is_err()
    {
        debug!(path = %path.display(), "removing stale socket");
        std::fs::remove_file(path)?;
    }
    Ok(())
}

fn spawn_connection<S>(app: Arc<dyn Application>, io: S)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        match serve_connection(app, io).await {
            Ok(()) => debug!("connection closed"),
            Err(err) => warn!(error = %err, "connection failed"),
        }
    });
}

/// Serves requests on one byte-stream connection until the peer hangs up.
pub async fn serve_connection<S>(app: Arc<dyn Application>, io: S) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (sink, stream) = StreamExt::split::<Frame<Response>>(server_framed(io));
    serve_frames(
        app,
        stream.map_err(ServerError::from),
        sink.sink_map_err(ServerError::from),
    )
    .await
}

/// Serves requests arriving on an in-process endpoint.
pub async fn serve_memory(app: Arc<dyn Application>, endpoint: MemoryEndpoint) -> Result<()> {
    let MemoryEndpoint {
        requests,
        responses,
    } = endpoint;
    serve_frames(
        app,
        requests.map(Ok),
        responses.sink_map_err(|_| ServerError::Disconnected),
    )
    .await
}

/// Answers requests one at a time, in arrival order, echoing each frame id.
///
/// Application calls run on the blocking pool; the next request is not
/// dispatched until the previous one has been answered.
async fn serve_frames<St, Si>(
    app: Arc<dyn Application>,
    requests: St,
    responses: Si,
) -> Result<()>
where
    St: Stream<Item = Result<Frame<Request>>>,
    Si: Sink<Frame<Response>, Error = ServerError>,
{
    futures::pin_mut!(requests);
    futures::pin_mut!(responses);

    while let Some(frame) = requests.next().await {
        let Frame { id, body } = frame?;
        let method = body.method();
        debug!(id, %method, "request received");

        let app = app.clone();
        let response = match tokio::task::spawn_blocking(move || dispatch(app.as_ref(), body)).await
        {
            Ok(response) => response,
            Err(err) => Response::exception(format!("application call failed: {err}")),
        };
        if let Response::Exception(exception) = &response {
            warn!(id, %method, error = %exception.error, "request failed");
        }
        responses.send(Frame::new(id, response)).await?;
    }
    Ok(())
}
