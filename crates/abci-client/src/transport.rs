//! Transports carrying frames between a client and a server.
//!
//! A [`Transport`] splits into a sink of request frames and a stream of
//! response frames. Transports are not required to deliver responses in
//! request order; the [`Pipeline`](crate::Pipeline) resequences them.

use crate::codec::{ClientCodec, ServerCodec};
use crate::error::{ClientError, Result};
use abci_types::{Frame, Request, Response};
use futures::channel::mpsc;
use futures::stream::BoxStream;
use futures::{Sink, SinkExt, StreamExt, TryStreamExt};
use std::path::PathBuf;
use std::pin::Pin;
use std::str::FromStr;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;

/// Outbound half of a client transport.
pub type FrameSink = Pin<Box<dyn Sink<Frame<Request>, Error = ClientError> + Send>>;

/// Inbound half of a client transport.
pub type FrameStream = BoxStream<'static, Result<Frame<Response>>>;

/// A bidirectional frame channel from the client's point of view.
pub trait Transport: Send + 'static {
    /// Splits the transport into its outbound and inbound halves.
    fn split(self) -> (FrameSink, FrameStream);
}

/// A transport over any byte stream, framed with [`ClientCodec`].
pub struct StreamTransport<S> {
    framed: Framed<S, ClientCodec>,
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wraps a connected byte stream.
    pub fn new(io: S) -> Self {
        Self {
            framed: Framed::new(io, ClientCodec::new()),
        }
    }
}

impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn split(self) -> (FrameSink, FrameStream) {
        let (sink, stream) = StreamExt::split::<Frame<Request>>(self.framed);
        (
            Box::pin(sink.sink_map_err(ClientError::from)),
            stream.map_err(ClientError::from).boxed(),
        )
    }
}

/// Client end of an in-process connection.
pub struct MemoryTransport {
    requests: mpsc::UnboundedSender<Frame<Request>>,
    responses: mpsc::UnboundedReceiver<Frame<Response>>,
}

/// Server end of an in-process connection.
pub struct MemoryEndpoint {
    /// Requests sent by the client.
    pub requests: mpsc::UnboundedReceiver<Frame<Request>>,
    /// Responses delivered to the client, in any order.
    pub responses: mpsc::UnboundedSender<Frame<Response>>,
}

/// Creates a connected in-process transport pair.
pub fn memory() -> (MemoryTransport, MemoryEndpoint) {
    let (request_tx, request_rx) = mpsc::unbounded();
    let (response_tx, response_rx) = mpsc::unbounded();
    (
        MemoryTransport {
            requests: request_tx,
            responses: response_rx,
        },
        MemoryEndpoint {
            requests: request_rx,
            responses: response_tx,
        },
    )
}

impl Transport for MemoryTransport {
    fn split(self) -> (FrameSink, FrameStream) {
        (
            Box::pin(
                self.requests
                    .sink_map_err(|_| ClientError::Disconnected),
            ),
            self.responses.map(Ok).boxed(),
        )
    }
}

/// Address of a listening application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// TCP `host:port`.
    Tcp(String),
    /// Unix domain socket path.
    Unix(PathBuf),
}

impl FromStr for Address {
    type Err = ClientError;

    /// Parses `tcp://host:port`, `unix://path` or a bare `host:port`.
    fn from_str(s: &str) -> Result<Self> {
        if let Some(path) = s.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(ClientError::InvalidAddress(s.to_string()));
            }
            return Ok(Address::Unix(PathBuf::from(path)));
        }
        let host = s.strip_prefix("tcp://").unwrap_or(s);
        if host.is_empty() || !host.contains(':') || host.contains("://") {
            return Err(ClientError::InvalidAddress(s.to_string()));
        }
        Ok(Address::Tcp(host.to_string()))
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Address::Tcp(host) => write!(f, "tcp://{host}"),
            Address::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

/// Object-safe form of [`Transport`] for boxed sockets.
pub trait SplitTransport: Send {
    /// Splits the boxed transport.
    fn split_boxed(self: Box<Self>) -> (FrameSink, FrameStream);
}

impl<T: Transport> SplitTransport for T {
    fn split_boxed(self: Box<Self>) -> (FrameSink, FrameStream) {
        (*self).split()
    }
}

impl Transport for Box<dyn SplitTransport> {
    fn split(self) -> (FrameSink, FrameStream) {
        self.split_boxed()
    }
}

/// Connects to an application over TCP.
pub async fn connect_tcp(host: &str) -> Result<StreamTransport<tokio::net::TcpStream>> {
    let stream = tokio::net::TcpStream::connect(host).await?;
    stream.set_nodelay(true)?;
    Ok(StreamTransport::new(stream))
}

/// Connects to an application over a Unix domain socket.
#[cfg(unix)]
pub async fn connect_unix(
    path: impl AsRef<std::path::Path>,
) -> Result<StreamTransport<tokio::net::UnixStream>> {
    let stream = tokio::net::UnixStream::connect(path).await?;
    Ok(StreamTransport::new(stream))
}

/// Connects to a listening application.
pub async fn connect(address: &Address) -> Result<Box<dyn SplitTransport>> {
    match address {
        Address::Tcp(host) => Ok(Box::new(connect_tcp(host).await?)),
        #[cfg(unix)]
        Address::Unix(path) => Ok(Box::new(connect_unix(path).await?)),
        #[cfg(not(unix))]
        Address::Unix(_) => Err(ClientError::InvalidAddress(address.to_string())),
    }
}

/// Server-side framing for a byte stream.
pub fn server_framed<S>(io: S) -> Framed<S, ServerCodec>
where
    S: AsyncRead + AsyncWrite,
{
    Framed::new(io, ServerCodec::new())
}
