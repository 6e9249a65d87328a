//! The client contract shared by every connection implementation.

use crate::error::{ClientError, Result};
use crate::reqres::ReqRes;
use abci_types::{Request, Response};
use async_trait::async_trait;
use std::sync::Arc;

/// Callback invoked for every completed request on a connection, in
/// submission order, before the request's own completion callback.
pub type ResponseCallback = Arc<dyn Fn(&Request, &Response) + Send + Sync>;

/// An ordered request/response connection to an application.
///
/// Requests complete strictly in the order they were submitted. Once the
/// connection reports an error it is poisoned: every pending and future
/// call fails with that error.
///
/// Callbacks run on the connection's delivery path and must not wait on
/// the same connection.
#[async_trait]
pub trait Client: Send + Sync {
    /// The error that poisoned the connection, if any.
    fn error(&self) -> Option<ClientError>;

    /// Registers the connection-wide response callback, replacing any
    /// previous one.
    fn set_response_callback(&self, callback: ResponseCallback);

    /// Submits a request without waiting for its response.
    fn submit_async(&self, request: Request) -> Result<ReqRes>;

    /// Submits a request and waits for its response. Requests submitted
    /// earlier on the same connection complete first.
    async fn submit_sync(&self, request: Request) -> Result<Response> {
        self.submit_async(request)?.wait().await
    }

    /// Waits until every request submitted before this call has completed.
    async fn flush(&self) -> Result<()> {
        self.submit_sync(Request::flush()).await.map(|_| ())
    }

    /// Closes the connection, failing every pending request.
    fn close(&self);
}

/// Typed calls on top of [`Client`].
#[async_trait]
pub trait ClientExt: Client {
    /// Submits a typed request and waits for the matching typed response.
    async fn call<Req, Res>(&self, request: Req) -> Result<Res>
    where
        Req: Into<Request> + Send,
        Res: TryFrom<Response, Error = Response> + Send,
    {
        let request = request.into();
        let expected = request.method();
        let response = self.submit_sync(request).await?;
        Res::try_from(response).map_err(|other| ClientError::UnexpectedResponse {
            expected,
            got: other.method(),
        })
    }
}

impl<C: Client + ?Sized> ClientExt for C {}

#[async_trait]
impl<C: Client + ?Sized> Client for Arc<C> {
    fn error(&self) -> Option<ClientError> {
        (**self).error()
    }

    fn set_response_callback(&self, callback: ResponseCallback) {
        (**self).set_response_callback(callback)
    }

    fn submit_async(&self, request: Request) -> Result<ReqRes> {
        (**self).submit_async(request)
    }

    async fn submit_sync(&self, request: Request) -> Result<Response> {
        (**self).submit_sync(request).await
    }

    async fn flush(&self) -> Result<()> {
        (**self).flush().await
    }

    fn close(&self) {
        (**self).close()
    }
}
