//! Timing decorator for clients.

use crate::metrics::{CallMode, Metrics};
use abci_client::{Client, ClientError, ReqRes, ResponseCallback, Result};
use abci_types::{Method, Request, Response};
use async_trait::async_trait;

/// A [`Client`] that records how long each call takes.
///
/// Asynchronous submissions record the time to enqueue the request;
/// synchronous calls and flushes record the full round trip. Recording
/// never changes the outcome of a call.
pub struct InstrumentedClient<C> {
    inner: C,
    metrics: Metrics,
}

impl<C: Client> InstrumentedClient<C> {
    /// Wraps `inner`.
    pub fn new(inner: C, metrics: Metrics) -> Self {
        Self { inner, metrics }
    }

    /// The wrapped client.
    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: Client> Client for InstrumentedClient<C> {
    fn error(&self) -> Option<ClientError> {
        self.inner.error()
    }

    fn set_response_callback(&self, callback: ResponseCallback) {
        self.inner.set_response_callback(callback)
    }

    fn submit_async(&self, request: Request) -> Result<ReqRes> {
        let _timer = self.metrics.start(request.method(), CallMode::Async);
        self.inner.submit_async(request)
    }

    async fn submit_sync(&self, request: Request) -> Result<Response> {
        let _timer = self.metrics.start(request.method(), CallMode::Sync);
        self.inner.submit_sync(request).await
    }

    async fn flush(&self) -> Result<()> {
        let _timer = self.metrics.start(Method::Flush, CallMode::Sync);
        self.inner.flush().await
    }

    fn close(&self) {
        self.inner.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::METHOD_TIMING;
    use abci_client::{memory, Pipeline};
    use abci_server::serve_memory;
    use abci_types::BaseApplication;
    use prometheus_client::registry::Registry;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_records_sync_and_async_calls() {
        let (transport, endpoint) = memory();
        tokio::spawn(serve_memory(Arc::new(BaseApplication::new()), endpoint));

        let mut registry = Registry::default();
        let client = InstrumentedClient::new(Pipeline::new(transport), Metrics::new(&mut registry));

        client.submit_async(Request::echo("a")).unwrap();
        client.submit_sync(Request::echo("b")).await.unwrap();
        client.flush().await.unwrap();

        let mut encoded = String::new();
        prometheus_client::encoding::text::encode(&mut encoded, &registry).unwrap();
        let count = |method: &str, mode: &str| {
            format!("{METHOD_TIMING}_count{{method=\"{method}\",type=\"{mode}\"}} 1")
        };
        assert!(encoded.contains(&count("echo", "async")));
        assert!(encoded.contains(&count("echo", "sync")));
        assert!(encoded.contains(&count("flush", "sync")));
    }

    #[tokio::test]
    async fn test_errors_pass_through_unchanged() {
        let (transport, _endpoint) = memory();
        let pipeline = Pipeline::new(transport);
        pipeline.close();

        let client = InstrumentedClient::new(pipeline, Metrics::nop());
        assert_eq!(
            client.submit_sync(Request::flush()).await.unwrap_err(),
            ClientError::Closed
        );
        assert_eq!(client.error(), Some(ClientError::Closed));
    }
}
