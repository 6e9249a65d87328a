//! Ordered request pipeline over a transport.
//!
//! Requests are numbered on submission and written in that order. The
//! transport may deliver responses in any order; responses that arrive
//! before an earlier request has been answered are held back until every
//! earlier request is released, so completions are strictly FIFO.

use crate::client::{Client, ResponseCallback};
use crate::error::{ClientError, Result};
use crate::reqres::ReqRes;
use crate::transport::{FrameSink, FrameStream, Transport};
use abci_types::{Frame, Request, Response};
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// A [`Client`] that pipelines requests over a single transport.
///
/// Must be created inside a tokio runtime; the reader and writer tasks are
/// aborted when the pipeline is closed or dropped.
pub struct Pipeline {
    shared: Arc<Shared>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

struct Shared {
    queue: Mutex<Queue>,
    /// Serializes completion delivery so releases and failures never
    /// interleave. Reentrant so callbacks may close the connection.
    delivery: ReentrantMutex<()>,
    outbound: mpsc::UnboundedSender<Frame<Request>>,
    callback: RwLock<Option<ResponseCallback>>,
}

#[derive(Default)]
struct Queue {
    next_id: u64,
    /// Submitted requests not yet released, oldest first.
    pending: VecDeque<ReqRes>,
    /// Responses that arrived ahead of an earlier pending request.
    arrived: HashMap<u64, Response>,
    error: Option<ClientError>,
}

impl Queue {
    /// Records a response and returns every request it unblocks, in
    /// submission order.
    fn accept(&mut self, frame: Frame<Response>) -> Result<Vec<(ReqRes, Response)>> {
        if self.error.is_some() {
            return Ok(Vec::new());
        }

        let head = match self.pending.front() {
            Some(head) => head.id(),
            None => return Err(ClientError::UnknownResponse(frame.id)),
        };
        if frame.id < head || frame.id >= self.next_id {
            return Err(ClientError::UnknownResponse(frame.id));
        }
        if self.arrived.contains_key(&frame.id) {
            return Err(ClientError::DuplicateResponse(frame.id));
        }

        let index = (frame.id - head) as usize;
        let expected = match self.pending.get(index) {
            Some(reqres) => reqres.request().method(),
            None => return Err(ClientError::UnknownResponse(frame.id)),
        };
        match frame.body {
            Response::Exception(exception) => {
                return Err(ClientError::Exception {
                    method: expected,
                    error: exception.error,
                })
            }
            ref body if body.method() != Some(expected) => {
                return Err(ClientError::UnexpectedResponse {
                    expected,
                    got: body.method(),
                })
            }
            _ => {}
        }
        self.arrived.insert(frame.id, frame.body);

        let mut released = Vec::new();
        while let Some(head) = self.pending.front() {
            let Some(response) = self.arrived.remove(&head.id()) else {
                break;
            };
            if let Some(reqres) = self.pending.pop_front() {
                released.push((reqres, response));
            }
        }
        Ok(released)
    }
}

impl Shared {
    fn deliver(&self, frame: Frame<Response>) -> Result<()> {
        let _delivery = self.delivery.lock();
        let released = self.queue.lock().accept(frame)?;
        if released.is_empty() {
            return Ok(());
        }

        let callback = self.callback.read().clone();
        for (reqres, response) in released {
            trace!(id = reqres.id(), method = %reqres.request().method(), "request completed");
            if let Some(callback) = &callback {
                callback(reqres.request(), &response);
            }
            reqres.complete(Ok(response));
        }
        Ok(())
    }

    /// Poisons the connection and fails every pending request.
    fn fail(&self, err: ClientError) {
        let _delivery = self.delivery.lock();
        let pending = {
            let mut queue = self.queue.lock();
            if queue.error.is_some() {
                return;
            }
            queue.error = Some(err.clone());
            queue.arrived.clear();
            std::mem::take(&mut queue.pending)
        };

        if err == ClientError::Closed {
            debug!(pending = pending.len(), "connection closed");
        } else {
            warn!(error = %err, pending = pending.len(), "connection failed");
        }
        for reqres in pending {
            reqres.complete(Err(err.clone()));
        }
    }
}

impl Pipeline {
    /// Starts a pipeline over the given transport.
    pub fn new<T: Transport>(transport: T) -> Self {
        let (sink, stream) = transport.split();
        let (outbound, requests) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue::default()),
            delivery: ReentrantMutex::new(()),
            outbound,
            callback: RwLock::new(None),
        });

        let writer = tokio::spawn(write_loop(shared.clone(), sink, requests));
        let reader = tokio::spawn(read_loop(shared.clone(), stream));

        Self {
            shared,
            tasks: Mutex::new(vec![writer, reader]),
        }
    }

    /// Number of submitted requests not yet completed.
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().pending.len()
    }

    fn shutdown(&self) {
        self.shared.fail(ClientError::Closed);
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

impl Client for Pipeline {
    fn error(&self) -> Option<ClientError> {
        self.shared.queue.lock().error.clone()
    }

    fn set_response_callback(&self, callback: ResponseCallback) {
        *self.shared.callback.write() = Some(callback);
    }

    fn submit_async(&self, request: Request) -> Result<ReqRes> {
        // The frame is queued under the lock so wire order matches ids.
        let mut queue = self.shared.queue.lock();
        if let Some(err) = &queue.error {
            return Err(err.clone());
        }

        let id = queue.next_id;
        let reqres = ReqRes::new(id, request.clone());
        self.shared
            .outbound
            .send(Frame::new(id, request))
            .map_err(|_| ClientError::Closed)?;
        queue.next_id += 1;
        queue.pending.push_back(reqres.clone());

        trace!(id, method = %reqres.request().method(), "request submitted");
        Ok(reqres)
    }

    fn close(&self) {
        self.shutdown();
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn write_loop(
    shared: Arc<Shared>,
    mut sink: FrameSink,
    mut requests: mpsc::UnboundedReceiver<Frame<Request>>,
) {
    while let Some(frame) = requests.recv().await {
        let result = async {
            sink.feed(frame).await?;
            while let Ok(frame) = requests.try_recv() {
                sink.feed(frame).await?;
            }
            sink.flush().await
        }
        .await;

        if let Err(err) = result {
            shared.fail(err);
            return;
        }
    }
}

async fn read_loop(shared: Arc<Shared>, mut stream: FrameStream) {
    while let Some(frame) = stream.next().await {
        if let Err(err) = frame.and_then(|frame| shared.deliver(frame)) {
            shared.fail(err);
            return;
        }
    }
    shared.fail(ClientError::Disconnected);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory;
    use abci_types::{ResponseEcho, ResponseFlush};

    fn echo_response(message: &str) -> Response {
        Response::from(ResponseEcho {
            message: message.into(),
        })
    }

    #[tokio::test]
    async fn test_submit_sync_roundtrip() {
        let (transport, mut endpoint) = memory();
        let pipeline = Pipeline::new(transport);

        let server = tokio::spawn(async move {
            let frame = endpoint.requests.next().await.unwrap();
            endpoint
                .responses
                .unbounded_send(Frame::new(frame.id, echo_response("hi")))
                .unwrap();
            endpoint
        });

        let response = pipeline.submit_sync(Request::echo("hi")).await.unwrap();
        assert_eq!(response, echo_response("hi"));
        assert_eq!(pipeline.pending(), 0);
        drop(server.await.unwrap());
    }

    #[tokio::test]
    async fn test_early_response_is_held_back() {
        let (transport, mut endpoint) = memory();
        let pipeline = Pipeline::new(transport);

        let first = pipeline.submit_async(Request::echo("a")).unwrap();
        let second = pipeline.submit_async(Request::echo("b")).unwrap();
        endpoint.requests.next().await.unwrap();
        endpoint.requests.next().await.unwrap();

        endpoint
            .responses
            .unbounded_send(Frame::new(1, echo_response("b")))
            .unwrap();
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(!second.is_done());

        endpoint
            .responses
            .unbounded_send(Frame::new(0, echo_response("a")))
            .unwrap();
        assert_eq!(first.wait().await.unwrap(), echo_response("a"));
        assert_eq!(second.wait().await.unwrap(), echo_response("b"));
    }

    #[tokio::test]
    async fn test_mismatched_response_poisons() {
        let (transport, mut endpoint) = memory();
        let pipeline = Pipeline::new(transport);

        let reqres = pipeline.submit_async(Request::echo("a")).unwrap();
        endpoint.requests.next().await.unwrap();
        endpoint
            .responses
            .unbounded_send(Frame::new(0, Response::from(ResponseFlush {})))
            .unwrap();

        let err = reqres.wait().await.unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedResponse { .. }));
        assert_eq!(pipeline.error(), Some(err));
    }

    #[tokio::test]
    async fn test_unknown_response_id_poisons() {
        let (transport, mut endpoint) = memory();
        let pipeline = Pipeline::new(transport);

        let reqres = pipeline.submit_async(Request::flush()).unwrap();
        endpoint.requests.next().await.unwrap();
        endpoint
            .responses
            .unbounded_send(Frame::new(42, Response::from(ResponseFlush {})))
            .unwrap();

        assert_eq!(
            reqres.wait().await.unwrap_err(),
            ClientError::UnknownResponse(42)
        );
    }

    #[tokio::test]
    async fn test_close_fails_pending_and_future_calls() {
        let (transport, _endpoint) = memory();
        let pipeline = Pipeline::new(transport);

        let reqres = pipeline.submit_async(Request::flush()).unwrap();
        pipeline.close();

        assert_eq!(reqres.wait().await.unwrap_err(), ClientError::Closed);
        assert_eq!(
            pipeline.submit_async(Request::flush()).unwrap_err(),
            ClientError::Closed
        );
        assert_eq!(pipeline.flush().await.unwrap_err(), ClientError::Closed);
    }
}
