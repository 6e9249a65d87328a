//! Handles to in-flight requests.

use crate::error::{ClientError, Result};
use abci_types::{Request, Response};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;

/// Callback invoked once when a request completes.
pub type CompletionCallback = Box<dyn FnOnce(&Result<Response>) + Send>;

/// A submitted request and its eventual outcome.
///
/// The outcome is set exactly once, either with the matching response or
/// with the error that poisoned the connection. Cloning yields another
/// handle to the same request.
#[derive(Clone)]
pub struct ReqRes {
    inner: Arc<Inner>,
}

struct Inner {
    id: u64,
    request: Request,
    slot: Mutex<Slot>,
    done: watch::Sender<bool>,
}

#[derive(Default)]
struct Slot {
    outcome: Option<Result<Response>>,
    callback: Option<CompletionCallback>,
    callback_set: bool,
}

impl ReqRes {
    pub(crate) fn new(id: u64, request: Request) -> Self {
        let (done, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                id,
                request,
                slot: Mutex::new(Slot::default()),
                done,
            }),
        }
    }

    /// Sequence number of the request on its connection.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The submitted request.
    pub fn request(&self) -> &Request {
        &self.inner.request
    }

    /// Returns true once the outcome is set.
    pub fn is_done(&self) -> bool {
        *self.inner.done.borrow()
    }

    /// Returns the outcome, if set.
    pub fn outcome(&self) -> Option<Result<Response>> {
        self.inner.slot.lock().outcome.clone()
    }

    /// Registers the completion callback.
    ///
    /// If the request has already completed the callback runs immediately
    /// on the calling thread. At most one callback may be registered.
    pub fn set_callback<F>(&self, callback: F) -> Result<()>
    where
        F: FnOnce(&Result<Response>) + Send + 'static,
    {
        let mut slot = self.inner.slot.lock();
        if slot.callback_set {
            return Err(ClientError::CallbackAlreadySet);
        }
        slot.callback_set = true;

        match slot.outcome.clone() {
            Some(outcome) => {
                drop(slot);
                callback(&outcome);
            }
            None => slot.callback = Some(Box::new(callback)),
        }
        Ok(())
    }

    /// Waits for the outcome.
    pub async fn wait(&self) -> Result<Response> {
        let mut done = self.inner.done.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = done.wait_for(|done| *done).await;
        self.outcome().unwrap_or(Err(ClientError::Closed))
    }

    /// Sets the outcome and runs the callback. Later calls are ignored.
    pub(crate) fn complete(&self, outcome: Result<Response>) {
        let callback = {
            let mut slot = self.inner.slot.lock();
            if slot.outcome.is_some() {
                return;
            }
            slot.outcome = Some(outcome.clone());
            slot.callback.take()
        };

        if let Some(callback) = callback {
            callback(&outcome);
        }
        self.inner.done.send_replace(true);
    }
}

impl std::fmt::Debug for ReqRes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqRes")
            .field("id", &self.inner.id)
            .field("method", &self.inner.request.method())
            .field("done", &self.is_done())
            .finish()
    }
}
