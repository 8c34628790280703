//! Store actor
//!
//! A single worker thread owns the key-value map. Every read and write is a
//! message on one channel, so requests are applied one at a time in the order
//! they were submitted and no caller ever touches the map or holds a lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::select;
use parking_lot::Mutex;

use super::message::{GetResult, Payload, StoreMessage, StoreOp, StoreOutcome};
use crate::error::{RelayError, Result};

/// A message tagged with the operation to apply
struct Request {
    op: StoreOp,
    message: StoreMessage,
}

/// Owner of the store worker thread
pub struct StoreActor {
    handle: StoreHandle,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl StoreActor {
    /// Start the worker with an empty map
    ///
    /// `request_timeout` bounds how long the convenience calls on
    /// [`StoreHandle`] wait for a reply.
    pub fn spawn(request_timeout: Option<Duration>) -> Result<Self> {
        let (requests_tx, requests_rx) = channel::unbounded();
        let (control_tx, control_rx) = channel::bounded(1);

        let worker = thread::Builder::new()
            .name("relaykv-store".to_string())
            .spawn(move || run(requests_rx, control_rx))?;

        Ok(Self {
            handle: StoreHandle {
                requests: requests_tx,
                control: control_tx,
                open: Arc::new(AtomicBool::new(true)),
                request_timeout,
            },
            worker: Mutex::new(Some(worker)),
        })
    }

    /// A handle for submitting requests
    pub fn handle(&self) -> StoreHandle {
        self.handle.clone()
    }

    /// Stop accepting requests; see [`StoreHandle::shutdown`]
    pub fn shutdown(&self) {
        self.handle.shutdown();
    }

    /// Shut down and wait for the worker to exit
    pub fn join(&self) {
        self.handle.shutdown();
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                tracing::error!("Store worker panicked");
            }
        }
    }
}

impl Drop for StoreActor {
    fn drop(&mut self) {
        self.join();
    }
}

/// Cloneable client side of the store actor
#[derive(Clone)]
pub struct StoreHandle {
    requests: Sender<Request>,
    control: Sender<()>,
    open: Arc<AtomicBool>,
    request_timeout: Option<Duration>,
}

impl StoreHandle {
    /// Submit a put; the outcome arrives on the message's slot
    pub fn put(&self, message: StoreMessage) {
        self.submit(StoreOp::Put, message);
    }

    /// Submit a get; the outcome arrives on the message's slot
    pub fn get(&self, message: StoreMessage) {
        self.submit(StoreOp::Get, message);
    }

    /// Submit a delete; the outcome arrives on the message's slot
    pub fn delete(&self, message: StoreMessage) {
        self.submit(StoreOp::Delete, message);
    }

    fn submit(&self, op: StoreOp, message: StoreMessage) {
        if !self.is_open() {
            message.reply.respond(Err(RelayError::StoreClosed));
            return;
        }
        if let Err(channel::SendError(request)) = self.requests.send(Request { op, message }) {
            request.message.reply.respond(Err(RelayError::StoreClosed));
        }
    }

    /// Insert or overwrite `key` and wait for the actor to apply it
    pub fn put_value(&self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let (message, receiver) = StoreMessage::key_value(key, value);
        self.put(message);
        receiver.wait(self.request_timeout).map(|_| ())
    }

    /// Look up `key`
    pub fn get_value(&self, key: impl Into<String>) -> GetResult {
        let (message, receiver) = StoreMessage::key(key);
        self.get(message);
        receiver
            .wait(self.request_timeout)?
            .ok_or(RelayError::BadData)
    }

    /// Remove `key`; `KeyNotFound` if it was absent
    pub fn delete_key(&self, key: impl Into<String>) -> Result<()> {
        let (message, receiver) = StoreMessage::key(key);
        self.delete(message);
        receiver.wait(self.request_timeout).map(|_| ())
    }

    /// False once shutdown has been requested
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Close the store
    ///
    /// Later submissions are answered with `StoreClosed` immediately. Requests
    /// still queued when the worker stops are answered the same way.
    pub fn shutdown(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            tracing::debug!("Store shutdown requested");
            let _ = self.control.try_send(());
        }
    }
}

// =============================================================================
// Worker
// =============================================================================

fn run(requests: Receiver<Request>, control: Receiver<()>) {
    let mut data: HashMap<String, String> = HashMap::new();

    tracing::debug!("Store worker started");

    loop {
        let request = select! {
            recv(requests) -> request => request.ok(),
            recv(control) -> _ => None,
        };

        let Some(Request { op, message }) = request else {
            break;
        };
        let outcome = apply(&mut data, op, message.payload);
        message.reply.respond(outcome);
    }

    for Request { message, .. } in requests.try_iter() {
        message.reply.respond(Err(RelayError::StoreClosed));
    }

    tracing::debug!("Store worker stopped with {} keys", data.len());
}

fn apply(data: &mut HashMap<String, String>, op: StoreOp, payload: Payload) -> StoreOutcome {
    match (op, payload) {
        (StoreOp::Put, Payload::KeyValue { key, value }) => {
            tracing::trace!("Put {}", key);
            data.insert(key, value);
            Ok(None)
        }
        (StoreOp::Get, Payload::Key(key)) => match data.get(&key) {
            Some(value) => Ok(Some(value.clone())),
            None => Err(RelayError::KeyNotFound),
        },
        (StoreOp::Delete, Payload::Key(key)) => match data.remove(&key) {
            Some(_) => {
                tracing::trace!("Delete {}", key);
                Ok(None)
            }
            None => Err(RelayError::KeyNotFound),
        },
        (op, payload) => {
            tracing::debug!("Payload {:?} does not match {:?}", payload, op);
            Err(RelayError::BadData)
        }
    }
}
