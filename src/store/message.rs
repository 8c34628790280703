//! Store request envelopes
//!
//! A [`StoreMessage`] carries a payload and a single-use [`ResponseSlot`].
//! The actor answers through the slot exactly once; answering consumes the
//! slot, which closes it.

use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};

use crate::error::{RelayError, Result};

/// Outcome of a store request: `Some(value)` for a get, `None` for a mutation
pub type StoreOutcome = Result<Option<String>>;

/// Outcome of a get: the value, or `KeyNotFound` / `BadData`
pub type GetResult = Result<String>;

/// Operation the actor applies to a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Put,
    Get,
    Delete,
}

/// Request payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// A bare key (get, delete)
    Key(String),

    /// A key and its new value (put)
    KeyValue { key: String, value: String },
}

/// Write side of a reply channel; holds at most one outcome
#[derive(Debug)]
pub struct ResponseSlot {
    tx: Sender<StoreOutcome>,
}

impl ResponseSlot {
    /// Deliver the outcome and close the slot
    pub fn respond(self, outcome: StoreOutcome) {
        // The caller may have stopped waiting (timeout); nothing to do then.
        let _ = self.tx.send(outcome);
    }
}

/// Read side of a reply channel
#[derive(Debug)]
pub struct ResponseReceiver {
    rx: Receiver<StoreOutcome>,
}

impl ResponseReceiver {
    /// Wait for the single outcome
    ///
    /// A slot dropped without an answer means the actor is gone and maps to
    /// `StoreClosed`; running out of time maps to `StoreTimeout`.
    pub fn wait(self, timeout: Option<Duration>) -> StoreOutcome {
        match timeout {
            Some(limit) => match self.rx.recv_timeout(limit) {
                Ok(outcome) => outcome,
                Err(RecvTimeoutError::Timeout) => Err(RelayError::StoreTimeout(limit)),
                Err(RecvTimeoutError::Disconnected) => Err(RelayError::StoreClosed),
            },
            None => self.rx.recv().unwrap_or(Err(RelayError::StoreClosed)),
        }
    }
}

/// Create a connected slot/receiver pair
pub fn response_slot() -> (ResponseSlot, ResponseReceiver) {
    let (tx, rx) = channel::bounded(1);
    (ResponseSlot { tx }, ResponseReceiver { rx })
}

/// A request envelope
#[derive(Debug)]
pub struct StoreMessage {
    pub payload: Payload,
    pub reply: ResponseSlot,
}

impl StoreMessage {
    /// Wrap a payload with a fresh reply slot
    pub fn new(payload: Payload) -> (Self, ResponseReceiver) {
        let (reply, receiver) = response_slot();
        (Self { payload, reply }, receiver)
    }

    /// Envelope carrying a bare key
    pub fn key(key: impl Into<String>) -> (Self, ResponseReceiver) {
        Self::new(Payload::Key(key.into()))
    }

    /// Envelope carrying a key and value
    pub fn key_value(key: impl Into<String>, value: impl Into<String>) -> (Self, ResponseReceiver) {
        Self::new(Payload::KeyValue {
            key: key.into(),
            value: value.into(),
        })
    }
}
