//! Store Module
//!
//! In-memory key-value map behind a single-owner actor.
//!
//! ## Concurrency Model
//! - One worker thread owns the `HashMap`
//! - Callers send [`StoreMessage`]s and read the outcome from its reply slot
//! - No locks around the data; the mailbox is the only way in
//!
//! Nothing is persisted; the map lives as long as the actor.

mod actor;
mod message;

pub use actor::{StoreActor, StoreHandle};
pub use message::{
    response_slot, GetResult, Payload, ResponseReceiver, ResponseSlot, StoreMessage, StoreOp,
    StoreOutcome,
};
