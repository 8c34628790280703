//! # RelayKV
//!
//! A small networked key-value store with:
//! - A length-prefixed ASCII protocol over TCP
//! - A single-owner store actor (no locks around the data)
//! - Best-effort replication of mutations over UDP broadcast
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────┐      ┌─────────────────────────────┐
//! │         TCP Server          │      │      Cluster Listener       │
//! │   (thread per connection)   │      │        (UDP receive)        │
//! └──────┬───────────────┬──────┘      └──────────────┬──────────────┘
//!        │               │ put/del                    │ put/del
//!        │               ▼                            │
//!        │        ┌─────────────┐                     │
//!        │        │ Replicator  │── UDP broadcast ──▶ peers
//!        │        └─────────────┘                     │
//!        ▼                                            ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                            Store Actor                            │
//! │                 (one worker thread owns the map)                  │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing is persisted. Replication is fire-and-forget: a client may see
//! `ack` before any peer has the write, and peers do not agree on an order
//! for concurrent writes to the same key.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod logging;

pub mod protocol;
pub mod store;
pub mod network;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{RelayError, Result};
pub use config::Config;
pub use client::Client;
pub use network::Server;
pub use store::{StoreActor, StoreHandle};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of RelayKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
