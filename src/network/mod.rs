//! Network Module
//!
//! TCP server, client handling, and UDP replication.
//!
//! ## Architecture
//! - Non-blocking acceptor loop owned by [`Server`]
//! - One thread per client connection
//! - One thread receiving replicated mutations from peers
//! - All of them talk to the store through its actor handle

mod connection;
mod replication;
mod server;
mod shutdown;

pub use connection::Connection;
pub use replication::{ClusterListener, Replicator, DATAGRAM_BUFFER_SIZE};
pub use server::Server;
pub use shutdown::Shutdown;
