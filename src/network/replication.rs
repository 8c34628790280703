//! Best-effort replication over UDP
//!
//! After a mutation is acknowledged to its client, the frame is re-encoded
//! and sent once to the broadcast address. Peers decode it with the same
//! codec and apply it to their own store.
//!
//! There is no acknowledgement, retry, or ordering across nodes. Two nodes
//! receiving concurrent writes to one key may apply them in different orders;
//! each node keeps whichever write it applied last.

use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use super::Shutdown;
use crate::error::{RelayError, Result};
use crate::protocol::{decode_command, encode_command, Command};
use crate::store::StoreHandle;

/// Largest datagram the cluster listener reads
pub const DATAGRAM_BUFFER_SIZE: usize = 2048;

/// Sends mutations to the broadcast address
pub struct Replicator {
    socket: UdpSocket,
    local_addr: SocketAddr,
    destination: SocketAddr,
}

impl Replicator {
    /// Bind the sending socket at `source` and aim it at `destination`
    pub fn bind(source: SocketAddr, destination: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(source)?;
        socket.set_broadcast(true)?;
        socket.connect(destination)?;
        let local_addr = socket.local_addr()?;

        tracing::info!("Replicating from {} to {}", local_addr, destination);

        Ok(Self {
            socket,
            local_addr,
            destination,
        })
    }

    /// Address datagrams are sent from
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Send `command` once; failures are logged and dropped
    pub fn broadcast(&self, command: &Command) {
        let frame = match encode_command(command) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Cannot encode {:?} for replication: {}", command.command_type(), e);
                return;
            }
        };

        match self.socket.send(&frame) {
            Ok(bytes) => tracing::debug!(
                "Replicated {:?} ({} bytes) to {}",
                command.command_type(),
                bytes,
                self.destination
            ),
            Err(e) => tracing::warn!("Failed to replicate to {}: {}", self.destination, e),
        }
    }
}

/// Receives replicated mutations and applies them to the local store
pub struct ClusterListener {
    socket: UdpSocket,
    local_addr: SocketAddr,
    own_sender: Option<SocketAddr>,
    store: StoreHandle,
    shutdown: Shutdown,
}

impl ClusterListener {
    /// Bind the listening socket
    ///
    /// Reads time out every `poll_interval` so the loop can observe shutdown.
    pub fn bind(
        addr: SocketAddr,
        store: StoreHandle,
        shutdown: Shutdown,
        poll_interval: Duration,
    ) -> Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_read_timeout(Some(poll_interval))?;
        let local_addr = socket.local_addr()?;

        tracing::info!("Cluster listener bound to {}", local_addr);

        Ok(Self {
            socket,
            local_addr,
            own_sender: None,
            store,
            shutdown,
        })
    }

    /// Drop datagrams coming from `addr`, this node's own broadcast socket
    pub fn ignore_source(mut self, addr: SocketAddr) -> Self {
        self.own_sender = Some(addr);
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Receive until shutdown is triggered
    pub fn run(&self) {
        let mut buffer = [0u8; DATAGRAM_BUFFER_SIZE];

        while !self.shutdown.is_triggered() {
            match self.socket.recv_from(&mut buffer) {
                Ok((len, source)) => self.handle_datagram(&buffer[..len], source),
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => tracing::warn!("Cluster receive failed: {}", e),
            }
        }

        tracing::debug!("Cluster listener on {} stopped", self.local_addr);
    }

    fn is_own(&self, source: SocketAddr) -> bool {
        source == self.local_addr || Some(source) == self.own_sender
    }

    /// Decode one datagram and apply it; never replies or re-broadcasts
    pub fn handle_datagram(&self, data: &[u8], source: SocketAddr) {
        if self.is_own(source) {
            tracing::trace!("Ignoring own datagram from {}", source);
            return;
        }

        let command = match decode_command(data) {
            Ok(command) => command,
            Err(e) => {
                tracing::debug!("Dropping undecodable datagram from {}: {}", source, e);
                return;
            }
        };

        tracing::debug!("Applying replicated {:?} from {}", command.command_type(), source);

        let applied = match command {
            Command::Put { key, value } => self.store.put_value(key, value),
            Command::Delete { key } => match self.store.delete_key(key) {
                Err(RelayError::KeyNotFound) => Ok(()),
                other => other,
            },
            Command::Get { .. } | Command::Bye => {
                tracing::debug!("Ignoring non-mutating datagram from {}", source);
                Ok(())
            }
        };

        if let Err(e) = applied {
            tracing::warn!("Failed to apply mutation from {}: {}", source, e);
        }
    }
}
