//! Connection Handler
//!
//! Handles individual client connections.
//!
//! Each read is treated as one command frame. The connection stays open
//! after malformed frames (they get `err`) and closes on disconnect, I/O
//! failure, or `bye`.

use std::io::{BufWriter, ErrorKind, Read};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use super::{Replicator, Shutdown};
use crate::error::{RelayError, Result};
use crate::protocol::{decode_command, write_response, Command, Response};
use crate::store::StoreHandle;

/// What to do after a frame has been processed
#[derive(Debug)]
enum Action {
    /// Send `response`, then replicate the command if present
    Respond {
        response: Response,
        replicate: Option<Command>,
    },

    /// Client asked for shutdown; close without a response
    Close,
}

impl Action {
    fn respond(response: Response) -> Self {
        Action::Respond {
            response,
            replicate: None,
        }
    }
}

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader
    reader: TcpStream,

    /// TCP stream writer (buffered so each response is one write)
    writer: BufWriter<TcpStream>,

    /// Handle to the store actor
    store: StoreHandle,

    /// Broadcast sender; `None` in standalone mode
    replicator: Option<Arc<Replicator>>,

    /// Process-level shutdown signal
    shutdown: Shutdown,

    /// Size of a single read
    buffer_size: usize,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Create a new connection handler
    ///
    /// Reads time out every `poll_interval` so the handler notices shutdown.
    pub fn new(
        stream: TcpStream,
        store: StoreHandle,
        replicator: Option<Arc<Replicator>>,
        shutdown: Shutdown,
        buffer_size: usize,
        poll_interval: Duration,
    ) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Accepted from a non-blocking listener; some platforms inherit the flag
        stream.set_nonblocking(false)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(poll_interval))?;

        let write_stream = stream.try_clone()?;

        Ok(Self {
            reader: stream,
            writer: BufWriter::new(write_stream),
            store,
            replicator,
            shutdown,
            buffer_size,
            peer_addr,
        })
    }

    /// Handle the connection (blocking until closed)
    ///
    /// A clean disconnect returns `Ok`. A genuine read failure writes `err`
    /// if it still can and returns the error.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        let mut buffer = vec![0u8; self.buffer_size];

        loop {
            let len = match self.reader.read(&mut buffer) {
                Ok(0) => {
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    return Ok(());
                }
                Ok(len) => len,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    if self.shutdown.is_triggered() {
                        tracing::debug!("Closing connection to {} for shutdown", self.peer_addr);
                        return Ok(());
                    }
                    continue;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
                    ) =>
                {
                    tracing::debug!("Connection reset by client {}", self.peer_addr);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                    let _ = self.send_response(&Response::Error);
                    return Err(e.into());
                }
            };

            match self.dispatch(&buffer[..len]) {
                Action::Respond {
                    response,
                    replicate,
                } => {
                    if let Err(e) = self.send_response(&response) {
                        return self.on_write_error(e);
                    }
                    if let (Some(command), Some(replicator)) = (replicate, &self.replicator) {
                        replicator.broadcast(&command);
                    }
                }
                Action::Close => return Ok(()),
            }
        }
    }

    /// Decode a frame and run it against the store
    fn dispatch(&self, frame: &[u8]) -> Action {
        let command = match decode_command(frame) {
            Ok(command) => command,
            Err(e) => {
                tracing::debug!("Rejecting frame from {}: {}", self.peer_addr, e);
                return Action::respond(Response::Error);
            }
        };

        tracing::trace!("Received command from {}: {:?}", self.peer_addr, command);

        // Only mutations are replicated, and only when a replicator exists
        let replicate = (command.is_mutation() && self.replicator.is_some()).then(|| command.clone());

        match command {
            Command::Get { key } => match self.store.get_value(key) {
                // `val` cannot carry an empty payload
                Ok(value) if value.is_empty() => Action::respond(Response::Nil),
                Ok(value) => Action::respond(Response::Value(value)),
                Err(RelayError::KeyNotFound) => Action::respond(Response::Nil),
                Err(e) => self.store_failure(e),
            },
            Command::Put { key, value } => match self.store.put_value(key, value) {
                Ok(()) => Action::Respond {
                    response: Response::Ack,
                    replicate,
                },
                Err(e) => self.store_failure(e),
            },
            Command::Delete { key } => match self.store.delete_key(key) {
                Ok(()) | Err(RelayError::KeyNotFound) => Action::Respond {
                    response: Response::Ack,
                    replicate,
                },
                Err(e) => self.store_failure(e),
            },
            Command::Bye => {
                self.shutdown.trigger(&format!("bye from {}", self.peer_addr));
                Action::Close
            }
        }
    }

    fn store_failure(&self, error: RelayError) -> Action {
        if error.is_store_unavailable() && self.shutdown.is_triggered() {
            tracing::debug!("Store closed for shutdown, answering {} with err: {}", self.peer_addr, error);
        } else {
            tracing::warn!("Store request from {} failed: {}", self.peer_addr, error);
        }
        Action::respond(Response::Error)
    }

    /// A client that went away mid-response is not a server error
    fn on_write_error(&self, error: RelayError) -> Result<()> {
        if let RelayError::Io(ref io_err) = error {
            if matches!(
                io_err.kind(),
                ErrorKind::ConnectionAborted | ErrorKind::ConnectionReset | ErrorKind::BrokenPipe
            ) {
                tracing::debug!(
                    "Client {} disconnected before response could be sent",
                    self.peer_addr
                );
                return Ok(());
            }
        }
        tracing::warn!("Error writing to {}: {}", self.peer_addr, error);
        Err(error)
    }

    /// Send a response to the client
    fn send_response(&mut self, response: &Response) -> Result<()> {
        write_response(&mut self.writer, response)
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}
