//! Configuration for RelayKV
//!
//! Centralized configuration with sensible defaults.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{RelayError, Result};

/// Port the broadcast sender binds to when no source address is given
pub const DEFAULT_BROADCAST_SOURCE_PORT: u16 = 8001;

/// Bytes the server reads per frame, and the largest frame a client sends
pub const DEFAULT_READ_BUFFER_SIZE: usize = 2048;

/// Main configuration for a RelayKV instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address for clients
    pub client_addr: String,

    /// UDP listen address for replicated mutations from peers
    pub cluster_addr: String,

    /// Destination of replication datagrams (normally a subnet broadcast address)
    pub broadcast_addr: String,

    /// Bind address of the sending socket.
    /// `None` derives `<cluster ip>:8001`.
    pub broadcast_source_addr: Option<String>,

    /// Disables replication entirely; no UDP sockets are opened
    pub standalone: bool,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Size of the buffer used for a single read from a client
    pub read_buffer_size: usize,

    /// How often blocking loops wake up to check for shutdown (milliseconds)
    pub poll_interval_ms: u64,

    // -------------------------------------------------------------------------
    // Store Configuration
    // -------------------------------------------------------------------------
    /// Upper bound on waiting for the store actor's reply (milliseconds, 0 = no limit)
    pub store_request_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Logging Configuration
    // -------------------------------------------------------------------------
    /// Log destination; `None` logs to stderr
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_addr: "127.0.0.1:1234".to_string(),
            cluster_addr: "127.0.0.1:8000".to_string(),
            broadcast_addr: "255.255.255.255:8000".to_string(),
            broadcast_source_addr: None,
            standalone: false,
            max_connections: 1024,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            poll_interval_ms: 100,
            store_request_timeout_ms: 5000,
            log_file: None,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check that every address resolves and sizes are usable
    pub fn validate(&self) -> Result<()> {
        resolve(&self.client_addr)?;
        if !self.standalone {
            resolve(&self.cluster_addr)?;
            resolve(&self.broadcast_addr)?;
            self.broadcast_source()?;
        }
        if self.read_buffer_size == 0 {
            return Err(RelayError::Config("read buffer size must be non-zero".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(RelayError::Config("poll interval must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Address the broadcast sender binds to
    pub fn broadcast_source(&self) -> Result<SocketAddr> {
        match &self.broadcast_source_addr {
            Some(addr) => resolve(addr),
            None => {
                let cluster = resolve(&self.cluster_addr)?;
                Ok(SocketAddr::new(cluster.ip(), DEFAULT_BROADCAST_SOURCE_PORT))
            }
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// `None` when requests may wait indefinitely
    pub fn store_request_timeout(&self) -> Option<Duration> {
        (self.store_request_timeout_ms > 0)
            .then(|| Duration::from_millis(self.store_request_timeout_ms))
    }
}

/// Resolve a `host:port` string to its first socket address
pub fn resolve(addr: &str) -> Result<SocketAddr> {
    addr.to_socket_addrs()
        .map_err(|e| RelayError::Config(format!("invalid address {addr:?}: {e}")))?
        .next()
        .ok_or_else(|| RelayError::Config(format!("address {addr:?} did not resolve")))
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the TCP listen address for clients
    pub fn client_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.client_addr = addr.into();
        self
    }

    /// Set the UDP listen address for cluster peers
    pub fn cluster_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.cluster_addr = addr.into();
        self
    }

    /// Set the destination of replication datagrams
    pub fn broadcast_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.broadcast_addr = addr.into();
        self
    }

    /// Set the bind address of the broadcast sender
    pub fn broadcast_source_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.broadcast_source_addr = Some(addr.into());
        self
    }

    /// Run without replication
    pub fn standalone(mut self, standalone: bool) -> Self {
        self.config.standalone = standalone;
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the per-read buffer size (in bytes)
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.read_buffer_size = size;
        self
    }

    /// Set the shutdown poll interval (in milliseconds)
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// Set the store request timeout (in milliseconds, 0 disables it)
    pub fn store_request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.store_request_timeout_ms = ms;
        self
    }

    /// Set the log file
    pub fn log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.log_file = Some(path.into());
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
