//! TCP Server
//!
//! Accepts connections and runs each on its own thread. The server is the
//! supervisor: it owns the listeners and the store actor, and it is the only
//! place they are shut down.

use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::{ClusterListener, Connection, Replicator, Shutdown};
use crate::config::{resolve, Config};
use crate::error::Result;
use crate::store::{StoreActor, StoreHandle};

/// Pause between accept attempts while no client is waiting
const ACCEPT_BACKOFF: Duration = Duration::from_millis(5);

/// Decrements the active connection count when a connection thread ends
struct ActiveGuard {
    active: Arc<AtomicUsize>,
}

impl ActiveGuard {
    fn new(active: Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::AcqRel);
        Self { active }
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

/// TCP server for RelayKV
pub struct Server {
    config: Config,
    listener: TcpListener,
    local_addr: SocketAddr,
    store: StoreActor,
    replicator: Option<Arc<Replicator>>,
    cluster_listener: Option<ClusterListener>,
    shutdown: Shutdown,
    active: Arc<AtomicUsize>,
}

impl Server {
    /// Bind every socket and start the store actor
    ///
    /// In standalone mode no UDP sockets are opened.
    pub fn bind(config: Config) -> Result<Self> {
        config.validate()?;

        let listener = TcpListener::bind(resolve(&config.client_addr)?)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let store = StoreActor::spawn(config.store_request_timeout())?;
        let shutdown = Shutdown::new();

        let (replicator, cluster_listener) = if config.standalone {
            tracing::info!("Standalone mode, replication disabled");
            (None, None)
        } else {
            let replicator = Replicator::bind(
                config.broadcast_source()?,
                resolve(&config.broadcast_addr)?,
            )?;
            let cluster_listener = ClusterListener::bind(
                resolve(&config.cluster_addr)?,
                store.handle(),
                shutdown.clone(),
                config.poll_interval(),
            )?
            .ignore_source(replicator.local_addr());
            (Some(Arc::new(replicator)), Some(cluster_listener))
        };

        Ok(Self {
            config,
            listener,
            local_addr,
            store,
            replicator,
            cluster_listener,
            shutdown,
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Address clients connect to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Address peers send replicated mutations to; `None` when standalone
    pub fn cluster_addr(&self) -> Option<SocketAddr> {
        self.cluster_listener.as_ref().map(ClusterListener::local_addr)
    }

    /// Address this node's replication datagrams come from
    pub fn broadcast_source_addr(&self) -> Option<SocketAddr> {
        self.replicator.as_ref().map(|r| r.local_addr())
    }

    /// A handle that stops [`Server::run`] when triggered
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Direct access to the store (in-process callers and tests)
    pub fn store(&self) -> StoreHandle {
        self.store.handle()
    }

    /// Start the server (blocking until shutdown)
    pub fn run(mut self) -> Result<()> {
        let cluster_thread = match self.cluster_listener.take() {
            Some(listener) => Some(
                thread::Builder::new()
                    .name("relaykv-cluster".to_string())
                    .spawn(move || listener.run())?,
            ),
            None => None,
        };

        tracing::info!("Accepting clients on {}", self.local_addr);

        let poll_interval = self.config.poll_interval();
        let backoff = ACCEPT_BACKOFF.min(poll_interval);
        while !self.shutdown.is_triggered() {
            match self.listener.accept() {
                Ok((stream, peer)) => self.spawn_connection(stream, peer),
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    self.shutdown.wait_timeout(backoff);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                    self.shutdown.wait_timeout(poll_interval);
                }
            }
        }

        tracing::info!("Shutting down");
        drop(self.listener);

        if let Some(handle) = cluster_thread {
            if handle.join().is_err() {
                tracing::error!("Cluster listener panicked");
            }
        }

        self.store.join();
        tracing::info!(
            "Server stopped with {} connections still closing",
            self.active.load(Ordering::Acquire)
        );
        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr) {
        if self.active.load(Ordering::Acquire) >= self.config.max_connections {
            tracing::warn!(
                "Connection limit of {} reached, dropping {}",
                self.config.max_connections,
                peer
            );
            return;
        }

        let mut connection = match Connection::new(
            stream,
            self.store.handle(),
            self.replicator.clone(),
            self.shutdown.clone(),
            self.config.read_buffer_size,
            self.config.poll_interval(),
        ) {
            Ok(connection) => connection,
            Err(e) => {
                tracing::warn!("Failed to set up connection from {}: {}", peer, e);
                return;
            }
        };

        let guard = ActiveGuard::new(Arc::clone(&self.active));
        let spawned = thread::Builder::new()
            .name(format!("relaykv-conn-{peer}"))
            .spawn(move || {
                let _guard = guard;
                if let Err(e) = connection.handle() {
                    tracing::debug!("Connection {} ended with error: {}", connection.peer_addr(), e);
                }
            });

        if let Err(e) = spawned {
            tracing::error!("Failed to spawn thread for {}: {}", peer, e);
        }
    }
}
