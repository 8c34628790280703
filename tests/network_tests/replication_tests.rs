//! Replication Tests
//!
//! Two clustered nodes on loopback. Node A's "broadcast" address is node B's
//! cluster address, standing in for a subnet broadcast.

use std::net::{SocketAddr, UdpSocket};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use relaykv::network::{ClusterListener, Shutdown};
use relaykv::{Client, Config, RelayError, Result, Server, StoreActor};

// =============================================================================
// Helper Functions
// =============================================================================

struct Node {
    client_addr: SocketAddr,
    cluster_addr: SocketAddr,
    sender_addr: SocketAddr,
    shutdown: Shutdown,
    handle: Option<JoinHandle<Result<()>>>,
}

impl Node {
    /// Start a clustered node that sends its mutations to `target`
    fn start(target: SocketAddr) -> Self {
        let config = Config::builder()
            .client_addr("127.0.0.1:0")
            .cluster_addr("127.0.0.1:0")
            .broadcast_addr(target.to_string())
            .broadcast_source_addr("127.0.0.1:0")
            .poll_interval_ms(20)
            .build();
        let server = Server::bind(config).unwrap();

        let client_addr = server.local_addr();
        let cluster_addr = server.cluster_addr().unwrap();
        let sender_addr = server.broadcast_source_addr().unwrap();
        let shutdown = server.shutdown_handle();

        Self {
            client_addr,
            cluster_addr,
            sender_addr,
            shutdown,
            handle: Some(thread::spawn(move || server.run())),
        }
    }

    fn client(&self) -> Client {
        let client = Client::connect(self.client_addr).unwrap();
        client.set_timeout(Some(Duration::from_secs(5))).unwrap();
        client
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.shutdown.trigger("test finished");
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// A UDP socket standing in for the rest of the broadcast domain
fn probe() -> UdpSocket {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket
        .set_read_timeout(Some(Duration::from_millis(300)))
        .unwrap();
    socket
}

/// Poll `client` until `key` has `expected`, or give up after ~2s
fn wait_for(client: &mut Client, key: &str, expected: Option<&str>) -> bool {
    for _ in 0..100 {
        if client.get(key).unwrap().as_deref() == expected {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    false
}

// =============================================================================
// Propagation Tests
// =============================================================================

#[test]
fn test_put_propagates_to_peer() {
    let probe = probe();
    let b = Node::start(probe.local_addr().unwrap());
    let a = Node::start(b.cluster_addr);

    a.client().put("k", "v").unwrap();

    let mut b_client = b.client();
    assert!(wait_for(&mut b_client, "k", Some("v")));
}

#[test]
fn test_delete_propagates_to_peer() {
    let probe = probe();
    let b = Node::start(probe.local_addr().unwrap());
    let a = Node::start(b.cluster_addr);

    let mut a_client = a.client();
    let mut b_client = b.client();

    a_client.put("k", "v").unwrap();
    assert!(wait_for(&mut b_client, "k", Some("v")));

    a_client.delete("k").unwrap();
    assert!(wait_for(&mut b_client, "k", None));
}

#[test]
fn test_mutation_is_sent_as_protocol_frame() {
    let probe = probe();
    let node = Node::start(probe.local_addr().unwrap());

    node.client().put("k", "v").unwrap();

    let mut buffer = [0u8; 2048];
    let (len, source) = probe.recv_from(&mut buffer).unwrap();
    assert_eq!(&buffer[..len], b"put11k11v");
    assert_eq!(source, node.sender_addr);
}

#[test]
fn test_replicated_mutation_is_not_rebroadcast() {
    let probe = probe();
    let b = Node::start(probe.local_addr().unwrap());
    let a = Node::start(b.cluster_addr);

    a.client().put("k", "v").unwrap();
    assert!(wait_for(&mut b.client(), "k", Some("v")));

    let mut buffer = [0u8; 2048];
    assert!(probe.recv_from(&mut buffer).is_err());
}

#[test]
fn test_reads_and_rejected_writes_are_not_replicated() {
    let probe = probe();
    let node = Node::start(probe.local_addr().unwrap());
    let mut client = node.client();

    client.send_raw(b"put11k").unwrap();
    client.send_raw(b"get11k").unwrap();

    let mut buffer = [0u8; 2048];
    assert!(probe.recv_from(&mut buffer).is_err());
}

#[test]
fn test_undecodable_datagram_is_dropped() {
    let probe = probe();
    let node = Node::start(probe.local_addr().unwrap());

    let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
    peer.send_to(b"garbage", node.cluster_addr).unwrap();
    peer.send_to(b"put21k11v", node.cluster_addr).unwrap();
    peer.send_to(b"put11k11v", node.cluster_addr).unwrap();

    let mut client = node.client();
    assert!(wait_for(&mut client, "k", Some("v")));
}

#[test]
fn test_standalone_node_does_not_replicate() {
    let probe = probe();
    let config = Config::builder()
        .client_addr("127.0.0.1:0")
        .broadcast_addr(probe.local_addr().unwrap().to_string())
        .standalone(true)
        .poll_interval_ms(20)
        .build();
    let server = Server::bind(config).unwrap();
    assert!(server.cluster_addr().is_none());

    let addr = server.local_addr();
    let shutdown = server.shutdown_handle();
    let handle = thread::spawn(move || server.run());

    Client::connect(addr).unwrap().put("k", "v").unwrap();

    let mut buffer = [0u8; 2048];
    assert!(probe.recv_from(&mut buffer).is_err());

    shutdown.trigger("test finished");
    handle.join().unwrap().unwrap();
}

// =============================================================================
// Cluster Listener Tests
// =============================================================================

#[test]
fn test_own_datagrams_are_ignored() {
    let store = StoreActor::spawn(Some(Duration::from_secs(5))).unwrap();
    let own_sender: SocketAddr = "127.0.0.1:8001".parse().unwrap();
    let listener = ClusterListener::bind(
        "127.0.0.1:0".parse().unwrap(),
        store.handle(),
        Shutdown::new(),
        Duration::from_millis(20),
    )
    .unwrap()
    .ignore_source(own_sender);

    listener.handle_datagram(b"put11k11v", own_sender);
    assert!(matches!(
        store.handle().get_value("k"),
        Err(RelayError::KeyNotFound)
    ));

    listener.handle_datagram(b"put11k11v", "127.0.0.2:8001".parse().unwrap());
    assert_eq!(store.handle().get_value("k").unwrap(), "v");
}

#[test]
fn test_replicated_delete_of_missing_key_is_harmless() {
    let store = StoreActor::spawn(Some(Duration::from_secs(5))).unwrap();
    let listener = ClusterListener::bind(
        "127.0.0.1:0".parse().unwrap(),
        store.handle(),
        Shutdown::new(),
        Duration::from_millis(20),
    )
    .unwrap();
    let peer: SocketAddr = "127.0.0.2:8001".parse().unwrap();

    listener.handle_datagram(b"del11k", peer);
    listener.handle_datagram(b"get11k", peer);
    listener.handle_datagram(b"bye", peer);

    assert!(store.handle().is_open());
    store.handle().put_value("k", "v").unwrap();
}
