//! Server Tests
//!
//! End-to-end tests against a standalone server over real TCP connections.

use std::net::{SocketAddr, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use relaykv::network::Shutdown;
use relaykv::protocol::Response;
use relaykv::{Client, Config, RelayError, Result, Server};

// =============================================================================
// Helper Functions
// =============================================================================

struct TestServer {
    addr: SocketAddr,
    shutdown: Shutdown,
    handle: Option<JoinHandle<Result<()>>>,
}

impl TestServer {
    fn start(config: Config) -> Self {
        let server = Server::bind(config).unwrap();
        Self::run(server)
    }

    fn run(server: Server) -> Self {
        let addr = server.local_addr();
        let shutdown = server.shutdown_handle();
        let handle = thread::spawn(move || server.run());
        Self {
            addr,
            shutdown,
            handle: Some(handle),
        }
    }

    fn client(&self) -> Client {
        let client = Client::connect(self.addr).unwrap();
        client.set_timeout(Some(Duration::from_secs(5))).unwrap();
        client
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap().unwrap();
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger("test finished");
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn standalone_config() -> Config {
    Config::builder()
        .client_addr("127.0.0.1:0")
        .standalone(true)
        .poll_interval_ms(20)
        .build()
}

fn start_standalone() -> TestServer {
    TestServer::start(standalone_config())
}

fn value(v: &str) -> Response {
    Response::Value(v.to_string())
}

// =============================================================================
// Protocol Scenario Tests
// =============================================================================

#[test]
fn test_end_to_end_scenario() {
    let server = start_standalone();
    let mut client = server.client();

    assert_eq!(client.send_raw(b"put11k11v").unwrap(), Response::Ack);
    assert_eq!(client.send_raw(b"get11k").unwrap(), value("v"));
    assert_eq!(client.send_raw(b"get11v").unwrap(), Response::Nil);
    assert_eq!(client.send_raw(b"get21v").unwrap(), Response::Error);
    assert_eq!(client.send_raw(b"del11k").unwrap(), Response::Ack);
    assert_eq!(client.send_raw(b"get11k").unwrap(), Response::Nil);
}

#[test]
fn test_long_key_and_value() {
    let server = start_standalone();
    let mut client = server.client();

    let key = "an expert from lorem ipsum";
    let value = "Lorem ipsum dolor sit amet. ".repeat(18);

    client.put(key, &value).unwrap();
    assert_eq!(client.get(key).unwrap(), Some(value));
    client.delete(key).unwrap();
    assert_eq!(client.get(key).unwrap(), None);
}

#[test]
fn test_put_overwrites_previous_value() {
    let server = start_standalone();
    let mut client = server.client();

    client.put("k", "first").unwrap();
    client.put("k", "second").unwrap();
    assert_eq!(client.get("k").unwrap(), Some("second".to_string()));
}

#[test]
fn test_delete_is_idempotent() {
    let server = start_standalone();
    let mut client = server.client();

    assert_eq!(client.send_raw(b"del11v").unwrap(), Response::Ack);
    assert_eq!(client.send_raw(b"del11v").unwrap(), Response::Ack);
}

#[test]
fn test_malformed_put_answers_once() {
    let server = start_standalone();
    let mut client = server.client();

    assert_eq!(client.send_raw(b"put11k").unwrap(), Response::Error);
    assert_eq!(client.send_raw(b"put21k11v").unwrap(), Response::Error);

    // a second response to the bad put would show up here instead of `nil`
    assert_eq!(client.send_raw(b"get11k").unwrap(), Response::Nil);
}

#[test]
fn test_unknown_command_answers_err_and_stays_open() {
    let server = start_standalone();
    let mut client = server.client();

    assert_eq!(client.send_raw(b"set11k11v").unwrap(), Response::Error);
    assert_eq!(client.send_raw(b"x").unwrap(), Response::Error);
    assert_eq!(client.send_raw(b"put11k11v").unwrap(), Response::Ack);
}

#[test]
fn test_trailing_newline_is_ignored() {
    let server = start_standalone();
    let mut client = server.client();

    assert_eq!(client.send_raw(b"put11k11v\n").unwrap(), Response::Ack);
    assert_eq!(client.send_raw(b"get11k\n").unwrap(), value("v"));
}

#[test]
fn test_empty_stored_value_reads_as_nil() {
    let server = Server::bind(standalone_config()).unwrap();
    let store = server.store();
    let server = TestServer::run(server);

    store.put_value("k", "").unwrap();

    let mut client = server.client();
    assert_eq!(client.send_raw(b"get11k").unwrap(), Response::Nil);
    // connection is still usable afterwards
    assert_eq!(client.send_raw(b"put11k11v").unwrap(), Response::Ack);
    assert_eq!(client.send_raw(b"get11k").unwrap(), value("v"));
}

#[test]
fn test_oversized_frame_is_refused_before_sending() {
    let server = start_standalone();
    let mut client = server.client();

    let result = client.put("big", &"x".repeat(3000));
    assert!(matches!(result, Err(RelayError::Protocol(_))));

    // requests and responses stay paired
    assert_eq!(client.send_raw(b"put11a11b").unwrap(), Response::Ack);
    assert_eq!(client.send_raw(b"get11a").unwrap(), value("b"));
    assert_eq!(client.get("big").unwrap(), None);
}

#[test]
fn test_frame_at_read_buffer_size_is_accepted() {
    let server = start_standalone();
    let mut client = server.client();

    // "put" + "13big" + "42035" + 2035 bytes fills one 2048-byte read
    let value = "x".repeat(2048 - 3 - 5 - 5);
    client.put("big", &value).unwrap();
    assert_eq!(client.get("big").unwrap(), Some(value));
}

// =============================================================================
// Connection Lifecycle Tests
// =============================================================================

#[test]
fn test_accept_does_not_wait_for_poll_interval() {
    let config = Config::builder()
        .client_addr("127.0.0.1:0")
        .standalone(true)
        .poll_interval_ms(2000)
        .build();
    let server = TestServer::start(config);

    let started = Instant::now();
    for i in 0..5 {
        let mut client = server.client();
        client.put("k", &i.to_string()).unwrap();
    }
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_disconnect_does_not_affect_other_clients() {
    let server = start_standalone();

    let mut first = server.client();
    first.put("k", "v").unwrap();
    drop(first);

    let mut second = server.client();
    assert_eq!(second.get("k").unwrap(), Some("v".to_string()));
}

#[test]
fn test_bye_shuts_down_server() {
    let mut server = start_standalone();

    let mut client = server.client();
    client.put("k", "v").unwrap();
    client.bye().unwrap();

    server.join();
    assert!(TcpStream::connect(server.addr).is_err());
}

#[test]
fn test_shutdown_closes_open_connections() {
    let mut server = start_standalone();
    let mut client = server.client();
    client.put("k", "v").unwrap();

    server.shutdown.trigger("test");
    server.join();
    thread::sleep(Duration::from_millis(200));

    assert!(client.send_raw(b"get11k").is_err());
}

#[test]
fn test_closed_store_answers_err() {
    let server = Server::bind(standalone_config()).unwrap();
    let store = server.store();
    let server = TestServer::run(server);

    let mut client = server.client();
    client.put("k", "v").unwrap();

    store.shutdown();
    assert_eq!(client.send_raw(b"get11k").unwrap(), Response::Error);
    assert_eq!(client.send_raw(b"put11k11v").unwrap(), Response::Error);
}

#[test]
fn test_connection_limit() {
    let config = Config::builder()
        .client_addr("127.0.0.1:0")
        .standalone(true)
        .poll_interval_ms(20)
        .max_connections(1)
        .build();
    let server = TestServer::start(config);

    let mut first = server.client();
    first.put("k", "v").unwrap();

    let mut second = server.client();
    assert!(second.send_raw(b"get11k").is_err());

    assert_eq!(first.get("k").unwrap(), Some("v".to_string()));
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_clients_distinct_keys() {
    let server = start_standalone();
    let mut handles = vec![];

    for i in 0..8 {
        let mut client = server.client();
        handles.push(thread::spawn(move || {
            for j in 0..25 {
                client
                    .put(&format!("key{}_{}", i, j), &format!("value{}_{}", i, j))
                    .unwrap();
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let mut client = server.client();
    for i in 0..8 {
        for j in 0..25 {
            assert_eq!(
                client.get(&format!("key{}_{}", i, j)).unwrap(),
                Some(format!("value{}_{}", i, j))
            );
        }
    }
}

#[test]
fn test_concurrent_clients_same_key() {
    let server = start_standalone();
    let values: Vec<String> = (0..4).map(|i| i.to_string().repeat(500)).collect();
    server.client().put("shared", &values[0]).unwrap();

    let mut handles = vec![];
    for value in values.clone() {
        let mut client = server.client();
        handles.push(thread::spawn(move || {
            for _ in 0..25 {
                client.put("shared", &value).unwrap();
            }
        }));
    }
    for _ in 0..4 {
        let mut client = server.client();
        let values = values.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..25 {
                let seen = client.get("shared").unwrap().unwrap();
                assert!(values.contains(&seen), "observed a torn value");
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
}
