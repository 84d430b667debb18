//! Tests for the TCP server
//!
//! Each test binds a server on an ephemeral loopback port, runs it on a
//! background thread and talks to it over real sockets.

use std::io::{BufReader, BufWriter, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tempfile::TempDir;
use weather_aggregator::config::Config;
use weather_aggregator::engine::Engine;
use weather_aggregator::network::{Server, ShutdownHandle};
use weather_aggregator::protocol::{read_response, write_request, Request, Response, StatusCode};

// =============================================================================
// Helper Functions
// =============================================================================

struct TestServer {
    _temp_dir: TempDir,
    addr: SocketAddr,
    engine: Arc<Engine>,
    server: Arc<Server>,
    shutdown: ShutdownHandle,
    thread: Option<JoinHandle<()>>,
}

impl TestServer {
    fn start() -> Self {
        Self::start_with(|builder| builder)
    }

    fn start_with(
        customize: impl FnOnce(weather_aggregator::config::ConfigBuilder) -> weather_aggregator::config::ConfigBuilder,
    ) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let config = customize(
            Config::builder()
                .data_dir(temp_dir.path())
                .listen_addr("127.0.0.1:0"),
        )
        .build();

        let engine = Arc::new(Engine::open(config.clone()).unwrap());
        let server = Arc::new(Server::bind(config, Arc::clone(&engine)).unwrap());
        let addr = server.local_addr().unwrap();
        let shutdown = server.shutdown_handle();

        let runner = Arc::clone(&server);
        let thread = thread::spawn(move || {
            runner.run().unwrap();
        });

        Self {
            _temp_dir: temp_dir,
            addr,
            engine,
            server,
            shutdown,
            thread: Some(thread),
        }
    }

    fn send(&self, request: &Request) -> Response {
        let stream = TcpStream::connect(self.addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let mut writer = BufWriter::new(stream.try_clone().unwrap());
        let mut reader = BufReader::new(stream);

        write_request(&mut writer, request).unwrap();
        read_response(&mut reader).unwrap()
    }

    fn put(&self, body: &str) -> Response {
        self.send(&Request::put("/weather.json", body.to_string()).with_lamport_clock(1))
    }

    fn get(&self) -> Value {
        let response = self.send(&Request::get("/weather.json"));
        assert_eq!(response.status, StatusCode::Ok);
        serde_json::from_slice(&response.body).unwrap()
    }

    /// Write raw bytes, half-close, and return everything the server sends
    fn raw(&self, bytes: &[u8]) -> Vec<u8> {
        let mut stream = TcpStream::connect(self.addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        stream.write_all(bytes).unwrap();
        stream.shutdown(std::net::Shutdown::Write).unwrap();

        let mut received = Vec::new();
        let _ = stream.read_to_end(&mut received);
        received
    }
}

fn wait_until(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.shutdown();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

// =============================================================================
// Request / Response Tests
// =============================================================================

#[test]
fn test_put_then_get_over_tcp() {
    let server = TestServer::start();

    let created = server.put(r#"{"id":"IDS60901","air_temp":13.3}"#);
    assert_eq!(created.status, StatusCode::Created);
    assert!(created.lamport_clock().unwrap() > 1);

    let updated = server.put(r#"{"id":"IDS60901","air_temp":12.9}"#);
    assert_eq!(updated.status, StatusCode::Ok);

    assert_eq!(server.get(), json!([{"id": "IDS60901", "air_temp": 12.9}]));
}

#[test]
fn test_get_on_fresh_server_is_empty_array() {
    let server = TestServer::start();
    assert_eq!(server.get(), json!([]));
}

#[test]
fn test_bad_request_line_gets_400() {
    let server = TestServer::start();

    let received = server.raw(b"NONSENSE\r\n\r\n");
    let text = String::from_utf8_lossy(&received);

    assert!(text.starts_with("HTTP/1.1 400 Bad Request\r\n"), "got {:?}", text);
    assert!(text.contains("Lamport-Clock: "));
}

#[test]
fn test_unsupported_method_gets_400() {
    let server = TestServer::start();
    server.put(r#"{"id":"A"}"#);

    let received = server.raw(b"DELETE /weather.json HTTP/1.1\r\n\r\n");

    assert!(received.starts_with(b"HTTP/1.1 400 "));
    assert_eq!(server.get(), json!([{"id": "A"}]));
}

#[test]
fn test_truncated_body_gets_no_response_and_no_update() {
    let server = TestServer::start();

    let received = server.raw(b"PUT /weather.json HTTP/1.1\r\nContent-Length: 50\r\n\r\n{\"id\":\"A\"");

    assert!(received.is_empty());
    assert!(server.engine.store().is_empty());
}

#[test]
fn test_silent_client_is_dropped_after_read_timeout() {
    let server = TestServer::start_with(|builder| builder.read_timeout_ms(100));

    let mut stream = TcpStream::connect(server.addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    stream.write_all(b"GET /weather.json HTTP/1.1\r\n").unwrap();

    let start = Instant::now();
    let mut received = Vec::new();
    let _ = stream.read_to_end(&mut received);

    assert!(received.is_empty());
    assert!(start.elapsed() < Duration::from_secs(4));
}

#[test]
fn test_connection_closes_after_one_response() {
    let server = TestServer::start();

    let mut stream = TcpStream::connect(server.addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    stream.write_all(b"GET /weather.json HTTP/1.1\r\n\r\n").unwrap();

    // Server closes after the response without waiting for more requests
    let mut received = Vec::new();
    stream.read_to_end(&mut received).unwrap();
    let text = String::from_utf8_lossy(&received);

    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(text.ends_with("\r\n\r\n[]"));
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_clients() {
    let server = Arc::new(TestServer::start());
    let mut handles = vec![];

    for t in 0..8 {
        let server = Arc::clone(&server);
        handles.push(thread::spawn(move || {
            for i in 0..5 {
                let response = server.put(&format!(r#"{{"id":"C{}-{}","n":{}}}"#, t, i, i));
                assert_eq!(response.status, StatusCode::Created);
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(server.get().as_array().unwrap().len(), 40);
}

#[test]
fn test_connections_over_limit_are_closed_without_response() {
    let server = TestServer::start_with(|builder| builder.max_connections(1));

    // Occupy the only slot with a connection that never sends a request
    let idle = TcpStream::connect(server.addr).unwrap();
    assert!(wait_until(Duration::from_secs(2), || {
        server.server.active_connections() == 1
    }));

    let mut refused = TcpStream::connect(server.addr).unwrap();
    refused
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let mut received = Vec::new();
    let _ = refused.read_to_end(&mut received);

    assert!(received.is_empty());
    assert_eq!(server.server.active_connections(), 1);

    // Freeing the slot lets the next client through
    drop(idle);
    assert!(wait_until(Duration::from_secs(2), || {
        server.server.active_connections() == 0
    }));
    assert_eq!(server.get(), json!([]));
}

// =============================================================================
// Expiry Tests
// =============================================================================

#[test]
fn test_station_expires_end_to_end() {
    let server = TestServer::start_with(|builder| builder.station_ttl_ms(300).sweep_interval_ms(50));

    server.put(r#"{"id":"SHORT"}"#);
    assert_eq!(server.get().as_array().unwrap().len(), 1);

    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline && !server.get().as_array().unwrap().is_empty() {
        thread::sleep(Duration::from_millis(50));
    }

    assert_eq!(server.get(), json!([]));
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_shutdown_stops_run() {
    let mut server = TestServer::start();
    server.put(r#"{"id":"A"}"#);

    server.shutdown.shutdown();
    let thread = server.thread.take().unwrap();

    let start = Instant::now();
    thread.join().unwrap();
    assert!(start.elapsed() < Duration::from_secs(2));
    assert!(server.shutdown.is_shutdown());
}
