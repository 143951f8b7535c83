//! End-to-end tests for the command bridge over real TCP.
//!
//! # Purpose
//!
//! These tests exercise the full data path the way an external client does:
//! open a TCP connection, write one JSON request, read one JSON response,
//! observe the connection close.  They verify:
//!
//! - The happy path: a registered command's result passes through the
//!   success envelope untouched.
//! - The error paths: unknown command types, malformed JSON, handler
//!   failures, and handler panics all come back as well-formed error
//!   envelopes on a connection that still completes cleanly.
//! - The serialization property: commands from concurrent connections
//!   execute on the main context one at a time, in submission order.
//!
//! # Client conventions
//!
//! The reference client appends `\n` to its request and reads until it sees
//! a newline; a client may instead half-close its write side to delimit the
//! request.  Both styles are covered below.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use cmdbridge_core::{HandlerError, HandlerGroup, ParamMap};
use cmdbridge_server::application::{
    BridgeDispatcher, CoreHandlers, HandlerRegistry, MainContextExecutor,
};
use cmdbridge_server::domain::config::BridgeConfig;
use cmdbridge_server::infrastructure::{bind, run_server};

// ── Test harness ──────────────────────────────────────────────────────────────

/// Binds the bridge on an ephemeral loopback port and serves in the
/// background until the returned flag is cleared (or the test ends).
async fn spawn_bridge(registry: HandlerRegistry, config: BridgeConfig) -> SocketAddr {
    let config = BridgeConfig {
        bind_addr: "127.0.0.1:0".parse().expect("literal addr"),
        ..config
    };
    let listener = bind(&config).await.expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");

    let executor = MainContextExecutor::spawn(registry).expect("spawn main context");
    let dispatcher = Arc::new(BridgeDispatcher::new(executor, config.dispatch_timeout));
    let running = Arc::new(AtomicBool::new(true));
    tokio::spawn(run_server(listener, dispatcher, config, running));

    addr
}

/// Shorthand: bridge with only the built-in handlers and default config.
async fn spawn_default_bridge() -> SocketAddr {
    let mut registry = HandlerRegistry::new();
    registry.register(Box::new(CoreHandlers));
    spawn_bridge(registry, BridgeConfig::default()).await
}

/// Writes `body`, optionally half-closes the write side, and reads the full
/// response as JSON.
async fn send_raw(addr: SocketAddr, body: &[u8], half_close: bool) -> Value {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    stream.write_all(body).await.expect("write request");
    if half_close {
        stream.shutdown().await.expect("half-close");
    }
    let mut response = Vec::new();
    stream
        .read_to_end(&mut response)
        .await
        .expect("read response");
    serde_json::from_slice(&response).expect("response must be valid JSON")
}

/// The common case: newline-terminated request, write side left open.
async fn send_request(addr: SocketAddr, request: Value) -> Value {
    let mut body = serde_json::to_vec(&request).expect("request fixture");
    body.push(b'\n');
    send_raw(addr, &body, false).await
}

// ── Stub handler groups ───────────────────────────────────────────────────────

/// Appends every invocation to a shared log, sleeping first for `slow_op`.
struct SequencedGroup {
    log: Arc<Mutex<Vec<String>>>,
}

impl HandlerGroup for SequencedGroup {
    fn name(&self) -> &'static str {
        "sequenced"
    }

    fn command_types(&self) -> &'static [&'static str] {
        &["slow_op", "quick_op"]
    }

    fn handle(&mut self, command_type: &str, _params: &ParamMap) -> Result<Value, HandlerError> {
        if command_type == "slow_op" {
            std::thread::sleep(Duration::from_millis(50));
        }
        self.log.lock().unwrap().push(command_type.to_string());
        Ok(json!({ "ran": command_type }))
    }
}

/// Echoes its parameter bag back, or fails on demand.
struct EchoGroup;

impl HandlerGroup for EchoGroup {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn command_types(&self) -> &'static [&'static str] {
        &["echo", "fail_op", "explode"]
    }

    fn handle(&mut self, command_type: &str, params: &ParamMap) -> Result<Value, HandlerError> {
        match command_type {
            "echo" => Ok(Value::Object(params.clone())),
            "fail_op" => Err(HandlerError::failed("deliberate failure")),
            "explode" => panic!("simulated handler fault"),
            other => Err(HandlerError::failed(format!("unknown command: {other}"))),
        }
    }
}

// ── Scenario tests (wire-exact envelopes) ─────────────────────────────────────

#[tokio::test]
async fn test_scenario_ping_returns_pong() {
    let addr = spawn_default_bridge().await;
    let response = send_request(addr, json!({ "type": "ping" })).await;
    assert_eq!(
        response,
        json!({ "status": "success", "result": { "message": "pong" } })
    );
}

#[tokio::test]
async fn test_scenario_unknown_command_envelope() {
    let addr = spawn_default_bridge().await;
    let response = send_request(addr, json!({ "type": "bogus_command" })).await;
    assert_eq!(
        response,
        json!({ "status": "error", "error": "unknown command: bogus_command" })
    );
}

#[tokio::test]
async fn test_scenario_malformed_json_gets_error_envelope() {
    let addr = spawn_default_bridge().await;
    // `{"type":` can only be judged once the client stops sending.
    let response = send_raw(addr, br#"{"type":"#, true).await;
    assert_eq!(response["status"], "error");
    let message = response["error"].as_str().expect("error message");
    assert!(message.contains("invalid JSON"), "got: {message}");
    assert!(response.get("result").is_none());
}

#[tokio::test]
async fn test_ping_works_with_half_close_and_no_newline() {
    let addr = spawn_default_bridge().await;
    let response = send_raw(addr, br#"{"type":"ping"}"#, true).await;
    assert_eq!(response["status"], "success");
}

#[tokio::test]
async fn test_replayed_ping_is_idempotent() {
    let addr = spawn_default_bridge().await;
    let first = send_request(addr, json!({ "type": "ping" })).await;
    let second = send_request(addr, json!({ "type": "ping" })).await;
    assert_eq!(first, second);
}

// ── Decode rejections that need no end-of-stream ──────────────────────────────

#[tokio::test]
async fn test_top_level_array_rejected_without_half_close() {
    let addr = spawn_default_bridge().await;
    // A complete-but-invalid document is answered immediately; the client
    // never has to close its side.
    let response = send_raw(addr, b"[1,2,3]\n", false).await;
    assert_eq!(response["status"], "error");
    assert!(response["error"]
        .as_str()
        .unwrap()
        .contains("expected a JSON object"));
}

#[tokio::test]
async fn test_missing_type_field_rejected() {
    let addr = spawn_default_bridge().await;
    let response = send_raw(addr, br#"{"params":{}}"#.as_slice(), false).await;
    assert_eq!(
        response,
        json!({ "status": "error", "error": "missing required field 'type'" })
    );
}

#[tokio::test]
async fn test_oversized_request_rejected() {
    let mut registry = HandlerRegistry::new();
    registry.register(Box::new(CoreHandlers));
    let addr = spawn_bridge(
        registry,
        BridgeConfig {
            max_request_bytes: 64,
            ..BridgeConfig::default()
        },
    )
    .await;

    // An endless string that never completes the document.
    let mut body = br#"{"type":""#.to_vec();
    body.extend(std::iter::repeat(b'a').take(256));
    let response = send_raw(addr, &body, false).await;
    assert_eq!(response["status"], "error");
    assert!(response["error"].as_str().unwrap().contains("64-byte limit"));
}

// ── Handler outcome pass-through ──────────────────────────────────────────────

#[tokio::test]
async fn test_handler_result_passes_through_unchanged() {
    let mut registry = HandlerRegistry::new();
    registry.register(Box::new(EchoGroup));
    let addr = spawn_bridge(registry, BridgeConfig::default()).await;

    let response = send_request(
        addr,
        json!({ "type": "echo", "params": { "name": "Cube01", "count": 3 } }),
    )
    .await;
    assert_eq!(
        response,
        json!({ "status": "success", "result": { "name": "Cube01", "count": 3 } })
    );
}

#[tokio::test]
async fn test_handler_error_passes_through_as_error_envelope() {
    let mut registry = HandlerRegistry::new();
    registry.register(Box::new(EchoGroup));
    let addr = spawn_bridge(registry, BridgeConfig::default()).await;

    let response = send_request(addr, json!({ "type": "fail_op" })).await;
    assert_eq!(
        response,
        json!({ "status": "error", "error": "deliberate failure" })
    );
}

#[tokio::test]
async fn test_handler_panic_is_contained_and_bridge_survives() {
    let mut registry = HandlerRegistry::new();
    registry.register(Box::new(EchoGroup));
    registry.register(Box::new(CoreHandlers));
    let addr = spawn_bridge(registry, BridgeConfig::default()).await;

    let response = send_request(addr, json!({ "type": "explode" })).await;
    assert_eq!(response["status"], "error");
    assert!(response["error"].as_str().unwrap().contains("panicked"));

    // The main context must still be serving.
    let after = send_request(addr, json!({ "type": "ping" })).await;
    assert_eq!(after["status"], "success");
}

// ── Serialization across concurrent connections ───────────────────────────────

#[tokio::test]
async fn test_fifo_serialization_across_connections() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = HandlerRegistry::new();
    registry.register(Box::new(SequencedGroup {
        log: Arc::clone(&log),
    }));
    let addr = spawn_bridge(registry, BridgeConfig::default()).await;

    // Fire slow_op first, give it time to be received and submitted, then
    // fire quick_op from a second connection while slow_op still runs.
    let slow = tokio::spawn(send_request(addr, json!({ "type": "slow_op" })));
    tokio::time::sleep(Duration::from_millis(15)).await;
    let quick = tokio::spawn(send_request(addr, json!({ "type": "quick_op" })));

    let (slow_response, quick_response) = (
        slow.await.expect("slow task"),
        quick.await.expect("quick task"),
    );
    assert_eq!(slow_response["status"], "success");
    assert_eq!(quick_response["status"], "success");

    // quick_op was submitted second, so it ran second — FIFO by submission
    // order, not fairness by command cost.
    assert_eq!(*log.lock().unwrap(), ["slow_op", "quick_op"]);
}

#[tokio::test]
async fn test_dispatch_timeout_answers_timeout_envelope() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = HandlerRegistry::new();
    registry.register(Box::new(SequencedGroup {
        log: Arc::clone(&log),
    }));
    let addr = spawn_bridge(
        registry,
        BridgeConfig {
            dispatch_timeout: Some(Duration::from_millis(10)),
            ..BridgeConfig::default()
        },
    )
    .await;

    let response = send_request(addr, json!({ "type": "slow_op" })).await;
    assert_eq!(response, json!({ "status": "error", "error": "timeout" }));
}

// ── Graceful shutdown ─────────────────────────────────────────────────────────

/// Sleeps well past the accept loop's flag-poll interval, so a shutdown
/// signal always lands while the handler is still running.
struct LingeringGroup;

impl HandlerGroup for LingeringGroup {
    fn name(&self) -> &'static str {
        "lingering"
    }

    fn command_types(&self) -> &'static [&'static str] {
        &["linger_op"]
    }

    fn handle(&mut self, _command_type: &str, _params: &ParamMap) -> Result<Value, HandlerError> {
        std::thread::sleep(Duration::from_millis(400));
        Ok(json!({ "done": true }))
    }
}

#[tokio::test]
async fn test_shutdown_drains_in_flight_connections() {
    let mut registry = HandlerRegistry::new();
    registry.register(Box::new(LingeringGroup));
    let config = BridgeConfig {
        bind_addr: "127.0.0.1:0".parse().expect("literal addr"),
        ..BridgeConfig::default()
    };
    let listener = bind(&config).await.expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    let executor = MainContextExecutor::spawn(registry).expect("spawn main context");
    let dispatcher = Arc::new(BridgeDispatcher::new(executor, config.dispatch_timeout));
    let running = Arc::new(AtomicBool::new(true));
    let server = tokio::spawn(run_server(
        listener,
        dispatcher,
        config,
        Arc::clone(&running),
    ));

    // Start a request whose handler outlives the shutdown signal, then
    // signal shutdown while it is still running.
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    stream
        .write_all(b"{\"type\": \"linger_op\"}\n")
        .await
        .expect("write request");
    tokio::time::sleep(Duration::from_millis(50)).await;
    let signalled_at = std::time::Instant::now();
    running.store(false, Ordering::Relaxed);

    // The server must not return before the in-flight cycle finished; the
    // accept loop alone would have noticed the flag within ~200 ms.
    server.await.expect("server task").expect("server result");
    assert!(
        signalled_at.elapsed() >= Duration::from_millis(300),
        "server returned before the in-flight connection finished"
    );

    // And the client still receives its complete response.
    let mut response = Vec::new();
    stream
        .read_to_end(&mut response)
        .await
        .expect("read response");
    let response: Value = serde_json::from_slice(&response).expect("full response");
    assert_eq!(
        response,
        json!({ "status": "success", "result": { "done": true } })
    );
}
