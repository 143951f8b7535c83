//! TCP server: accept loop and per-connection request serving.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address with the configured
//!    accept backlog.
//! 2. Accepting incoming connections in a loop until the shutdown flag is
//!    cleared, then waiting out connections still being served.
//! 3. Running each connection's single request/response cycle in its own
//!    tokio task: read → decode → dispatch → encode → write → close.
//!
//! # One command per connection
//!
//! The external protocol convention is one request and one response per
//! connection.  The accept loop keeps accepting while earlier commands are
//! still queued on the main context — backpressure is absorbed by the
//! executor queue, never by refusing an accept.
//!
//! # Per-connection lifecycle
//!
//! ```text
//! Accepted → Reading → Decoded → Dispatched → Awaiting → Responded → Closed
//!                 └──────(decode failure)──────────────→ Responded → Closed
//! ```
//!
//! A decode failure short-circuits straight to the error envelope; the
//! dispatcher and executor are never involved.  Transport faults (accept,
//! read, or write errors) are logged and abandon only the affected
//! connection.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use cmdbridge_core::protocol::codec::{
    decode_command, decode_frame, encode_response, DecodeError, DecodeProgress,
};
use cmdbridge_core::{Command, Response};

use crate::application::dispatcher::BridgeDispatcher;
use crate::domain::config::BridgeConfig;

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds the listener described by `config`.
///
/// Uses an explicit [`TcpSocket`] so the accept backlog is under our control
/// and the address is reusable across quick restarts.
///
/// # Errors
///
/// Returns an error if the socket cannot be created, bound, or put into
/// listening state.  Callers treat this as fatal — it is the only condition
/// that aborts the whole bridge.
pub async fn bind(config: &BridgeConfig) -> anyhow::Result<TcpListener> {
    let socket = match config.bind_addr {
        SocketAddr::V4(_) => TcpSocket::new_v4(),
        SocketAddr::V6(_) => TcpSocket::new_v6(),
    }
    .context("failed to create TCP socket")?;

    // Quick restarts must not trip over TIME_WAIT from the previous run.
    socket
        .set_reuseaddr(true)
        .context("failed to set SO_REUSEADDR")?;
    socket
        .bind(config.bind_addr)
        .with_context(|| format!("failed to bind listener on {}", config.bind_addr))?;

    let listener = socket
        .listen(config.backlog)
        .with_context(|| format!("failed to listen on {}", config.bind_addr))?;

    info!(
        addr = %listener.local_addr().unwrap_or(config.bind_addr),
        backlog = config.backlog,
        "command bridge listening"
    );
    Ok(listener)
}

/// Runs the accept loop until `running` is cleared, then drains in-flight
/// connections before returning.
///
/// Each accepted connection is served in a dedicated tokio task; a slow or
/// queued command never delays the next accept.  On shutdown, no new
/// connections are accepted but every connection already being served runs
/// its cycle to completion, so a response mid-write is never cut off.
///
/// # Errors
///
/// Only accept-loop-fatal conditions propagate; per-connection failures are
/// logged and absorbed.
pub async fn run_server(
    listener: TcpListener,
    dispatcher: Arc<BridgeDispatcher>,
    config: BridgeConfig,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let mut connections = JoinSet::new();

    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // Short accept timeout so the loop re-checks the shutdown flag even
        // when no client is connecting.
        let accept_result = timeout(Duration::from_millis(200), listener.accept()).await;

        match accept_result {
            Ok(Ok((stream, peer_addr))) => {
                let dispatcher = Arc::clone(&dispatcher);
                let max_request_bytes = config.max_request_bytes;
                connections.spawn(async move {
                    handle_connection(stream, peer_addr, dispatcher, max_request_bytes).await;
                });
            }
            Ok(Err(e)) => {
                // Transient accept error (e.g. file-descriptor exhaustion).
                // Keep accepting rather than taking the bridge down.
                error!("accept error: {e}");
            }
            Err(_) => {
                // No connection within the timeout; loop back to the flag check.
            }
        }

        // Reap finished connection tasks so the set stays small on
        // long-running bridges.
        while connections.try_join_next().is_some() {}
    }

    if !connections.is_empty() {
        info!(
            in_flight = connections.len(),
            "waiting for in-flight connections to finish"
        );
    }
    while connections.join_next().await.is_some() {}

    Ok(())
}

// ── Per-connection handling ───────────────────────────────────────────────────

/// Entry point of each per-connection task; logs the outcome of the cycle.
async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    dispatcher: Arc<BridgeDispatcher>,
    max_request_bytes: usize,
) {
    let connection_id = Uuid::new_v4();
    debug!(%connection_id, %peer_addr, "connection accepted");
    match run_request_cycle(stream, connection_id, dispatcher, max_request_bytes).await {
        Ok(()) => debug!(%connection_id, "connection closed normally"),
        Err(e) => warn!(%connection_id, %peer_addr, "connection abandoned: {e:#}"),
    }
}

/// One complete request/response cycle over an accepted stream.
///
/// # Errors
///
/// Returns an error only for transport faults (read or write failures);
/// decode failures and command failures are answered in-band with an error
/// envelope.
async fn run_request_cycle(
    mut stream: TcpStream,
    connection_id: Uuid,
    dispatcher: Arc<BridgeDispatcher>,
    max_request_bytes: usize,
) -> anyhow::Result<()> {
    let response = match read_request(&mut stream, max_request_bytes)
        .await
        .context("failed to read request")?
    {
        Ok(command) => {
            debug!(
                %connection_id,
                command_type = %command.command_type,
                "request decoded, dispatching"
            );
            dispatcher.serve(command).await
        }
        Err(decode_error) => {
            debug!(%connection_id, "request rejected: {decode_error}");
            Response::error(decode_error.to_string())
        }
    };

    stream
        .write_all(&encode_response(&response))
        .await
        .context("failed to write response")?;
    // Half-close the write side so the client observes a clean end of
    // response even if it keeps its own side open.
    stream
        .shutdown()
        .await
        .context("failed to shut down connection")?;
    Ok(())
}

/// Reads exactly one request from the stream.
///
/// Accumulates chunks and attempts an incremental decode after each one; a
/// request is complete as soon as the buffer parses (clients conventionally
/// append `\n`, which is ignored as whitespace) or when the client
/// half-closes its write side.
///
/// The outer `Result` is the transport: an `Err` means the socket failed.
/// The inner `Result` is the protocol: a [`DecodeError`] is answered with an
/// error envelope by the caller.
async fn read_request(
    stream: &mut TcpStream,
    max_request_bytes: usize,
) -> std::io::Result<Result<Command, DecodeError>> {
    let mut buf: Vec<u8> = Vec::with_capacity(1024);
    let mut chunk = [0u8; 4096];

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            // EOF: whatever arrived must now be a complete request.
            return Ok(decode_command(&buf));
        }
        buf.extend_from_slice(&chunk[..n]);

        if buf.len() > max_request_bytes {
            return Ok(Err(DecodeError::RequestTooLarge {
                limit: max_request_bytes,
            }));
        }

        match decode_frame(&buf) {
            Ok(DecodeProgress::Complete(command)) => return Ok(Ok(command)),
            Ok(DecodeProgress::NeedMoreData) => continue,
            Err(e) => return Ok(Err(e)),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
