//! cmdbridge-server library crate.
//!
//! This crate is the bridge proper: it accepts TCP connections carrying one
//! JSON command each, routes the command to the handler group that owns it,
//! and executes it on a single dedicated "main context" thread so that all
//! mutable host state has exactly one writer.
//!
//! # Architecture
//!
//! ```text
//! Client (one JSON request per TCP connection)
//!         ↕
//! [cmdbridge-server]
//!   ├── domain/          BridgeConfig (addresses, limits, timeout)
//!   ├── application/
//!   │     ├── registry/    command type → HandlerGroup routing table
//!   │     ├── executor/    the main-context worker thread + FIFO task queue
//!   │     ├── dispatcher/  resolve → submit → await → envelope
//!   │     └── builtin/     the built-in `ping` group
//!   └── infrastructure/
//!         └── tcp_server/  accept loop and per-connection read/serve/write
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and `cmdbridge-core`; the executor is
//!   the only place that spawns a thread, and that thread is the only caller
//!   of any [`cmdbridge_core::HandlerGroup`].
//! - `infrastructure` depends on everything above plus `tokio`.
//!
//! # The two concurrency domains
//!
//! Network tasks (one tokio task per accepted connection) and the main
//! context (one OS thread) meet at exactly one crossing point: a network task
//! submits a task to the executor's queue and then awaits its completion
//! future.  Network code never calls handler code, and handler code never
//! sees a socket.

/// Domain layer: configuration.
pub mod domain;

/// Application layer: registry, executor, dispatcher, built-in handlers.
pub mod application;

/// Infrastructure layer: TCP listener and per-connection serving.
pub mod infrastructure;
