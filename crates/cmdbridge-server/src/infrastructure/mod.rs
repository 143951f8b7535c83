//! Infrastructure layer: the TCP listener and per-connection serving.

pub mod tcp_server;

pub use tcp_server::{bind, run_server};
