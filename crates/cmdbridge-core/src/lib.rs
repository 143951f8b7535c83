//! # cmdbridge-core
//!
//! Shared library for cmdbridge containing the wire protocol types, the JSON
//! codec, and the handler-group contract that domain logic plugs into.
//!
//! This crate owns no sockets and spawns no threads.  It has zero dependencies
//! on the async runtime, which keeps every type in here testable with plain
//! `#[test]` functions.
//!
//! # What lives where
//!
//! - **`protocol`** – The `{type, params}` request shape, the
//!   `{status, result|error}` response envelope, and the codec that turns one
//!   JSON document into a [`Command`] (and a [`Response`] back into bytes).
//!
//! - **`handler`** – The [`HandlerGroup`] trait: the one narrow interface the
//!   bridge consumes from domain logic.  A handler group receives a command
//!   type and a parameter bag and returns a result value or an error; it never
//!   sees sockets, futures, or the routing table.

pub mod handler;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `cmdbridge_core::Command` instead of `cmdbridge_core::protocol::command::Command`.
pub use handler::{HandlerError, HandlerGroup};
pub use protocol::codec::{
    decode_command, decode_frame, encode_response, DecodeError, DecodeProgress,
};
pub use protocol::command::{Command, ParamMap, Response};
