//! Request and response shapes for the command protocol.
//!
//! A client sends one [`Command`] per connection and receives exactly one
//! [`Response`].  Both sides of the exchange are plain UTF-8 JSON objects:
//!
//! ```text
//! request:   { "type": "create_object", "params": { "name": "Cube01" } }
//! response:  { "status": "success", "result": { ... } }
//!        or  { "status": "error",   "error": "..." }
//! ```
//!
//! The `type` string is the sole dispatch key.  The bridge treats it as
//! opaque: case-sensitive, matched exactly against the registration table.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The parameter bag attached to a command.
///
/// `serde_json`'s `preserve_order` feature is enabled workspace-wide, so this
/// map keeps the key order the client sent.
pub type ParamMap = serde_json::Map<String, Value>;

/// A decoded request: a command type plus its parameter bag.
///
/// `Command` values are only ever produced by the codec
/// ([`crate::protocol::codec::decode_command`]), which guarantees that
/// `command_type` is non-empty and that `params` came from a JSON object.
/// There is deliberately no `Deserialize` impl: deserializing directly would
/// bypass those checks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Command {
    /// The dispatch key, e.g. `"ping"` or `"create_object"`.
    #[serde(rename = "type")]
    pub command_type: String,

    /// Named parameters for the command.  Absent on the wire means empty.
    #[serde(skip_serializing_if = "ParamMap::is_empty")]
    pub params: ParamMap,
}

impl Command {
    /// Builds a command with an empty parameter bag.
    pub fn new(command_type: impl Into<String>) -> Self {
        Self {
            command_type: command_type.into(),
            params: ParamMap::new(),
        }
    }

    /// Builds a command with the given parameter bag.
    pub fn with_params(command_type: impl Into<String>, params: ParamMap) -> Self {
        Self {
            command_type: command_type.into(),
            params,
        }
    }
}

/// The fixed response envelope.
///
/// Every request that decodes successfully receives exactly one of these,
/// including requests for unknown command types and requests whose handler
/// failed.  Exactly one of `result`/`error` is present on the wire; the enum
/// representation makes any other shape unrepresentable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Response {
    /// `{ "status": "success", "result": <any JSON value> }`
    Success { result: Value },
    /// `{ "status": "error", "error": "<message>" }`
    Error { error: String },
}

impl Response {
    /// Builds a success envelope around `result`.
    pub fn success(result: Value) -> Self {
        Self::Success { result }
    }

    /// Builds an error envelope with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    /// Returns `true` for the success variant.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
