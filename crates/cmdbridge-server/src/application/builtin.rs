//! Built-in handler group.
//!
//! The bridge answers `ping` itself so a freshly started server is probe-able
//! before any domain handler groups are attached.  Everything else is domain
//! territory and registered by the embedding application.

use serde_json::{json, Value};

use cmdbridge_core::{HandlerError, HandlerGroup, ParamMap};

/// The bridge's own commands.
pub struct CoreHandlers;

impl HandlerGroup for CoreHandlers {
    fn name(&self) -> &'static str {
        "core"
    }

    fn command_types(&self) -> &'static [&'static str] {
        &["ping"]
    }

    fn handle(&mut self, command_type: &str, _params: &ParamMap) -> Result<Value, HandlerError> {
        match command_type {
            "ping" => Ok(json!({ "message": "pong" })),
            other => Err(HandlerError::failed(format!("unknown command: {other}"))),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
