//! The handler-group contract: how domain logic plugs into the bridge.
//!
//! A *handler group* owns one capability area — object lifecycle, editor
//! state, graph authoring, and so on — and answers the command types it
//! declared at registration.  The bridge knows nothing about what a command
//! does; it only routes `(type, params)` in and carries `(result | error)`
//! back out.
//!
//! # Execution contract
//!
//! `handle` is only ever invoked from the main-context worker thread, one
//! call at a time, in submission order.  That is the whole point of the
//! bridge: groups may mutate shared state freely with no internal locking.
//! The flip side is that a slow handler stalls every queued command behind
//! it, so a group must not block on external I/O beyond what its domain
//! strictly requires.
//!
//! Groups must not spawn threads that touch the same state, and they never
//! see sockets, futures, or the routing table — only the parsed parameter
//! bag, and only for the duration of one call.

use serde_json::Value;
use thiserror::Error;

use crate::protocol::command::ParamMap;

/// A domain-side failure while executing a command.
///
/// Whatever the variant, the bridge maps it to
/// `{ "status": "error", "error": "<Display output>" }`, so the message is
/// what the client sees.
#[derive(Debug, Error, PartialEq)]
pub enum HandlerError {
    /// A parameter the command requires was absent from the bag.
    #[error("missing required parameter '{0}'")]
    MissingParameter(&'static str),

    /// A parameter was present but had the wrong type or an invalid value.
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// Any other domain failure, described free-form.
    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    /// Shorthand for [`HandlerError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// A capability-scoped unit of domain logic.
///
/// Implementations must be `Send` because the registry that owns them is
/// handed to the main-context worker thread at startup.  They do not need to
/// be `Sync`: after that handoff, only the worker ever touches them, which is
/// why `handle` can take `&mut self` and mutate freely.
pub trait HandlerGroup: Send {
    /// Registration-bookkeeping name.  Used in logs only, never on the wire.
    fn name(&self) -> &'static str;

    /// The command types this group answers.  Read once at registration.
    fn command_types(&self) -> &'static [&'static str];

    /// Executes one command.
    ///
    /// `command_type` is guaranteed to be one of [`Self::command_types`] when
    /// called through the bridge's routing table.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] on any domain failure; the bridge converts it
    /// to an error envelope and carries on.
    fn handle(&mut self, command_type: &str, params: &ParamMap) -> Result<Value, HandlerError>;
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// A minimal group used to exercise the trait-object surface.
    struct EchoGroup;

    impl HandlerGroup for EchoGroup {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn command_types(&self) -> &'static [&'static str] {
            &["echo"]
        }

        fn handle(&mut self, _command_type: &str, params: &ParamMap) -> Result<Value, HandlerError> {
            Ok(Value::Object(params.clone()))
        }
    }

    #[test]
    fn test_handler_group_is_usable_as_a_boxed_trait_object() {
        let mut group: Box<dyn HandlerGroup> = Box::new(EchoGroup);
        let mut params = ParamMap::new();
        params.insert("k".to_string(), json!("v"));
        let result = group.handle("echo", &params).unwrap();
        assert_eq!(result, json!({ "k": "v" }));
    }

    #[test]
    fn test_missing_parameter_message() {
        let err = HandlerError::MissingParameter("name");
        assert_eq!(err.to_string(), "missing required parameter 'name'");
    }

    #[test]
    fn test_invalid_parameter_message() {
        let err = HandlerError::InvalidParameter {
            name: "location",
            reason: "expected an array of 3 numbers".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid parameter 'location': expected an array of 3 numbers"
        );
    }

    #[test]
    fn test_failed_message_is_verbatim() {
        let err = HandlerError::failed("object 'Cube01' not found");
        assert_eq!(err.to_string(), "object 'Cube01' not found");
    }
}
