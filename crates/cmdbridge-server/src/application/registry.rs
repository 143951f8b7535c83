//! Handler registry: the command type → handler group routing table.
//!
//! The registry is built once at startup, before the listener accepts its
//! first connection, and is immutable thereafter: [`MainContextExecutor::spawn`]
//! moves it onto the worker thread, and from that point the only view the
//! rest of the bridge keeps is a read-only snapshot of the registered type
//! names.  There is no dynamic re-registration while serving — that single
//! decision is what makes concurrent dispatch trivial to reason about.
//!
//! Each command type maps to at most one group.  A duplicate registration is
//! a startup-time conflict worth logging loudly; the later registration wins
//! so the outcome is never ambiguous at dispatch time.
//!
//! [`MainContextExecutor::spawn`]: crate::application::executor::MainContextExecutor::spawn

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::{debug, warn};

use cmdbridge_core::{Command, HandlerError, HandlerGroup};

/// Routing table plus ownership of the handler groups themselves.
#[derive(Default)]
pub struct HandlerRegistry {
    /// The groups, in registration order.  Boxed because each group is a
    /// differently-typed capability unit behind the one trait.
    groups: Vec<Box<dyn HandlerGroup>>,
    /// Command type → index into `groups`.
    routes: HashMap<String, usize>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler group under every command type it declares.
    ///
    /// Duplicate command types are logged as a conflict; the group registered
    /// last wins.
    pub fn register(&mut self, group: Box<dyn HandlerGroup>) {
        let index = self.groups.len();
        for &command_type in group.command_types() {
            if let Some(previous) = self.routes.insert(command_type.to_string(), index) {
                warn!(
                    command_type,
                    previous_group = self.groups[previous].name(),
                    new_group = group.name(),
                    "duplicate command registration; later group wins"
                );
            }
        }
        debug!(
            group = group.name(),
            command_types = ?group.command_types(),
            "registered handler group"
        );
        self.groups.push(group);
    }

    /// Returns the set of registered command types.
    ///
    /// The dispatcher keeps this snapshot so it can answer "unknown command"
    /// without ever touching the executor queue.
    pub fn registered_types(&self) -> HashSet<String> {
        self.routes.keys().cloned().collect()
    }

    /// Number of registered groups.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Resolves and invokes the group owning `command.command_type`.
    ///
    /// Only the main-context worker calls this.  An unregistered type is not
    /// a registry fault — the dispatcher normally filters those out before
    /// submission — but it is still answered with a well-formed error for
    /// defense in depth.
    pub fn dispatch(&mut self, command: &Command) -> Result<Value, HandlerError> {
        match self.routes.get(&command.command_type) {
            Some(&index) => self.groups[index].handle(&command.command_type, &command.params),
            None => Err(HandlerError::failed(format!(
                "unknown command: {}",
                command.command_type
            ))),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
