//! Bridge dispatcher: one decoded command in, one response envelope out.
//!
//! The dispatcher is the glue between a connection routine and the main
//! context.  For each request it:
//!
//! 1. Checks the routing snapshot; an unregistered `type` is answered
//!    `{status:"error", error:"unknown command: <type>"}` without the
//!    executor ever seeing a task.
//! 2. Submits a task to the main context.
//! 3. Awaits the task's future, bounded by the configured dispatch timeout.
//! 4. Maps the outcome onto the fixed response envelope.
//!
//! Whatever goes wrong downstream — handler error, handler panic, timeout,
//! a dead worker — the caller always receives a well-formed [`Response`].

use std::time::Duration;

use tracing::{debug, warn};

use cmdbridge_core::{Command, Response};

use crate::application::executor::{ExecutorHandle, WaitOutcome};

/// Serves decoded commands against the main context.
#[derive(Clone)]
pub struct BridgeDispatcher {
    executor: ExecutorHandle,
    /// Upper bound on the wait for a single command; `None` waits forever.
    timeout: Option<Duration>,
}

impl BridgeDispatcher {
    /// Builds a dispatcher over a running main context.
    pub fn new(executor: ExecutorHandle, timeout: Option<Duration>) -> Self {
        Self { executor, timeout }
    }

    /// Serves one command to completion and returns its response envelope.
    pub async fn serve(&self, command: Command) -> Response {
        let command_type = command.command_type.clone();

        if !self.executor.is_registered(&command_type) {
            debug!(%command_type, "rejecting unregistered command type");
            return Response::error(format!("unknown command: {command_type}"));
        }

        let task = match self.executor.submit(command) {
            Ok(task) => task,
            Err(e) => {
                warn!(%command_type, "submit failed: {e}");
                return Response::error(e.to_string());
            }
        };

        match task.wait(self.timeout).await {
            WaitOutcome::Completed(Ok(result)) => Response::success(result),
            WaitOutcome::Completed(Err(err)) => {
                debug!(%command_type, "handler failed: {err}");
                Response::error(err.to_string())
            }
            WaitOutcome::TimedOut => {
                warn!(
                    %command_type,
                    timeout = ?self.timeout,
                    "main context did not answer in time; task abandoned"
                );
                Response::error("timeout")
            }
            WaitOutcome::ExecutorGone => {
                warn!(%command_type, "main context exited while task was pending");
                Response::error("main context is no longer running")
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
