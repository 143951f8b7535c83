//! Main-context executor: one thread, one queue, strict FIFO.
//!
//! The host environment this bridge fronts has a single logical execution
//! context that owns all mutable state.  This module makes that context
//! explicit: a dedicated OS thread (named `main-context`) that owns the
//! [`HandlerRegistry`] and drains a task queue in submission order.  At most
//! one handler body executes at any instant — that is the correctness
//! property the whole bridge exists to provide, because handler groups
//! mutate shared state with no internal locking.
//!
//! # Crossing the async boundary
//!
//! The network side runs on tokio; the main context is a plain thread.  The
//! two meet through an unbounded `tokio::sync::mpsc` channel (async senders,
//! a blocking receiver on the worker) and a `oneshot` completion channel per
//! task.  [`ExecutorHandle::submit`] enqueues and returns immediately; the
//! caller then awaits the returned [`SubmittedTask`].  The worker never
//! reorders, never drops, and never runs two tasks concurrently.
//!
//! # Fault containment
//!
//! A handler that returns an error produces an error outcome.  A handler
//! that *panics* is caught at the worker boundary and converted to an error
//! outcome too — one failing command must never kill the worker or stall the
//! queue behind it.
//!
//! # Abandoned tasks
//!
//! A waiter that gives up (dispatch timeout) flips the task's abandoned flag.
//! The worker checks the flag before invoking a still-pending task and skips
//! it, so a late execution never runs on behalf of a client that already got
//! its `timeout` answer.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use cmdbridge_core::{Command, HandlerError};

use crate::application::registry::HandlerRegistry;

/// What the main context produced for one command.
pub type TaskOutcome = Result<Value, HandlerError>;

/// One unit of work queued on the main context.
struct Task {
    command: Command,
    reply: oneshot::Sender<TaskOutcome>,
    abandoned: Arc<AtomicBool>,
}

/// Submitting to a main context whose worker has already exited.
#[derive(Debug, Error)]
#[error("main context is no longer accepting tasks")]
pub struct SubmitError;

/// The main-context worker, spawned once at startup.
pub struct MainContextExecutor;

impl MainContextExecutor {
    /// Spawns the main-context thread, handing it ownership of `registry`.
    ///
    /// Returns a cloneable [`ExecutorHandle`] for submitting tasks.  The
    /// worker exits when every handle (and thus every queue sender) has been
    /// dropped and the queue has drained.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS refuses to spawn the thread — a fatal
    /// startup condition.
    pub fn spawn(registry: HandlerRegistry) -> std::io::Result<ExecutorHandle> {
        let registered = Arc::new(registry.registered_types());
        let (submit_tx, submit_rx) = mpsc::unbounded_channel::<Task>();

        std::thread::Builder::new()
            .name("main-context".to_string())
            .spawn(move || worker_loop(registry, submit_rx))?;

        Ok(ExecutorHandle {
            submit_tx,
            registered,
        })
    }
}

/// The worker body: drain the queue strictly FIFO until it closes.
fn worker_loop(mut registry: HandlerRegistry, mut submit_rx: mpsc::UnboundedReceiver<Task>) {
    info!(
        groups = registry.group_count(),
        "main context up, draining task queue"
    );

    while let Some(task) = submit_rx.blocking_recv() {
        if task.abandoned.load(Ordering::Acquire) {
            debug!(
                command_type = %task.command.command_type,
                "skipping abandoned task; its waiter already gave up"
            );
            continue;
        }

        let outcome = run_one(&mut registry, &task.command);
        if task.reply.send(outcome).is_err() {
            // The waiter vanished between our abandoned-check and now
            // (e.g. its connection died).  Nothing to deliver to.
            debug!(
                command_type = %task.command.command_type,
                "task outcome had no remaining waiter"
            );
        }
    }

    info!("task queue closed; main context exiting");
}

/// Invokes one command through the registry, converting panics to errors.
fn run_one(registry: &mut HandlerRegistry, command: &Command) -> TaskOutcome {
    // AssertUnwindSafe: on panic we keep using the registry for subsequent
    // tasks.  A half-mutated group is the handler author's bug to fix; the
    // bridge's obligation is to keep the queue moving.
    match panic::catch_unwind(AssertUnwindSafe(|| registry.dispatch(command))) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let detail = panic_message(payload.as_ref());
            error!(
                command_type = %command.command_type,
                detail,
                "handler panicked; converting to error outcome"
            );
            Err(HandlerError::failed(format!(
                "handler panicked while executing '{}': {detail}",
                command.command_type
            )))
        }
    }
}

/// Best-effort extraction of a panic payload's message.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

// ── Submission side ───────────────────────────────────────────────────────────

/// Cloneable handle for submitting commands to the main context.
#[derive(Clone)]
pub struct ExecutorHandle {
    submit_tx: mpsc::UnboundedSender<Task>,
    /// Snapshot of the registry's command types, taken before the registry
    /// moved onto the worker thread.  Immutable for the process lifetime.
    registered: Arc<HashSet<String>>,
}

impl ExecutorHandle {
    /// Whether the registry (as built at startup) answers `command_type`.
    pub fn is_registered(&self, command_type: &str) -> bool {
        self.registered.contains(command_type)
    }

    /// Enqueues `command` and returns immediately.
    ///
    /// The calling task never runs the command itself; it awaits the
    /// returned [`SubmittedTask`] for the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError`] if the worker has already exited.
    pub fn submit(&self, command: Command) -> Result<SubmittedTask, SubmitError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let abandoned = Arc::new(AtomicBool::new(false));
        let task = Task {
            command,
            reply: reply_tx,
            abandoned: Arc::clone(&abandoned),
        };
        self.submit_tx.send(task).map_err(|_| SubmitError)?;
        Ok(SubmittedTask {
            reply_rx,
            abandoned,
        })
    }
}

/// The waiting end of one submitted task.
pub struct SubmittedTask {
    reply_rx: oneshot::Receiver<TaskOutcome>,
    abandoned: Arc<AtomicBool>,
}

/// How the wait for a task ended.
#[derive(Debug)]
pub enum WaitOutcome {
    /// The main context ran the handler and produced this outcome.
    Completed(TaskOutcome),
    /// The deadline passed first.  The task is marked abandoned, so the
    /// worker will skip it if it has not started yet.
    TimedOut,
    /// The worker exited before fulfilling the task.
    ExecutorGone,
}

impl SubmittedTask {
    /// Awaits the task's outcome, optionally bounded by `timeout`.
    pub async fn wait(self, timeout: Option<Duration>) -> WaitOutcome {
        let Self {
            reply_rx,
            abandoned,
        } = self;
        match timeout {
            None => match reply_rx.await {
                Ok(outcome) => WaitOutcome::Completed(outcome),
                Err(_) => WaitOutcome::ExecutorGone,
            },
            Some(limit) => match tokio::time::timeout(limit, reply_rx).await {
                Ok(Ok(outcome)) => WaitOutcome::Completed(outcome),
                Ok(Err(_)) => WaitOutcome::ExecutorGone,
                Err(_elapsed) => {
                    // Release so the worker's Acquire load observes the flag
                    // before it decides to run the task.
                    abandoned.store(true, Ordering::Release);
                    WaitOutcome::TimedOut
                }
            },
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
