//! Application layer: routing, main-context execution, and dispatch.

pub mod builtin;
pub mod dispatcher;
pub mod executor;
pub mod registry;

pub use builtin::CoreHandlers;
pub use dispatcher::BridgeDispatcher;
pub use executor::{ExecutorHandle, MainContextExecutor, SubmittedTask, WaitOutcome};
pub use registry::HandlerRegistry;
