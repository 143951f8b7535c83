//! Domain layer: pure configuration types with no I/O and no async.

pub mod config;

pub use config::BridgeConfig;
