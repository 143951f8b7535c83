//! cmdbridge-server — entry point.
//!
//! This binary runs the local command bridge: a TCP server that accepts one
//! JSON-encoded command per connection, executes it on the single-threaded
//! main context, and answers with a `{status, result|error}` envelope.
//!
//! # Usage
//!
//! ```text
//! cmdbridge-server [OPTIONS]
//!
//! Options:
//!   --host <HOST>            Listen address [default: 127.0.0.1]
//!   --port <PORT>            Listen port [default: 55557]
//!   --backlog <N>            Accept backlog [default: 5]
//!   --timeout-secs <SECS>    Per-command dispatch timeout; 0 disables [default: 10]
//! ```
//!
//! # Environment variable overrides
//!
//! CLI args take precedence when both are present.
//!
//! | Variable                 | Default     | Description                  |
//! |--------------------------|-------------|------------------------------|
//! | `CMDBRIDGE_HOST`         | `127.0.0.1` | Listen address               |
//! | `CMDBRIDGE_PORT`         | `55557`     | Listen port                  |
//! | `CMDBRIDGE_BACKLOG`      | `5`         | Accept backlog               |
//! | `CMDBRIDGE_TIMEOUT_SECS` | `10`        | Dispatch timeout (0 = none)  |
//!
//! Log verbosity is controlled by `RUST_LOG` (e.g. `RUST_LOG=debug`).

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cmdbridge_server::application::{
    BridgeDispatcher, CoreHandlers, HandlerRegistry, MainContextExecutor,
};
use cmdbridge_server::domain::config::{BridgeConfig, DEFAULT_PORT};
use cmdbridge_server::infrastructure::{bind, run_server};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Local command bridge.
///
/// Accepts one JSON command per TCP connection and executes it on the
/// single-threaded main context.
#[derive(Debug, Parser)]
#[command(
    name = "cmdbridge-server",
    about = "TCP command bridge serializing JSON commands onto a single main context",
    version
)]
struct Cli {
    /// Address to listen on.
    ///
    /// The bridge trusts its client, so keep this on loopback unless you
    /// know exactly what is on the network.
    #[arg(long, default_value = "127.0.0.1", env = "CMDBRIDGE_HOST")]
    host: String,

    /// TCP port to listen on.
    #[arg(long, default_value_t = DEFAULT_PORT, env = "CMDBRIDGE_PORT")]
    port: u16,

    /// Accept backlog passed to the OS listener.
    #[arg(long, default_value_t = 5, env = "CMDBRIDGE_BACKLOG")]
    backlog: u32,

    /// Seconds a connection waits for the main context before answering
    /// `timeout`.  `0` waits indefinitely.
    #[arg(long, default_value_t = 10, env = "CMDBRIDGE_TIMEOUT_SECS")]
    timeout_secs: u64,
}

impl Cli {
    /// Converts the parsed CLI arguments into a [`BridgeConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if `--host` and `--port` do not form a valid socket
    /// address.
    fn into_bridge_config(self) -> anyhow::Result<BridgeConfig> {
        let bind_addr: SocketAddr = format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address: '{}:{}'", self.host, self.port))?;

        Ok(BridgeConfig {
            bind_addr,
            backlog: self.backlog,
            dispatch_timeout: match self.timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            ..BridgeConfig::default()
        })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.into_bridge_config()?;

    info!(
        addr = %config.bind_addr,
        timeout = ?config.dispatch_timeout,
        "command bridge starting"
    );

    // The registration table is closed before the listener starts accepting.
    // Domain handler groups for the host environment register here.
    let mut registry = HandlerRegistry::new();
    registry.register(Box::new(CoreHandlers));

    let executor = MainContextExecutor::spawn(registry)
        .context("failed to spawn the main-context thread")?;
    let dispatcher = Arc::new(BridgeDispatcher::new(executor, config.dispatch_timeout));

    // Binding is the one fatal startup step; everything after is
    // connection- or command-scoped.
    let listener = bind(&config).await?;

    // Ctrl+C clears the running flag; the accept loop polls it every 200 ms,
    // stops accepting, and drains in-flight connections before returning.
    let running = Arc::new(AtomicBool::new(true));
    let running_for_signal = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; initiating graceful shutdown");
                running_for_signal.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    run_server(listener, dispatcher, config, running).await?;

    info!("command bridge stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
