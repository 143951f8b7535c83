//! Bridge configuration.
//!
//! [`BridgeConfig`] is the single source of truth for all runtime settings.
//! The binary populates it from CLI arguments and environment variables; the
//! defaults match the host environment's long-standing conventions (loopback
//! only, port 55557, listen backlog of 5) so tests and local development need
//! no configuration at all.

use std::net::SocketAddr;
use std::time::Duration;

use cmdbridge_core::protocol::codec::DEFAULT_MAX_REQUEST_BYTES;

/// The port clients expect the bridge on unless told otherwise.
pub const DEFAULT_PORT: u16 = 55557;

/// All runtime configuration for the bridge.
///
/// Build this once at startup and clone it where needed; every field is
/// cheap to copy.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Address and port the TCP listener binds to.
    ///
    /// Loopback by default: the bridge assumes exactly one trusted local
    /// client and performs no authentication.
    pub bind_addr: SocketAddr,

    /// Listen backlog passed to the OS.
    ///
    /// Small on purpose — connections are short-lived (one request each) and
    /// queueing happens on the main context, not in the accept queue.
    pub backlog: u32,

    /// Hard cap on a single request's size.
    ///
    /// A buffer that exceeds this without ever parsing as a complete JSON
    /// document is answered with an error envelope instead of growing
    /// without bound.
    pub max_request_bytes: usize,

    /// How long a network task waits on the main context before answering
    /// `timeout`.  `None` waits indefinitely.
    pub dispatch_timeout: Option<Duration>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            // Known-valid literal; parse cannot fail.
            bind_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            backlog: 5,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            dispatch_timeout: Some(Duration::from_secs(10)),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
