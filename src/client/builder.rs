use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, watch};
use url::Url;

use super::{ClientState, ConnectionManager, ConnectionState, ConsoleClient};
use crate::infrastructure::BackoffTimer;
use crate::messaging::MessageRouter;
use crate::types::constants::{
    DEFAULT_HEARTBEAT_INTERVAL_MS, DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_BASE_MS,
    DEFAULT_RECONNECT_CEILING_MS,
};
use crate::types::{ConsoleError, Result};

/// Externally supplied connection knobs. Nothing here is hard-coded by the
/// core; defaults only kick in for fields the caller leaves unset.
#[derive(Debug, Clone)]
pub struct ConsoleClientOptions {
    /// WebSocket sub-protocol identifiers offered during the handshake.
    pub protocols: Vec<String>,
    /// Interval between outbound liveness pings (milliseconds).
    pub heartbeat_interval_ms: u64,
    /// Base reconnect interval; attempt n waits `base × 2^n` (milliseconds).
    pub reconnect_base_ms: u64,
    /// Ceiling for the computed reconnect delay (milliseconds).
    pub reconnect_ceiling_ms: u64,
    /// Automatic reconnect attempts before going terminal.
    pub max_reconnect_attempts: u32,
}

impl Default for ConsoleClientOptions {
    fn default() -> Self {
        Self {
            protocols: Vec::new(),
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            reconnect_base_ms: DEFAULT_RECONNECT_BASE_MS,
            reconnect_ceiling_ms: DEFAULT_RECONNECT_CEILING_MS,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
        }
    }
}

/// Builder for [`ConsoleClient`] that validates configuration up front.
pub struct ConsoleClientBuilder {
    endpoint: String,
    options: ConsoleClientOptions,
}

impl ConsoleClientBuilder {
    pub fn new(endpoint: impl Into<String>, options: ConsoleClientOptions) -> Result<Self> {
        let endpoint = endpoint.into();

        let url = Url::parse(&endpoint)?;
        if url.scheme() != "ws" && url.scheme() != "wss" {
            return Err(ConsoleError::Config(format!(
                "stream URL must use ws:// or wss://, got {}",
                url.scheme()
            )));
        }
        if options.reconnect_base_ms == 0 {
            return Err(ConsoleError::Config(
                "reconnect base interval must be non-zero".to_string(),
            ));
        }

        Ok(Self { endpoint, options })
    }

    /// Assemble the client. No connection is made until `connect()`.
    pub fn build(self) -> ConsoleClient {
        let backoff = BackoffTimer::new(
            Duration::from_millis(self.options.reconnect_base_ms),
            Duration::from_millis(self.options.reconnect_ceiling_ms),
            self.options.max_reconnect_attempts,
        );
        let (state_tx, _state_rx) = watch::channel(ConnectionState::Disconnected);

        let connection = Arc::new(ConnectionManager::new());
        let router = Arc::new(MessageRouter::new(Arc::downgrade(&connection)));

        ConsoleClient {
            endpoint: self.endpoint,
            options: self.options,
            connection,
            router,
            state: Arc::new(RwLock::new(ClientState::new(backoff, state_tx))),
        }
    }
}
