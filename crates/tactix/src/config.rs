use std::time::Duration;

use tactix_session::SessionConfig;
use tactix_transport::WebSocketConfig;

/// Everything the server needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listener binds to.
    ///
    /// Default: `127.0.0.1:8080`.
    pub bind_addr: String,

    /// Disconnect, monitor and rematch timings.
    pub session: SessionConfig,

    /// Handshake timeout and frame size limit.
    pub websocket: WebSocketConfig,

    /// A connection that sends nothing for this long is dropped.
    ///
    /// Default: 10 minutes.
    pub idle_timeout: Duration,

    /// Seed for ids, side draws and bot moves. `None` seeds from the OS.
    pub rng_seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_owned(),
            session: SessionConfig::default(),
            websocket: WebSocketConfig::default(),
            idle_timeout: Duration::from_secs(600),
            rng_seed: None,
        }
    }
}
