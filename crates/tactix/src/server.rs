//! `TactixServer` builder and accept loop.
//!
//! This is the entry point for running a Tactix server. It ties the layers
//! together: transport → protocol → session → match.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tactix_match::{MemoryStore, Orchestrator, Store};
use tactix_protocol::{Action, Codec, JsonCodec, PlayerId, Response, ResponsePayload};
use tactix_session::{
    ConnectionRegistry, DisconnectTracker, RematchBook, SessionConfig, SessionHandle,
};
use tactix_transport::{WebSocketConfig, WebSocketConnection, WebSocketTransport};
use tokio_util::sync::CancellationToken;

use crate::handler::handle_connection;
use crate::{ServerConfig, TactixError, monitor};

/// Shared server state passed to each connection task and the monitor.
pub(crate) struct ServerState<S> {
    pub(crate) orchestrator: Orchestrator<S>,
    pub(crate) registry: ConnectionRegistry,
    pub(crate) disconnects: DisconnectTracker,
    pub(crate) rematches: RematchBook,
    pub(crate) codec: JsonCodec,
    pub(crate) config: ServerConfig,
}

impl<S: Store> ServerState<S> {
    pub(crate) fn new(store: S, config: ServerConfig) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            orchestrator: Orchestrator::with_rng(store, rng),
            registry: ConnectionRegistry::new(),
            disconnects: DisconnectTracker::new(config.session.disconnect_timeout),
            rematches: RematchBook::new(config.session.rematch_ttl),
            codec: JsonCodec,
            config,
        }
    }

    /// Binds `player_id` to the connection it just spoke on and cancels
    /// any pending forfeit.
    pub(crate) async fn identify(&self, session: &SessionHandle, player_id: &PlayerId) {
        self.registry.register(player_id.clone(), session.clone()).await;
        if self.disconnects.mark_reconnected(player_id).await {
            tracing::info!(%player_id, conn_id = %session.connection_id(), "player came back");
        }
    }

    pub(crate) fn encode(
        &self,
        action: Action,
        payload: ResponsePayload,
    ) -> Result<Vec<u8>, TactixError> {
        Ok(self.codec.encode(&Response::new(action, payload))?)
    }

    /// Answers on the connection the request came from.
    pub(crate) fn reply(
        &self,
        session: &SessionHandle,
        action: Action,
        payload: ResponsePayload,
    ) -> Result<(), TactixError> {
        session.send(self.encode(action, payload)?)?;
        Ok(())
    }

    /// Delivers to a player's live connection. A player without one is
    /// skipped; they see the current state when they reconnect.
    pub(crate) async fn deliver(&self, player_id: &PlayerId, action: Action, payload: ResponsePayload) {
        let bytes = match self.encode(action, payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(%player_id, %action, error = %e, "failed to encode response");
                return;
            }
        };
        if let Err(e) = self.registry.send_to(player_id, bytes).await {
            tracing::debug!(%player_id, %action, error = %e, "response not delivered");
        }
    }
}

/// Builder for configuring and starting a Tactix server.
///
/// # Example
///
/// ```rust,ignore
/// let server = TactixServer::builder()
///     .bind("0.0.0.0:8080")
///     .disconnect_timeout(Duration::from_secs(10))
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct TactixServerBuilder {
    config: ServerConfig,
}

impl TactixServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_owned();
        self
    }

    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.config.session = config;
        self
    }

    pub fn websocket_config(mut self, config: WebSocketConfig) -> Self {
        self.config.websocket = config;
        self
    }

    /// How long a disconnected player may stay away before forfeiting.
    pub fn disconnect_timeout(mut self, timeout: Duration) -> Self {
        self.config.session.disconnect_timeout = timeout;
        self
    }

    pub fn monitor_interval(mut self, interval: Duration) -> Self {
        self.config.session.monitor_interval = interval;
        self
    }

    /// How long a first "yes" to a rematch waits for the opponent.
    pub fn rematch_ttl(mut self, ttl: Duration) -> Self {
        self.config.session.rematch_ttl = ttl;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Makes ids, side draws and bot moves reproducible.
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.config.rng_seed = Some(seed);
        self
    }

    /// Binds the listener with the in-memory store.
    pub async fn build(self) -> Result<TactixServer<MemoryStore>, TactixError> {
        self.build_with_store(MemoryStore::new()).await
    }

    /// Binds the listener with a caller-supplied store.
    pub async fn build_with_store<S: Store>(self, store: S) -> Result<TactixServer<S>, TactixError> {
        let transport =
            WebSocketTransport::bind_with_config(&self.config.bind_addr, self.config.websocket)
                .await?;
        Ok(TactixServer {
            transport,
            state: Arc::new(ServerState::new(store, self.config)),
            shutdown: CancellationToken::new(),
        })
    }
}

impl Default for TactixServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Tactix server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct TactixServer<S> {
    transport: WebSocketTransport,
    state: Arc<ServerState<S>>,
    shutdown: CancellationToken,
}

impl TactixServer<MemoryStore> {
    pub fn builder() -> TactixServerBuilder {
        TactixServerBuilder::new()
    }
}

impl<S: Store> TactixServer<S> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, TactixError> {
        Ok(self.transport.local_addr()?)
    }

    /// A token that stops the accept loop and the disconnect monitor
    /// when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Runs the accept loop until the shutdown token fires.
    ///
    /// Each connection is upgraded and served on its own task, so a slow
    /// handshake never stalls the loop. Connections already open keep
    /// running after shutdown until their peers leave.
    pub async fn run(self) -> Result<(), TactixError> {
        let addr = self.local_addr()?;
        tracing::info!(%addr, "Tactix server running");

        let monitor = tokio::spawn(monitor::run(
            Arc::clone(&self.state),
            self.shutdown.clone(),
        ));
        let ws_config = self.transport.config();

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = self.transport.accept_tcp() => match accepted {
                    Ok((stream, peer)) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            let conn = match WebSocketConnection::upgrade(stream, ws_config).await {
                                Ok(conn) => conn,
                                Err(e) => {
                                    tracing::debug!(%peer, error = %e, "websocket upgrade failed");
                                    return;
                                }
                            };
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(%peer, error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }

        if let Err(e) = monitor.await {
            tracing::error!(error = %e, "disconnect monitor panicked");
        }
        tracing::info!("Tactix server stopped");
        Ok(())
    }
}
