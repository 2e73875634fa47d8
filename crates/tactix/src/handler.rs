//! Per-connection handler: read loop, writer task, cleanup.
//!
//! Each upgraded connection gets two Tokio tasks:
//!   1. this read loop, which decodes frames and hands them to the
//!      dispatcher
//!   2. a writer that drains the connection's outbound queue
//!
//! Everything addressed to a player, including replies, goes through the
//! queue, so the read loop never waits on a socket write.

use std::sync::Arc;

use tactix_match::Store;
use tactix_session::SessionHandle;
use tactix_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::mpsc;

use crate::TactixError;
use crate::dispatch::dispatch;
use crate::server::ServerState;

/// Drop guard that unregisters the connection when the handler exits.
///
/// Runs even if the handler panics. `Drop` is synchronous, so the async
/// cleanup is spawned.
struct ConnectionGuard<S: Store> {
    conn_id: ConnectionId,
    state: Arc<ServerState<S>>,
}

impl<S: Store> Drop for ConnectionGuard<S> {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let state = Arc::clone(&self.state);
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        runtime.spawn(async move {
            release_connection(&state, conn_id).await;
        });
    }
}

/// Removes the registry entries this connection still owns and starts
/// their forfeit clocks. Forfeiting itself is left to the monitor.
pub(crate) async fn release_connection<S: Store>(state: &ServerState<S>, conn_id: ConnectionId) {
    let players = state.registry.remove_connection(conn_id).await;
    for player_id in players {
        tracing::debug!(%player_id, %conn_id, "registry entry released");
        state.disconnects.mark_disconnected(player_id).await;
    }
}

/// Serves one upgraded connection until it closes.
pub(crate) async fn handle_connection<S: Store>(
    conn: WebSocketConnection,
    state: Arc<ServerState<S>>,
) -> Result<(), TactixError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    tokio::spawn(write_loop(Arc::clone(&conn), outbound_rx));
    let session = SessionHandle::new(conn_id, outbound_tx);
    let _guard = ConnectionGuard {
        conn_id,
        state: Arc::clone(&state),
    };

    let idle_timeout = state.config.idle_timeout;
    let result = loop {
        let data = match tokio::time::timeout(idle_timeout, conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::info!(%conn_id, "connection closed cleanly");
                break Ok(());
            }
            Ok(Err(e)) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break Err(TactixError::Transport(e));
            }
            Err(_) => {
                tracing::info!(%conn_id, "connection idle, dropping");
                break Ok(());
            }
        };
        dispatch(&state, &session, &data).await;
    };

    // The writer stops once every sender is gone: ours here, the
    // registry's when the guard releases the connection.
    drop(session);
    result
}

async fn write_loop(conn: Arc<WebSocketConnection>, mut outbound: mpsc::UnboundedReceiver<Vec<u8>>) {
    let conn_id = conn.id();
    while let Some(bytes) = outbound.recv().await {
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(%conn_id, error = %e, "send failed, stopping writer");
            return;
        }
    }
    if let Err(e) = conn.close().await {
        tracing::debug!(%conn_id, error = %e, "close failed");
    }
}
