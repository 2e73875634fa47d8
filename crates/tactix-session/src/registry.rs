//! The connection registry: which live connection speaks for which player.
//!
//! Handlers read it on every broadcast and write it whenever a connection
//! identifies itself, so it sits behind a [`RwLock`]: many concurrent
//! lookups, exclusive registration. Entries hold the sending half of the
//! connection's outbound queue, never the socket itself, so delivering to
//! one player never waits on another player's network.

use std::collections::HashMap;

use tactix_protocol::PlayerId;
use tactix_transport::ConnectionId;
use tokio::sync::{RwLock, mpsc};

use crate::SessionError;

/// Sending half of a connection's outbound queue, tagged with the
/// connection it belongs to.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    conn_id: ConnectionId,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
}

impl SessionHandle {
    pub fn new(conn_id: ConnectionId, outbound: mpsc::UnboundedSender<Vec<u8>>) -> Self {
        Self { conn_id, outbound }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.conn_id
    }

    /// Queues an encoded message for the connection's writer task.
    pub fn send(&self, bytes: Vec<u8>) -> Result<(), SessionError> {
        self.outbound
            .send(bytes)
            .map_err(|_| SessionError::Closed(self.conn_id))
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }
}

/// Player id → live connection.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    sessions: RwLock<HashMap<PlayerId, SessionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `player_id` to `handle`, replacing any previous connection.
    ///
    /// Returns the connection that was displaced, if it was a different
    /// one. Re-registering the same connection only takes the read lock.
    pub async fn register(
        &self,
        player_id: PlayerId,
        handle: SessionHandle,
    ) -> Option<ConnectionId> {
        {
            let sessions = self.sessions.read().await;
            if sessions
                .get(&player_id)
                .is_some_and(|h| h.conn_id == handle.conn_id)
            {
                return None;
            }
        }

        let conn_id = handle.conn_id;
        let previous = self
            .sessions
            .write()
            .await
            .insert(player_id.clone(), handle)
            .map(|h| h.conn_id)
            .filter(|prev| *prev != conn_id);

        match previous {
            Some(prev) => {
                tracing::info!(%player_id, %conn_id, replaced = %prev, "player reconnected on new connection");
            }
            None => tracing::debug!(%player_id, %conn_id, "player registered"),
        }
        previous
    }

    /// Looks up the live connection for `player_id`.
    pub async fn get(&self, player_id: &PlayerId) -> Option<SessionHandle> {
        self.sessions.read().await.get(player_id).cloned()
    }

    /// Queues `bytes` for `player_id`'s connection.
    pub async fn send_to(&self, player_id: &PlayerId, bytes: Vec<u8>) -> Result<(), SessionError> {
        let handle = self
            .get(player_id)
            .await
            .ok_or_else(|| SessionError::NotConnected(player_id.clone()))?;
        handle.send(bytes)
    }

    /// Drops every entry still owned by `conn_id` and returns their
    /// player ids.
    ///
    /// Entries that a newer connection has already taken over are left
    /// alone, so a stale socket closing late cannot unregister a player
    /// who reconnected elsewhere.
    pub async fn remove_connection(&self, conn_id: ConnectionId) -> Vec<PlayerId> {
        let mut removed = Vec::new();
        self.sessions.write().await.retain(|player_id, handle| {
            if handle.conn_id == conn_id {
                removed.push(player_id.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    pub async fn is_connected(&self, player_id: &PlayerId) -> bool {
        self.sessions.read().await.contains_key(player_id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
