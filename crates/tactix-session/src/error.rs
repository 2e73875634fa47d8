//! Error types for the session layer.

use tactix_protocol::PlayerId;
use tactix_transport::ConnectionId;

/// Errors that can occur while delivering to a player's session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The player has no live connection in the registry.
    #[error("player {0} is not connected")]
    NotConnected(PlayerId),

    /// The connection's writer has shut down; the entry is stale.
    #[error("{0} is closed")]
    Closed(ConnectionId),
}
