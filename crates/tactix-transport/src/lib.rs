//! Transport layer for Tactix.
//!
//! Provides the [`Connection`] trait plus a WebSocket implementation written directly against RFC 6455: the HTTP upgrade in
//! [`handshake`] and text-frame encoding in [`frame`]. Only what the game
//! protocol needs is supported (unfragmented text frames, close).

#![allow(async_fn_in_trait)]

mod error;
pub mod frame;
pub mod handshake;
mod websocket;

pub use error::{FrameError, HandshakeError, TransportError};
pub use frame::{decode_frame, encode_frame};
pub use handshake::compute_accept_key;
pub use websocket::{WebSocketConfig, WebSocketConnection, WebSocketTransport};

use std::fmt;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A single connection that carries whole text messages.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one message to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next message from the remote peer.
    ///
    /// Returns `Ok(None)` when the peer closed the connection.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
