//! WebSocket transport over TCP, built on the hand-written handshake and
//! frame codec.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::frame::{self, DEFAULT_MAX_PAYLOAD};
use crate::handshake;
use crate::{Connection, ConnectionId, HandshakeError, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Limits applied to every accepted connection.
#[derive(Debug, Clone, Copy)]
pub struct WebSocketConfig {
    /// How long a client may take to send its upgrade request.
    pub handshake_timeout: Duration,
    /// Largest frame payload accepted from a client.
    pub max_payload: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(10),
            max_payload: DEFAULT_MAX_PAYLOAD,
        }
    }
}

/// TCP listener whose connections are upgraded to WebSocket.
pub struct WebSocketTransport {
    listener: TcpListener,
    config: WebSocketConfig,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        Self::bind_with_config(addr, WebSocketConfig::default()).await
    }

    /// Binds with explicit connection limits.
    pub async fn bind_with_config(
        addr: &str,
        config: WebSocketConfig,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self { listener, config })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener
            .local_addr()
            .map_err(TransportError::AcceptFailed)
    }

    /// Accepts the next TCP connection without running the handshake.
    ///
    /// The caller upgrades it with [`WebSocketConnection::upgrade`], which
    /// lets a slow client handshake on its own task instead of stalling the
    /// accept loop.
    pub async fn accept_tcp(&self) -> Result<(TcpStream, SocketAddr), TransportError> {
        self.listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)
    }

    /// Returns the limits applied to accepted connections.
    pub fn config(&self) -> WebSocketConfig {
        self.config
    }
}

/// A single upgraded WebSocket connection.
///
/// Reading and writing use separate locks, so one task can block in
/// [`Connection::recv`] while another sends.
pub struct WebSocketConnection<S = TcpStream> {
    id: ConnectionId,
    reader: Mutex<BufReader<ReadHalf<S>>>,
    writer: Mutex<WriteHalf<S>>,
    max_payload: usize,
}

impl<S> WebSocketConnection<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Performs the server handshake on `stream`.
    pub async fn upgrade(
        stream: S,
        config: WebSocketConfig,
    ) -> Result<Self, TransportError> {
        let (read_half, mut write_half) = tokio::io::split(stream);
        let mut reader = BufReader::new(read_half);

        let request = tokio::time::timeout(
            config.handshake_timeout,
            handshake::server_handshake(&mut reader, &mut write_half),
        )
        .await
        .map_err(|_| HandshakeError::Timeout)??;

        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        tracing::debug!(%id, path = %request.path, "websocket upgrade complete");

        Ok(Self {
            id,
            reader: Mutex::new(reader),
            writer: Mutex::new(write_half),
            max_payload: config.max_payload,
        })
    }
}

impl<S> Connection for WebSocketConnection<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let mut writer = self.writer.lock().await;
        frame::write_frame(&mut *writer, data)
            .await
            .map_err(TransportError::SendFailed)
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut reader = self.reader.lock().await;
        Ok(frame::decode_frame(&mut *reader, self.max_payload).await?)
    }

    async fn close(&self) -> Result<(), Self::Error> {
        let mut writer = self.writer.lock().await;
        writer
            .write_all(&frame::encode_close_frame())
            .await
            .map_err(TransportError::SendFailed)?;
        writer.shutdown().await.map_err(TransportError::SendFailed)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
