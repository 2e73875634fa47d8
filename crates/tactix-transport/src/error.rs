/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The opening HTTP upgrade was rejected.
    #[error("handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    /// A frame could not be decoded.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
}

/// Errors produced while decoding a WebSocket frame.
///
/// Every variant is fatal to the connection that produced it.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The stream ended in the middle of a frame.
    #[error("truncated frame: {0}")]
    Truncated(#[source] std::io::Error),

    /// The header carried bits this codec does not accept.
    #[error("malformed frame header: {0}")]
    MalformedHeader(&'static str),

    /// Only text frames are accepted.
    #[error("unsupported opcode {0:#x}")]
    UnsupportedOpcode(u8),

    /// A frame arrived with FIN unset.
    #[error("fragmented messages are not supported")]
    Fragmented,

    /// The declared payload length exceeds the configured limit.
    #[error("payload of {len} bytes exceeds limit of {max}")]
    PayloadTooLarge { len: u64, max: usize },
}

/// Errors produced while performing the HTTP upgrade.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    /// The request line or a header line could not be parsed.
    #[error("malformed request: {0}")]
    Malformed(String),

    /// The request was not a `GET`.
    #[error("unsupported method {0}")]
    Method(String),

    /// The `Upgrade` header was missing or not `websocket`.
    #[error("missing websocket upgrade header")]
    MissingUpgrade,

    /// The `Sec-WebSocket-Key` header was missing.
    #[error("missing Sec-WebSocket-Key header")]
    MissingKey,

    /// The request head exceeded the size limits.
    #[error("request head too large")]
    TooLarge,

    /// The client did not finish the handshake in time.
    #[error("handshake timed out")]
    Timeout,

    /// Reading the request or writing the response failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
