//! Server side of the WebSocket opening handshake (RFC 6455 section 4.2).
//!
//! The client sends an HTTP/1.1 `GET` carrying `Upgrade: websocket` and a
//! random `Sec-WebSocket-Key`. The server answers `101 Switching Protocols`
//! with `Sec-WebSocket-Accept` set to `base64(sha1(key + GUID))`, after
//! which the TCP stream carries frames instead of HTTP.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use sha1::{Digest, Sha1};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::HandshakeError;

/// Magic GUID appended to the client key before hashing.
pub const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Upper bound on the request line plus all header lines.
pub const MAX_REQUEST_HEAD_BYTES: usize = 8 * 1024;

/// Upper bound on the number of header lines.
pub const MAX_HEADERS: usize = 64;

/// Sent when the upgrade request fails validation.
pub const BAD_REQUEST_RESPONSE: &str =
    "HTTP/1.1 400 Bad Request\r\nConnection: close\r\nContent-Length: 0\r\n\r\n";

/// Computes the `Sec-WebSocket-Accept` value for a client key.
pub fn compute_accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WEBSOCKET_GUID.as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// Builds the `101 Switching Protocols` response for an accept key.
pub fn switching_protocols_response(accept_key: &str) -> String {
    format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept_key}\r\n\r\n"
    )
}

/// A parsed HTTP request head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
}

impl UpgradeRequest {
    /// Returns the first header named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Checks that this is a websocket upgrade and returns the client key.
    pub fn websocket_key(&self) -> Result<&str, HandshakeError> {
        if self.method != "GET" {
            return Err(HandshakeError::Method(self.method.clone()));
        }
        match self.header("upgrade") {
            Some(v) if v.eq_ignore_ascii_case("websocket") => {}
            _ => return Err(HandshakeError::MissingUpgrade),
        }
        match self.header("sec-websocket-key") {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(HandshakeError::MissingKey),
        }
    }
}

/// Reads an HTTP request head up to and including the blank line.
///
/// Bytes after the blank line stay in `reader`'s buffer.
pub async fn read_request<R>(reader: &mut R) -> Result<UpgradeRequest, HandshakeError>
where
    R: AsyncBufRead + Unpin,
{
    let mut consumed = 0usize;
    let mut lines = Vec::new();
    loop {
        let mut line = String::new();
        let budget = (MAX_REQUEST_HEAD_BYTES - consumed) as u64;
        let n = (&mut *reader).take(budget).read_line(&mut line).await?;
        consumed += n;
        if !line.ends_with('\n') {
            if consumed >= MAX_REQUEST_HEAD_BYTES {
                return Err(HandshakeError::TooLarge);
            }
            return Err(HandshakeError::Malformed(
                "request ended before blank line".into(),
            ));
        }
        let line = line.trim_end_matches(['\r', '\n']).to_owned();
        if line.is_empty() {
            break;
        }
        lines.push(line);
        if lines.len() > MAX_HEADERS + 1 {
            return Err(HandshakeError::TooLarge);
        }
    }

    let mut lines = lines.into_iter();
    let request_line = lines
        .next()
        .ok_or_else(|| HandshakeError::Malformed("empty request".into()))?;
    let parts: Vec<&str> = request_line.split_whitespace().collect();
    let (method, path) = match parts.as_slice() {
        [method, path, version] if version.starts_with("HTTP/1.") => {
            ((*method).to_owned(), (*path).to_owned())
        }
        _ => return Err(HandshakeError::Malformed(request_line.clone())),
    };

    let headers = lines
        .map(|line| match line.split_once(':') {
            Some((name, value)) => {
                Ok((name.trim().to_owned(), value.trim().to_owned()))
            }
            None => Err(HandshakeError::Malformed(line)),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(UpgradeRequest {
        method,
        path,
        headers,
    })
}

/// Runs the server half of the handshake.
///
/// On success the `101` response has been written and flushed. When the
/// request is not a valid upgrade, a `400` is written before the error is
/// returned.
pub async fn server_handshake<R, W>(
    reader: &mut R,
    writer: &mut W,
) -> Result<UpgradeRequest, HandshakeError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let request = match read_request(reader).await {
        Ok(request) => request,
        Err(HandshakeError::Io(e)) => return Err(HandshakeError::Io(e)),
        Err(e) => {
            reject(writer).await;
            return Err(e);
        }
    };

    let accept = match request.websocket_key() {
        Ok(key) => compute_accept_key(key),
        Err(e) => {
            reject(writer).await;
            return Err(e);
        }
    };

    writer
        .write_all(switching_protocols_response(&accept).as_bytes())
        .await?;
    writer.flush().await?;
    Ok(request)
}

async fn reject<W: AsyncWrite + Unpin>(writer: &mut W) {
    if let Err(e) = writer.write_all(BAD_REQUEST_RESPONSE.as_bytes()).await {
        tracing::debug!(error = %e, "failed to write 400 response");
        return;
    }
    let _ = writer.flush().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "GET /ws HTTP/1.1\r\n\
        Host: localhost:9090\r\n\
        Upgrade: websocket\r\n\
        Connection: Upgrade\r\n\
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
        Sec-WebSocket-Version: 13\r\n\r\n";

    async fn handshake(request: &str) -> (Result<UpgradeRequest, HandshakeError>, String) {
        let mut reader = request.as_bytes();
        let mut out = Vec::new();
        let result = server_handshake(&mut reader, &mut out).await;
        (result, String::from_utf8(out).unwrap())
    }

    // =========================================================================
    // compute_accept_key
    // =========================================================================

    #[test]
    fn test_compute_accept_key_matches_rfc_example() {
        assert_eq!(
            compute_accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    // =========================================================================
    // read_request
    // =========================================================================

    #[tokio::test]
    async fn test_read_request_parses_method_path_and_headers() {
        let mut reader = VALID.as_bytes();
        let request = read_request(&mut reader).await.unwrap();
        assert_eq!(request.method, "GET");
        assert_eq!(request.path, "/ws");
        assert_eq!(request.header("HOST"), Some("localhost:9090"));
        assert_eq!(request.headers.len(), 5);
    }

    #[tokio::test]
    async fn test_read_request_leaves_trailing_bytes_unread() {
        let input = format!("{VALID}\u{81}");
        let mut reader = input.as_bytes();
        read_request(&mut reader).await.unwrap();
        assert_eq!(reader, "\u{81}".as_bytes());
    }

    #[tokio::test]
    async fn test_read_request_missing_blank_line_is_malformed() {
        let mut reader = "GET / HTTP/1.1\r\nHost: x\r\n".as_bytes();
        let err = read_request(&mut reader).await.unwrap_err();
        assert!(matches!(err, HandshakeError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_read_request_oversized_head_is_rejected() {
        let input = format!(
            "GET / HTTP/1.1\r\nX-Pad: {}\r\n\r\n",
            "a".repeat(MAX_REQUEST_HEAD_BYTES)
        );
        let mut reader = input.as_bytes();
        let err = read_request(&mut reader).await.unwrap_err();
        assert!(matches!(err, HandshakeError::TooLarge));
    }

    #[tokio::test]
    async fn test_read_request_header_without_colon_is_malformed() {
        let mut reader = "GET / HTTP/1.1\r\nbogus\r\n\r\n".as_bytes();
        let err = read_request(&mut reader).await.unwrap_err();
        assert!(matches!(err, HandshakeError::Malformed(_)));
    }

    // =========================================================================
    // server_handshake
    // =========================================================================

    #[tokio::test]
    async fn test_server_handshake_valid_request_switches_protocols() {
        let (result, response) = handshake(VALID).await;
        assert!(result.is_ok());
        assert!(response.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(response.contains("Upgrade: websocket\r\n"));
        assert!(response.contains("Connection: Upgrade\r\n"));
        assert!(
            response.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n")
        );
        assert!(response.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn test_server_handshake_upgrade_value_is_case_insensitive() {
        let request = VALID.replace("Upgrade: websocket", "upgrade: WebSocket");
        let (result, _) = handshake(&request).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_server_handshake_missing_upgrade_is_bad_request() {
        let request = VALID.replace("Upgrade: websocket\r\n", "");
        let (result, response) = handshake(&request).await;
        assert!(matches!(result, Err(HandshakeError::MissingUpgrade)));
        assert_eq!(response, BAD_REQUEST_RESPONSE);
    }

    #[tokio::test]
    async fn test_server_handshake_wrong_upgrade_is_bad_request() {
        let request = VALID.replace("Upgrade: websocket", "Upgrade: h2c");
        let (result, response) = handshake(&request).await;
        assert!(matches!(result, Err(HandshakeError::MissingUpgrade)));
        assert_eq!(response, BAD_REQUEST_RESPONSE);
    }

    #[tokio::test]
    async fn test_server_handshake_missing_key_is_bad_request() {
        let request = VALID.replace("Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n", "");
        let (result, response) = handshake(&request).await;
        assert!(matches!(result, Err(HandshakeError::MissingKey)));
        assert_eq!(response, BAD_REQUEST_RESPONSE);
    }

    #[tokio::test]
    async fn test_server_handshake_post_is_rejected() {
        let request = VALID.replacen("GET", "POST", 1);
        let (result, response) = handshake(&request).await;
        assert!(matches!(result, Err(HandshakeError::Method(m)) if m == "POST"));
        assert_eq!(response, BAD_REQUEST_RESPONSE);
    }
}
