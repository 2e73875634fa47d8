//! Interoperability tests for the hand-written WebSocket transport.
//!
//! A `tokio-tungstenite` client plays the browser: if an independent
//! implementation can complete the handshake and exchange frames with
//! ours, the accept key, framing and masking are right.

use futures_util::{SinkExt, StreamExt};
use tactix_transport::{
    Connection, FrameError, TransportError, WebSocketConnection, WebSocketTransport,
};
use tokio_tungstenite::tungstenite::Message;

type ClientStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Binds on an OS-assigned port and returns the transport and its address.
async fn bind() -> (WebSocketTransport, String) {
    let transport = WebSocketTransport::bind("127.0.0.1:0")
        .await
        .expect("should bind");
    let addr = transport.local_addr().expect("should have addr").to_string();
    (transport, addr)
}

/// Accepts one TCP connection and runs the server handshake on it.
async fn accept(transport: WebSocketTransport) -> Result<WebSocketConnection, TransportError> {
    let (stream, _) = transport.accept_tcp().await?;
    WebSocketConnection::upgrade(stream, transport.config()).await
}

async fn connect_client(addr: &str) -> ClientStream {
    let url = format!("ws://{addr}");
    let (ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("client should connect");
    ws
}

#[tokio::test]
async fn test_websocket_accept_and_send_receive() {
    let (transport, addr) = bind().await;
    let server_handle =
        tokio::spawn(async move { accept(transport).await.expect("should accept") });

    let mut client_ws = connect_client(&addr).await;
    let server_conn = server_handle.await.expect("task should complete");
    assert!(server_conn.id().into_inner() > 0);

    // Server sends, client receives.
    server_conn
        .send(b"hello from server")
        .await
        .expect("send should succeed");
    let msg = client_ws.next().await.unwrap().unwrap();
    assert!(msg.is_text());
    assert_eq!(msg.into_data().as_ref(), b"hello from server");

    // Client sends (masked), server receives.
    client_ws
        .send(Message::Text("hello from client".into()))
        .await
        .unwrap();
    let received = server_conn
        .recv()
        .await
        .expect("recv should succeed")
        .expect("should have data");
    assert_eq!(received, b"hello from client");

    server_conn.close().await.expect("close should succeed");
}

#[tokio::test]
async fn test_websocket_large_message_uses_extended_length() {
    let (transport, addr) = bind().await;
    let server_handle =
        tokio::spawn(async move { accept(transport).await.expect("should accept") });
    let mut client_ws = connect_client(&addr).await;
    let server_conn = server_handle.await.unwrap();

    let big = "x".repeat(70_000);
    client_ws.send(Message::Text(big.clone().into())).await.unwrap();
    let received = server_conn.recv().await.unwrap().unwrap();
    assert_eq!(received.len(), 70_000);

    server_conn.send(big.as_bytes()).await.unwrap();
    let msg = client_ws.next().await.unwrap().unwrap();
    assert_eq!(msg.into_data().len(), 70_000);
}

#[tokio::test]
async fn test_websocket_recv_returns_none_on_client_close() {
    let (transport, addr) = bind().await;
    let server_handle =
        tokio::spawn(async move { accept(transport).await.expect("should accept") });
    let mut client_ws = connect_client(&addr).await;
    let server_conn = server_handle.await.unwrap();

    client_ws.send(Message::Close(None)).await.unwrap();

    let result = server_conn.recv().await.expect("recv should not error");
    assert!(result.is_none(), "should return None on client close");
}

#[tokio::test]
async fn test_websocket_binary_message_is_unsupported() {
    let (transport, addr) = bind().await;
    let server_handle =
        tokio::spawn(async move { accept(transport).await.expect("should accept") });
    let mut client_ws = connect_client(&addr).await;
    let server_conn = server_handle.await.unwrap();

    client_ws
        .send(Message::Binary(vec![1, 2, 3].into()))
        .await
        .unwrap();

    let err = server_conn.recv().await.unwrap_err();
    assert!(matches!(
        err,
        TransportError::Frame(FrameError::UnsupportedOpcode(0x2))
    ));
}

#[tokio::test]
async fn test_websocket_plain_http_request_gets_bad_request() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let (transport, addr) = bind().await;
    let server_handle = tokio::spawn(async move { accept(transport).await });

    let mut stream = tokio::net::TcpStream::connect(&addr).await.unwrap();
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with("HTTP/1.1 400 Bad Request"));
    assert!(server_handle.await.unwrap().is_err());
}
