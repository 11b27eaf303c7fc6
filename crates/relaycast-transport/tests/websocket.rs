//! Integration tests for the WebSocket transport.
//!
//! These spin up a real WebSocket server and client to verify that frames
//! map onto opaque messages in both directions.

#[cfg(feature = "websocket")]
mod websocket {
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use relaycast_transport::{Connection, Transport, WebSocketTransport};
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpStream;
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    /// Helper: binds a transport on a random port, connects one client and
    /// returns both ends.
    async fn accept_one() -> (
        relaycast_transport::WebSocketConnection,
        ClientWs,
    ) {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("should have local addr");

        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });

        let (client, _) =
            tokio_tungstenite::connect_async(format!("ws://{addr}"))
                .await
                .expect("client should connect");
        let server_conn = server_handle.await.expect("task should complete");
        (server_conn, client)
    }

    #[tokio::test]
    async fn test_websocket_accept_and_send_receive() {
        let (server_conn, mut client_ws) = accept_one().await;

        assert!(server_conn.id().into_inner() > 0);
        assert_eq!(server_conn.origin().to_string(), "127.0.0.1");

        server_conn
            .send(b"hello from server")
            .await
            .expect("send should succeed");
        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"hello from server");

        client_ws
            .send(Message::Binary(b"hello from client".to_vec().into()))
            .await
            .unwrap();
        let received = server_conn
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(received, b"hello from client");

        client_ws
            .send(Message::Text("text frame".into()))
            .await
            .unwrap();
        let received = server_conn.recv().await.unwrap().unwrap();
        assert_eq!(received, b"text frame");
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_client_close() {
        let (server_conn, mut client_ws) = accept_one().await;

        client_ws.send(Message::Close(None)).await.unwrap();

        let result = server_conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_websocket_send_while_recv_pending() {
        // The read half must not block the write half.
        let (server_conn, mut client_ws) = accept_one().await;
        let server_conn = std::sync::Arc::new(server_conn);

        let reader = {
            let conn = std::sync::Arc::clone(&server_conn);
            tokio::spawn(async move { conn.recv().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        tokio::time::timeout(
            Duration::from_secs(2),
            server_conn.send(b"while reading"),
        )
        .await
        .expect("send should not wait on recv")
        .unwrap();
        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"while reading");

        server_conn.close().await.unwrap();
        let result = tokio::time::timeout(Duration::from_secs(2), reader)
            .await
            .expect("close should wake recv")
            .unwrap()
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_websocket_silent_client_does_not_block_accept() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind")
            .with_handshake_timeout(Duration::from_millis(300));
        let addr = transport.local_addr().expect("should have local addr");

        // Connects at the TCP level but never sends a handshake.
        let mut silent = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let server = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });
        let (_client, _) = tokio::time::timeout(
            Duration::from_secs(3),
            tokio_tungstenite::connect_async(format!("ws://{addr}")),
        )
        .await
        .expect("handshake should not queue behind the silent client")
        .expect("client should connect");
        let conn = tokio::time::timeout(Duration::from_secs(3), server)
            .await
            .expect("accept should return")
            .unwrap();
        assert!(conn.id().into_inner() > 0);

        // Past the timeout the silent socket is dropped.
        let mut buf = [0u8; 16];
        let read =
            tokio::time::timeout(Duration::from_secs(2), silent.read(&mut buf))
                .await
                .expect("silent client should be disconnected");
        assert!(matches!(read, Ok(0) | Err(_)));
    }
}
