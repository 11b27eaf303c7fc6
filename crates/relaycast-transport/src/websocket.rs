//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! Each binary or text frame is one message. Ping, pong and raw frames
//! are skipped.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

use crate::{Connection, ConnectionId, Origin, Transport, TransportError};

type WsStream = tokio_tungstenite::WebSocketStream<TcpStream>;

/// How long a client gets to finish the opening handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long `close` waits for the close frame to be written.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// A WebSocket-based [`Transport`] that listens for incoming connections.
///
/// Handshakes run on their own tasks, so a client that connects and then
/// stays silent holds up nobody but itself.
pub struct WebSocketTransport {
    listener: TcpListener,
    handshake_timeout: Duration,
    ready_tx: mpsc::UnboundedSender<WebSocketConnection>,
    ready_rx: mpsc::UnboundedReceiver<WebSocketConnection>,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await.map_err(|source| {
            TransportError::BindFailed {
                addr: addr.to_string(),
                source,
            }
        })?;
        tracing::info!(addr, "WebSocket transport listening");
        let (ready_tx, ready_rx) = mpsc::unbounded_channel();
        Ok(Self {
            listener,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            ready_tx,
            ready_rx,
        })
    }

    /// Sets how long a client may take to complete the handshake before
    /// its socket is dropped.
    pub fn with_handshake_timeout(mut self, limit: Duration) -> Self {
        self.handshake_timeout = limit;
        self
    }

    fn spawn_handshake(&self, stream: TcpStream, addr: SocketAddr) {
        let ready = self.ready_tx.clone();
        let limit = self.handshake_timeout;
        tokio::spawn(async move {
            match timeout(limit, tokio_tungstenite::accept_async(stream)).await {
                Ok(Ok(ws)) => {
                    let conn = WebSocketConnection::new(ws, addr);
                    tracing::debug!(id = %conn.id, %addr, "accepted WebSocket connection");
                    let _ = ready.send(conn);
                }
                Ok(Err(e)) => {
                    tracing::info!(%addr, error = %e, "WebSocket handshake failed");
                }
                Err(_) => {
                    tracing::info!(%addr, ?limit, "WebSocket handshake timed out");
                }
            }
        });
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        loop {
            tokio::select! {
                Some(conn) = self.ready_rx.recv() => return Ok(conn),
                accepted = self.listener.accept() => {
                    let (stream, addr) =
                        accepted.map_err(TransportError::AcceptFailed)?;
                    self.spawn_handshake(stream, addr);
                }
            }
        }
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// A single WebSocket connection.
pub struct WebSocketConnection {
    id: ConnectionId,
    peer_addr: SocketAddr,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
    closed: watch::Sender<bool>,
}

impl WebSocketConnection {
    fn new(ws: WsStream, peer_addr: SocketAddr) -> Self {
        let (sink, stream) = ws.split();
        let (closed, _) = watch::channel(false);
        Self {
            id: ConnectionId::next(),
            peer_addr,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            closed,
        }
    }

    fn closed_error(&self) -> TransportError {
        TransportError::ConnectionClosed(format!("{} is closed", self.id))
    }

    /// Returns the remote socket address, port included.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

fn broken_pipe(
    e: tokio_tungstenite::tungstenite::Error,
) -> TransportError {
    TransportError::SendFailed(std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        e,
    ))
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Err(self.closed_error());
        }

        let msg = Message::Binary(data.to_vec().into());
        let mut sink = tokio::select! {
            sink = self.sink.lock() => sink,
            _ = closed.changed() => return Err(self.closed_error()),
        };
        tokio::select! {
            sent = sink.send(msg) => sent.map_err(broken_pipe),
            _ = closed.changed() => Err(self.closed_error()),
        }
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Ok(None);
        }

        let mut stream = self.stream.lock().await;
        loop {
            let msg = tokio::select! {
                msg = stream.next() => msg,
                _ = closed.changed() => return Ok(None),
            };
            match msg {
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.into()));
                }
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // skip ping/pong/frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    /// Marks the connection closed and sends a close frame.
    ///
    /// A peer that is not reading cannot take the close frame; after
    /// `CLOSE_TIMEOUT` the socket is left for drop to tear down.
    async fn close(&self) -> Result<(), Self::Error> {
        if self.closed.send_replace(true) {
            return Ok(());
        }
        let mut sink = self.sink.lock().await;
        match timeout(CLOSE_TIMEOUT, sink.close()).await {
            Ok(closed) => closed.map_err(broken_pipe),
            Err(_) => Err(self.closed_error()),
        }
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn origin(&self) -> Origin {
        Origin::from(self.peer_addr)
    }
}
