//! Raw TCP transport.
//!
//! There is no framing: whatever a single read returns, up to the
//! configured buffer size, is handed up as one message.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, watch};

use crate::{Connection, ConnectionId, Origin, Transport, TransportError};

/// Bytes requested per read when no size is configured.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64;

/// A TCP [`Transport`] that listens for incoming connections.
pub struct TcpTransport {
    listener: TcpListener,
    read_buffer_size: usize,
}

impl TcpTransport {
    /// Binds a new TCP transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await.map_err(|source| {
            TransportError::BindFailed {
                addr: addr.to_string(),
                source,
            }
        })?;
        tracing::info!(addr, "TCP transport listening");
        Ok(Self {
            listener,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        })
    }

    /// Sets the per-read buffer size for connections accepted from now on.
    ///
    /// A size of 0 is raised to 1.
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let conn = TcpConnection::from_stream(
            stream,
            addr,
            self.read_buffer_size,
        );
        tracing::debug!(id = %conn.id, %addr, "accepted TCP connection");
        Ok(conn)
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// A single TCP connection, split into independently locked halves.
pub struct TcpConnection {
    id: ConnectionId,
    peer_addr: SocketAddr,
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
    closed: watch::Sender<bool>,
    read_buffer_size: usize,
}

impl TcpConnection {
    /// Wraps an already-connected stream.
    pub fn from_stream(
        stream: TcpStream,
        peer_addr: SocketAddr,
        read_buffer_size: usize,
    ) -> Self {
        let (reader, writer) = stream.into_split();
        let (closed, _) = watch::channel(false);
        Self {
            id: ConnectionId::next(),
            peer_addr,
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            closed,
            read_buffer_size: read_buffer_size.max(1),
        }
    }

    /// Returns the remote socket address, port included.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    fn closed_error(&self) -> TransportError {
        TransportError::ConnectionClosed(format!("{} is closed", self.id))
    }
}

impl Connection for TcpConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Err(self.closed_error());
        }

        // A peer that stops reading can park this write forever; closing
        // the connection abandons it and releases the write half.
        let mut writer = tokio::select! {
            writer = self.writer.lock() => writer,
            _ = closed.changed() => return Err(self.closed_error()),
        };
        tokio::select! {
            written = writer.write_all(data) => {
                written.map_err(TransportError::SendFailed)
            }
            _ = closed.changed() => Err(self.closed_error()),
        }
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Ok(None);
        }

        let mut reader = self.reader.lock().await;
        let mut buf = vec![0u8; self.read_buffer_size];
        let read = tokio::select! {
            read = reader.read(&mut buf) => read,
            _ = closed.changed() => return Ok(None),
        };

        match read {
            Ok(0) => Ok(None),
            Ok(n) => {
                buf.truncate(n);
                Ok(Some(buf))
            }
            Err(e) => Err(TransportError::ReceiveFailed(e)),
        }
    }

    /// Marks the connection closed, then shuts down the write half.
    ///
    /// Setting the flag first wakes any pending `recv` or `send`, so the
    /// writer lock is released before the shutdown needs it.
    async fn close(&self) -> Result<(), Self::Error> {
        if self.closed.send_replace(true) {
            return Ok(());
        }
        self.writer
            .lock()
            .await
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn origin(&self) -> Origin {
        Origin::from(self.peer_addr)
    }
}
