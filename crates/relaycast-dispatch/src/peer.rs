//! Peer handles: the dispatcher's write side of a connection.
//!
//! The dispatcher never touches a socket. Each connection has an
//! unbounded outbound channel drained by its own writer task, and the
//! dispatcher only pushes [`Outbound`] items into it. A slow peer can
//! therefore never stall the event loop.

use bytes::Bytes;
use relaycast_transport::{ConnectionId, Origin};
use tokio::sync::mpsc;

use crate::DispatchError;

/// A side effect the dispatcher issues onto a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Write these bytes verbatim.
    Data(Bytes),
    /// Close the connection. Items queued before this are written first.
    Close,
}

/// Receiving end of a peer's outbound channel, owned by its writer task.
pub type OutboundReceiver = mpsc::UnboundedReceiver<Outbound>;

/// Handle to one peer connection.
///
/// Cheap to clone. Carries the connection's identity and origin so the
/// dispatcher can key its registry and ban list without asking the
/// transport.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    id: ConnectionId,
    origin: Origin,
    sender: mpsc::UnboundedSender<Outbound>,
}

impl PeerHandle {
    /// Creates a handle and the receiver its writer task should drain.
    pub fn new(id: ConnectionId, origin: Origin) -> (Self, OutboundReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { id, origin, sender }, receiver)
    }

    /// Returns the connection identity.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the network origin of the connection.
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Queues bytes for delivery.
    ///
    /// # Errors
    /// [`DispatchError::PeerUnreachable`] if the writer task has exited.
    pub fn send(&self, data: Bytes) -> Result<(), DispatchError> {
        self.sender
            .send(Outbound::Data(data))
            .map_err(|_| DispatchError::PeerUnreachable(self.id))
    }

    /// Queues a close. Does nothing if the writer task is already gone.
    pub fn close(&self) {
        let _ = self.sender.send(Outbound::Close);
    }
}
