//! Events that producers feed into the dispatcher.

use bytes::Bytes;
use relaycast_transport::ConnectionId;

use crate::PeerHandle;

/// One thing that happened on a connection.
///
/// There is deliberately no error variant: a failed read is reported as
/// [`Event::Left`], and everything the dispatcher rejects is handled
/// inside the dispatcher.
#[derive(Debug, Clone)]
pub enum Event {
    /// A connection was accepted.
    Joined { handle: PeerHandle },

    /// A connection produced one chunk of bytes.
    DataReceived { handle: PeerHandle, payload: Bytes },

    /// A connection's read side ended (EOF, error, or local close).
    Left { handle: PeerHandle },
}

impl Event {
    /// Returns the connection this event belongs to.
    pub fn peer(&self) -> ConnectionId {
        self.handle().id()
    }

    /// Returns the handle carried by the event.
    pub fn handle(&self) -> &PeerHandle {
        match self {
            Self::Joined { handle }
            | Self::DataReceived { handle, .. }
            | Self::Left { handle } => handle,
        }
    }

    /// Short name used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Joined { .. } => "joined",
            Self::DataReceived { .. } => "data",
            Self::Left { .. } => "left",
        }
    }
}
