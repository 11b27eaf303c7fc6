//! Error types for the dispatch layer.

use relaycast_transport::ConnectionId;

/// Errors that can occur when talking to the dispatcher or to a peer's
/// outbound channel.
///
/// Neither is expected during normal operation: both mean the task on the
/// other end of a channel has already exited.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The dispatcher task has stopped and no longer accepts events.
    #[error("dispatcher is unavailable")]
    Unavailable,

    /// The peer's writer task is gone, so nothing can be delivered to it.
    #[error("peer {0} is unreachable")]
    PeerUnreachable(ConnectionId),
}
