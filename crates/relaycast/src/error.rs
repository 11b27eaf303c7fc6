//! Unified error type for Relaycast.

use relaycast_dispatch::DispatchError;
use relaycast_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attributes let `?` convert sub-crate errors.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The dispatcher or a peer's writer is gone.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// The configuration could not be loaded.
    #[error("invalid configuration: {0}")]
    Config(String),
}
