//! # Relaycast
//!
//! A real-time broadcast relay: whatever one connected peer sends is
//! forwarded verbatim to every other connected peer.
//!
//! All shared state (who is connected, who is banned) lives in one
//! dispatcher task. The accept loop and each connection's reader only
//! send it events; it answers with writes and closes on peer handles.
//! Peers that send faster than the policy allows collect strikes, and
//! enough strikes ban their address for a while.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use relaycast::prelude::*;
//!
//! # async fn start() -> Result<(), RelayError> {
//! let server = RelayServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .policy(RelayPolicy::default())
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod logging;
mod server;

pub use config::RelayConfig;
pub use error::RelayError;
pub use logging::init_logging;
pub use server::{RelayServer, RelayServerBuilder};

/// Re-exports for building and running a relay.
pub mod prelude {
    pub use crate::{
        RelayConfig, RelayError, RelayServer, RelayServerBuilder,
        init_logging,
    };
    pub use relaycast_dispatch::{
        DispatcherHandle, DispatcherStats, RelayPolicy,
    };
    pub use relaycast_transport::{Connection, Transport};
}
