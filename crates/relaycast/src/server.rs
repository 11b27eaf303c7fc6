//! `RelayServer` builder and accept loop.
//!
//! This is the entry point for running a relay. It ties the layers
//! together: transport → per-connection handler → dispatcher.

use std::net::SocketAddr;
use std::sync::Arc;

use relaycast_dispatch::{
    DispatcherHandle, PeerHandle, RelayPolicy, spawn_dispatcher,
};
use relaycast_transport::{Connection, TcpTransport, Transport};
#[cfg(feature = "websocket")]
use relaycast_transport::WebSocketTransport;

use crate::handler::serve_connection;
use crate::{RelayConfig, RelayError};

/// Builder for configuring and starting a relay.
///
/// # Example
///
/// ```rust,no_run
/// use relaycast::prelude::*;
///
/// # async fn start() -> Result<(), RelayError> {
/// let server = RelayServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct RelayServerBuilder {
    config: RelayConfig,
}

impl RelayServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: RelayConfig::default(),
        }
    }

    /// Replaces every setting with `config`.
    pub fn config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the per-read buffer size (TCP only).
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.read_buffer_size = size;
        self
    }

    /// Sets the throttle and ban policy.
    pub fn policy(mut self, policy: RelayPolicy) -> Self {
        self.config.policy = policy;
        self
    }

    /// Binds a raw TCP listener and starts the dispatcher.
    ///
    /// # Errors
    /// [`RelayError::Transport`] if the address cannot be bound.
    pub async fn build(self) -> Result<RelayServer<TcpTransport>, RelayError> {
        let transport = TcpTransport::bind(&self.config.bind_addr)
            .await?
            .with_read_buffer_size(self.config.read_buffer_size);
        Ok(RelayServer::new(transport, self.config.policy))
    }

    /// Binds a WebSocket listener and starts the dispatcher.
    #[cfg(feature = "websocket")]
    pub async fn build_websocket(
        self,
    ) -> Result<RelayServer<WebSocketTransport>, RelayError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;
        Ok(RelayServer::new(transport, self.config.policy))
    }
}

impl Default for RelayServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A relay bound to a transport.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct RelayServer<T: Transport> {
    transport: T,
    dispatcher: DispatcherHandle,
}

impl RelayServer<TcpTransport> {
    /// Creates a new builder.
    pub fn builder() -> RelayServerBuilder {
        RelayServerBuilder::new()
    }
}

impl<T: Transport> RelayServer<T> {
    /// Wraps an already-bound transport and spawns the dispatcher.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(transport: T, policy: RelayPolicy) -> Self {
        Self {
            transport,
            dispatcher: spawn_dispatcher(policy),
        }
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Returns a handle to the server's dispatcher.
    pub fn dispatcher(&self) -> DispatcherHandle {
        self.dispatcher.clone()
    }

    /// Runs the accept loop.
    ///
    /// A failed accept is logged and the loop continues. Runs until the
    /// process is terminated; only returns if the dispatcher has stopped.
    pub async fn run(mut self) -> Result<(), RelayError> {
        match self.local_addr() {
            Ok(addr) => tracing::info!(%addr, "relay running"),
            Err(_) => tracing::info!("relay running"),
        }

        loop {
            match self.transport.accept().await {
                Ok(conn) => self.admit(conn)?,
                Err(e) => {
                    tracing::error!(error = %e, "could not accept a connection");
                }
            }
        }
    }

    /// Announces a new connection and starts its reader and writer.
    ///
    /// `Joined` is enqueued before the reader exists, so the dispatcher
    /// always sees it before any data from the same connection.
    fn admit(&self, conn: T::Connection) -> Result<(), RelayError> {
        let conn = Arc::new(conn);
        let (handle, outbound) = PeerHandle::new(conn.id(), conn.origin());
        tracing::info!(
            peer = %handle.id(),
            origin = %handle.origin(),
            "accepted connection"
        );

        self.dispatcher.joined(handle.clone())?;
        tokio::spawn(serve_connection(
            conn,
            handle,
            outbound,
            self.dispatcher.clone(),
        ));
        Ok(())
    }
}
