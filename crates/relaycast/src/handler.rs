//! Per-connection plumbing: one reader loop and one writer task.
//!
//! Neither side makes a decision. The reader turns every chunk into an
//! event; the writer applies whatever the dispatcher queued on the peer's
//! handle. The flow is:
//!   1. Spawn the writer, draining the peer's outbound channel
//!   2. Loop: receive a chunk → enqueue `DataReceived`
//!   3. On EOF, read error, or local close → enqueue `Left`, then close
//!
//! `Left` goes out before the close so that nothing on the write side can
//! hold up the registry cleanup.

use std::sync::Arc;

use bytes::Bytes;
use relaycast_dispatch::{
    DispatcherHandle, Outbound, OutboundReceiver, PeerHandle,
};
use relaycast_transport::Connection;

/// Runs a connection from just after its `Joined` event until it is gone.
pub(crate) async fn serve_connection<C: Connection>(
    conn: Arc<C>,
    handle: PeerHandle,
    outbound: OutboundReceiver,
    dispatcher: DispatcherHandle,
) {
    let peer = handle.id();
    tokio::spawn(write_outbound(Arc::clone(&conn), outbound));

    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::debug!(%peer, "connection closed");
                break;
            }
            Err(e) => {
                tracing::info!(%peer, error = %e, "could not read from peer");
                break;
            }
        };

        if dispatcher.data(handle.clone(), Bytes::from(data)).is_err() {
            tracing::warn!(%peer, "dispatcher gone, dropping connection");
            break;
        }
    }

    let _ = dispatcher.left(handle);
    if let Err(e) = conn.close().await {
        tracing::trace!(%peer, error = %e, "close after read loop failed");
    }
}

/// Applies queued side effects to the connection, in order.
///
/// Ends on [`Outbound::Close`], on the first failed write (which closes
/// the connection and so wakes the reader), or once every handle to the
/// peer is gone.
async fn write_outbound<C: Connection>(
    conn: Arc<C>,
    mut outbound: OutboundReceiver,
) {
    let peer = conn.id();
    while let Some(item) = outbound.recv().await {
        match item {
            Outbound::Data(bytes) => {
                if let Err(e) = conn.send(&bytes).await {
                    tracing::warn!(%peer, error = %e, "could not send data");
                    let _ = conn.close().await;
                    break;
                }
            }
            Outbound::Close => {
                if let Err(e) = conn.close().await {
                    tracing::debug!(%peer, error = %e, "close failed");
                }
                break;
            }
        }
    }
}
