//! The live-peer registry.
//!
//! Keyed by [`ConnectionId`], never by origin: two connections from the
//! same host are two peers, and a disconnect always finds its own entry.
//! Not thread-safe on purpose; only the dispatcher task ever holds one.

use std::collections::HashMap;

use relaycast_transport::{ConnectionId, Origin};
use tokio::time::Instant;

use crate::PeerHandle;

/// Bookkeeping for one registered peer.
#[derive(Debug)]
pub struct PeerEntry {
    handle: PeerHandle,
    pub(crate) last_accepted_at: Instant,
    pub(crate) strike_count: u32,
    closing: bool,
}

impl PeerEntry {
    /// Creates an entry for a peer that joined at `now`.
    ///
    /// The join time counts as the last accepted message, so a message
    /// sent right after joining is throttled.
    pub fn new(handle: PeerHandle, now: Instant) -> Self {
        Self {
            handle,
            last_accepted_at: now,
            strike_count: 0,
            closing: false,
        }
    }

    pub fn handle(&self) -> &PeerHandle {
        &self.handle
    }

    pub fn origin(&self) -> Origin {
        self.handle.origin()
    }

    pub fn last_accepted_at(&self) -> Instant {
        self.last_accepted_at
    }

    pub fn strike_count(&self) -> u32 {
        self.strike_count
    }

    /// `true` once the dispatcher has closed this peer and is only
    /// waiting for its `Left` event.
    pub fn is_closing(&self) -> bool {
        self.closing
    }

    pub(crate) fn mark_closing(&mut self) {
        self.closing = true;
    }
}

/// All currently registered peers.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: HashMap<ConnectionId, PeerEntry>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entry, returning the one it replaced, if any.
    pub fn insert(&mut self, entry: PeerEntry) -> Option<PeerEntry> {
        self.peers.insert(entry.handle.id(), entry)
    }

    pub fn get(&self, id: &ConnectionId) -> Option<&PeerEntry> {
        self.peers.get(id)
    }

    pub fn get_mut(&mut self, id: &ConnectionId) -> Option<&mut PeerEntry> {
        self.peers.get_mut(id)
    }

    pub fn remove(&mut self, id: &ConnectionId) -> Option<PeerEntry> {
        self.peers.remove(id)
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.peers.contains_key(id)
    }

    /// Handles of every peer that should receive a broadcast from
    /// `sender`: everyone else who is not being closed.
    pub fn recipients_except(
        &self,
        sender: ConnectionId,
    ) -> impl Iterator<Item = &PeerHandle> {
        self.peers
            .iter()
            .filter(move |(id, entry)| **id != sender && !entry.closing)
            .map(|(_, entry)| &entry.handle)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
