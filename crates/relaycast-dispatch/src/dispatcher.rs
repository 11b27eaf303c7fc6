//! The dispatcher: one task that owns the registry and the ban list.
//!
//! Every producer (the accept loop, each connection's reader) talks to it
//! through a single unbounded queue. Events are handled one at a time in
//! arrival order, so the registry and ban list need no locks.

use bytes::Bytes;
use relaycast_transport::ConnectionId;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::{
    BanList, DispatchError, Event, PeerEntry, PeerHandle, PeerRegistry,
    RelayPolicy, Verdict,
};

/// Written to a connection refused because its origin is banned.
pub const JOIN_REJECTED_NOTICE: &[u8] = b"you are banned\n";

/// Written to a peer right before it is closed for spamming.
pub const STRIKE_BAN_NOTICE: &[u8] = b"you are banned\n";

/// Counters reported by [`DispatcherHandle::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherStats {
    /// Registered peers, closing ones included.
    pub peers: usize,
    /// Bans still in force.
    pub bans: usize,
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// The synchronous core of the dispatcher.
///
/// [`spawn_dispatcher`] wraps it in a task. It is public so the policy can
/// be driven with explicit timestamps.
#[derive(Debug)]
pub struct Dispatcher {
    policy: RelayPolicy,
    registry: PeerRegistry,
    bans: BanList,
}

impl Dispatcher {
    pub fn new(policy: RelayPolicy) -> Self {
        let policy = policy.validated();
        Self {
            bans: BanList::new(policy.ban_window),
            registry: PeerRegistry::new(),
            policy,
        }
    }

    pub fn policy(&self) -> &RelayPolicy {
        &self.policy
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    pub fn bans(&self) -> &BanList {
        &self.bans
    }

    pub fn stats(&self, now: Instant) -> DispatcherStats {
        DispatcherStats {
            peers: self.registry.len(),
            bans: self.bans.active_count(now),
        }
    }

    /// Applies one event at time `now`.
    pub fn handle(&mut self, event: Event, now: Instant) {
        tracing::trace!(peer = %event.peer(), event = event.kind(), "handling");
        match event {
            Event::Joined { handle } => self.on_joined(handle, now),
            Event::DataReceived { handle, payload } => {
                self.on_data(handle, payload, now)
            }
            Event::Left { handle } => self.on_left(handle),
        }
    }

    fn on_joined(&mut self, handle: PeerHandle, now: Instant) {
        let peer = handle.id();
        let origin = handle.origin();

        if let Some(remaining) = self.bans.check(origin, now) {
            tracing::info!(
                %peer,
                %origin,
                remaining_secs = remaining.as_secs(),
                "rejecting connection from banned origin"
            );
            let _ = handle.send(Bytes::from_static(JOIN_REJECTED_NOTICE));
            handle.close();
            return;
        }

        if let Some(old) = self.registry.insert(PeerEntry::new(handle, now)) {
            tracing::warn!(%peer, "replacing existing registry entry");
            old.handle().close();
        }
        tracing::info!(
            %peer,
            %origin,
            peers = self.registry.len(),
            "peer joined"
        );
    }

    fn on_data(&mut self, handle: PeerHandle, payload: Bytes, now: Instant) {
        let peer = handle.id();

        let Some(entry) = self.registry.get_mut(&peer) else {
            tracing::debug!(%peer, "data from unregistered peer, closing");
            handle.close();
            return;
        };

        if entry.is_closing() {
            tracing::trace!(%peer, "dropping data from closing peer");
            return;
        }

        match self.policy.judge(entry, now) {
            Verdict::Accepted => {
                let delivered = self.broadcast(peer, &payload);
                tracing::debug!(
                    %peer,
                    bytes = payload.len(),
                    delivered,
                    "message relayed"
                );
            }
            Verdict::Throttled { strikes } => {
                tracing::debug!(%peer, strikes, "message throttled");
            }
            Verdict::Banned => {
                let origin = entry.origin();
                entry.mark_closing();
                let _ = entry
                    .handle()
                    .send(Bytes::from_static(STRIKE_BAN_NOTICE));
                entry.handle().close();
                self.bans.ban(origin, now);
                tracing::info!(
                    %peer,
                    %origin,
                    window_secs = self.policy.ban_window.as_secs(),
                    "origin banned for spamming"
                );
            }
        }
    }

    fn on_left(&mut self, handle: PeerHandle) {
        let peer = handle.id();
        match self.registry.remove(&peer) {
            Some(entry) => tracing::info!(
                %peer,
                origin = %entry.origin(),
                peers = self.registry.len(),
                "peer disconnected"
            ),
            None => tracing::debug!(%peer, "left event for unknown peer"),
        }
    }

    /// Sends `payload` to every registered peer except `sender`.
    ///
    /// A recipient whose writer is gone is logged and skipped; it stays
    /// registered until its own `Left` arrives. Returns how many
    /// recipients the payload was queued for.
    fn broadcast(&self, sender: ConnectionId, payload: &Bytes) -> usize {
        let mut delivered = 0;
        for recipient in self.registry.recipients_except(sender) {
            match recipient.send(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        peer = %recipient.id(),
                        error = %e,
                        "could not send data"
                    );
                }
            }
        }
        delivered
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// Items on the dispatcher's queue.
enum Command {
    Event(Event),
    Stats {
        reply: oneshot::Sender<DispatcherStats>,
    },
}

/// Handle to a running dispatcher task.
///
/// Cheap to clone; every producer holds one. The task exits once the
/// last handle is dropped and the queue is drained.
#[derive(Clone)]
pub struct DispatcherHandle {
    sender: mpsc::UnboundedSender<Command>,
}

impl DispatcherHandle {
    /// Enqueues an event. Never waits.
    pub fn send(&self, event: Event) -> Result<(), DispatchError> {
        self.sender
            .send(Command::Event(event))
            .map_err(|_| DispatchError::Unavailable)
    }

    /// Enqueues [`Event::Joined`].
    pub fn joined(&self, handle: PeerHandle) -> Result<(), DispatchError> {
        self.send(Event::Joined { handle })
    }

    /// Enqueues [`Event::DataReceived`].
    pub fn data(
        &self,
        handle: PeerHandle,
        payload: Bytes,
    ) -> Result<(), DispatchError> {
        self.send(Event::DataReceived { handle, payload })
    }

    /// Enqueues [`Event::Left`].
    pub fn left(&self, handle: PeerHandle) -> Result<(), DispatchError> {
        self.send(Event::Left { handle })
    }

    /// Asks for current counters.
    ///
    /// The request is queued behind every event sent before it, so the
    /// answer reflects all of them.
    pub async fn stats(&self) -> Result<DispatcherStats, DispatchError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(Command::Stats { reply: reply_tx })
            .map_err(|_| DispatchError::Unavailable)?;
        reply_rx.await.map_err(|_| DispatchError::Unavailable)
    }
}

struct DispatcherActor {
    dispatcher: Dispatcher,
    receiver: mpsc::UnboundedReceiver<Command>,
}

impl DispatcherActor {
    async fn run(mut self) {
        tracing::info!(
            strike_limit = self.dispatcher.policy.strike_limit,
            interval_ms = self.dispatcher.policy.message_interval.as_millis()
                as u64,
            "dispatcher started"
        );

        while let Some(cmd) = self.receiver.recv().await {
            let now = Instant::now();
            match cmd {
                Command::Event(event) => self.dispatcher.handle(event, now),
                Command::Stats { reply } => {
                    let _ = reply.send(self.dispatcher.stats(now));
                }
            }
        }

        tracing::info!("dispatcher stopped");
    }
}

/// Spawns the dispatcher task and returns a handle to feed it.
pub fn spawn_dispatcher(policy: RelayPolicy) -> DispatcherHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let actor = DispatcherActor {
        dispatcher: Dispatcher::new(policy),
        receiver: rx,
    };
    tokio::spawn(actor.run());
    DispatcherHandle { sender: tx }
}

// =========================================================================
// Tests
// =========================================================================
