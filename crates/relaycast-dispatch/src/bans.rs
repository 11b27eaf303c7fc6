//! Origin ban list with lazy expiry.
//!
//! Entries are never swept. An expired ban is forgotten the next time a
//! join from that origin looks it up, which is the only moment a ban
//! matters.

use std::collections::HashMap;
use std::time::Duration;

use relaycast_transport::Origin;
use tokio::time::Instant;

/// Tracks banned origins and when each ban started.
#[derive(Debug)]
pub struct BanList {
    bans: HashMap<Origin, Instant>,
    window: Duration,
}

impl BanList {
    /// Creates an empty ban list whose bans last `window`.
    pub fn new(window: Duration) -> Self {
        Self {
            bans: HashMap::new(),
            window,
        }
    }

    /// Bans `origin` starting at `now`, replacing any earlier ban.
    pub fn ban(&mut self, origin: Origin, now: Instant) {
        self.bans.insert(origin, now);
    }

    /// Checks whether `origin` is banned at `now`.
    ///
    /// Returns the time left on the ban, or `None` if the origin may join.
    /// An expired entry is removed as a side effect.
    pub fn check(&mut self, origin: Origin, now: Instant) -> Option<Duration> {
        let banned_at = *self.bans.get(&origin)?;
        let elapsed = now.saturating_duration_since(banned_at);
        if elapsed < self.window {
            return Some(self.window - elapsed);
        }
        self.bans.remove(&origin);
        tracing::debug!(%origin, "ban expired");
        None
    }

    /// Number of bans still in force at `now`.
    pub fn active_count(&self, now: Instant) -> usize {
        self.bans
            .values()
            .filter(|at| now.saturating_duration_since(**at) < self.window)
            .count()
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.bans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bans.is_empty()
    }
}
