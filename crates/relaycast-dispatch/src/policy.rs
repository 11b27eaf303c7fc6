//! Throttle and ban policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::PeerEntry;

// ---------------------------------------------------------------------------
// RelayPolicy
// ---------------------------------------------------------------------------

/// The three knobs of the relay's anti-spam policy.
///
/// Durations are written as whole milliseconds in config files:
///
/// ```json
/// { "ban_window_ms": 60000, "message_interval_ms": 1000, "strike_limit": 10 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayPolicy {
    /// How long a banned origin is refused at join time.
    #[serde(rename = "ban_window_ms", with = "duration_ms")]
    pub ban_window: Duration,

    /// Minimum spacing between two accepted messages from one peer.
    #[serde(rename = "message_interval_ms", with = "duration_ms")]
    pub message_interval: Duration,

    /// Consecutive throttled messages that trigger a ban.
    pub strike_limit: u32,
}

impl Default for RelayPolicy {
    fn default() -> Self {
        Self {
            ban_window: Duration::from_secs(60),
            message_interval: Duration::from_secs(1),
            strike_limit: 10,
        }
    }
}

impl RelayPolicy {
    /// Fixes out-of-range values so the policy is safe to use.
    ///
    /// A `strike_limit` of 0 would ban on a peer's first throttled
    /// message before any strike is counted; it is raised to 1.
    pub fn validated(mut self) -> Self {
        if self.strike_limit == 0 {
            tracing::warn!("strike_limit of 0 is invalid, using 1");
            self.strike_limit = 1;
        }
        self
    }

    /// Applies the throttle to one incoming message and updates the
    /// peer's bookkeeping.
    ///
    /// - Accepted: strikes reset, `last_accepted_at` moves to `now`.
    /// - Throttled: strike count goes up by exactly one.
    /// - Banned: the strike that reached `strike_limit`.
    pub fn judge(&self, entry: &mut PeerEntry, now: Instant) -> Verdict {
        let elapsed = now.saturating_duration_since(entry.last_accepted_at);
        if elapsed >= self.message_interval {
            entry.last_accepted_at = now;
            entry.strike_count = 0;
            return Verdict::Accepted;
        }

        entry.strike_count += 1;
        if entry.strike_count >= self.strike_limit {
            Verdict::Banned
        } else {
            Verdict::Throttled {
                strikes: entry.strike_count,
            }
        }
    }
}

/// (De)serializes a [`Duration`] as an integer count of milliseconds.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Duration,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// Outcome of [`RelayPolicy::judge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Relay the message.
    Accepted,
    /// Drop the message; the peer now has `strikes` strikes.
    Throttled { strikes: u32 },
    /// Drop the message and ban the peer's origin.
    Banned,
}

#[cfg(test)]
mod tests {
    use relaycast_transport::{ConnectionId, Origin};

    use super::*;
    use crate::PeerHandle;

    fn entry(now: Instant) -> PeerEntry {
        let (handle, _rx) = PeerHandle::new(
            ConnectionId::new(1),
            Origin::new("10.0.0.1".parse().unwrap()),
        );
        PeerEntry::new(handle, now)
    }

    #[test]
    fn test_default_policy_values() {
        let p = RelayPolicy::default();
        assert_eq!(p.ban_window, Duration::from_secs(60));
        assert_eq!(p.message_interval, Duration::from_secs(1));
        assert_eq!(p.strike_limit, 10);
    }

    #[test]
    fn test_validated_raises_zero_strike_limit() {
        let p = RelayPolicy {
            strike_limit: 0,
            ..RelayPolicy::default()
        }
        .validated();
        assert_eq!(p.strike_limit, 1);
    }

    #[test]
    fn test_judge_after_interval_accepts_and_resets() {
        let policy = RelayPolicy::default();
        let t0 = Instant::now();
        let mut e = entry(t0);
        e.strike_count = 4;

        let t1 = t0 + Duration::from_secs(1);
        assert_eq!(policy.judge(&mut e, t1), Verdict::Accepted);
        assert_eq!(e.strike_count(), 0);
        assert_eq!(e.last_accepted_at(), t1);
    }

    #[test]
    fn test_judge_within_interval_adds_one_strike() {
        let policy = RelayPolicy::default();
        let t0 = Instant::now();
        let mut e = entry(t0);

        let verdict = policy.judge(&mut e, t0 + Duration::from_millis(500));
        assert_eq!(verdict, Verdict::Throttled { strikes: 1 });
        assert_eq!(e.last_accepted_at(), t0, "rejection keeps the timestamp");
    }

    #[test]
    fn test_judge_tenth_strike_bans_ninth_does_not() {
        let policy = RelayPolicy::default();
        let t0 = Instant::now();
        let mut e = entry(t0);
        let soon = t0 + Duration::from_millis(10);

        for n in 1..=9 {
            assert_eq!(
                policy.judge(&mut e, soon),
                Verdict::Throttled { strikes: n }
            );
        }
        assert_eq!(policy.judge(&mut e, soon), Verdict::Banned);
    }

    #[test]
    fn test_judge_time_alone_does_not_reset_strikes() {
        // A throttled message never moves `last_accepted_at`.
        let policy = RelayPolicy::default();
        let t0 = Instant::now();
        let mut e = entry(t0);

        policy.judge(&mut e, t0 + Duration::from_millis(100));
        policy.judge(&mut e, t0 + Duration::from_millis(200));
        assert_eq!(e.strike_count(), 2);

        let late = t0 + Duration::from_millis(900);
        assert_eq!(
            policy.judge(&mut e, late),
            Verdict::Throttled { strikes: 3 }
        );
    }
}
