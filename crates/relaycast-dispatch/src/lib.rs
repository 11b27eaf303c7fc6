//! Event dispatch for Relaycast.
//!
//! A single task owns the peer registry and the ban list. Producers send
//! it [`Event`]s over an ordered queue and it answers with side effects
//! on each peer's [`PeerHandle`]: relayed bytes, notices, closes.
//!
//! # Key types
//!
//! - [`Dispatcher`] — the state machine (join / data / leave policy)
//! - [`DispatcherHandle`] — feeds events to the running task
//! - [`PeerHandle`] — the dispatcher's write side of one connection
//! - [`RelayPolicy`] — ban window, message interval, strike limit
//! - [`PeerRegistry`] / [`BanList`] — the state the dispatcher owns

mod bans;
mod dispatcher;
mod error;
mod event;
mod peer;
mod policy;
mod registry;

pub use bans::BanList;
pub use dispatcher::{
    Dispatcher, DispatcherHandle, DispatcherStats, JOIN_REJECTED_NOTICE,
    STRIKE_BAN_NOTICE, spawn_dispatcher,
};
pub use error::DispatchError;
pub use event::Event;
pub use peer::{Outbound, OutboundReceiver, PeerHandle};
pub use policy::{RelayPolicy, Verdict};
pub use registry::{PeerEntry, PeerRegistry};
