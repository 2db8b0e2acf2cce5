//! Subscription registry: what this socket is currently part of.
//!
//! Three keyed tables live here:
//!
//! - matches by [`MatchId`]
//! - chat channels by the name they were joined with
//! - matchmaker tickets by ticket id
//!
//! Every handle carries a [`HandleId`] minted when it was created, so a
//! re-join is distinguishable from the handle it replaced even though both
//! share the same key.
//!
//! # Concurrency note
//!
//! The registry is plain data, like the session slot. The socket wraps it in
//! a mutex shared by its reader task and its callers and never holds that
//! lock across an `.await`.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use realmlink_protocol::{
    ChannelInfo, ChannelKind, ChannelPresenceEvent, MatchId, MatchInfo, MatchPresenceEvent,
    UserPresence,
};

use crate::MatchmakerRequest;

/// Counter for generating unique handle ids.
static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

// ---------------------------------------------------------------------------
// HandleId
// ---------------------------------------------------------------------------

/// Process-unique id of one registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    fn next() -> Self {
        Self(NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// A keyed table of live handles.
#[derive(Debug, Clone)]
pub struct Registry<K, H> {
    entries: HashMap<K, H>,
}

impl<K, H> Default for Registry<K, H> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash, H> Registry<K, H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `handle` under `key`, returning the handle it replaced.
    pub fn put(&mut self, key: K, handle: H) -> Option<H> {
        self.entries.insert(key, handle)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&H>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut H>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get_mut(key)
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<H>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.remove(key)
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every entry, returning how many there were.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &H> {
        self.entries.values()
    }
}

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// Local record of a joined match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchHandle {
    pub id: HandleId,
    pub match_id: MatchId,
    pub authoritative: bool,
    pub label: Option<String>,
    /// Other members, kept current by presence events.
    pub presences: Vec<UserPresence>,
    pub self_presence: UserPresence,
}

impl MatchHandle {
    /// Creates a fresh handle from the server's join reply.
    pub fn from_info(info: MatchInfo) -> Self {
        Self {
            id: HandleId::next(),
            match_id: info.match_id,
            authoritative: info.authoritative,
            label: info.label,
            presences: info.presences,
            self_presence: info.self_presence,
        }
    }

    /// Applies a presence delta. Returns `true` if our own presence left.
    pub fn apply_presence(&mut self, event: &MatchPresenceEvent) -> bool {
        apply_delta(
            &mut self.presences,
            &self.self_presence,
            &event.joins,
            &event.leaves,
        )
    }
}

/// Local record of a joined chat channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelHandle {
    pub id: HandleId,
    /// Server-assigned id that outgoing messages are addressed with.
    pub channel_id: String,
    /// The name (target) the channel was joined with.
    pub name: String,
    pub kind: ChannelKind,
    pub presences: Vec<UserPresence>,
    pub self_presence: UserPresence,
}

impl ChannelHandle {
    pub fn from_info(info: ChannelInfo) -> Self {
        Self {
            id: HandleId::next(),
            channel_id: info.channel_id,
            name: info.name,
            kind: info.kind,
            presences: info.presences,
            self_presence: info.self_presence,
        }
    }

    /// Applies a presence delta. Returns `true` if our own presence left.
    pub fn apply_presence(&mut self, event: &ChannelPresenceEvent) -> bool {
        apply_delta(
            &mut self.presences,
            &self.self_presence,
            &event.joins,
            &event.leaves,
        )
    }
}

/// Adds `joins` and drops `leaves` (matched by session id), ignoring our
/// own presence in `joins`.
fn apply_delta(
    presences: &mut Vec<UserPresence>,
    own: &UserPresence,
    joins: &[UserPresence],
    leaves: &[UserPresence],
) -> bool {
    let mut self_left = false;
    for leave in leaves {
        if leave.session_id == own.session_id {
            self_left = true;
        }
        presences.retain(|p| p.session_id != leave.session_id);
    }
    for join in joins {
        if join.session_id == own.session_id {
            continue;
        }
        if !presences.iter().any(|p| p.session_id == join.session_id) {
            presences.push(join.clone());
        }
    }
    self_left
}

/// A matchmaker ticket waiting for a result.
#[derive(Debug, Clone, PartialEq)]
pub struct Ticket {
    pub id: HandleId,
    pub ticket: String,
    /// The request that produced the ticket.
    pub request: MatchmakerRequest,
}

impl Ticket {
    pub fn new(ticket: impl Into<String>, request: MatchmakerRequest) -> Self {
        Self {
            id: HandleId::next(),
            ticket: ticket.into(),
            request,
        }
    }
}

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

/// The three registries of one socket, purged together.
#[derive(Debug, Default)]
pub struct Subscriptions {
    pub matches: Registry<MatchId, MatchHandle>,
    /// Keyed by the name the channel was joined with.
    pub channels: Registry<String, ChannelHandle>,
    pub tickets: Registry<String, Ticket>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every match, channel, and ticket.
    pub fn purge(&mut self) {
        let matches = self.matches.clear();
        let channels = self.channels.clear();
        let tickets = self.tickets.clear();
        if matches + channels + tickets > 0 {
            tracing::debug!(matches, channels, tickets, "subscriptions purged");
        }
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty() && self.channels.is_empty() && self.tickets.is_empty()
    }

    /// Finds the channel joined under any name whose server id is `channel_id`.
    pub fn channel_by_id_mut(&mut self, channel_id: &str) -> Option<&mut ChannelHandle> {
        self.channels
            .entries
            .values_mut()
            .find(|h| h.channel_id == channel_id)
    }

    /// Name of the channel whose server id is `channel_id`.
    pub fn channel_name(&self, channel_id: &str) -> Option<&str> {
        self.channels
            .values()
            .find(|h| h.channel_id == channel_id)
            .map(|h| h.name.as_str())
    }
}
