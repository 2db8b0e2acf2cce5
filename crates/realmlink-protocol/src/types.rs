//! Identity types shared by the HTTP API and the realtime socket.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// MatchId
// ---------------------------------------------------------------------------

/// Server-assigned identifier of a realtime match.
///
/// Newtype over the backend's opaque string so a match id can't be handed to
/// an API expecting a channel id or ticket. Serializes as a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(String);

impl MatchId {
    /// Wraps a raw match id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MatchId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for MatchId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// ChannelKind
// ---------------------------------------------------------------------------

/// The kind of chat channel being joined.
///
/// The join target is interpreted by kind: a room name, a group id, or the
/// other user's id for a direct conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ChannelKind {
    /// A named public room anyone can join.
    #[default]
    Room,
    /// A group's private channel.
    Group,
    /// A one-to-one conversation.
    Direct,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Room => "room",
            Self::Group => "group",
            Self::Direct => "direct",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// UserPresence
// ---------------------------------------------------------------------------

/// One user's presence on one socket session.
///
/// A user connected from two devices has two presences that share a
/// `user_id` but differ in `session_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserPresence {
    pub user_id: String,
    pub session_id: String,
    #[serde(default)]
    pub username: String,
}
