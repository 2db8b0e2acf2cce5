//! Messages carried over the realtime socket.
//!
//! Every frame is an [`Envelope`]: an optional correlation id (`cid`) plus
//! one [`RealtimeMessage`]. A client request carries a `cid`; the server
//! echoes it on the reply so the client can wake the right caller. Server
//! pushes (match data, presence, chat, matchmaker results) carry no `cid`.
//!
//! ```text
//! { "cid": 4, "message": { "type": "ChannelJoin", "target": "lobby", ... } }
//! { "cid": 4, "message": { "type": "Channel", "channel_id": "2...lobby", ... } }
//! { "message": { "type": "ChannelMessage", "content": "hi", ... } }
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{ChannelKind, MatchId, UserPresence};

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The top-level frame on the realtime socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Correlation id. `Some` on requests and their replies, `None` on pushes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<u64>,

    pub message: RealtimeMessage,
}

impl Envelope {
    /// Builds a request (or the reply to one) tagged with `cid`.
    pub fn request(cid: u64, message: RealtimeMessage) -> Self {
        Self {
            cid: Some(cid),
            message,
        }
    }

    /// Builds an uncorrelated frame.
    pub fn push(message: RealtimeMessage) -> Self {
        Self { cid: None, message }
    }
}

// ---------------------------------------------------------------------------
// RealtimeMessage
// ---------------------------------------------------------------------------

/// Everything that can travel inside an [`Envelope`].
///
/// Internally tagged: the variant name is the `type` field of the JSON
/// object and the variant's fields sit next to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RealtimeMessage {
    // -- Client → server requests --
    /// Join a match, either by id or with a matchmaker token.
    MatchJoin {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        match_id: Option<MatchId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
        #[serde(default)]
        metadata: HashMap<String, String>,
    },

    MatchLeave {
        match_id: MatchId,
    },

    /// Match state from this client. Not acknowledged by the server.
    MatchDataSend {
        match_id: MatchId,
        op_code: i64,
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
    },

    ChannelJoin {
        target: String,
        kind: ChannelKind,
        /// Whether messages are stored server-side for history.
        persistence: bool,
        /// Whether this user's presence is hidden from other members.
        hidden: bool,
    },

    ChannelLeave {
        channel_id: String,
    },

    ChannelMessageSend {
        channel_id: String,
        content: String,
    },

    MatchmakerAdd {
        query: String,
        min_count: u32,
        max_count: u32,
        #[serde(default)]
        string_properties: HashMap<String, String>,
        #[serde(default)]
        numeric_properties: HashMap<String, f64>,
    },

    MatchmakerRemove {
        ticket: String,
    },

    // -- Server → client replies --
    /// Empty acknowledgement of a request that returns nothing.
    Ack,

    /// The request identified by the envelope's `cid` was rejected.
    /// Without a `cid` it reports a socket-level problem.
    Error {
        code: i32,
        message: String,
    },

    Match(MatchInfo),

    Channel(ChannelInfo),

    ChannelMessageAck(ChannelMessageAck),

    MatchmakerTicket {
        ticket: String,
    },

    // -- Server → client pushes --
    MatchData(MatchData),

    MatchPresenceEvent(MatchPresenceEvent),

    ChannelMessage(ChannelMessage),

    ChannelPresenceEvent(ChannelPresenceEvent),

    MatchmakerMatched(MatchmakerMatched),
}

// ---------------------------------------------------------------------------
// Payload structs
// ---------------------------------------------------------------------------

/// A joined match as described by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchInfo {
    pub match_id: MatchId,
    /// `true` when server-side match logic owns the state.
    #[serde(default)]
    pub authoritative: bool,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub size: u32,
    /// Other members present when we joined.
    #[serde(default)]
    pub presences: Vec<UserPresence>,
    /// Our own presence in the match.
    pub self_presence: UserPresence,
}

/// A joined chat channel as described by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// Server-assigned channel id. Chat messages are addressed with it.
    pub channel_id: String,
    /// The target the channel was joined with (room name, group id, user id).
    pub name: String,
    #[serde(default)]
    pub kind: ChannelKind,
    #[serde(default)]
    pub presences: Vec<UserPresence>,
    pub self_presence: UserPresence,
}

/// Server receipt for a chat message we sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMessageAck {
    pub channel_id: String,
    pub message_id: String,
    #[serde(default)]
    pub username: String,
    /// Unix milliseconds.
    #[serde(default)]
    pub create_time: u64,
    #[serde(default)]
    pub persistent: bool,
}

/// State pushed into a match by one of its members (or the server).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchData {
    pub match_id: MatchId,
    /// Sender, absent for server-originated state.
    #[serde(default)]
    pub presence: Option<UserPresence>,
    pub op_code: i64,
    #[serde(default, with = "base64_bytes")]
    pub data: Vec<u8>,
}

/// Members joining or leaving a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPresenceEvent {
    pub match_id: MatchId,
    #[serde(default)]
    pub joins: Vec<UserPresence>,
    #[serde(default)]
    pub leaves: Vec<UserPresence>,
}

/// A chat message delivered to a channel we are in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub channel_id: String,
    pub message_id: String,
    pub sender_id: String,
    #[serde(default)]
    pub username: String,
    pub content: String,
    /// Unix milliseconds.
    #[serde(default)]
    pub create_time: u64,
}

/// Members joining or leaving a chat channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPresenceEvent {
    pub channel_id: String,
    #[serde(default)]
    pub joins: Vec<UserPresence>,
    #[serde(default)]
    pub leaves: Vec<UserPresence>,
}

/// One participant of a matchmaker result, with the properties it advertised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchmakerUser {
    pub presence: UserPresence,
    #[serde(default)]
    pub string_properties: HashMap<String, String>,
    #[serde(default)]
    pub numeric_properties: HashMap<String, f64>,
}

/// The matchmaker found a party for one of our tickets.
///
/// Either `match_id` (an authoritative match already exists) or `token`
/// (every member joins the same relayed match with it) is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchmakerMatched {
    pub ticket: String,
    #[serde(default)]
    pub match_id: Option<MatchId>,
    #[serde(default)]
    pub token: Option<String>,
    /// Every member of the party, including us.
    pub users: Vec<MatchmakerUser>,
    pub self_user: MatchmakerUser,
}

/// Match payloads are opaque bytes and travel as standard base64 strings.
mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(D::Error::custom)
    }
}
