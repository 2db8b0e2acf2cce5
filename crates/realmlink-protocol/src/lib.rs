//! Wire protocol for Realmlink.
//!
//! This crate defines the "language" the client speaks with the backend:
//!
//! - **Realtime messages** ([`Envelope`], [`RealtimeMessage`] and their
//!   payloads) that travel over the socket.
//! - **API bodies** ([`Credentials`], [`SessionTokens`], storage types)
//!   that travel over HTTP.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) that turns either into bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the session and
//! realtime layers. It knows nothing about connections or state; it only
//! knows the shape of the data.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope / API body) → Session, Realtime
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod api;
mod codec;
mod error;
mod realtime;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use api::{
    ApiErrorBody, AuthOptions, Credentials, ReadPermission, ReadStorageRequest, RpcResponse,
    SessionTokens, StorageAck, StorageAcks, StorageObject, StorageObjectId, StorageObjects,
    StorageWrite, WritePermission, WriteStorageRequest,
};
pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use realtime::{
    ChannelInfo, ChannelMessage, ChannelMessageAck, ChannelPresenceEvent, Envelope, MatchData,
    MatchInfo, MatchPresenceEvent, MatchmakerMatched, MatchmakerUser, RealtimeMessage,
};
pub use types::{ChannelKind, MatchId, UserPresence};
