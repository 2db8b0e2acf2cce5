//! # Realmlink
//!
//! Client session and connection layer for realtime multiplayer backends.
//!
//! Realmlink handles authentication, session restore, and one persistent
//! realtime socket carrying matches, chat channels, and matchmaking. It
//! keeps track of what the socket has joined and fans server pushes out to
//! observers.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use realmlink::prelude::*;
//!
//! # async fn run() -> Result<(), RealmlinkError> {
//! let mut conn = Connection::builder().host("127.0.0.1").build()?;
//! conn.authenticate_email("ada@example.com", "hunter22", &AuthOptions::default())
//!     .await?;
//! conn.open_socket().await?;
//!
//! let mut messages = conn.events().channel_message.subscribe();
//! conn.join_chat("lobby", ChannelKind::Room).await?;
//! conn.send_chat("lobby", r#"{"text":"hi"}"#).await?;
//! if let Some(message) = messages.recv().await {
//!     println!("{}: {}", message.username, message.content);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Crates
//!
//! - `realmlink-transport`: byte connections and the HTTP transport
//! - `realmlink-protocol`: wire types and codecs
//! - `realmlink-session`: sessions, restore, the session slot
//! - `realmlink-realtime`: the socket, registry, events, matchmaker

mod client;
mod config;
mod connection;
mod error;
mod logging;

pub use client::ApiClient;
pub use config::ClientConfig;
pub use connection::{Connection, ConnectionBuilder};
pub use error::{ApiError, AuthError, ConnectionError, RealmlinkError};
pub use logging::init_tracing;

/// Everything an app typically needs, in one import.
pub mod prelude {
    pub use crate::{ApiClient, ClientConfig, Connection, ConnectionBuilder, RealmlinkError};
    pub use realmlink_protocol::{
        AuthOptions, ChannelKind, ChannelMessage, Credentials, MatchData, MatchId,
        MatchPresenceEvent, MatchmakerMatched, ReadPermission, StorageObjectId, StorageWrite,
        UserPresence, WritePermission,
    };
    pub use realmlink_realtime::{
        ChannelHandle, CloseReason, MatchHandle, MatchmakerRequest, SocketState, Ticket,
    };
    pub use realmlink_session::Session;
}

// Lower layers, for apps that need more than the prelude.
pub use realmlink_protocol as protocol;
pub use realmlink_realtime as realtime;
pub use realmlink_session as session;
pub use realmlink_transport as transport;
