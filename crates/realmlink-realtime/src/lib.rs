//! Realtime layer for Realmlink.
//!
//! One persistent socket per connection context carries matches, chat, and
//! matchmaking. A background reader task routes replies to the requests
//! waiting for them and fans server pushes out to observers.
//!
//! # Key types
//!
//! - [`RealtimeSocket`]: the connection state machine and every realtime
//!   operation
//! - [`Subscriptions`] / [`Registry`]: what the socket is currently part of
//! - [`EventDispatcher`] / [`Topic`]: per-category event fan-out
//! - [`MatchmakerRequest`], [`MatchmakerQuery`], [`MatchmakerPool`]:
//!   matchmaking requests, their query language, and a local matcher
//! - [`SocketState`], [`SocketConfig`]

mod dispatcher;
mod error;
mod matchmaker;
mod registry;
mod socket;

pub use dispatcher::{CloseReason, EventDispatcher, Subscriber, Topic};
pub use error::{ErrorKind, RealtimeError};
pub use matchmaker::{MatchmakerPool, MatchmakerQuery, MatchmakerRequest, Properties};
pub use registry::{
    ChannelHandle, HandleId, MatchHandle, Registry, Subscriptions, Ticket,
};
pub use socket::{ChannelOptions, RealtimeSocket, SocketConfig, SocketState};
