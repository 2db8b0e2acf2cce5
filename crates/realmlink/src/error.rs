//! Unified error type for Realmlink.
//!
//! Every operation on [`Connection`](crate::Connection) fails with a
//! [`RealmlinkError`] whose variant says which kind of operation failed.
//! The underlying crate error stays reachable as the `source()`.

use realmlink_protocol::ProtocolError;
use realmlink_realtime::{ErrorKind, RealtimeError};
use realmlink_session::SessionError;
use realmlink_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum RealmlinkError {
    /// The server couldn't be reached, or the socket isn't usable.
    #[error("connection error: {0}")]
    Connection(#[source] ConnectionError),

    /// Authentication was rejected, or the session is missing, malformed,
    /// or expired.
    #[error("auth error: {0}")]
    Auth(#[source] AuthError),

    #[error("rpc error: {0}")]
    Rpc(#[source] ApiError),

    #[error("storage error: {0}")]
    Storage(#[source] ApiError),

    /// A match join, leave, or state send failed.
    #[error("match error: {0}")]
    Match(#[source] RealtimeError),

    #[error("matchmaker error: {0}")]
    Matchmaker(#[source] RealtimeError),

    /// A chat join, leave, or send failed.
    #[error("chat error: {0}")]
    Chat(#[source] RealtimeError),

    /// A body or frame didn't encode or decode.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Why the server couldn't be reached.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// An HTTP request or socket dial failed below the protocol.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The realtime socket is in the wrong state or went away.
    #[error(transparent)]
    Socket(RealtimeError),
}

/// Why authentication failed.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The server answered with an error status.
    #[error(transparent)]
    Rejected(ApiError),

    /// The realtime socket refused the session's token.
    #[error("socket refused the session: {0}")]
    SocketRejected(#[source] TransportError),
}

/// An error response from the HTTP API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("server returned {status} (code {code}): {message}")]
pub struct ApiError {
    pub status: u16,
    /// The backend's own error code, 0 if the body didn't carry one.
    pub code: i32,
    pub message: String,
}

impl From<TransportError> for RealmlinkError {
    fn from(err: TransportError) -> Self {
        Self::Connection(ConnectionError::Transport(err))
    }
}

impl From<SessionError> for RealmlinkError {
    fn from(err: SessionError) -> Self {
        Self::Auth(AuthError::Session(err))
    }
}

impl RealmlinkError {
    /// Classifies a realtime failure, using `wrap` for failures that belong
    /// to the operation itself.
    pub(crate) fn realtime(err: RealtimeError, wrap: fn(RealtimeError) -> Self) -> Self {
        match (err.kind(), err) {
            (ErrorKind::Connection, RealtimeError::Transport(e)) => {
                Self::Connection(ConnectionError::Transport(e))
            }
            (ErrorKind::Connection, e) => Self::Connection(ConnectionError::Socket(e)),
            (_, RealtimeError::Session(e)) => Self::Auth(AuthError::Session(e)),
            (ErrorKind::Session, RealtimeError::Transport(e)) => {
                Self::Auth(AuthError::SocketRejected(e))
            }
            (_, RealtimeError::Protocol(e)) => Self::Protocol(e),
            (_, e) => wrap(e),
        }
    }

    /// `true` for failures that a reconnect might fix.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}
