//! Error types for the realtime layer.

use realmlink_protocol::{MatchId, ProtocolError};
use realmlink_session::SessionError;
use realmlink_transport::TransportError;

use crate::SocketState;

/// Errors that can occur during realtime operations.
#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    /// The operation needs a `Connected` socket.
    #[error("socket is not connected (state: {0})")]
    NotConnected(SocketState),

    /// `open` was called while a socket is already live or being opened.
    #[error("socket is already open (state: {0})")]
    AlreadyOpen(SocketState),

    /// The socket closed while the request was waiting for its reply.
    #[error("socket closed before the request completed")]
    Closed,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The session needed to open the socket is missing or expired.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// No match with this id is registered on the socket.
    #[error("not in match {0}")]
    UnknownMatch(MatchId),

    /// No chat channel with this name is registered on the socket.
    #[error("not in channel {0}")]
    UnknownChannel(String),

    /// No matchmaker ticket with this id is registered on the socket.
    #[error("unknown matchmaker ticket {0}")]
    UnknownTicket(String),

    /// The matchmaker request breaks a count rule or its query doesn't parse.
    #[error("invalid matchmaker request: {0}")]
    InvalidMatchmaker(String),

    /// The server answered the request with an error.
    #[error("server rejected request ({code}): {message}")]
    Rejected { code: i32, message: String },

    /// The server answered with a message of the wrong type.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),
}

/// Coarse classification of a [`RealtimeError`].
///
/// The facade uses it to decide whether a failed match or chat call is a
/// connection problem or a problem with the call itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The socket is down, closing, or the transport failed.
    Connection,
    /// The session is missing, expired, or was refused by the socket.
    Session,
    /// Bytes didn't encode or decode.
    Protocol,
    /// The request itself was refused, locally or by the server.
    Request,
}

impl RealtimeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Session(_) | Self::Transport(TransportError::Unauthorized { .. }) => {
                ErrorKind::Session
            }
            Self::NotConnected(_) | Self::AlreadyOpen(_) | Self::Closed | Self::Transport(_) => {
                ErrorKind::Connection
            }
            Self::Protocol(_) | Self::UnexpectedReply(_) => ErrorKind::Protocol,
            Self::UnknownMatch(_)
            | Self::UnknownChannel(_)
            | Self::UnknownTicket(_)
            | Self::InvalidMatchmaker(_)
            | Self::Rejected { .. } => ErrorKind::Request,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_closed_is_connection() {
        assert_eq!(RealtimeError::Closed.kind(), ErrorKind::Connection);
        assert_eq!(
            RealtimeError::NotConnected(SocketState::Closing).kind(),
            ErrorKind::Connection
        );
    }

    #[test]
    fn test_kind_rejection_is_request() {
        let err = RealtimeError::Rejected {
            code: 3,
            message: "bad".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Request);
        assert_eq!(err.to_string(), "server rejected request (3): bad");
    }

    #[test]
    fn test_kind_expired_session_is_session() {
        let err = RealtimeError::from(SessionError::Expired { expires_at: 1 });
        assert_eq!(err.kind(), ErrorKind::Session);
    }

    #[test]
    fn test_kind_unauthorized_handshake_is_session() {
        let refused = RealtimeError::from(TransportError::Unauthorized { status: 401 });
        assert_eq!(refused.kind(), ErrorKind::Session);

        let unreachable = RealtimeError::from(TransportError::ConnectionClosed("gone".into()));
        assert_eq!(unreachable.kind(), ErrorKind::Connection);
    }
}
