//! Error types for the session layer.

/// Errors that can occur while creating, restoring, or reading a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The backend rejected the credentials, or an [`Authenticator`]
    /// failed for a reason it reports as text.
    ///
    /// [`Authenticator`]: crate::Authenticator
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The token isn't in the expected `header.payload.signature` shape,
    /// or its payload doesn't decode to the expected claims.
    #[error("invalid session token: {0}")]
    InvalidToken(String),

    /// The token decoded fine but its expiry is in the past.
    #[error("session expired at {expires_at}")]
    Expired { expires_at: u64 },

    /// An operation needed a session and none is set (and no cached token
    /// was available to restore one).
    #[error("no active session")]
    NoSession,
}
