//! The session: an authenticated credential with an expiry.
//!
//! A session is what the client holds after signing in. It tracks:
//! - WHO the user is (`user_id`, `username`)
//! - WHAT proves it (the opaque `token`, plus an optional refresh token)
//! - WHEN it stops being valid (`expires_at`, unix seconds)
//!
//! The token is a three-part `header.payload.signature` string. The client
//! never verifies the signature (only the server can), but it does read the
//! payload so a cached token can be turned back into a session without a
//! network round trip. See [`Session::restore`].

use std::time::{SystemTime, UNIX_EPOCH};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use realmlink_protocol::SessionTokens;
use serde::Deserialize;

use crate::SessionError;

/// The claims the client reads from a token's payload segment.
///
/// Unknown claims (issuer, session vars, ...) are ignored.
#[derive(Debug, Deserialize)]
struct Claims {
    /// User id.
    uid: String,
    /// Username.
    #[serde(default)]
    usn: String,
    /// Expiry, unix seconds.
    exp: u64,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// An authenticated user session.
///
/// Immutable once built: renewing means authenticating again and replacing
/// the session in the [`SessionSlot`](crate::SessionSlot).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
    refresh_token: Option<String>,
    user_id: String,
    username: String,
    expires_at: u64,
    created: bool,
}

impl Session {
    /// Builds a session from a successful authentication response.
    ///
    /// # Errors
    /// Returns [`SessionError::InvalidToken`] if the returned token can't
    /// be decoded. The server just issued it, so expiry isn't checked here.
    pub fn from_tokens(tokens: SessionTokens) -> Result<Self, SessionError> {
        let claims = decode_claims(&tokens.token)?;
        Ok(Self {
            token: tokens.token,
            refresh_token: tokens.refresh_token,
            user_id: claims.uid,
            username: claims.usn,
            expires_at: claims.exp,
            created: tokens.created,
        })
    }

    /// Rebuilds a session from a previously issued token, without contacting
    /// the server.
    ///
    /// # Errors
    /// - [`SessionError::InvalidToken`] if the token is malformed
    /// - [`SessionError::Expired`] if its expiry has passed
    pub fn restore(token: &str) -> Result<Self, SessionError> {
        let claims = decode_claims(token)?;
        if claims.exp <= now_unix() {
            return Err(SessionError::Expired {
                expires_at: claims.exp,
            });
        }

        Ok(Self {
            token: token.to_string(),
            refresh_token: None,
            user_id: claims.uid,
            username: claims.usn,
            expires_at: claims.exp,
            created: false,
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Expiry as unix seconds.
    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }

    /// `true` if the authentication that produced this session also created
    /// the account. Always `false` for restored sessions.
    pub fn created(&self) -> bool {
        self.created
    }

    /// Whether the session has expired as of now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_unix())
    }

    /// Whether the session is expired at the given unix time.
    pub fn is_expired_at(&self, unix_secs: u64) -> bool {
        self.expires_at <= unix_secs
    }
}

/// Extracts the claims from the middle segment of a token.
fn decode_claims(token: &str) -> Result<Claims, SessionError> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_), None) if !payload.is_empty() => payload,
        _ => {
            return Err(SessionError::InvalidToken(
                "expected three dot-separated segments".into(),
            ));
        }
    };

    // Issuers disagree on padding; the no-pad engine wants none.
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| SessionError::InvalidToken(format!("payload is not base64url: {e}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| SessionError::InvalidToken(format!("payload claims: {e}")))
}

/// Current wall-clock time as unix seconds.
pub(crate) fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
