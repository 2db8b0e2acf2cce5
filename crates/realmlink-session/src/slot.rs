//! The session slot: the one active session of a connection context.
//!
//! A context has at most one session at a time. The slot holds it, and also
//! remembers the token of the last session it was given so the app can come
//! back after a restart with `restore(None)` instead of asking for
//! credentials again.
//!
//! ```text
//! sign_in() / set() ──→ [Some(session)] ──→ clear() ──→ [None]
//!        ↑                                                 │
//!        └────────── restore(token | cached token) ────────┘
//! ```
//!
//! # Concurrency note
//!
//! The slot is plain data. The owning context hands out `&mut` access for
//! anything that changes the session, so there is nothing to lock.

use realmlink_protocol::{AuthOptions, Credentials};

use crate::{Authenticator, Session, SessionError};

/// Holds the active session and the last known token.
#[derive(Debug, Default)]
pub struct SessionSlot {
    current: Option<Session>,

    /// Token of the most recent session placed in the slot. Survives
    /// replacing the session; cleared only by [`clear`](Self::clear).
    cached_token: Option<String>,
}

impl SessionSlot {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `session` the active session, replacing any previous one.
    pub fn set(&mut self, session: Session) -> &Session {
        tracing::info!(user_id = %session.user_id(), "session set");
        self.cached_token = Some(session.token().to_string());
        self.current.insert(session)
    }

    /// Returns the active session.
    ///
    /// # Errors
    /// Returns [`SessionError::NoSession`] if nothing is set.
    pub fn current(&self) -> Result<&Session, SessionError> {
        self.current.as_ref().ok_or(SessionError::NoSession)
    }

    /// Returns the active session only if it hasn't expired.
    ///
    /// # Errors
    /// - [`SessionError::NoSession`] if nothing is set
    /// - [`SessionError::Expired`] if the session's expiry has passed
    pub fn valid(&self) -> Result<&Session, SessionError> {
        let session = self.current()?;
        if session.is_expired() {
            return Err(SessionError::Expired {
                expires_at: session.expires_at(),
            });
        }
        Ok(session)
    }

    /// Restores a session from `token`, or from the cached token when
    /// `token` is `None`, and makes it active.
    ///
    /// On failure the slot is left exactly as it was: an invalid token never
    /// knocks out a working session.
    ///
    /// # Errors
    /// - [`SessionError::NoSession`] if no token was given and none is cached
    /// - whatever [`Session::restore`] returns for a bad token
    pub fn restore(&mut self, token: Option<&str>) -> Result<&Session, SessionError> {
        let token = match token {
            Some(token) => token.to_string(),
            None => self.cached_token.clone().ok_or(SessionError::NoSession)?,
        };

        match Session::restore(&token) {
            Ok(session) => Ok(self.set(session)),
            Err(e) => {
                tracing::warn!(error = %e, "session restore failed");
                Err(e)
            }
        }
    }

    /// Authenticates through `auth` and makes the result active.
    ///
    /// # Errors
    /// Returns the authenticator's error; the slot is left unchanged.
    pub async fn sign_in<A: Authenticator>(
        &mut self,
        auth: &A,
        credentials: &Credentials,
        options: &AuthOptions,
    ) -> Result<&Session, A::Error> {
        let session = auth.authenticate(credentials, options).await?;
        Ok(self.set(session))
    }

    /// Removes the active session and forgets the cached token.
    ///
    /// Returns the session that was active, if any.
    pub fn clear(&mut self) -> Option<Session> {
        self.cached_token = None;
        let previous = self.current.take();
        if let Some(session) = &previous {
            tracing::info!(user_id = %session.user_id(), "session cleared");
        }
        previous
    }

    /// The token a `restore(None)` would use.
    pub fn cached_token(&self) -> Option<&str> {
        self.cached_token.as_deref()
    }

    pub fn is_set(&self) -> bool {
        self.current.is_some()
    }
}
