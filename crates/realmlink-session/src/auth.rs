//! Authentication hook for obtaining a session.
//!
//! The session layer doesn't talk HTTP itself. Instead it defines the
//! [`Authenticator`] trait: a single async method that turns credentials into
//! a [`Session`]. The HTTP client implements it against the backend; tests
//! and offline tools implement it with whatever they like.

use realmlink_protocol::{AuthOptions, Credentials};

use crate::Session;

/// Exchanges credentials for a session.
///
/// # Trait bounds
///
/// - `Send + Sync` → the authenticator can be shared across async tasks.
/// - The returned future is `Send` so callers can drive it from a spawned
///   task.
///
/// The error type is the implementor's own, so an HTTP-backed authenticator
/// can keep the difference between "bad password" and "server unreachable".
///
/// # Example
///
/// ```rust
/// use realmlink_protocol::{AuthOptions, Credentials};
/// use realmlink_session::{Authenticator, Session, SessionError};
///
/// /// Hands out a fixed, pre-issued token. Only useful in tests.
/// struct FixedToken(String);
///
/// impl Authenticator for FixedToken {
///     type Error = SessionError;
///
///     async fn authenticate(
///         &self,
///         _credentials: &Credentials,
///         _options: &AuthOptions,
///     ) -> Result<Session, SessionError> {
///         Session::restore(&self.0)
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync {
    type Error;

    /// Validates the credentials with the identity provider.
    ///
    /// With `options.create` set, a missing account is created.
    fn authenticate(
        &self,
        credentials: &Credentials,
        options: &AuthOptions,
    ) -> impl std::future::Future<Output = Result<Session, Self::Error>> + Send;
}
