//! User session handling for Realmlink.
//!
//! This crate covers the client side of "who am I":
//!
//! 1. **Authentication**: exchanging credentials for a session
//!    ([`Authenticator`] trait)
//! 2. **Restore**: rebuilding a session from a cached token with no network
//!    round trip ([`Session::restore`])
//! 3. **The active session**: one per connection context ([`SessionSlot`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Realtime Layer (above)  ← needs a valid session to open the socket
//!     ↕
//! Session Layer (this crate)  ← holds and validates the user's credential
//!     ↕
//! Protocol Layer (below)  ← provides Credentials, SessionTokens
//! ```

mod auth;
mod error;
mod session;
mod slot;

pub use auth::Authenticator;
pub use error::SessionError;
pub use session::Session;
pub use slot::SessionSlot;
