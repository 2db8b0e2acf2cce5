//! The connection context: one user's session, API client, and socket.
//!
//! A [`Connection`] owns everything a signed-in client needs, explicitly,
//! instead of through process-wide globals. Create one per user (tests and
//! tools can create several side by side).
//!
//! ```text
//!            ┌───────────────── Connection ─────────────────┐
//! authenticate ──→ SessionSlot ──(valid session)──→ RealtimeSocket
//!      │                │                              │
//!  ApiClient ←──────────┘ (bearer token)        matches, chat, matchmaker
//! ```
//!
//! Methods that can change the session take `&mut self`, including
//! `open_socket`, which drops a session the socket refuses. Everything else
//! on the socket takes `&self`, so a shared `Connection` can send from one
//! task while another task watches events.

use realmlink_protocol::{
    AuthOptions, ChannelKind, ChannelMessageAck, Credentials, MatchId, MatchmakerMatched,
    RpcResponse, StorageAck, StorageObject, StorageObjectId, StorageWrite,
};
use realmlink_realtime::{
    ChannelHandle, ChannelOptions, EventDispatcher, MatchHandle, MatchmakerRequest,
    RealtimeError, RealtimeSocket, SocketState, Ticket,
};
use realmlink_session::{Session, SessionSlot};
use realmlink_transport::{Connector, HttpTransport, ReqwestTransport, WebSocketConnector};
use tokio::sync::watch;

use crate::error::{AuthError, ConnectionError};
use crate::{ApiClient, ClientConfig, RealmlinkError};

// ---------------------------------------------------------------------------
// ConnectionBuilder
// ---------------------------------------------------------------------------

/// Builder for a [`Connection`] over the default HTTP and WebSocket stack.
///
/// # Example
///
/// ```rust,no_run
/// use realmlink::prelude::*;
///
/// # async fn run() -> Result<(), RealmlinkError> {
/// let mut conn = Connection::builder()
///     .host("127.0.0.1")
///     .port(7350)
///     .server_key("nakama_key")
///     .build()?;
///
/// conn.authenticate_custom("device-1234", &AuthOptions::default()).await?;
/// conn.open_socket().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConnectionBuilder {
    config: ClientConfig,
}

impl ConnectionBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn scheme(mut self, scheme: &str) -> Self {
        self.config = self.config.with_scheme(scheme);
        self
    }

    pub fn host(mut self, host: &str) -> Self {
        self.config = self.config.with_host(host);
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config = self.config.with_port(port);
        self
    }

    pub fn server_key(mut self, server_key: &str) -> Self {
        self.config = self.config.with_server_key(server_key);
        self
    }

    /// Builds the connection. Nothing is contacted yet.
    ///
    /// # Errors
    /// `Connection` if the HTTP client can't be created.
    pub fn build(self) -> Result<Connection<ReqwestTransport, WebSocketConnector>, RealmlinkError> {
        let http = ReqwestTransport::new(self.config.base_url())?;
        Ok(Connection::from_parts(self.config, http, WebSocketConnector))
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// One user's connection to the backend.
pub struct Connection<H: HttpTransport, K: Connector> {
    client: ApiClient<H>,
    slot: SessionSlot,
    socket: RealtimeSocket<K>,
}

impl Connection<ReqwestTransport, WebSocketConnector> {
    /// Creates a builder for the default stack.
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::new()
    }
}

impl<H: HttpTransport, K: Connector> Connection<H, K> {
    /// Assembles a connection from explicit transports.
    pub fn from_parts(config: ClientConfig, http: H, connector: K) -> Self {
        let socket = RealtimeSocket::new(connector, config.socket_config());
        Self {
            client: ApiClient::new(config, http),
            slot: SessionSlot::new(),
            socket,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        self.client.config()
    }

    pub fn client(&self) -> &ApiClient<H> {
        &self.client
    }

    pub fn socket(&self) -> &RealtimeSocket<K> {
        &self.socket
    }

    // -- Session --

    /// The active session.
    ///
    /// # Errors
    /// `Auth` if no session is set.
    pub fn session(&self) -> Result<&Session, RealmlinkError> {
        Ok(self.slot.current()?)
    }

    /// Authenticates and makes the result the active session. The previous
    /// session stays active if this fails.
    pub async fn authenticate(
        &mut self,
        credentials: &Credentials,
        options: &AuthOptions,
    ) -> Result<&Session, RealmlinkError> {
        self.slot.sign_in(&self.client, credentials, options).await
    }

    pub async fn authenticate_email(
        &mut self,
        email: &str,
        password: &str,
        options: &AuthOptions,
    ) -> Result<&Session, RealmlinkError> {
        self.authenticate(&Credentials::email(email, password), options)
            .await
    }

    pub async fn authenticate_custom(
        &mut self,
        id: &str,
        options: &AuthOptions,
    ) -> Result<&Session, RealmlinkError> {
        self.authenticate(&Credentials::custom(id), options).await
    }

    /// Restores a session from `token`, or from the last token this
    /// connection held when `None`. No network.
    ///
    /// # Errors
    /// `Auth` if the token is malformed or expired (the current session, if
    /// any, is kept), or if there is no token to restore from.
    pub fn restore(&mut self, token: Option<&str>) -> Result<&Session, RealmlinkError> {
        Ok(self.slot.restore(token)?)
    }

    /// Closes the socket, clears the session locally, and invalidates it on
    /// the server.
    ///
    /// The local session is gone even if the server call fails.
    pub async fn logout(&mut self) -> Result<(), RealmlinkError> {
        self.close_socket().await?;
        let Some(session) = self.slot.clear() else {
            return Ok(());
        };
        self.client.logout(&session).await
    }

    // -- HTTP calls on behalf of the session --

    pub async fn rpc(&self, id: &str, payload: &str) -> Result<RpcResponse, RealmlinkError> {
        let session = self.slot.valid()?;
        self.client.rpc(session, id, payload).await
    }

    pub async fn read_storage(
        &self,
        ids: &[StorageObjectId],
    ) -> Result<Vec<StorageObject>, RealmlinkError> {
        let session = self.slot.valid()?;
        self.client.read_storage(session, ids).await
    }

    pub async fn write_storage(
        &self,
        writes: &[StorageWrite],
    ) -> Result<Vec<StorageAck>, RealmlinkError> {
        let session = self.slot.valid()?;
        self.client.write_storage(session, writes).await
    }

    // -- Socket lifecycle --

    /// Opens the realtime socket with the active session.
    ///
    /// # Errors
    /// `Auth` if there is no session, or if the socket refuses its token. A
    /// refused session is cleared, along with its cached token.
    pub async fn open_socket(&mut self) -> Result<(), RealmlinkError> {
        let session = self.slot.current()?;
        let Err(err) = self.socket.open(session).await else {
            return Ok(());
        };

        let err = RealmlinkError::realtime(err, socket_error);
        if matches!(err, RealmlinkError::Auth(AuthError::SocketRejected(_))) {
            if let Some(session) = self.slot.clear() {
                tracing::warn!(user_id = %session.user_id(), "socket refused the session");
            }
        }
        Err(err)
    }

    pub async fn close_socket(&self) -> Result<(), RealmlinkError> {
        self.socket
            .close()
            .await
            .map_err(|e| RealmlinkError::realtime(e, socket_error))
    }

    pub fn socket_state(&self) -> SocketState {
        self.socket.state()
    }

    pub fn state_changes(&self) -> watch::Receiver<SocketState> {
        self.socket.state_changes()
    }

    pub fn events(&self) -> &EventDispatcher {
        self.socket.events()
    }

    // -- Matches --

    pub async fn join_match(&self, match_id: &MatchId) -> Result<MatchHandle, RealmlinkError> {
        self.socket
            .join_match(match_id)
            .await
            .map_err(|e| RealmlinkError::realtime(e, RealmlinkError::Match))
    }

    pub async fn join_matched(
        &self,
        matched: &MatchmakerMatched,
    ) -> Result<MatchHandle, RealmlinkError> {
        self.socket
            .join_matched(matched)
            .await
            .map_err(|e| RealmlinkError::realtime(e, RealmlinkError::Match))
    }

    pub async fn leave_match(&self, match_id: &MatchId) -> Result<(), RealmlinkError> {
        self.socket
            .leave_match(match_id)
            .await
            .map_err(|e| RealmlinkError::realtime(e, RealmlinkError::Match))
    }

    /// Leaves the match `handle` came from, unless a later join replaced it.
    pub async fn leave_match_handle(&self, handle: &MatchHandle) -> Result<(), RealmlinkError> {
        self.socket
            .leave_match_handle(handle)
            .await
            .map_err(|e| RealmlinkError::realtime(e, RealmlinkError::Match))
    }

    pub async fn send_match_state(
        &self,
        match_id: &MatchId,
        op_code: i64,
        data: &[u8],
    ) -> Result<(), RealmlinkError> {
        self.socket
            .send_match_state(match_id, op_code, data)
            .await
            .map_err(|e| RealmlinkError::realtime(e, RealmlinkError::Match))
    }

    pub fn match_handle(&self, match_id: &MatchId) -> Option<MatchHandle> {
        self.socket.match_handle(match_id)
    }

    // -- Chat --

    pub async fn join_chat(
        &self,
        name: &str,
        kind: ChannelKind,
    ) -> Result<ChannelHandle, RealmlinkError> {
        self.join_chat_with(name, kind, ChannelOptions::default())
            .await
    }

    pub async fn join_chat_with(
        &self,
        name: &str,
        kind: ChannelKind,
        options: ChannelOptions,
    ) -> Result<ChannelHandle, RealmlinkError> {
        self.socket
            .join_chat_with(name, kind, options)
            .await
            .map_err(|e| RealmlinkError::realtime(e, RealmlinkError::Chat))
    }

    pub async fn leave_chat(&self, name: &str) -> Result<(), RealmlinkError> {
        self.socket
            .leave_chat(name)
            .await
            .map_err(|e| RealmlinkError::realtime(e, RealmlinkError::Chat))
    }

    pub async fn send_chat(
        &self,
        name: &str,
        content: &str,
    ) -> Result<ChannelMessageAck, RealmlinkError> {
        self.socket
            .send_chat(name, content)
            .await
            .map_err(|e| RealmlinkError::realtime(e, RealmlinkError::Chat))
    }

    pub fn channel_handle(&self, name: &str) -> Option<ChannelHandle> {
        self.socket.channel_handle(name)
    }

    // -- Matchmaker --

    pub async fn add_matchmaker(
        &self,
        request: MatchmakerRequest,
    ) -> Result<Ticket, RealmlinkError> {
        self.socket
            .add_matchmaker(request)
            .await
            .map_err(|e| RealmlinkError::realtime(e, RealmlinkError::Matchmaker))
    }

    pub async fn remove_matchmaker(&self, ticket: &str) -> Result<(), RealmlinkError> {
        self.socket
            .remove_matchmaker(ticket)
            .await
            .map_err(|e| RealmlinkError::realtime(e, RealmlinkError::Matchmaker))
    }

    pub fn tickets(&self) -> Vec<Ticket> {
        self.socket.tickets()
    }
}

/// Socket lifecycle failures are connection failures.
fn socket_error(err: RealtimeError) -> RealmlinkError {
    RealmlinkError::Connection(ConnectionError::Socket(err))
}
