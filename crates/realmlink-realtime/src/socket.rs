//! The realtime socket: one persistent connection and everything riding on it.
//!
//! The socket owns a state machine, a background reader task, the table of
//! requests waiting for replies, the subscription registry, and the event
//! dispatcher.
//!
//! ```text
//!   Disconnected ──open()──→ Connecting ──(connected)──→ Connected
//!        ↑                      │                          │
//!        ├────(connect failed)──┘                          │ close()
//!        │                                                 ▼
//!        └───────(teardown)───────────────────────────── Closing
//!        ↑                                                 │
//!        └─────────(remote close / read error)─────────────┘ (from Connected)
//! ```
//!
//! # Requests and replies
//!
//! Each request gets a fresh correlation id (`cid`). The caller parks on a
//! `oneshot` stored under that id; the reader task completes it when a frame
//! with the same `cid` arrives. Frames without a `cid` are pushes and go to
//! the [`EventDispatcher`].
//!
//! # Teardown
//!
//! However the connection ends, teardown runs once, in this order:
//!
//! 1. every waiting request fails with [`RealtimeError::Closed`]
//! 2. the registry is purged (matches, channels, tickets)
//! 3. the state becomes `Disconnected`
//! 4. `error` is dispatched (read failures only), then `closed`
//!
//! # Locking
//!
//! Shared state sits behind `std::sync::Mutex`es that are only ever held
//! for a few lines of synchronous code, never across an `.await`. Lock order
//! is link → pending → subscriptions.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use realmlink_protocol::{
    ChannelKind, ChannelMessageAck, Codec, Envelope, JsonCodec, MatchId, MatchmakerMatched,
    RealtimeMessage,
};
use realmlink_session::{Session, SessionError};
use realmlink_transport::{Connection, Connector};
use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::dispatcher::CloseReason;
use crate::registry::{ChannelHandle, MatchHandle, Subscriptions, Ticket};
use crate::{EventDispatcher, MatchmakerRequest, RealtimeError};

// ---------------------------------------------------------------------------
// SocketState
// ---------------------------------------------------------------------------

/// Lifecycle state of a [`RealtimeSocket`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SocketState {
    /// No connection. The only state `open()` is accepted in.
    Disconnected,
    /// `open()` is waiting for the transport handshake.
    Connecting,
    /// Live. Requests and pushes flow.
    Connected,
    /// `close()` is shutting the connection down.
    Closing,
}

impl fmt::Display for SocketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closing => "closing",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// SocketConfig
// ---------------------------------------------------------------------------

/// Where and how the socket connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketConfig {
    /// Full socket URL without query, e.g. `ws://127.0.0.1:7350/ws`.
    pub endpoint: String,
    /// Language tag sent to the server for localized messages.
    pub lang: String,
    /// Whether other users see this user as online while connected.
    pub appear_online: bool,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://127.0.0.1:7350/ws".into(),
            lang: "en".into(),
            appear_online: false,
        }
    }
}

impl SocketConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    pub fn with_appear_online(mut self, appear_online: bool) -> Self {
        self.appear_online = appear_online;
        self
    }

    /// The URL dialed for a session with this token.
    pub fn url(&self, token: &str) -> String {
        format!(
            "{}?lang={}&status={}&token={}",
            self.endpoint, self.lang, self.appear_online, token
        )
    }
}

/// Options for joining a chat channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelOptions {
    /// Store messages server-side so history can be listed later.
    pub persistence: bool,
    /// Hide this user's presence from the other members.
    pub hidden: bool,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            persistence: true,
            hidden: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

type Reply = Result<RealtimeMessage, RealtimeError>;

/// The live connection and the means to stop its reader.
struct Link<C> {
    conn: Arc<C>,
    shutdown: oneshot::Sender<()>,
    reader: JoinHandle<()>,
}

struct LinkSlot<C> {
    /// Bumped by every `open()` and by `close()` during `Connecting`, so a
    /// handshake that finishes after being abandoned can tell.
    epoch: u64,
    link: Option<Link<C>>,
}

#[derive(Default)]
struct Pending {
    /// `true` while requests may be registered. Cleared by teardown in the
    /// same critical section that drains `waiters`.
    open: bool,
    waiters: HashMap<u64, oneshot::Sender<Reply>>,
}

/// State shared between the socket handle and its reader task.
struct Shared<C> {
    state: watch::Sender<SocketState>,
    link: Mutex<LinkSlot<C>>,
    pending: Mutex<Pending>,
    subs: Mutex<Subscriptions>,
    events: EventDispatcher,
    next_cid: AtomicU64,
    codec: JsonCodec,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<C: Connection> Shared<C> {
    fn state(&self) -> SocketState {
        *self.state.borrow()
    }

    fn set_state(&self, state: SocketState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "socket state changed");
        }
    }

    /// Runs the teardown sequence described in the module docs.
    fn teardown(&self, error: Option<RealtimeError>, reason: CloseReason) {
        let waiters = {
            let mut pending = lock(&self.pending);
            pending.open = false;
            std::mem::take(&mut pending.waiters)
        };
        let failed = waiters.len();
        for (_, waiter) in waiters {
            let _ = waiter.send(Err(RealtimeError::Closed));
        }

        lock(&self.subs).purge();
        self.set_state(SocketState::Disconnected);

        match &error {
            Some(e) => tracing::warn!(error = %e, ?reason, failed, "socket closed"),
            None => tracing::info!(?reason, failed, "socket closed"),
        }
        if let Some(e) = error {
            self.events.error.publish(Arc::new(e));
        }
        self.events.closed.publish(reason);
    }

    /// Called by the reader when the connection ended on its own.
    ///
    /// Does nothing if `close()` already took the link; it performs the
    /// teardown itself.
    fn connection_lost(&self, conn: &Arc<C>, error: Option<RealtimeError>) {
        let ours = {
            let mut slot = lock(&self.link);
            let ours = slot
                .link
                .as_ref()
                .is_some_and(|link| Arc::ptr_eq(&link.conn, conn));
            if ours {
                slot.link = None;
                self.set_state(SocketState::Closing);
            }
            ours
        };

        if ours {
            let reason = if error.is_some() {
                CloseReason::Error
            } else {
                CloseReason::Remote
            };
            self.teardown(error, reason);
        }
    }

    /// Decodes one inbound frame and routes it.
    fn handle_frame(&self, bytes: &[u8]) {
        let envelope: Envelope = match self.codec.decode(bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "dropping undecodable frame");
                self.events
                    .error
                    .publish(Arc::new(RealtimeError::Protocol(e)));
                return;
            }
        };

        match envelope.cid {
            Some(cid) => {
                let waiter = lock(&self.pending).waiters.remove(&cid);
                match waiter {
                    Some(waiter) => {
                        let _ = waiter.send(Ok(envelope.message));
                    }
                    None => tracing::debug!(cid, "reply for unknown request"),
                }
            }
            None => self.handle_push(envelope.message),
        }
    }

    fn handle_push(&self, message: RealtimeMessage) {
        match message {
            RealtimeMessage::MatchData(data) => {
                self.events.match_state.publish(data);
            }
            RealtimeMessage::MatchPresenceEvent(event) => {
                {
                    let mut subs = lock(&self.subs);
                    let self_left = subs
                        .matches
                        .get_mut(&event.match_id)
                        .is_some_and(|handle| handle.apply_presence(&event));
                    if self_left {
                        subs.matches.remove(&event.match_id);
                        tracing::info!(match_id = %event.match_id, "removed from match");
                    }
                }
                self.events.match_presence.publish(event);
            }
            RealtimeMessage::ChannelMessage(message) => {
                self.events.channel_message.publish(message);
            }
            RealtimeMessage::ChannelPresenceEvent(event) => {
                {
                    let mut subs = lock(&self.subs);
                    let self_left = subs
                        .channel_by_id_mut(&event.channel_id)
                        .is_some_and(|handle| handle.apply_presence(&event));
                    if self_left {
                        let name = subs.channel_name(&event.channel_id).map(str::to_string);
                        if let Some(name) = name {
                            subs.channels.remove(&name);
                            tracing::info!(channel = %name, "removed from channel");
                        }
                    }
                }
                self.events.channel_presence.publish(event);
            }
            RealtimeMessage::MatchmakerMatched(matched) => {
                if lock(&self.subs).tickets.remove(&matched.ticket).is_some() {
                    tracing::info!(ticket = %matched.ticket, "matchmaker ticket matched");
                }
                self.events.matchmaker_matched.publish(matched);
            }
            RealtimeMessage::Error { code, message } => {
                tracing::warn!(code, %message, "server reported an error");
                self.events
                    .error
                    .publish(Arc::new(RealtimeError::Rejected { code, message }));
            }
            other => tracing::debug!(?other, "ignoring unexpected push"),
        }
    }
}

/// The reader task: forwards frames until shut down or the connection ends.
async fn read_loop<C: Connection>(
    shared: Arc<Shared<C>>,
    conn: Arc<C>,
    mut shutdown: oneshot::Receiver<()>,
) {
    tracing::debug!(conn = %conn.id(), "socket reader started");
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::debug!(conn = %conn.id(), "socket reader stopped");
                return;
            }
            result = conn.recv() => match result {
                Ok(Some(bytes)) => shared.handle_frame(&bytes),
                Ok(None) => {
                    shared.connection_lost(&conn, None);
                    return;
                }
                Err(e) => {
                    shared.connection_lost(&conn, Some(RealtimeError::Transport(e)));
                    return;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// RealtimeSocket
// ---------------------------------------------------------------------------

/// A realtime connection to the backend.
///
/// All methods take `&self`: the socket can be shared (e.g. in an `Arc`)
/// between the tasks that send and the tasks that observe events.
pub struct RealtimeSocket<K: Connector> {
    connector: K,
    config: SocketConfig,
    shared: Arc<Shared<K::Connection>>,
}

impl<K: Connector> RealtimeSocket<K> {
    /// Creates a disconnected socket.
    pub fn new(connector: K, config: SocketConfig) -> Self {
        let (state, _) = watch::channel(SocketState::Disconnected);
        Self {
            connector,
            config,
            shared: Arc::new(Shared {
                state,
                link: Mutex::new(LinkSlot {
                    epoch: 0,
                    link: None,
                }),
                pending: Mutex::new(Pending::default()),
                subs: Mutex::new(Subscriptions::new()),
                events: EventDispatcher::new(),
                next_cid: AtomicU64::new(1),
                codec: JsonCodec,
            }),
        }
    }

    // -- Accessors --

    pub fn state(&self) -> SocketState {
        self.shared.state()
    }

    /// A receiver that observes every state transition from now on.
    pub fn state_changes(&self) -> watch::Receiver<SocketState> {
        self.shared.state.subscribe()
    }

    pub fn config(&self) -> &SocketConfig {
        &self.config
    }

    pub fn events(&self) -> &EventDispatcher {
        &self.shared.events
    }

    /// Snapshot of the handle for a joined match.
    pub fn match_handle(&self, match_id: &MatchId) -> Option<MatchHandle> {
        lock(&self.shared.subs).matches.get(match_id).cloned()
    }

    /// Snapshot of the handle for a chat channel, by the name it was joined with.
    pub fn channel_handle(&self, name: &str) -> Option<ChannelHandle> {
        lock(&self.shared.subs).channels.get(name).cloned()
    }

    /// Snapshot of every ticket still waiting for a match.
    pub fn tickets(&self) -> Vec<Ticket> {
        lock(&self.shared.subs).tickets.values().cloned().collect()
    }

    // -- Lifecycle --

    /// Connects with `session`'s token.
    ///
    /// # Errors
    /// - [`RealtimeError::Session`] if the session has expired
    /// - [`RealtimeError::AlreadyOpen`] unless the socket is `Disconnected`
    /// - [`RealtimeError::Transport`] if the connection can't be made
    /// - [`RealtimeError::Closed`] if `close()` abandoned the attempt
    pub async fn open(&self, session: &Session) -> Result<(), RealtimeError> {
        if session.is_expired() {
            return Err(SessionError::Expired {
                expires_at: session.expires_at(),
            }
            .into());
        }

        let attempt = {
            let mut slot = lock(&self.shared.link);
            let current = self.shared.state();
            if current != SocketState::Disconnected {
                return Err(RealtimeError::AlreadyOpen(current));
            }
            slot.epoch += 1;
            self.shared.set_state(SocketState::Connecting);
            slot.epoch
        };

        tracing::info!(endpoint = %self.config.endpoint, user_id = %session.user_id(), "socket connecting");
        let connected = self.connector.connect(&self.config.url(session.token())).await;

        let conn = match connected {
            Ok(conn) => Arc::new(conn),
            Err(e) => {
                let slot = lock(&self.shared.link);
                if slot.epoch == attempt && self.shared.state() == SocketState::Connecting {
                    self.shared.set_state(SocketState::Disconnected);
                }
                tracing::warn!(error = %e, "socket connect failed");
                return Err(e.into());
            }
        };

        let installed = {
            let mut slot = lock(&self.shared.link);
            if slot.epoch == attempt && self.shared.state() == SocketState::Connecting {
                let (shutdown, shutdown_rx) = oneshot::channel();
                let reader = tokio::spawn(read_loop(
                    Arc::clone(&self.shared),
                    Arc::clone(&conn),
                    shutdown_rx,
                ));
                slot.link = Some(Link {
                    conn: Arc::clone(&conn),
                    shutdown,
                    reader,
                });
                lock(&self.shared.pending).open = true;
                self.shared.set_state(SocketState::Connected);
                true
            } else {
                false
            }
        };

        if !installed {
            tracing::info!(conn = %conn.id(), "open abandoned by close");
            let _ = conn.close().await;
            return Err(RealtimeError::Closed);
        }

        tracing::info!(conn = %conn.id(), "socket connected");
        self.shared.events.connected.publish(());
        Ok(())
    }

    /// Closes the socket. Always ends in `Disconnected`; a no-op if already
    /// there.
    pub async fn close(&self) -> Result<(), RealtimeError> {
        let link = {
            let mut slot = lock(&self.shared.link);
            match self.shared.state() {
                SocketState::Disconnected => return Ok(()),
                SocketState::Connecting => {
                    slot.epoch += 1;
                    self.shared.set_state(SocketState::Disconnected);
                    tracing::info!("socket open abandoned");
                    return Ok(());
                }
                SocketState::Closing => None,
                SocketState::Connected => {
                    self.shared.set_state(SocketState::Closing);
                    slot.link.take()
                }
            }
        };

        let Some(link) = link else {
            // Someone else is tearing down; wait for them to finish.
            let mut changes = self.shared.state.subscribe();
            let _ = changes
                .wait_for(|s| *s == SocketState::Disconnected)
                .await;
            return Ok(());
        };

        tracing::info!(conn = %link.conn.id(), "socket closing");
        let _ = link.shutdown.send(());
        if let Err(e) = link.conn.close().await {
            tracing::debug!(error = %e, "close frame not sent");
        }
        let _ = link.reader.await;

        self.shared.teardown(None, CloseReason::Requested);
        Ok(())
    }

    // -- Matches --

    /// Joins a match by id and registers a fresh handle for it.
    ///
    /// Joining a match that is already registered replaces its handle.
    pub async fn join_match(&self, match_id: &MatchId) -> Result<MatchHandle, RealtimeError> {
        self.join(RealtimeMessage::MatchJoin {
            match_id: Some(match_id.clone()),
            token: None,
            metadata: HashMap::new(),
        })
        .await
    }

    /// Joins the match a matchmaker result points at.
    ///
    /// # Errors
    /// [`RealtimeError::InvalidMatchmaker`] if the result has neither a match
    /// id nor a token; otherwise as [`join_match`](Self::join_match).
    pub async fn join_matched(
        &self,
        matched: &MatchmakerMatched,
    ) -> Result<MatchHandle, RealtimeError> {
        let message = match (&matched.match_id, &matched.token) {
            (Some(match_id), _) => RealtimeMessage::MatchJoin {
                match_id: Some(match_id.clone()),
                token: None,
                metadata: HashMap::new(),
            },
            (None, Some(token)) => RealtimeMessage::MatchJoin {
                match_id: None,
                token: Some(token.clone()),
                metadata: HashMap::new(),
            },
            (None, None) => {
                return Err(RealtimeError::InvalidMatchmaker(format!(
                    "result for ticket {} has no match id or token",
                    matched.ticket
                )));
            }
        };
        self.join(message).await
    }

    async fn join(&self, message: RealtimeMessage) -> Result<MatchHandle, RealtimeError> {
        self.ensure_connected()?;
        let info = match self.request(message).await? {
            RealtimeMessage::Match(info) => info,
            other => return Err(unexpected("Match", &other)),
        };

        let handle = MatchHandle::from_info(info);
        let replaced = lock(&self.shared.subs)
            .matches
            .put(handle.match_id.clone(), handle.clone());
        tracing::info!(
            match_id = %handle.match_id,
            handle = %handle.id,
            rejoined = replaced.is_some(),
            "joined match"
        );
        Ok(handle)
    }

    /// Leaves a joined match.
    ///
    /// # Errors
    /// [`RealtimeError::UnknownMatch`] if the match isn't registered.
    pub async fn leave_match(&self, match_id: &MatchId) -> Result<(), RealtimeError> {
        self.ensure_connected()?;
        if !lock(&self.shared.subs).matches.contains(match_id) {
            return Err(RealtimeError::UnknownMatch(match_id.clone()));
        }

        let reply = self
            .request(RealtimeMessage::MatchLeave {
                match_id: match_id.clone(),
            })
            .await?;
        expect_ack(reply)?;

        lock(&self.shared.subs).matches.remove(match_id);
        tracing::info!(%match_id, "left match");
        Ok(())
    }

    /// Leaves the match `handle` was returned for.
    ///
    /// # Errors
    /// [`RealtimeError::UnknownMatch`] if `handle` is no longer the
    /// registered one: the match was left, or a later join replaced it.
    pub async fn leave_match_handle(&self, handle: &MatchHandle) -> Result<(), RealtimeError> {
        self.ensure_connected()?;
        let current = lock(&self.shared.subs)
            .matches
            .get(&handle.match_id)
            .map(|registered| registered.id);
        if current != Some(handle.id) {
            return Err(RealtimeError::UnknownMatch(handle.match_id.clone()));
        }
        self.leave_match(&handle.match_id).await
    }

    /// Sends match state. Returns once the frame is written; the server
    /// doesn't acknowledge it.
    ///
    /// # Errors
    /// - [`RealtimeError::NotConnected`] unless `Connected`
    /// - [`RealtimeError::UnknownMatch`] if the match isn't registered
    pub async fn send_match_state(
        &self,
        match_id: &MatchId,
        op_code: i64,
        data: &[u8],
    ) -> Result<(), RealtimeError> {
        self.ensure_connected()?;
        if !lock(&self.shared.subs).matches.contains(match_id) {
            return Err(RealtimeError::UnknownMatch(match_id.clone()));
        }

        let envelope = Envelope::push(RealtimeMessage::MatchDataSend {
            match_id: match_id.clone(),
            op_code,
            data: data.to_vec(),
        });
        self.send_envelope(&envelope).await
    }

    // -- Chat --

    /// Joins a chat channel with default options. See
    /// [`join_chat_with`](Self::join_chat_with).
    pub async fn join_chat(
        &self,
        name: &str,
        kind: ChannelKind,
    ) -> Result<ChannelHandle, RealtimeError> {
        self.join_chat_with(name, kind, ChannelOptions::default())
            .await
    }

    /// Joins a chat channel and registers its handle under `name`.
    pub async fn join_chat_with(
        &self,
        name: &str,
        kind: ChannelKind,
        options: ChannelOptions,
    ) -> Result<ChannelHandle, RealtimeError> {
        self.ensure_connected()?;
        let reply = self
            .request(RealtimeMessage::ChannelJoin {
                target: name.to_string(),
                kind,
                persistence: options.persistence,
                hidden: options.hidden,
            })
            .await?;
        let info = match reply {
            RealtimeMessage::Channel(info) => info,
            other => return Err(unexpected("Channel", &other)),
        };

        let handle = ChannelHandle::from_info(info);
        lock(&self.shared.subs)
            .channels
            .put(name.to_string(), handle.clone());
        tracing::info!(channel = %name, %kind, channel_id = %handle.channel_id, "joined channel");
        Ok(handle)
    }

    /// Leaves a chat channel joined under `name`.
    ///
    /// # Errors
    /// [`RealtimeError::UnknownChannel`] if no channel is registered under it.
    pub async fn leave_chat(&self, name: &str) -> Result<(), RealtimeError> {
        self.ensure_connected()?;
        let channel_id = self.channel_id(name)?;

        let reply = self
            .request(RealtimeMessage::ChannelLeave { channel_id })
            .await?;
        expect_ack(reply)?;

        lock(&self.shared.subs).channels.remove(name);
        tracing::info!(channel = %name, "left channel");
        Ok(())
    }

    /// Sends a chat message to the channel joined under `name`.
    ///
    /// `content` is sent as-is; the server expects a JSON object.
    pub async fn send_chat(
        &self,
        name: &str,
        content: &str,
    ) -> Result<ChannelMessageAck, RealtimeError> {
        self.ensure_connected()?;
        let channel_id = self.channel_id(name)?;

        match self
            .request(RealtimeMessage::ChannelMessageSend {
                channel_id,
                content: content.to_string(),
            })
            .await?
        {
            RealtimeMessage::ChannelMessageAck(ack) => Ok(ack),
            other => Err(unexpected("ChannelMessageAck", &other)),
        }
    }

    fn channel_id(&self, name: &str) -> Result<String, RealtimeError> {
        lock(&self.shared.subs)
            .channels
            .get(name)
            .map(|h| h.channel_id.clone())
            .ok_or_else(|| RealtimeError::UnknownChannel(name.to_string()))
    }

    // -- Matchmaker --

    /// Submits a matchmaker request and registers the returned ticket.
    ///
    /// # Errors
    /// [`RealtimeError::InvalidMatchmaker`] if the request doesn't validate;
    /// nothing is sent in that case.
    pub async fn add_matchmaker(&self, request: MatchmakerRequest) -> Result<Ticket, RealtimeError> {
        self.ensure_connected()?;
        request.validate()?;

        let ticket = match self.request(request.to_message()).await? {
            RealtimeMessage::MatchmakerTicket { ticket } => Ticket::new(ticket, request),
            other => return Err(unexpected("MatchmakerTicket", &other)),
        };

        lock(&self.shared.subs)
            .tickets
            .put(ticket.ticket.clone(), ticket.clone());
        tracing::info!(ticket = %ticket.ticket, query = %ticket.request.query_str(), "matchmaker ticket added");
        Ok(ticket)
    }

    /// Withdraws a waiting ticket.
    ///
    /// # Errors
    /// [`RealtimeError::UnknownTicket`] if it isn't registered (never added,
    /// already removed, or already matched).
    pub async fn remove_matchmaker(&self, ticket: &str) -> Result<(), RealtimeError> {
        self.ensure_connected()?;
        if !lock(&self.shared.subs).tickets.contains(ticket) {
            return Err(RealtimeError::UnknownTicket(ticket.to_string()));
        }

        let reply = self
            .request(RealtimeMessage::MatchmakerRemove {
                ticket: ticket.to_string(),
            })
            .await?;
        expect_ack(reply)?;

        lock(&self.shared.subs).tickets.remove(ticket);
        tracing::info!(%ticket, "matchmaker ticket removed");
        Ok(())
    }

    // -- Plumbing --

    fn ensure_connected(&self) -> Result<(), RealtimeError> {
        match self.state() {
            SocketState::Connected => Ok(()),
            other => Err(RealtimeError::NotConnected(other)),
        }
    }

    /// The live connection, if `Connected`.
    fn connection(&self) -> Result<Arc<K::Connection>, RealtimeError> {
        let slot = lock(&self.shared.link);
        match (&slot.link, self.shared.state()) {
            (Some(link), SocketState::Connected) => Ok(Arc::clone(&link.conn)),
            (_, state) => Err(RealtimeError::NotConnected(state)),
        }
    }

    async fn send_envelope(&self, envelope: &Envelope) -> Result<(), RealtimeError> {
        let conn = self.connection()?;
        let bytes = self.shared.codec.encode(envelope)?;
        conn.send(&bytes).await?;
        Ok(())
    }

    /// Sends `message` with a fresh `cid` and waits for the matching reply.
    ///
    /// An `Error` reply becomes [`RealtimeError::Rejected`].
    async fn request(&self, message: RealtimeMessage) -> Result<RealtimeMessage, RealtimeError> {
        let conn = self.connection()?;
        let cid = self.shared.next_cid.fetch_add(1, Ordering::Relaxed);
        let bytes = self.shared.codec.encode(&Envelope::request(cid, message))?;

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = lock(&self.shared.pending);
            if !pending.open {
                return Err(RealtimeError::NotConnected(self.shared.state()));
            }
            pending.waiters.insert(cid, tx);
        }

        if let Err(e) = conn.send(&bytes).await {
            lock(&self.shared.pending).waiters.remove(&cid);
            return Err(e.into());
        }

        match rx.await {
            Ok(Ok(RealtimeMessage::Error { code, message })) => {
                tracing::debug!(cid, code, %message, "request rejected");
                Err(RealtimeError::Rejected { code, message })
            }
            Ok(reply) => reply,
            // The sender is only dropped without a reply by teardown.
            Err(_) => Err(RealtimeError::Closed),
        }
    }
}

impl<K: Connector> Drop for RealtimeSocket<K> {
    fn drop(&mut self) {
        let link = lock(&self.shared.link).link.take();
        if let Some(link) = link {
            let _ = link.shutdown.send(());
            link.reader.abort();
            self.shared.teardown(None, CloseReason::Requested);
        }
    }
}

fn expect_ack(reply: RealtimeMessage) -> Result<(), RealtimeError> {
    match reply {
        RealtimeMessage::Ack => Ok(()),
        other => Err(unexpected("Ack", &other)),
    }
}

fn unexpected(expected: &str, got: &RealtimeMessage) -> RealtimeError {
    RealtimeError::UnexpectedReply(format!("expected {expected}, got {got:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_config_url_carries_query() {
        let config = SocketConfig::new("ws://example.com:7350/ws")
            .with_lang("de")
            .with_appear_online(true);

        assert_eq!(
            config.url("a.b.c"),
            "ws://example.com:7350/ws?lang=de&status=true&token=a.b.c"
        );
    }

    #[test]
    fn test_socket_config_defaults() {
        let config = SocketConfig::default();
        assert_eq!(config.lang, "en");
        assert!(!config.appear_online);
    }

    #[test]
    fn test_channel_options_default_persistent_and_visible() {
        let options = ChannelOptions::default();
        assert!(options.persistence);
        assert!(!options.hidden);
    }

    #[test]
    fn test_socket_state_display() {
        assert_eq!(SocketState::Closing.to_string(), "closing");
    }

    #[test]
    fn test_expect_ack_rejects_other_message() {
        let result = expect_ack(RealtimeMessage::MatchmakerTicket {
            ticket: "T".into(),
        });
        assert!(matches!(result, Err(RealtimeError::UnexpectedReply(_))));
    }
}
