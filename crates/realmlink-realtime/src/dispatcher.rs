//! Event dispatcher: fans server pushes out to observers.
//!
//! Each event category is a [`Topic`]. Observers call `subscribe()` and get
//! an unbounded receiver; the socket's reader task calls `publish()` for
//! every push it decodes. Delivery is in arrival order. There is no replay:
//! a subscriber only sees events published after it subscribed.
//!
//! ```text
//! reader task ──publish()──→ Topic<T> ──→ subscriber 1 (mpsc)
//!                                     └─→ subscriber 2 (mpsc)
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use realmlink_protocol::{
    ChannelMessage, ChannelPresenceEvent, MatchData, MatchPresenceEvent, MatchmakerMatched,
};
use tokio::sync::mpsc;

use crate::RealtimeError;

/// Channel end an observer reads events from.
pub type Subscriber<T> = mpsc::UnboundedReceiver<T>;

// ---------------------------------------------------------------------------
// Topic
// ---------------------------------------------------------------------------

/// One event category with any number of subscribers.
///
/// Subscribers that dropped their receiver are pruned on the next publish.
#[derive(Debug)]
pub struct Topic<T> {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<T>>>,
}

impl<T> Default for Topic<T> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<T: Clone> Topic<T> {
    /// Registers a new observer.
    pub fn subscribe(&self) -> Subscriber<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);
        rx
    }

    /// Delivers `event` to every live subscriber. Returns how many got it.
    pub fn publish(&self, event: T) -> usize {
        let mut subscribers = self.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        subscribers.len()
    }

    /// Number of subscribers as of the last publish.
    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::UnboundedSender<T>>> {
        // A publisher panicking mid-send leaves the list itself intact.
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// EventDispatcher
// ---------------------------------------------------------------------------

/// Why the socket reached `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// `close()` was called.
    Requested,
    /// The server ended the connection.
    Remote,
    /// A read failed. The error was dispatched just before.
    Error,
}

/// One topic per category of socket event.
#[derive(Debug, Default)]
pub struct EventDispatcher {
    pub connected: Topic<()>,
    pub closed: Topic<CloseReason>,
    pub error: Topic<Arc<RealtimeError>>,
    pub match_state: Topic<MatchData>,
    pub match_presence: Topic<MatchPresenceEvent>,
    pub channel_message: Topic<ChannelMessage>,
    pub channel_presence: Topic<ChannelPresenceEvent>,
    pub matchmaker_matched: Topic<MatchmakerMatched>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }
}
