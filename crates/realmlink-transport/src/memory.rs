//! In-process connections backed by tokio channels.
//!
//! A [`MemoryConnector`] hands the far end of every connection it opens to
//! its paired [`MemoryAcceptor`], so a test (or an offline session) can play
//! the backend's role in the same process.

use tokio::sync::{mpsc, Mutex};

use crate::{Connection, ConnectionId, Connector, TransportError};

/// Dials in-memory connections. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    accepted: mpsc::UnboundedSender<(MemoryConnection, String)>,
}

impl MemoryConnector {
    /// Creates a connector and the acceptor that receives its server ends.
    pub fn new() -> (Self, MemoryAcceptor) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { accepted: tx }, MemoryAcceptor { incoming: rx })
    }
}

impl Connector for MemoryConnector {
    type Connection = MemoryConnection;

    async fn connect(&self, url: &str) -> Result<Self::Connection, TransportError> {
        let (client, server) = MemoryConnection::pair();
        self.accepted
            .send((server, url.to_string()))
            .map_err(|_| {
                TransportError::ConnectFailed(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "no acceptor is listening",
                ))
            })?;
        tracing::debug!(id = %client.id(), "in-memory connection opened");
        Ok(client)
    }
}

/// Receives the server ends of connections opened by a [`MemoryConnector`].
#[derive(Debug)]
pub struct MemoryAcceptor {
    incoming: mpsc::UnboundedReceiver<(MemoryConnection, String)>,
}

impl MemoryAcceptor {
    /// Waits for the next connection and the URL it was dialed with.
    ///
    /// Returns `None` once every connector has been dropped.
    pub async fn accept(&mut self) -> Option<(MemoryConnection, String)> {
        self.incoming.recv().await
    }
}

/// One end of an in-memory duplex connection.
#[derive(Debug)]
pub struct MemoryConnection {
    id: ConnectionId,
    outgoing: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    incoming: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

impl MemoryConnection {
    /// Creates two connected ends. Bytes sent on one are received on the other.
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        let a = Self {
            id: ConnectionId::next(),
            outgoing: Mutex::new(Some(a_tx)),
            incoming: Mutex::new(b_rx),
        };
        let b = Self {
            id: ConnectionId::next(),
            outgoing: Mutex::new(Some(b_tx)),
            incoming: Mutex::new(a_rx),
        };
        (a, b)
    }
}

impl Connection for MemoryConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let outgoing = self.outgoing.lock().await;
        let tx = outgoing.as_ref().ok_or_else(|| {
            TransportError::ConnectionClosed("closed locally".into())
        })?;
        tx.send(data.to_vec()).map_err(|_| {
            TransportError::ConnectionClosed("peer went away".into())
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        Ok(self.incoming.lock().await.recv().await)
    }

    async fn close(&self) -> Result<(), TransportError> {
        // Dropping our sender ends the peer's receive stream.
        self.outgoing.lock().await.take();
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
