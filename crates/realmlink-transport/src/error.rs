/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection handshake could not be completed.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// The server refused the handshake because of the credentials it
    /// carried (HTTP 401 or 403).
    #[error("handshake rejected with status {status}")]
    Unauthorized { status: u16 },

    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// An HTTP request could not be delivered or its response read.
    #[error("request failed: {0}")]
    RequestFailed(#[source] std::io::Error),
}
