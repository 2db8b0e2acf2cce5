//! Client configuration.

use realmlink_realtime::SocketConfig;

/// Where the backend lives and how to talk to it.
///
/// `Default` points at a backend running locally with its stock settings.
/// Override only what differs:
///
/// ```rust
/// use realmlink::ClientConfig;
///
/// let config = ClientConfig::default()
///     .with_host("game.example.com")
///     .with_scheme("https")
///     .with_port(443);
///
/// assert_eq!(config.base_url(), "https://game.example.com:443");
/// assert_eq!(config.socket_endpoint(), "wss://game.example.com:443/ws");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// `http` or `https`. The socket uses `ws` or `wss` to match.
    pub scheme: String,
    pub host: String,
    pub port: u16,
    /// Key identifying this game to the server, sent on authentication.
    pub server_key: String,
    /// Language tag sent when the socket opens.
    pub lang: String,
    /// Whether the user appears online to others while the socket is open.
    pub appear_online: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            scheme: "http".into(),
            host: "127.0.0.1".into(),
            port: 7350,
            server_key: "nakama_key".into(),
            lang: "en".into(),
            appear_online: false,
        }
    }
}

impl ClientConfig {
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_server_key(mut self, server_key: impl Into<String>) -> Self {
        self.server_key = server_key.into();
        self
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    pub fn with_appear_online(mut self, appear_online: bool) -> Self {
        self.appear_online = appear_online;
        self
    }

    /// Root of the HTTP API, e.g. `http://127.0.0.1:7350`.
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }

    /// The realtime socket URL, without query.
    pub fn socket_endpoint(&self) -> String {
        let scheme = if self.scheme.eq_ignore_ascii_case("https") {
            "wss"
        } else {
            "ws"
        };
        format!("{scheme}://{}:{}/ws", self.host, self.port)
    }

    /// Socket settings derived from this config.
    pub fn socket_config(&self) -> SocketConfig {
        SocketConfig::new(self.socket_endpoint())
            .with_lang(self.lang.clone())
            .with_appear_online(self.appear_online)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_points_at_local_backend() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url(), "http://127.0.0.1:7350");
        assert_eq!(config.socket_endpoint(), "ws://127.0.0.1:7350/ws");
        assert_eq!(config.server_key, "nakama_key");
    }

    #[test]
    fn test_socket_config_carries_lang_and_status() {
        let socket = ClientConfig::default()
            .with_lang("fr")
            .with_appear_online(true)
            .socket_config();

        assert_eq!(socket.endpoint, "ws://127.0.0.1:7350/ws");
        assert_eq!(socket.lang, "fr");
        assert!(socket.appear_online);
    }
}
