//! Request/response transport used for the backend's HTTP API.
//!
//! The upper layers build an [`HttpRequest`] (path relative to the server's
//! base URL, query pairs, credentials, optional JSON body) and hand it to an
//! [`HttpTransport`]. What travels in the body is the protocol layer's
//! business; this layer only moves bytes.

use std::future::Future;

use crate::TransportError;

/// HTTP verbs used by the backend API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

/// Credentials attached to a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Authorization {
    /// No `Authorization` header.
    #[default]
    None,
    /// HTTP basic auth. Authentication calls use the server key here.
    Basic { username: String, password: String },
    /// Bearer token. Calls made on behalf of a session use its token.
    Bearer(String),
}

/// A request relative to the transport's base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Absolute path, e.g. `/v2/rpc/echo`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub auth: Authorization,
    /// JSON body, if any.
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Creates a request with no query, credentials or body.
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            auth: Authorization::None,
            body: None,
        }
    }

    /// Appends a query parameter.
    pub fn with_query(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Sets the request credentials.
    pub fn with_auth(mut self, auth: Authorization) -> Self {
        self.auth = auth;
        self
    }

    /// Sets the JSON body.
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }
}

/// Status and raw body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes HTTP requests against one backend.
///
/// A non-2xx status is NOT a transport error: it comes back as a normal
/// [`HttpResponse`] and the caller decides what it means. Only failures to
/// deliver the request or read the response are [`TransportError`]s.
pub trait HttpTransport: Send + Sync + 'static {
    /// Sends the request and waits for the full response.
    fn execute(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}

// ---------------------------------------------------------------------------
// ReqwestTransport
// ---------------------------------------------------------------------------

/// An [`HttpTransport`] backed by a `reqwest` client.
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    base_url: String,
    client: reqwest::Client,
}

#[cfg(feature = "http")]
impl ReqwestTransport {
    /// Creates a transport rooted at `base_url` (e.g. `http://127.0.0.1:7350`).
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::RequestFailed(std::io::Error::other(e)))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Returns the base URL requests are resolved against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(feature = "http")]
impl HttpTransport for ReqwestTransport {
    async fn execute(
        &self,
        request: HttpRequest,
    ) -> Result<HttpResponse, TransportError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };
        let url = format!("{}{}", self.base_url, request.path);

        let mut builder = self
            .client
            .request(method, &url)
            .query(&request.query)
            .header(reqwest::header::ACCEPT, "application/json");

        builder = match request.auth {
            Authorization::None => builder,
            Authorization::Basic { username, password } => {
                builder.basic_auth(username, Some(password))
            }
            Authorization::Bearer(token) => builder.bearer_auth(token),
        };

        if let Some(body) = request.body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::RequestFailed(std::io::Error::other(e)))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::ReceiveFailed(std::io::Error::other(e)))?;

        tracing::debug!(path = %request.path, status, "HTTP request completed");
        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}
