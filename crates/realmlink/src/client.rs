//! HTTP API client.
//!
//! Stateless request/response calls: authentication, RPC, storage, logout.
//! Each call builds an [`HttpRequest`], hands it to the [`HttpTransport`],
//! and maps the response. There are no retries; a failed call fails.

use std::fmt::Write as _;

use realmlink_protocol::{
    ApiErrorBody, AuthOptions, Codec, Credentials, JsonCodec, ProtocolError, ReadStorageRequest,
    RpcResponse,
    SessionTokens, StorageAck, StorageAcks, StorageObject, StorageObjectId, StorageObjects,
    StorageWrite, WriteStorageRequest,
};
use realmlink_session::{Authenticator, Session};
use realmlink_transport::{Authorization, HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use serde::Serialize;

use crate::error::{ApiError, AuthError};
use crate::{ClientConfig, RealmlinkError};

/// Client for the backend's HTTP API.
pub struct ApiClient<H: HttpTransport> {
    config: ClientConfig,
    http: H,
    codec: JsonCodec,
}

impl<H: HttpTransport> ApiClient<H> {
    pub fn new(config: ClientConfig, http: H) -> Self {
        Self {
            config,
            http,
            codec: JsonCodec,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // -- Authentication --

    /// Exchanges credentials for a session.
    ///
    /// # Errors
    /// - `Auth` if the server rejects the credentials or returns a token
    ///   that can't be read
    /// - `Connection` if the server can't be reached
    pub async fn authenticate(
        &self,
        credentials: &Credentials,
        options: &AuthOptions,
    ) -> Result<Session, RealmlinkError> {
        let mut request = HttpRequest::new(
            HttpMethod::Post,
            format!("/v2/account/authenticate/{}", credentials.method()),
        )
        .with_query("create", options.create.to_string())
        .with_auth(Authorization::Basic {
            username: self.config.server_key.clone(),
            password: String::new(),
        })
        .with_body(self.codec.encode(credentials)?);
        if let Some(username) = &options.username {
            request = request.with_query("username", username.clone());
        }

        let response = self.http.execute(request).await?;
        if !response.is_success() {
            let err = api_error(&response);
            tracing::warn!(method = credentials.method(), status = err.status, "authentication rejected");
            return Err(RealmlinkError::Auth(AuthError::Rejected(err)));
        }

        let tokens: SessionTokens = self.codec.decode(&response.body)?;
        let session = Session::from_tokens(tokens)?;
        tracing::info!(
            method = credentials.method(),
            user_id = %session.user_id(),
            created = session.created(),
            "authenticated"
        );
        Ok(session)
    }

    /// Email/password authentication.
    pub async fn authenticate_email(
        &self,
        email: &str,
        password: &str,
        options: &AuthOptions,
    ) -> Result<Session, RealmlinkError> {
        self.authenticate(&Credentials::email(email, password), options)
            .await
    }

    /// Custom-id authentication.
    pub async fn authenticate_custom(
        &self,
        id: &str,
        options: &AuthOptions,
    ) -> Result<Session, RealmlinkError> {
        self.authenticate(&Credentials::custom(id), options).await
    }

    /// Invalidates the session's tokens on the server.
    pub async fn logout(&self, session: &Session) -> Result<(), RealmlinkError> {
        #[derive(Serialize)]
        struct Logout<'a> {
            token: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            refresh_token: Option<&'a str>,
        }

        let body = self.codec.encode(&Logout {
            token: session.token(),
            refresh_token: session.refresh_token(),
        })?;
        let response = self
            .http
            .execute(authorized(HttpMethod::Post, "/v2/session/logout", session).with_body(body))
            .await?;
        if !response.is_success() {
            return Err(RealmlinkError::Auth(AuthError::Rejected(api_error(&response))));
        }
        tracing::info!(user_id = %session.user_id(), "logged out");
        Ok(())
    }

    // -- RPC --

    /// Calls a server-side function. `payload` is passed through as text.
    pub async fn rpc(
        &self,
        session: &Session,
        id: &str,
        payload: &str,
    ) -> Result<RpcResponse, RealmlinkError> {
        let path = format!("/v2/rpc/{}", path_segment(id)?);
        // The endpoint takes the payload as a JSON string literal.
        let body = self.codec.encode(&payload)?;
        let response = self
            .http
            .execute(authorized(HttpMethod::Post, &path, session).with_body(body))
            .await?;
        if !response.is_success() {
            let err = api_error(&response);
            tracing::debug!(rpc = id, status = err.status, "rpc failed");
            return Err(RealmlinkError::Rpc(err));
        }
        Ok(self.codec.decode(&response.body)?)
    }

    // -- Storage --

    /// Reads objects. Objects that don't exist (or aren't readable) are
    /// simply missing from the result.
    pub async fn read_storage(
        &self,
        session: &Session,
        ids: &[StorageObjectId],
    ) -> Result<Vec<StorageObject>, RealmlinkError> {
        let body = self.codec.encode(&ReadStorageRequest {
            object_ids: ids.to_vec(),
        })?;
        let response = self
            .http
            .execute(authorized(HttpMethod::Post, "/v2/storage", session).with_body(body))
            .await?;
        if !response.is_success() {
            return Err(RealmlinkError::Storage(api_error(&response)));
        }
        let objects: StorageObjects = self.codec.decode(&response.body)?;
        Ok(objects.objects)
    }

    /// Writes objects, returning one ack per object.
    pub async fn write_storage(
        &self,
        session: &Session,
        writes: &[StorageWrite],
    ) -> Result<Vec<StorageAck>, RealmlinkError> {
        let body = self.codec.encode(&WriteStorageRequest {
            objects: writes.to_vec(),
        })?;
        let response = self
            .http
            .execute(authorized(HttpMethod::Put, "/v2/storage", session).with_body(body))
            .await?;
        if !response.is_success() {
            return Err(RealmlinkError::Storage(api_error(&response)));
        }
        let acks: StorageAcks = self.codec.decode(&response.body)?;
        tracing::debug!(count = acks.acks.len(), "storage written");
        Ok(acks.acks)
    }
}

impl<H: HttpTransport> Authenticator for ApiClient<H> {
    type Error = RealmlinkError;

    async fn authenticate(
        &self,
        credentials: &Credentials,
        options: &AuthOptions,
    ) -> Result<Session, RealmlinkError> {
        ApiClient::authenticate(self, credentials, options).await
    }
}

/// A request carrying the session's bearer token.
fn authorized(method: HttpMethod, path: &str, session: &Session) -> HttpRequest {
    HttpRequest::new(method, path).with_auth(Authorization::Bearer(session.token().to_string()))
}

/// Escapes `raw` for use as one path segment. Everything outside the
/// unreserved set is percent-encoded, so a `/`, `?` or `#` in an id can't
/// change which endpoint is hit.
///
/// # Errors
/// `InvalidMessage` for an empty id or a dot segment.
fn path_segment(raw: &str) -> Result<String, ProtocolError> {
    if matches!(raw, "" | "." | "..") {
        return Err(ProtocolError::InvalidMessage(format!(
            "{raw:?} is not a usable path segment"
        )));
    }
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(char::from(byte));
            }
            _ => {
                let _ = write!(out, "%{byte:02X}");
            }
        }
    }
    Ok(out)
}

/// Best-effort decode of an error response.
fn api_error(response: &HttpResponse) -> ApiError {
    let body: ApiErrorBody = JsonCodec.decode(&response.body).unwrap_or_default();
    let message = if body.message.is_empty() {
        String::from_utf8_lossy(&response.body).into_owned()
    } else {
        body.message
    };
    ApiError {
        status: response.status,
        code: body.code,
        message,
    }
}
