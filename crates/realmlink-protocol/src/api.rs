//! Request and response bodies for the HTTP API.
//!
//! These are plain data: the paths, headers, and auth schemes that carry
//! them live in the client. Field names match the backend's JSON.

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

/// Credentials for one of the supported authentication methods.
///
/// Serialized untagged, so the body is just the credential fields:
/// `{"email": "...", "password": "..."}` or `{"id": "..."}`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Credentials {
    /// Email and password account.
    Email { email: String, password: String },
    /// A custom id issued by an external identity system.
    Custom { id: String },
}

impl Credentials {
    pub fn email(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Email {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn custom(id: impl Into<String>) -> Self {
        Self::Custom { id: id.into() }
    }

    /// The last path segment of this method's authenticate endpoint.
    pub fn method(&self) -> &'static str {
        match self {
            Self::Email { .. } => "email",
            Self::Custom { .. } => "custom",
        }
    }
}

// Hand-written so passwords never end up in logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Email { email, .. } => f
                .debug_struct("Email")
                .field("email", email)
                .field("password", &"<redacted>")
                .finish(),
            Self::Custom { id } => f.debug_struct("Custom").field("id", id).finish(),
        }
    }
}

/// Options sent as query parameters alongside [`Credentials`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOptions {
    /// Create the account if it doesn't exist yet.
    pub create: bool,
    /// Username to assign when an account is created.
    pub username: Option<String>,
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            create: true,
            username: None,
        }
    }
}

/// The token pair returned by a successful authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTokens {
    pub token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// `true` if this call created the account.
    #[serde(default)]
    pub created: bool,
}

// ---------------------------------------------------------------------------
// RPC
// ---------------------------------------------------------------------------

/// Result of a server-side RPC call.
///
/// The payload is an opaque string (usually JSON) defined by the RPC itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: String,
    #[serde(default)]
    pub payload: String,
}

// ---------------------------------------------------------------------------
// Storage permissions
// ---------------------------------------------------------------------------

/// Who may read a storage object. Encoded as an integer on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ReadPermission {
    /// Only server-side code can read it.
    NoRead,
    /// The owning user can read it.
    #[default]
    OwnerRead,
    /// Any user can read it.
    PublicRead,
}

impl From<ReadPermission> for u8 {
    fn from(p: ReadPermission) -> u8 {
        match p {
            ReadPermission::NoRead => 0,
            ReadPermission::OwnerRead => 1,
            ReadPermission::PublicRead => 2,
        }
    }
}

impl TryFrom<u8> for ReadPermission {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::NoRead),
            1 => Ok(Self::OwnerRead),
            2 => Ok(Self::PublicRead),
            other => Err(ProtocolError::InvalidMessage(format!(
                "read permission out of range: {other}"
            ))),
        }
    }
}

/// Who may write a storage object. Encoded as an integer on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum WritePermission {
    NoWrite,
    #[default]
    OwnerWrite,
}

impl From<WritePermission> for u8 {
    fn from(p: WritePermission) -> u8 {
        match p {
            WritePermission::NoWrite => 0,
            WritePermission::OwnerWrite => 1,
        }
    }
}

impl TryFrom<u8> for WritePermission {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::NoWrite),
            1 => Ok(Self::OwnerWrite),
            other => Err(ProtocolError::InvalidMessage(format!(
                "write permission out of range: {other}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Storage objects
// ---------------------------------------------------------------------------

/// One object to write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageWrite {
    pub collection: String,
    pub key: String,
    /// JSON-encoded value.
    pub value: String,
    /// Expected current version for a conditional write. `"*"` means the
    /// object must not exist yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub permission_read: ReadPermission,
    pub permission_write: WritePermission,
}

impl StorageWrite {
    /// An owner-readable, owner-writable, unconditional write.
    pub fn new(
        collection: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            collection: collection.into(),
            key: key.into(),
            value: value.into(),
            version: None,
            permission_read: ReadPermission::default(),
            permission_write: WritePermission::default(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_permissions(mut self, read: ReadPermission, write: WritePermission) -> Self {
        self.permission_read = read;
        self.permission_write = write;
        self
    }
}

/// Address of one object to read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageObjectId {
    pub collection: String,
    pub key: String,
    /// Owner of the object. `None` reads the caller's own object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl StorageObjectId {
    pub fn new(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            key: key.into(),
            user_id: None,
        }
    }

    pub fn owned_by(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// A stored object as returned by a read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageObject {
    pub collection: String,
    pub key: String,
    #[serde(default)]
    pub user_id: String,
    pub value: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub permission_read: ReadPermission,
    #[serde(default)]
    pub permission_write: WritePermission,
    #[serde(default)]
    pub create_time: Option<String>,
    #[serde(default)]
    pub update_time: Option<String>,
}

/// Receipt for one written object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageAck {
    pub collection: String,
    pub key: String,
    pub version: String,
    #[serde(default)]
    pub user_id: String,
}

/// Body of a storage read request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadStorageRequest {
    pub object_ids: Vec<StorageObjectId>,
}

/// Body of a storage write request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteStorageRequest {
    pub objects: Vec<StorageWrite>,
}

/// Response to a storage read. Missing objects are simply absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageObjects {
    #[serde(default)]
    pub objects: Vec<StorageObject>,
}

/// Response to a storage write.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageAcks {
    #[serde(default)]
    pub acks: Vec<StorageAck>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// The JSON body the backend returns with a non-2xx status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}
