//! End-to-end tests for [`Connection`]: HTTP calls against a scripted
//! transport and realtime traffic against an in-memory backend.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use realmlink::prelude::*;
use realmlink::protocol::{
    ChannelInfo, ChannelMessageAck, Codec, Envelope, JsonCodec, MatchInfo, MatchmakerUser,
    RealtimeMessage,
};
use realmlink::realtime::RealtimeError;
use realmlink::session::SessionError;
use realmlink::transport::{
    Authorization, Connection as _, Connector, HttpMethod, HttpRequest, HttpResponse, HttpTransport,
    MemoryAcceptor, MemoryConnection, MemoryConnector, TransportError,
};
use realmlink::{ApiError, AuthError, ConnectionError};
use tokio::sync::mpsc;

// =========================================================================
// Scripted HTTP
// =========================================================================

#[derive(Default)]
struct HttpScript {
    requests: Vec<HttpRequest>,
    responses: VecDeque<HttpResponse>,
}

/// Answers requests from a queue and records what was sent.
#[derive(Clone, Default)]
struct MockHttp {
    script: Arc<Mutex<HttpScript>>,
}

impl MockHttp {
    fn respond(&self, status: u16, body: serde_json::Value) {
        self.script.lock().unwrap().responses.push_back(HttpResponse {
            status,
            body: body.to_string().into_bytes(),
        });
    }

    fn requests(&self) -> Vec<HttpRequest> {
        self.script.lock().unwrap().requests.clone()
    }

    fn last_request(&self) -> HttpRequest {
        self.requests().pop().expect("a request was sent")
    }
}

impl HttpTransport for MockHttp {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut script = self.script.lock().unwrap();
        script.requests.push(request);
        script.responses.pop_front().ok_or_else(|| {
            TransportError::RequestFailed(std::io::Error::other("connection refused"))
        })
    }
}

fn body_json(request: &HttpRequest) -> serde_json::Value {
    serde_json::from_slice(request.body.as_deref().expect("request has a body")).unwrap()
}

// =========================================================================
// Tokens
// =========================================================================

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

fn token(uid: &str, exp: u64) -> String {
    let payload = URL_SAFE_NO_PAD
        .encode(serde_json::json!({ "uid": uid, "usn": "ada", "exp": exp }).to_string());
    format!("eyJhbGciOiJIUzI1NiJ9.{payload}.sig")
}

// =========================================================================
// Scripted realtime backend
// =========================================================================

fn me() -> UserPresence {
    UserPresence {
        user_id: "u1".into(),
        session_id: "s1".into(),
        username: "ada".into(),
    }
}

fn other() -> UserPresence {
    UserPresence {
        user_id: "u2".into(),
        session_id: "s2".into(),
        username: "bob".into(),
    }
}

struct Backend {
    received: mpsc::UnboundedReceiver<Envelope>,
    pushes: mpsc::UnboundedSender<RealtimeMessage>,
}

impl Backend {
    fn push(&self, message: RealtimeMessage) {
        self.pushes.send(message).unwrap();
    }

    async fn next_received(&mut self) -> RealtimeMessage {
        self.received.recv().await.expect("backend still running").message
    }
}

fn reply_to(message: &RealtimeMessage, tickets: &mut u32) -> Option<RealtimeMessage> {
    match message {
        RealtimeMessage::MatchJoin { match_id, token, .. } => {
            let match_id = match (match_id, token) {
                (Some(id), _) => id.clone(),
                (None, Some(token)) => MatchId::from(format!("relayed-{token}")),
                (None, None) => return None,
            };
            Some(RealtimeMessage::Match(MatchInfo {
                match_id,
                authoritative: false,
                label: None,
                size: 2,
                presences: vec![other()],
                self_presence: me(),
            }))
        }
        RealtimeMessage::ChannelJoin { target, kind, .. } => {
            Some(RealtimeMessage::Channel(ChannelInfo {
                channel_id: format!("2...{target}"),
                name: target.clone(),
                kind: *kind,
                presences: vec![],
                self_presence: me(),
            }))
        }
        RealtimeMessage::ChannelMessageSend { channel_id, .. } => {
            Some(RealtimeMessage::ChannelMessageAck(ChannelMessageAck {
                channel_id: channel_id.clone(),
                message_id: "msg-1".into(),
                username: "ada".into(),
                create_time: 0,
                persistent: true,
            }))
        }
        RealtimeMessage::MatchmakerAdd { .. } => {
            *tickets += 1;
            Some(RealtimeMessage::MatchmakerTicket {
                ticket: format!("T{tickets}"),
            })
        }
        RealtimeMessage::MatchLeave { .. }
        | RealtimeMessage::ChannelLeave { .. }
        | RealtimeMessage::MatchmakerRemove { .. } => Some(RealtimeMessage::Ack),
        _ => None,
    }
}

async fn serve(
    conn: MemoryConnection,
    received: mpsc::UnboundedSender<Envelope>,
    mut pushes: mpsc::UnboundedReceiver<RealtimeMessage>,
) {
    let mut tickets = 0;
    loop {
        tokio::select! {
            push = pushes.recv() => {
                let Some(message) = push else {
                    let _ = conn.close().await;
                    return;
                };
                let bytes = JsonCodec.encode(&Envelope::push(message)).unwrap();
                let _ = conn.send(&bytes).await;
            }
            frame = conn.recv() => {
                let Ok(Some(bytes)) = frame else { return };
                let envelope: Envelope = JsonCodec.decode(&bytes).unwrap();
                let reply = envelope
                    .cid
                    .and_then(|cid| reply_to(&envelope.message, &mut tickets).map(|m| Envelope::request(cid, m)));
                let _ = received.send(envelope);
                if let Some(reply) = reply {
                    let bytes = JsonCodec.encode(&reply).unwrap();
                    let _ = conn.send(&bytes).await;
                }
            }
        }
    }
}

fn spawn_backend(mut acceptor: MemoryAcceptor) -> Backend {
    let (received_tx, received) = mpsc::unbounded_channel();
    let (pushes, pushes_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        if let Some((conn, _url)) = acceptor.accept().await {
            serve(conn, received_tx, pushes_rx).await;
        }
    });
    Backend { received, pushes }
}

// =========================================================================
// Connectors with scripted failures
// =========================================================================

/// Refuses every handshake the way a server refuses a bad token.
struct RejectingConnector;

impl Connector for RejectingConnector {
    type Connection = MemoryConnection;

    async fn connect(&self, _url: &str) -> Result<MemoryConnection, TransportError> {
        Err(TransportError::Unauthorized { status: 401 })
    }
}

/// Fails every dial before any handshake happens.
struct UnreachableConnector;

impl Connector for UnreachableConnector {
    type Connection = MemoryConnection;

    async fn connect(&self, _url: &str) -> Result<MemoryConnection, TransportError> {
        Err(TransportError::ConnectFailed(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "nothing listening",
        )))
    }
}

async fn signed_in_with<K: Connector>(connector: K) -> Connection<MockHttp, K> {
    let http = MockHttp::default();
    http.respond(
        200,
        serde_json::json!({ "token": token("u1", now() + 3600), "refresh_token": "r1" }),
    );
    let mut conn = Connection::from_parts(ClientConfig::default(), http, connector);
    conn.authenticate_custom("device-1", &AuthOptions::default())
        .await
        .expect("authentication should succeed");
    conn
}

// =========================================================================
// Fixtures
// =========================================================================

type TestConnection = Connection<MockHttp, MemoryConnector>;

fn fresh() -> (TestConnection, MockHttp, MemoryAcceptor) {
    let http = MockHttp::default();
    let (connector, acceptor) = MemoryConnector::new();
    let conn = Connection::from_parts(ClientConfig::default(), http.clone(), connector);
    (conn, http, acceptor)
}

async fn signed_in() -> (TestConnection, MockHttp, MemoryAcceptor) {
    let (mut conn, http, acceptor) = fresh();
    http.respond(
        200,
        serde_json::json!({ "token": token("u1", now() + 3600), "refresh_token": "r1" }),
    );
    conn.authenticate_custom("device-1", &AuthOptions::default())
        .await
        .expect("authentication should succeed");
    (conn, http, acceptor)
}

async fn online() -> (TestConnection, MockHttp, Backend) {
    let (mut conn, http, acceptor) = signed_in().await;
    let backend = spawn_backend(acceptor);
    conn.open_socket().await.expect("socket should open");
    (conn, http, backend)
}

// =========================================================================
// Authentication
// =========================================================================

#[tokio::test]
async fn test_authenticate_email_sends_credentials_with_server_key() {
    let (mut conn, http, _acceptor) = fresh();
    http.respond(
        200,
        serde_json::json!({ "token": token("u1", now() + 3600), "created": true }),
    );

    let options = AuthOptions {
        create: true,
        username: Some("ada".into()),
    };
    let session = conn
        .authenticate_email("ada@example.com", "hunter22", &options)
        .await
        .unwrap();
    assert_eq!(session.user_id(), "u1");
    assert!(session.created());

    let request = http.last_request();
    assert_eq!(request.method, HttpMethod::Post);
    assert_eq!(request.path, "/v2/account/authenticate/email");
    assert_eq!(
        request.auth,
        Authorization::Basic {
            username: "nakama_key".into(),
            password: String::new(),
        }
    );
    assert!(request.query.contains(&("create".into(), "true".into())));
    assert!(request.query.contains(&("username".into(), "ada".into())));
    assert_eq!(
        body_json(&request),
        serde_json::json!({ "email": "ada@example.com", "password": "hunter22" })
    );
}

#[tokio::test]
async fn test_authenticate_rejected_maps_to_auth_error() {
    let (mut conn, http, _acceptor) = fresh();
    http.respond(
        401,
        serde_json::json!({ "code": 16, "message": "Invalid credentials." }),
    );

    let err = conn
        .authenticate_email("ada@example.com", "wrong", &AuthOptions::default())
        .await
        .unwrap_err();
    match err {
        RealmlinkError::Auth(AuthError::Rejected(ApiError {
            status, code, message,
        })) => {
            assert_eq!(status, 401);
            assert_eq!(code, 16);
            assert_eq!(message, "Invalid credentials.");
        }
        other => panic!("expected rejected auth, got {other:?}"),
    }
    assert!(matches!(
        conn.session(),
        Err(RealmlinkError::Auth(AuthError::Session(SessionError::NoSession)))
    ));
}

#[tokio::test]
async fn test_authenticate_unreachable_is_connection_error() {
    let (mut conn, _http, _acceptor) = fresh();

    let err = conn
        .authenticate_custom("device-1", &AuthOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_connection());
    assert!(matches!(
        err,
        RealmlinkError::Connection(ConnectionError::Transport(_))
    ));
}

#[tokio::test]
async fn test_failed_authenticate_keeps_previous_session() {
    let (mut conn, http, _acceptor) = signed_in().await;
    http.respond(500, serde_json::json!({ "code": 13, "message": "internal" }));

    assert!(
        conn.authenticate_custom("device-2", &AuthOptions::default())
            .await
            .is_err()
    );
    assert_eq!(conn.session().unwrap().user_id(), "u1");
}

// =========================================================================
// Restore
// =========================================================================

#[tokio::test]
async fn test_restore_valid_token_without_network() {
    let (mut conn, http, _acceptor) = fresh();

    let session = conn.restore(Some(&token("u9", now() + 600))).unwrap();
    assert_eq!(session.user_id(), "u9");
    assert_eq!(session.username(), "ada");
    assert!(http.requests().is_empty());
}

#[tokio::test]
async fn test_restore_expired_token_is_auth_error() {
    let (mut conn, _http, _acceptor) = fresh();

    let err = conn.restore(Some(&token("u9", now() - 10))).unwrap_err();
    assert!(matches!(
        err,
        RealmlinkError::Auth(AuthError::Session(SessionError::Expired { .. }))
    ));
}

#[tokio::test]
async fn test_restore_malformed_token_keeps_current_session() {
    let (mut conn, _http, _acceptor) = signed_in().await;

    let err = conn.restore(Some("not-a-token")).unwrap_err();
    assert!(matches!(
        err,
        RealmlinkError::Auth(AuthError::Session(SessionError::InvalidToken(_)))
    ));
    assert_eq!(conn.session().unwrap().user_id(), "u1");
}

#[tokio::test]
async fn test_restore_without_token_uses_last_session() {
    let (mut conn, _http, _acceptor) = signed_in().await;

    let session = conn.restore(None).unwrap();
    assert_eq!(session.user_id(), "u1");
}

// =========================================================================
// RPC and storage
// =========================================================================

#[tokio::test]
async fn test_rpc_sends_payload_as_string_with_bearer_token() {
    let (conn, http, _acceptor) = signed_in().await;
    http.respond(
        200,
        serde_json::json!({ "id": "echo", "payload": "{\"x\":1}" }),
    );

    let response = conn.rpc("echo", r#"{"x":1}"#).await.unwrap();
    assert_eq!(response.id, "echo");
    assert_eq!(response.payload, r#"{"x":1}"#);

    let request = http.last_request();
    assert_eq!(request.path, "/v2/rpc/echo");
    assert_eq!(
        request.auth,
        Authorization::Bearer(conn.session().unwrap().token().to_string())
    );
    assert_eq!(body_json(&request), serde_json::json!(r#"{"x":1}"#));
}

#[tokio::test]
async fn test_rpc_id_is_escaped_in_path() {
    let (conn, http, _acceptor) = signed_in().await;
    http.respond(200, serde_json::json!({ "id": "guild/join?x=1#y" }));

    conn.rpc("guild/join?x=1#y", "{}").await.unwrap();
    assert_eq!(http.last_request().path, "/v2/rpc/guild%2Fjoin%3Fx%3D1%23y");
}

#[tokio::test]
async fn test_rpc_dot_segment_id_sends_nothing() {
    let (conn, http, _acceptor) = signed_in().await;

    let err = conn.rpc("..", "{}").await.unwrap_err();
    assert!(matches!(err, RealmlinkError::Protocol(_)));
    assert!(http.requests().is_empty());
}

#[tokio::test]
async fn test_rpc_without_session_sends_nothing() {
    let (conn, http, _acceptor) = fresh();

    let err = conn.rpc("echo", "{}").await.unwrap_err();
    assert!(matches!(
        err,
        RealmlinkError::Auth(AuthError::Session(SessionError::NoSession))
    ));
    assert!(http.requests().is_empty());
}

#[tokio::test]
async fn test_rpc_failure_maps_to_rpc_error() {
    let (conn, http, _acceptor) = signed_in().await;
    http.respond(404, serde_json::json!({ "code": 5, "message": "RPC function not found" }));

    let err = conn.rpc("missing", "{}").await.unwrap_err();
    assert!(matches!(err, RealmlinkError::Rpc(ApiError { status: 404, code: 5, .. })));
}

#[tokio::test]
async fn test_write_storage_encodes_permissions_as_integers() {
    let (conn, http, _acceptor) = signed_in().await;
    http.respond(
        200,
        serde_json::json!({ "acks": [{ "collection": "saves", "key": "slot1", "version": "v1" }] }),
    );

    let write = StorageWrite::new("saves", "slot1", r#"{"level":3}"#)
        .with_permissions(ReadPermission::PublicRead, WritePermission::OwnerWrite);
    let acks = conn.write_storage(&[write]).await.unwrap();
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].version, "v1");

    let request = http.last_request();
    assert_eq!(request.method, HttpMethod::Put);
    assert_eq!(request.path, "/v2/storage");
    let body = body_json(&request);
    assert_eq!(body["objects"][0]["permission_read"], 2);
    assert_eq!(body["objects"][0]["permission_write"], 1);
    assert_eq!(body["objects"][0]["value"], r#"{"level":3}"#);
}

#[tokio::test]
async fn test_read_storage_returns_found_objects() {
    let (conn, http, _acceptor) = signed_in().await;
    http.respond(
        200,
        serde_json::json!({ "objects": [{
            "collection": "saves",
            "key": "slot1",
            "user_id": "u1",
            "value": "{\"level\":3}",
            "version": "v1",
            "permission_read": 1,
            "permission_write": 1
        }] }),
    );

    let ids = [
        StorageObjectId::new("saves", "slot1"),
        StorageObjectId::new("saves", "slot2").owned_by("u2"),
    ];
    let objects = conn.read_storage(&ids).await.unwrap();
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].key, "slot1");

    let body = body_json(&http.last_request());
    assert_eq!(body["object_ids"][1]["user_id"], "u2");
    assert!(body["object_ids"][0].get("user_id").is_none());
}

#[tokio::test]
async fn test_storage_failure_maps_to_storage_error() {
    let (conn, http, _acceptor) = signed_in().await;
    http.respond(409, serde_json::json!({ "code": 3, "message": "version check failed" }));

    let write = StorageWrite::new("saves", "slot1", "{}").with_version("*");
    let err = conn.write_storage(&[write]).await.unwrap_err();
    assert!(matches!(err, RealmlinkError::Storage(ApiError { status: 409, .. })));
}

// =========================================================================
// Socket
// =========================================================================

#[tokio::test]
async fn test_open_socket_without_session_is_auth_error() {
    let (mut conn, _http, _acceptor) = fresh();

    let err = conn.open_socket().await.unwrap_err();
    assert!(matches!(
        err,
        RealmlinkError::Auth(AuthError::Session(SessionError::NoSession))
    ));
    assert_eq!(conn.socket_state(), SocketState::Disconnected);
}

#[tokio::test]
async fn test_open_socket_twice_is_connection_error() {
    let (mut conn, _http, _backend) = online().await;

    let err = conn.open_socket().await.unwrap_err();
    assert!(err.is_connection());
    assert_eq!(conn.socket_state(), SocketState::Connected);
}

#[tokio::test]
async fn test_socket_refusing_token_clears_session() {
    let mut conn = signed_in_with(RejectingConnector).await;

    let err = conn.open_socket().await.unwrap_err();
    assert!(matches!(
        err,
        RealmlinkError::Auth(AuthError::SocketRejected(TransportError::Unauthorized {
            status: 401
        }))
    ));
    assert!(matches!(
        conn.session(),
        Err(RealmlinkError::Auth(AuthError::Session(SessionError::NoSession)))
    ));
    assert!(conn.restore(None).is_err());
    assert_eq!(conn.socket_state(), SocketState::Disconnected);
}

#[tokio::test]
async fn test_unreachable_socket_keeps_session() {
    let mut conn = signed_in_with(UnreachableConnector).await;

    let err = conn.open_socket().await.unwrap_err();
    assert!(err.is_connection());
    assert_eq!(conn.session().unwrap().user_id(), "u1");
    assert_eq!(conn.socket_state(), SocketState::Disconnected);
}

#[tokio::test]
async fn test_join_before_open_is_connection_error() {
    let (conn, _http, _acceptor) = signed_in().await;

    let err = conn.join_chat("lobby", ChannelKind::Room).await.unwrap_err();
    assert!(matches!(
        err,
        RealmlinkError::Connection(ConnectionError::Socket(RealtimeError::NotConnected(_)))
    ));
}

#[tokio::test]
async fn test_chat_round_trip() {
    let (conn, _http, mut backend) = online().await;
    let mut messages = conn.events().channel_message.subscribe();

    let handle = conn.join_chat("lobby", ChannelKind::Room).await.unwrap();
    assert_eq!(handle.channel_id, "2...lobby");
    assert!(matches!(
        backend.next_received().await,
        RealtimeMessage::ChannelJoin { ref target, .. } if target == "lobby"
    ));

    let ack = conn.send_chat("lobby", r#"{"text":"hi"}"#).await.unwrap();
    assert_eq!(ack.channel_id, "2...lobby");
    match backend.next_received().await {
        RealtimeMessage::ChannelMessageSend { channel_id, content } => {
            assert_eq!(channel_id, "2...lobby");
            assert_eq!(content, r#"{"text":"hi"}"#);
        }
        other => panic!("expected a channel message, got {other:?}"),
    }

    backend.push(RealtimeMessage::ChannelMessage(ChannelMessage {
        channel_id: "2...lobby".into(),
        message_id: "msg-2".into(),
        sender_id: "u2".into(),
        username: "bob".into(),
        content: r#"{"text":"hello"}"#.into(),
        create_time: 0,
    }));
    let message = messages.recv().await.unwrap();
    assert_eq!(message.username, "bob");

    conn.leave_chat("lobby").await.unwrap();
    assert!(conn.channel_handle("lobby").is_none());
    let err = conn.send_chat("lobby", "again").await.unwrap_err();
    assert!(matches!(
        err,
        RealmlinkError::Chat(RealtimeError::UnknownChannel(_))
    ));
}

#[tokio::test]
async fn test_match_join_send_and_leave() {
    let (conn, _http, mut backend) = online().await;
    let match_id = MatchId::from("m-42");

    let handle = conn.join_match(&match_id).await.unwrap();
    assert_eq!(handle.presences, vec![other()]);
    backend.next_received().await;

    conn.send_match_state(&match_id, 7, b"move:e4").await.unwrap();
    match backend.next_received().await {
        RealtimeMessage::MatchDataSend { op_code, data, .. } => {
            assert_eq!(op_code, 7);
            assert_eq!(data, b"move:e4".to_vec());
        }
        other => panic!("expected match data, got {other:?}"),
    }

    conn.leave_match(&match_id).await.unwrap();
    let err = conn.leave_match(&match_id).await.unwrap_err();
    assert!(matches!(err, RealmlinkError::Match(RealtimeError::UnknownMatch(_))));
}

#[tokio::test]
async fn test_leave_match_by_handle() {
    let (conn, _http, mut backend) = online().await;

    let handle = conn.join_match(&MatchId::from("m-7")).await.unwrap();
    backend.next_received().await;

    conn.leave_match_handle(&handle).await.unwrap();
    assert!(matches!(
        backend.next_received().await,
        RealtimeMessage::MatchLeave { ref match_id } if match_id.as_str() == "m-7"
    ));
    assert!(conn.match_handle(&handle.match_id).is_none());

    let err = conn.leave_match_handle(&handle).await.unwrap_err();
    assert!(matches!(err, RealmlinkError::Match(RealtimeError::UnknownMatch(_))));
}

#[tokio::test]
async fn test_matchmaker_ticket_to_joined_match() {
    let (conn, _http, mut backend) = online().await;
    let mut matched = conn.events().matchmaker_matched.subscribe();

    let request = MatchmakerRequest::new()
        .query("+properties.region:eu")
        .min_count(2)
        .max_count(4)
        .string_property("region", "eu");
    let ticket = conn.add_matchmaker(request).await.unwrap();
    assert_eq!(ticket.ticket, "T1");
    assert_eq!(conn.tickets().len(), 1);

    match backend.next_received().await {
        RealtimeMessage::MatchmakerAdd {
            min_count,
            max_count,
            string_properties,
            ..
        } => {
            assert_eq!((min_count, max_count), (2, 4));
            assert_eq!(string_properties.get("region").map(String::as_str), Some("eu"));
        }
        other => panic!("expected a matchmaker add, got {other:?}"),
    }

    let user = |presence: UserPresence| MatchmakerUser {
        presence,
        string_properties: [("region".to_string(), "eu".to_string())].into(),
        numeric_properties: Default::default(),
    };
    backend.push(RealtimeMessage::MatchmakerMatched(MatchmakerMatched {
        ticket: "T1".into(),
        match_id: None,
        token: Some("tok".into()),
        users: vec![user(me()), user(other())],
        self_user: user(me()),
    }));

    let result = matched.recv().await.unwrap();
    assert!(conn.tickets().is_empty());

    let handle = conn.join_matched(&result).await.unwrap();
    assert_eq!(handle.match_id.as_str(), "relayed-tok");
    assert!(conn.match_handle(&handle.match_id).is_some());
}

#[tokio::test]
async fn test_invalid_matchmaker_request_is_matchmaker_error() {
    let (conn, _http, _backend) = online().await;

    let request = MatchmakerRequest::new().min_count(4).max_count(2);
    let err = conn.add_matchmaker(request).await.unwrap_err();
    assert!(matches!(
        err,
        RealmlinkError::Matchmaker(RealtimeError::InvalidMatchmaker(_))
    ));
    assert!(conn.tickets().is_empty());
}

#[tokio::test]
async fn test_remove_unknown_ticket_is_matchmaker_error() {
    let (conn, _http, _backend) = online().await;

    let err = conn.remove_matchmaker("T99").await.unwrap_err();
    assert!(matches!(
        err,
        RealmlinkError::Matchmaker(RealtimeError::UnknownTicket(_))
    ));
}

// =========================================================================
// Logout
// =========================================================================

#[tokio::test]
async fn test_logout_closes_socket_and_clears_session() {
    let (mut conn, http, _backend) = online().await;
    conn.join_chat("lobby", ChannelKind::Room).await.unwrap();
    http.respond(200, serde_json::json!({}));

    conn.logout().await.unwrap();

    assert_eq!(conn.socket_state(), SocketState::Disconnected);
    assert!(conn.channel_handle("lobby").is_none());
    assert!(conn.session().is_err());
    assert!(conn.restore(None).is_err());

    let request = http.last_request();
    assert_eq!(request.path, "/v2/session/logout");
    assert_eq!(body_json(&request)["refresh_token"], "r1");
}

#[tokio::test]
async fn test_logout_clears_session_even_if_server_fails() {
    let (mut conn, http, _acceptor) = signed_in().await;
    http.respond(500, serde_json::json!({ "message": "down" }));

    assert!(conn.logout().await.is_err());
    assert!(conn.session().is_err());
}
