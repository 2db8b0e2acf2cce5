use realmlink::prelude::*;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Where to connect and who to be, read from the environment.
#[derive(Debug, Clone, PartialEq)]
struct Settings {
    config: ClientConfig,
    device_id: String,
    region: String,
}

impl Settings {
    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let mut config = ClientConfig::default();
        if let Some(host) = get("REALMLINK_HOST") {
            config = config.with_host(host);
        }
        if let Some(port) = get("REALMLINK_PORT") {
            let port = port
                .parse()
                .map_err(|_| format!("REALMLINK_PORT must be a port number, got {port:?}"))?;
            config = config.with_port(port);
        }
        if let Some(key) = get("REALMLINK_SERVER_KEY") {
            config = config.with_server_key(key);
        }
        if get("REALMLINK_TLS").is_some_and(|v| v == "1") {
            config = config.with_scheme("https");
        }

        Ok(Self {
            config,
            device_id: get("REALMLINK_DEVICE_ID").unwrap_or_else(|| "lobby-client-demo".into()),
            region: get("REALMLINK_REGION").unwrap_or_else(|| "eu".into()),
        })
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

const OP_HELLO: i64 = 1;

#[derive(Serialize, Deserialize)]
struct ChatText {
    text: String,
}

#[derive(Serialize, Deserialize)]
struct Hello {
    from: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    realmlink::init_tracing("info,realmlink=debug");

    let settings = Settings::from_lookup(|key| std::env::var(key).ok())?;
    eprintln!("connecting to {}", settings.config.base_url());

    let mut conn = Connection::builder().config(settings.config.clone()).build()?;
    let session = conn
        .authenticate_custom(&settings.device_id, &AuthOptions::default())
        .await?;
    let me = session.username().to_string();
    tracing::info!(user_id = %session.user_id(), %me, "signed in");

    conn.open_socket().await?;

    let mut chat = conn.events().channel_message.subscribe();
    tokio::spawn(async move {
        while let Some(message) = chat.recv().await {
            let text = serde_json::from_str::<ChatText>(&message.content)
                .map(|c| c.text)
                .unwrap_or(message.content);
            println!("[{}] {}", message.username, text);
        }
    });

    let mut match_state = conn.events().match_state.subscribe();
    tokio::spawn(async move {
        while let Some(data) = match_state.recv().await {
            if data.op_code == OP_HELLO {
                if let Ok(hello) = serde_json::from_slice::<Hello>(&data.data) {
                    println!("match {}: hello from {}", data.match_id, hello.from);
                }
            }
        }
    });

    conn.join_chat("lobby", ChannelKind::Room).await?;
    let greeting = serde_json::to_string(&ChatText {
        text: format!("{me} is looking for a match"),
    })?;
    conn.send_chat("lobby", &greeting).await?;

    let mut matched = conn.events().matchmaker_matched.subscribe();
    let request = MatchmakerRequest::new()
        .query(format!("+properties.region:{}", settings.region))
        .min_count(2)
        .max_count(4)
        .string_property("region", settings.region.as_str());
    let ticket = conn.add_matchmaker(request).await?;
    eprintln!("waiting for players (ticket {})", ticket.ticket);

    tokio::select! {
        result = matched.recv() => {
            let Some(result) = result else {
                eprintln!("socket closed before a match was found");
                return Ok(());
            };
            let handle = conn.join_matched(&result).await?;
            eprintln!(
                "joined match {} with {} other player(s)",
                handle.match_id,
                handle.presences.len()
            );
            let hello = serde_json::to_vec(&Hello { from: me.clone() })?;
            conn.send_match_state(&handle.match_id, OP_HELLO, &hello).await?;
            conn.leave_match_handle(&handle).await?;
        }
        _ = tokio::signal::ctrl_c() => {
            conn.remove_matchmaker(&ticket.ticket).await?;
        }
    }

    conn.leave_chat("lobby").await?;
    conn.logout().await?;
    Ok(())
}
