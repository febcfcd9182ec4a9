//! # Custom Remote Example
//!
//! Shows how to implement the [`RemoteClient`] trait with a small in-process
//! lobby server. This is useful for:
//!
//! - **Testing** — exercise your UI flow without a real server
//! - **Custom backends** — adapt any request/response layer (gRPC, IPC, a local game host)
//!
//! ## Running
//!
//! ```sh
//! cargo run --example custom_remote
//! ```

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use lobby_session_client::protocol::{self, Method, Request};
use lobby_session_client::{
    Action, MemoryCredentialStore, RemoteClient, SessionConfig, SessionController, SessionError,
    SessionEvent, View,
};
use serde_json::{json, Value};

// ─────────────────────────────────────────────────────────────────────
// Step 1: Define an in-process "server"
// ─────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Lobby {
    id: u32,
    players: Vec<String>,
    game_started: bool,
}

/// A toy lobby server living in the same process.
///
/// Tokens are plain `toy:<username>` strings; a matching decoder is passed to
/// [`SessionController::start_with_decoder`] below.
#[derive(Default)]
struct LoopbackRemote {
    lobby: Mutex<Option<Lobby>>,
}

impl LoopbackRemote {
    fn user(request: &Request) -> Result<String, SessionError> {
        request
            .token
            .as_deref()
            .and_then(|t| t.strip_prefix("toy:"))
            .map(str::to_string)
            .ok_or(SessionError::AuthInvalid)
    }

    fn lobby_json(lobby: &Lobby) -> Value {
        json!({
            "has_lobby": true,
            "lobby": {
                "id": lobby.id,
                "players": lobby.players,
                "game_started": lobby.game_started,
            }
        })
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 2: Implement the RemoteClient trait
// ─────────────────────────────────────────────────────────────────────

#[async_trait]
impl RemoteClient for LoopbackRemote {
    async fn request(&self, request: Request) -> Result<Value, SessionError> {
        // Simulate a little network latency.
        tokio::time::sleep(Duration::from_millis(20)).await;

        if (request.method, request.path) == (Method::Post, protocol::PATH_TOKEN) {
            let username = request
                .body
                .as_ref()
                .and_then(|b| b.get("username"))
                .and_then(Value::as_str)
                .unwrap_or("guest");
            return Ok(json!({ "access_token": format!("toy:{username}"), "token_type": "bearer" }));
        }

        let user = Self::user(&request)?;
        let mut lobby = self
            .lobby
            .lock()
            .map_err(|_| SessionError::TransportFailure("server state poisoned".into()))?;

        match (request.method, request.path) {
            (Method::Post, protocol::PATH_TOKEN_VERIFY) => Ok(json!({ "valid": true })),
            (Method::Post, protocol::PATH_LOBBY) => {
                if lobby.is_some() {
                    return Err(SessionError::rejected(409, Some("Already in a lobby".into())));
                }
                *lobby = Some(Lobby {
                    id: 1,
                    players: vec![user, "npc".into()],
                    game_started: false,
                });
                Ok(json!({ "id": 1 }))
            }
            (Method::Get, protocol::PATH_LOBBY) => Ok(json!({ "lobbies": [] })),
            (Method::Get, protocol::PATH_MY_LOBBY) => Ok(match lobby.as_ref() {
                Some(l) if !l.game_started => Self::lobby_json(l),
                _ => json!({ "has_lobby": false, "lobby": null }),
            }),
            (Method::Post, protocol::PATH_LOBBY_START) => match lobby.as_mut() {
                Some(l) => {
                    l.game_started = true;
                    Ok(Value::Null)
                }
                None => Err(SessionError::rejected(404, Some("No such lobby".into()))),
            },
            (Method::Get, protocol::PATH_MY_GAME) => Ok(match lobby.as_ref() {
                Some(l) if l.game_started => json!({
                    "has_game": true,
                    "game_status": { "players": l.players, "turn": l.players.first() }
                }),
                _ => json!({ "has_game": false, "game_status": null }),
            }),
            _ => Err(SessionError::rejected(404, None)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 3: Drive a session against it
// ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for readable output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let decoder = |token: &str| token.strip_prefix("toy:").map(str::to_string);
    let config = SessionConfig::default().with_poll_interval(Duration::from_millis(200));
    let (session, mut events) = SessionController::start_with_decoder(
        LoopbackRemote::default(),
        MemoryCredentialStore::new(),
        decoder,
        config,
    );

    // No stored token yet, so this lands on the sign-in screen.
    session.verify_session().await?;
    println!("view: {:?}", session.view().await);

    session.dispatch(Action::EditUsername("ada".into())).await?;
    session
        .dispatch(Action::Login {
            username: "ada".into(),
        })
        .await?;
    session.dispatch(Action::CreateLobby).await?;
    if let View::FullLobby { lobby, .. } = session.view().await {
        println!("in lobby {} with {} players", lobby.lobby_id, lobby.members.len());
    }

    session.dispatch(Action::Start).await?;

    // Watch a few game updates arrive through polling.
    let mut updates = 0;
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::GameUpdated(game) => {
                println!("game: {}", game.status);
                updates += 1;
                if updates == 3 {
                    break;
                }
            }
            SessionEvent::LoadingChanged(_) => {}
            other => println!("event: {other:?}"),
        }
    }

    session.shutdown().await;
    println!("view: {:?}", session.view().await);
    Ok(())
}
