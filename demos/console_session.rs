//! # Console Session Example
//!
//! A line-based client for a lobby server:
//!
//! 1. Resume the stored session (or ask for a username)
//! 2. Browse, create, join, and leave lobbies
//! 3. Start a game and watch it update through polling
//! 4. Shut down gracefully on Ctrl+C or end of input
//!
//! ## Running
//!
//! ```sh
//! # Start a lobby server on localhost:8000, then:
//! cargo run --example console_session
//!
//! # Override the server URL and token file:
//! LOBBY_SERVER_URL=http://my-server:8000 LOBBY_TOKEN_FILE=/tmp/lobby.token \
//!     cargo run --example console_session
//! ```
//!
//! Commands: `login <name>`, `lobbies`, `back`, `create`, `join <id>`,
//! `leave`, `start`, `logout`, `quit`.

use std::time::Duration;

use lobby_session_client::{
    Action, FileCredentialStore, HttpRemote, LobbyId, SessionConfig, SessionController,
    SessionError, SessionEvent, View,
};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Default server URL when `LOBBY_SERVER_URL` is not set.
const DEFAULT_URL: &str = "http://localhost:8000";

/// Default token file when `LOBBY_TOKEN_FILE` is not set.
const DEFAULT_TOKEN_FILE: &str = "lobby-session.token";

fn render(view: &View) {
    match view {
        View::Root => println!("[loading]"),
        View::SignIn { draft } => println!("[sign in] username: {draft}"),
        View::MainMenu { username } => {
            println!("[main menu] signed in as {username}: lobbies | create | join <id> | logout");
        }
        View::Lobbies { lobbies } => {
            println!("[lobbies] {} open: back | join <id>", lobbies.len());
            for lobby in lobbies {
                let players: Vec<&str> = lobby.members.iter().map(|m| m.username()).collect();
                println!("  {} ({})", lobby.id, players.join(", "));
            }
        }
        View::FullLobby { username, lobby } => {
            let players: Vec<&str> = lobby.members.iter().map(|m| m.username()).collect();
            println!(
                "[lobby {}] {} waiting with {}: leave | start",
                lobby.lobby_id,
                username,
                players.join(", ")
            );
        }
        View::Game { game } => println!("[game] {}", game.status),
    }
}

fn parse(line: &str) -> Option<Action> {
    let mut words = line.split_whitespace();
    let action = match (words.next()?, words.next()) {
        ("login", Some(name)) => Action::Login {
            username: name.to_string(),
        },
        ("lobbies", _) => Action::ShowLobbies,
        ("refresh", _) => Action::Refresh,
        ("back", _) => Action::Back,
        ("create", _) => Action::CreateLobby,
        ("join", Some(id)) => Action::JoinLobby(LobbyId::from(id)),
        ("leave", _) => Action::Leave,
        ("start", _) => Action::Start,
        ("logout", _) => Action::Logout,
        _ => return None,
    };
    Some(action)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Initialize tracing. Set `RUST_LOG=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let url = std::env::var("LOBBY_SERVER_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let token_file =
        std::env::var("LOBBY_TOKEN_FILE").unwrap_or_else(|_| DEFAULT_TOKEN_FILE.to_string());
    tracing::info!("Using server {url}, token file {token_file}");

    let remote = HttpRemote::with_timeout(&url, Duration::from_secs(10))?;
    let store = FileCredentialStore::new(token_file);
    let config = SessionConfig::default().with_request_timeout(Duration::from_secs(15));
    let (session, mut events) = SessionController::start(remote, store, config);

    if let Err(e) = session.verify_session().await {
        tracing::warn!("Could not check the stored session: {e}");
    }
    render(&session.view().await);

    // ── Event loop ──────────────────────────────────────────────────
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line.trim() == "quit" {
                    break;
                }
                let Some(action) = parse(&line) else {
                    println!("unknown command: {line}");
                    continue;
                };
                match session.dispatch(action).await {
                    Ok(()) => render(&session.view().await),
                    Err(SessionError::ActionUnavailable) => println!("not available on this screen"),
                    // Failures are also reported as `ActionFailed` events.
                    Err(_) => {}
                }
            }

            event = events.recv() => {
                let Some(event) = event else {
                    break;
                };
                match event {
                    SessionEvent::ActionFailed { message, .. } => println!("! {message}"),
                    SessionEvent::SyncDegraded { consecutive, .. } => {
                        println!("! lost contact with the server ({consecutive} failed polls)");
                    }
                    SessionEvent::SyncRestored { .. } => println!("reconnected"),
                    SessionEvent::LobbyClosed => println!("! the lobby was closed"),
                    SessionEvent::SessionExpired => println!("! session expired, please sign in"),
                    SessionEvent::RouteChanged { .. }
                    | SessionEvent::LobbyUpdated(_)
                    | SessionEvent::GameUpdated(_) => render(&session.view().await),
                    other => tracing::debug!(?other, "event"),
                }
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down");
                break;
            }
        }
    }

    session.shutdown().await;
    Ok(())
}
