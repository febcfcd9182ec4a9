#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for Lobby Session Client integration tests.
//!
//! Provides a scripted [`MockRemote`] and helper functions for constructing
//! common server response bodies.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use lobby_session_client::protocol::{
    Method, Request, PATH_LOBBY, PATH_MY_GAME, PATH_MY_LOBBY, PATH_TOKEN, PATH_TOKEN_VERIFY,
};
use lobby_session_client::{
    CredentialStore, MemoryCredentialStore, RemoteClient, SessionConfig, SessionController, SessionError,
    SessionEvent,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;

/// Poll interval used by [`start_session`] (the controller's default).
pub const POLL: Duration = Duration::from_millis(5000);

// ── MockRemote ──────────────────────────────────────────────────────

/// One scripted answer of the [`MockRemote`].
#[derive(Debug, Clone)]
pub enum Reply {
    /// 2xx with this body.
    Ok(Value),
    /// Non-success status with a `detail` message.
    Reject(u16, &'static str),
    /// HTTP 401.
    Unauthorized,
    /// Server unreachable.
    Down,
}

impl Reply {
    fn into_result(self) -> Result<Value, SessionError> {
        match self {
            Self::Ok(body) => Ok(body),
            Self::Reject(status, message) => Err(SessionError::rejected(status, Some(message.into()))),
            Self::Unauthorized => Err(SessionError::AuthInvalid),
            Self::Down => Err(SessionError::TransportFailure("connection refused".into())),
        }
    }
}

/// A scripted remote.
///
/// Each `(method, path)` has a queue of replies. Replies are consumed in
/// order; the last one sticks and answers every later request. Unscripted
/// routes answer 404. Every request is recorded.
#[derive(Default)]
pub struct MockRemote {
    routes: StdMutex<HashMap<(Method, &'static str), VecDeque<Reply>>>,
    delays: StdMutex<HashMap<&'static str, Duration>>,
    requests: StdMutex<Vec<Request>>,
}

impl MockRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Replace the script of `(method, path)` with a single sticky reply.
    pub fn on(&self, method: Method, path: &'static str, reply: Reply) {
        self.routes
            .lock()
            .unwrap()
            .insert((method, path), VecDeque::from([reply]));
    }

    /// Queue `reply` after the replies already scripted for `(method, path)`.
    pub fn then(&self, method: Method, path: &'static str, reply: Reply) {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path))
            .or_default()
            .push_back(reply);
    }

    /// Make every request to `path` take `delay` before answering.
    pub fn delay(&self, path: &'static str, delay: Duration) {
        self.delays.lock().unwrap().insert(path, delay);
    }

    /// Number of requests made to `(method, path)`.
    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    /// The most recent request to `(method, path)`.
    pub fn last(&self, method: Method, path: &str) -> Option<Request> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.method == method && r.path == path)
            .cloned()
    }

    pub fn total(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn next_reply(&self, method: Method, path: &'static str) -> Reply {
        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(&(method, path)) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or(Reply::Reject(404, "Not Found")),
            None => Reply::Reject(404, "Not Found"),
        }
    }
}

#[async_trait]
impl RemoteClient for MockRemote {
    async fn request(&self, request: Request) -> Result<Value, SessionError> {
        let (method, path) = (request.method, request.path);
        self.requests.lock().unwrap().push(request);
        let delay = self.delays.lock().unwrap().get(path).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.next_reply(method, path).into_result()
    }
}

// ── CountingStore ───────────────────────────────────────────────────

/// An in-memory credential store that counts how often it is read.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryCredentialStore,
    reads: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl CredentialStore for CountingStore {
    fn save(&self, token: &str) -> Result<(), SessionError> {
        self.inner.save(token)
    }

    fn read(&self) -> Result<Option<String>, SessionError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read()
    }

    fn erase(&self) -> Result<(), SessionError> {
        self.inner.erase()
    }
}

// ── Session helpers ─────────────────────────────────────────────────

/// Start a controller against `remote` with an empty in-memory store.
pub fn start_session(
    remote: &Arc<MockRemote>,
) -> (SessionController, mpsc::Receiver<SessionEvent>) {
    start_session_with(remote, MemoryCredentialStore::new(), SessionConfig::default())
}

pub fn start_session_with(
    remote: &Arc<MockRemote>,
    store: impl CredentialStore,
    config: SessionConfig,
) -> (SessionController, mpsc::Receiver<SessionEvent>) {
    SessionController::start(Arc::clone(remote), store, config)
}

/// Script a server that issues and accepts tokens for `username` and where
/// the user has neither a lobby nor a game.
pub fn idle_server(username: &str) -> Arc<MockRemote> {
    let remote = MockRemote::new();
    remote.on(
        Method::Post,
        PATH_TOKEN,
        Reply::Ok(json!({ "access_token": fake_token(username), "token_type": "bearer" })),
    );
    remote.on(Method::Post, PATH_TOKEN_VERIFY, Reply::Ok(json!({ "valid": true })));
    remote.on(Method::Get, PATH_MY_LOBBY, Reply::Ok(no_lobby_json()));
    remote.on(Method::Get, PATH_MY_GAME, Reply::Ok(no_game_json()));
    remote.on(Method::Get, PATH_LOBBY, Reply::Ok(lobby_list_json(&[])));
    remote
}

/// Collect every event currently queued.
pub fn drain(events: &mut mpsc::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

/// Sleep through `n` poll intervals plus a margin, letting the timers fire.
pub async fn ticks(n: u32) {
    tokio::time::sleep(POLL * n + Duration::from_millis(10)).await;
}

// ── Token and body helpers ──────────────────────────────────────────

/// An unsigned JWT carrying `username`.
pub fn fake_token(username: &str) -> String {
    format!(
        "{}.{}.signature",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(json!({ "username": username, "exp": 4102444800u64 }).to_string())
    )
}

pub fn lobby_json(id: &str, game_started: bool, players: &[&str]) -> Value {
    json!({
        "has_lobby": true,
        "lobby": {
            "id": id,
            "owner": players.first().copied().unwrap_or_default(),
            "game_started": game_started,
            "players": players,
        }
    })
}

pub fn no_lobby_json() -> Value {
    json!({ "has_lobby": false, "lobby": null })
}

pub fn game_json(turn: &str, pot: u32) -> Value {
    json!({
        "has_game": true,
        "game_status": { "turn": turn, "pot": pot, "players": ["alice", "bob"] }
    })
}

pub fn no_game_json() -> Value {
    json!({ "has_game": false, "game_status": null })
}

pub fn lobby_list_json(ids: &[&str]) -> Value {
    let lobbies: Vec<Value> = ids
        .iter()
        .map(|id| json!({ "id": id, "owner": "someone", "players": ["someone"] }))
        .collect();
    json!({ "lobbies": lobbies })
}
