//! Session controller: the client's screen state machine and its polling.
//!
//! [`SessionController`] is a cheap, cloneable handle around shared state.
//! User operations (`login`, `create_lobby`, `join_lobby`, ...) run on the
//! caller's task and await their requests. Polling runs on a spawned timer
//! task that holds only a weak reference to the controller, so dropping every
//! handle stops it.
//!
//! At most one poll timer is live at any time (see [`crate::poll`]). Ticks
//! are serialized: a tick waits for its fetch before the next one is
//! scheduled, and ticks that fall due while a fetch is outstanding are
//! skipped.
//!
//! # Example
//!
//! ```rust,ignore
//! let remote = HttpRemote::new("http://localhost:8000")?;
//! let store = FileCredentialStore::new("session.token");
//! let (session, mut events) = SessionController::start(remote, store, SessionConfig::default());
//!
//! session.verify_session().await?;
//! while let Some(event) = events.recv().await {
//!     render(&session.view().await);
//! }
//! ```

use std::sync::{Arc, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, watch, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::credentials::CredentialStore;
use crate::error::{Result, SessionError};
use crate::event::SessionEvent;
use crate::poll::{PollMode, Poller};
use crate::protocol::{
    self, GameSnapshot, IssueTokenRequest, IssueTokenResponse, LobbyId, LobbyIdRequest,
    LobbyListResponse, LobbySnapshot, LobbySummary, Method, MyGameResponse, Request,
    VerifyTokenRequest, VerifyTokenResponse,
};
use crate::remote::{RemoteClient, RequestTracker};
use crate::screen::{present, Action, Route, View};
use crate::token::{JwtUsernameDecoder, TokenDecoder};

/// Default interval between poll ticks.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default number of consecutive failed ticks before `SyncDegraded` is emitted.
const DEFAULT_POLL_FAILURE_THRESHOLD: u32 = 3;

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`SessionController`].
///
/// # Example
///
/// ```
/// use lobby_session_client::client::SessionConfig;
/// use std::time::Duration;
///
/// let config = SessionConfig::default()
///     .with_poll_interval(Duration::from_secs(2))
///     .with_request_timeout(Duration::from_secs(10));
/// assert_eq!(config.poll_interval, Duration::from_secs(2));
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Time between poll ticks. Defaults to **5 seconds**.
    pub poll_interval: Duration,
    /// Capacity of the bounded event channel.
    ///
    /// When the consumer falls behind, events are dropped (with a warning
    /// logged) rather than blocking the controller. Defaults to **256**.
    /// Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Consecutive failed ticks after which
    /// [`SessionEvent::SyncDegraded`] is emitted. Defaults to **3**.
    pub poll_failure_threshold: u32,
    /// Upper bound for a single request. `None` (the default) waits for the
    /// server indefinitely.
    pub request_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            poll_failure_threshold: DEFAULT_POLL_FAILURE_THRESHOLD,
            request_timeout: None,
        }
    }
}

impl SessionConfig {
    /// Set the interval between poll ticks. Zero is clamped to one millisecond.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Set the capacity of the bounded event channel. Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Set how many consecutive failed ticks mark synchronization as degraded.
    /// Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_poll_failure_threshold(mut self, threshold: u32) -> Self {
        self.poll_failure_threshold = threshold.max(1);
        self
    }

    /// Bound every request by `timeout`.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

// ── State ───────────────────────────────────────────────────────────

/// A point-in-time copy of the controller's state, as consumed by
/// [`present`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub route: Route,
    /// `true` while any request is in flight.
    pub loading: bool,
    /// Set iff a stored token was issued or verified.
    pub username: Option<String>,
    /// Text typed on the sign-in screen.
    pub username_draft: String,
    /// Last fetched lobby list. Kept when leaving the lobby browser.
    pub lobbies: Vec<LobbySummary>,
    pub lobby: Option<LobbySnapshot>,
    pub game: Option<GameSnapshot>,
    /// Mode of the live poll timer.
    pub polling: Option<PollMode>,
}

/// Mutable state guarded by the controller's lock.
#[derive(Debug, Default)]
struct Core {
    route: Route,
    username: Option<String>,
    username_draft: String,
    lobbies: Vec<LobbySummary>,
    lobby: Option<LobbySnapshot>,
    game: Option<GameSnapshot>,
    poller: Poller,
    /// Token as last saved to or read from the store; `None` until the store
    /// was first consulted.
    token: Option<Option<String>>,
}

struct Inner {
    remote: Box<dyn RemoteClient>,
    store: Box<dyn CredentialStore>,
    decoder: Box<dyn TokenDecoder>,
    config: SessionConfig,
    requests: Arc<RequestTracker>,
    core: Mutex<Core>,
    event_tx: mpsc::Sender<SessionEvent>,
    loading_task: Option<JoinHandle<()>>,
}

/// What a poll loop does after a tick.
enum TickOutcome {
    Continue,
    Stop,
    /// Lobby polling handed over to game polling armed with this epoch.
    HandOver(u64),
}

// ── Controller handle ───────────────────────────────────────────────

/// Handle to a client session.
///
/// Created via [`SessionController::start`], which also returns the receiver
/// for [`SessionEvent`]s. Clones share the same session.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    /// Create a session in the [`Route::Root`] state, decoding usernames from
    /// JWT access tokens.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start(
        remote: impl RemoteClient,
        store: impl CredentialStore,
        config: SessionConfig,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        Self::start_with_decoder(remote, store, JwtUsernameDecoder, config)
    }

    /// Like [`start`](Self::start), with a custom [`TokenDecoder`].
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start_with_decoder(
        remote: impl RemoteClient,
        store: impl CredentialStore,
        decoder: impl TokenDecoder,
        config: SessionConfig,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        // Clamp capacity to at least 1 (tokio panics on 0).
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel(capacity);
        let requests = Arc::new(RequestTracker::new());
        let loading_task = tokio::spawn(forward_loading(
            requests.subscribe(),
            event_tx.clone(),
        ));

        let inner = Arc::new(Inner {
            remote: Box::new(remote),
            store: Box::new(store),
            decoder: Box::new(decoder),
            config,
            requests,
            core: Mutex::new(Core::default()),
            event_tx,
            loading_task: Some(loading_task),
        });

        (Self { inner }, event_rx)
    }

    // ── Authentication ──────────────────────────────────────────────

    /// Resume the stored session.
    ///
    /// Without a stored token, or when the server rejects it, the session
    /// moves to [`Route::SignIn`] and this returns `Ok`. A valid token moves
    /// it to [`Route::MainMenu`] and then reconciles any lobby or game the
    /// user is already in.
    ///
    /// # Errors
    ///
    /// Transport and decoding failures are returned; the route stays where it
    /// was.
    pub async fn verify_session(&self) -> Result<()> {
        let result = self.verify_session_inner().await;
        self.inner.report("verify_session", result).await
    }

    async fn verify_session_inner(&self) -> Result<()> {
        let inner = &self.inner;
        let stored = inner.store.read()?;
        inner.core.lock().await.token = Some(stored.clone());
        let Some(token) = stored else {
            info!("no stored token, signing in");
            let mut core = inner.core.lock().await;
            inner.set_route(&mut core, Route::SignIn);
            return Ok(());
        };

        let body = serde_json::to_value(VerifyTokenRequest {
            token: token.clone(),
        })?;
        let valid = match inner
            .call(Method::Post, protocol::PATH_TOKEN_VERIFY, Some(body))
            .await
        {
            Ok(raw) => protocol::decode::<VerifyTokenResponse>(raw)?.valid,
            Err(SessionError::AuthInvalid) => false,
            Err(e) => return Err(e),
        };

        let username = if valid {
            inner.decoder.username(&token)
        } else {
            None
        };
        let Some(username) = username else {
            info!("stored token is no longer valid");
            let mut core = inner.core.lock().await;
            core.username = None;
            inner.set_route(&mut core, Route::SignIn);
            return Ok(());
        };

        info!(%username, "session resumed");
        {
            let mut core = inner.core.lock().await;
            core.username = Some(username);
            inner.set_route(&mut core, Route::MainMenu);
        }
        self.reconcile_inner().await
    }

    /// Update the text typed on the sign-in screen.
    pub async fn set_username_draft(&self, text: impl Into<String>) {
        self.inner.core.lock().await.username_draft = text.into();
    }

    /// Request a token for `username`, store it, and enter the main menu.
    ///
    /// The username is not validated locally.
    ///
    /// # Errors
    ///
    /// Returns the server's rejection or a transport failure; nothing is
    /// stored in that case.
    pub async fn login(&self, username: impl Into<String>) -> Result<()> {
        let result = self.login_inner(username.into()).await;
        self.inner.report("login", result).await
    }

    async fn login_inner(&self, username: String) -> Result<()> {
        let inner = &self.inner;
        let body = serde_json::to_value(IssueTokenRequest {
            username: username.clone(),
        })?;
        let raw = inner
            .call(Method::Post, protocol::PATH_TOKEN, Some(body))
            .await?;
        let issued: IssueTokenResponse = protocol::decode(raw)?;
        inner.store.save(&issued.access_token)?;

        let username = inner
            .decoder
            .username(&issued.access_token)
            .unwrap_or(username);
        info!(%username, "logged in");
        {
            let mut core = inner.core.lock().await;
            core.token = Some(Some(issued.access_token));
            core.username = Some(username);
            core.username_draft.clear();
            inner.set_route(&mut core, Route::MainMenu);
        }
        self.reconcile_inner().await
    }

    /// Forget the session: erase the token, stop polling, clear all
    /// server-derived state, and show the sign-in screen.
    ///
    /// Calling it again is harmless.
    ///
    /// # Errors
    ///
    /// Returns the credential store's error if the token could not be erased.
    /// The in-memory session is cleared regardless.
    pub async fn logout(&self) -> Result<()> {
        let erased = self.inner.store.erase();
        let mut core = self.inner.core.lock().await;
        core.token = Some(None);
        self.inner.clear_session(&mut core);
        info!("logged out");
        erased
    }

    // ── Lobby lifecycle ─────────────────────────────────────────────

    /// Check the server for a lobby, then a game, the user already belongs to.
    ///
    /// A lobby wins over a game: with a lobby the session enters
    /// [`Route::FullLobby`] and polls the lobby; otherwise with a game it
    /// starts game polling; otherwise it stays where it is.
    ///
    /// # Errors
    ///
    /// Returns transport or decoding failures of the two lookups.
    pub async fn reconcile_active_resource(&self) -> Result<()> {
        let result = self.reconcile_inner().await;
        self.inner.report("reconcile", result).await
    }

    async fn reconcile_inner(&self) -> Result<()> {
        let inner = &self.inner;
        if let Some(lobby) = inner.fetch_lobby().await? {
            debug!(lobby_id = %lobby.lobby_id, "user is in a lobby");
            let mut core = inner.core.lock().await;
            inner.enter_lobby(&mut core, lobby);
            return Ok(());
        }

        let raw = inner.call(Method::Get, protocol::PATH_MY_GAME, None).await?;
        let game: MyGameResponse = protocol::decode(raw)?;
        if game.has_game {
            debug!("user is in a game");
            return self.start_game_polling_inner().await;
        }
        debug!("user has no lobby or game");
        Ok(())
    }

    /// Create a lobby and enter it.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::RemoteRejected`] if the server refuses (for
    /// example because the user is already in a lobby); state is unchanged.
    pub async fn create_lobby(&self) -> Result<()> {
        let result = self.create_lobby_inner().await;
        self.inner.report("create_lobby", result).await
    }

    async fn create_lobby_inner(&self) -> Result<()> {
        let inner = &self.inner;
        inner.call(Method::Post, protocol::PATH_LOBBY, None).await?;
        let lobby = inner
            .fetch_lobby()
            .await?
            .ok_or(SessionError::NoActiveLobby)?;
        info!(lobby_id = %lobby.lobby_id, "lobby created");
        let mut core = inner.core.lock().await;
        inner.enter_lobby(&mut core, lobby);
        Ok(())
    }

    /// Fetch the open lobbies and show the lobby browser. Also used to refresh it.
    ///
    /// # Errors
    ///
    /// Returns transport or decoding failures; the previous list is kept.
    pub async fn list_lobbies(&self) -> Result<()> {
        let result = self.list_lobbies_inner().await;
        self.inner.report("list_lobbies", result).await
    }

    async fn list_lobbies_inner(&self) -> Result<()> {
        let inner = &self.inner;
        let raw = inner.call(Method::Get, protocol::PATH_LOBBY, None).await?;
        let list: LobbyListResponse = protocol::decode(raw)?;
        debug!(count = list.lobbies.len(), "lobby list fetched");
        let mut core = inner.core.lock().await;
        core.lobbies = list.lobbies;
        inner.set_route(&mut core, Route::Lobbies);
        Ok(())
    }

    /// Leave the lobby browser. The fetched list is kept until the next
    /// [`list_lobbies`](Self::list_lobbies).
    pub async fn go_back_from_lobbies(&self) {
        let mut core = self.inner.core.lock().await;
        self.inner.set_route(&mut core, Route::MainMenu);
    }

    /// Join the lobby `lobby_id` and enter it.
    ///
    /// # Errors
    ///
    /// When the server refuses (unknown id, lobby full, ...) a
    /// [`SessionEvent::ActionFailed`] is emitted, the error is returned, and
    /// the route and lobby are left untouched.
    pub async fn join_lobby(&self, lobby_id: impl Into<LobbyId>) -> Result<()> {
        let result = self.join_lobby_inner(lobby_id.into()).await;
        self.inner.report("join_lobby", result).await
    }

    async fn join_lobby_inner(&self, lobby_id: LobbyId) -> Result<()> {
        let inner = &self.inner;
        let body = serde_json::to_value(LobbyIdRequest {
            lobby_id: lobby_id.clone(),
        })?;
        let raw = inner
            .call(Method::Patch, protocol::PATH_LOBBY_JOIN, Some(body))
            .await?;
        let replied = if LobbySnapshot::is_described_by(&raw) {
            LobbySnapshot::from_response(raw)?
        } else {
            None
        };
        let lobby = match replied {
            Some(lobby) => lobby,
            // The join was accepted without lobby data; the server still knows the lobby.
            None => inner
                .fetch_lobby()
                .await?
                .ok_or(SessionError::NoActiveLobby)?,
        };
        info!(%lobby_id, "joined lobby");
        let mut core = inner.core.lock().await;
        inner.enter_lobby(&mut core, lobby);
        Ok(())
    }

    /// Leave the current lobby and return to the main menu.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoActiveLobby`] without a current lobby, or
    /// the server's error; in both cases state is unchanged.
    pub async fn leave_lobby(&self) -> Result<()> {
        let result = self.leave_lobby_inner().await;
        self.inner.report("leave_lobby", result).await
    }

    async fn leave_lobby_inner(&self) -> Result<()> {
        let inner = &self.inner;
        let lobby_id = inner.current_lobby_id().await?;
        let body = serde_json::to_value(LobbyIdRequest {
            lobby_id: lobby_id.clone(),
        })?;
        inner
            .call(Method::Put, protocol::PATH_LOBBY_LEAVE, Some(body))
            .await?;
        info!(%lobby_id, "left lobby");

        let mut core = inner.core.lock().await;
        inner.stop_polling_locked(&mut core);
        core.lobby = None;
        inner.set_route(&mut core, Route::MainMenu);
        Ok(())
    }

    /// Start the game of the current lobby and switch to game polling.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoActiveLobby`] without a current lobby, the
    /// server's refusal, or the failure of the first game fetch (polling
    /// stays armed in that case).
    pub async fn start_game(&self) -> Result<()> {
        let result = self.start_game_inner().await;
        self.inner.report("start_game", result).await
    }

    async fn start_game_inner(&self) -> Result<()> {
        let inner = &self.inner;
        let lobby_id = inner.current_lobby_id().await?;
        let body = serde_json::to_value(LobbyIdRequest {
            lobby_id: lobby_id.clone(),
        })?;
        inner
            .call(Method::Post, protocol::PATH_LOBBY_START, Some(body))
            .await?;
        info!(%lobby_id, "game started");
        self.start_game_polling_inner().await
    }

    // ── Polling ─────────────────────────────────────────────────────

    /// Poll the user's lobby, replacing any running poll timer.
    pub async fn start_lobby_polling(&self) {
        let mut core = self.inner.core.lock().await;
        self.inner.arm_lobby(&mut core);
    }

    /// Poll the user's game, replacing any running poll timer.
    ///
    /// The first fetch happens immediately; the session enters
    /// [`Route::Game`] once a game snapshot is available.
    ///
    /// # Errors
    ///
    /// Returns the failure of the first fetch. The timer stays armed and later
    /// ticks retry.
    pub async fn start_game_polling(&self) -> Result<()> {
        self.start_game_polling_inner().await
    }

    async fn start_game_polling_inner(&self) -> Result<()> {
        let epoch = {
            let mut core = self.inner.core.lock().await;
            let epoch = core.poller.begin(PollMode::Game);
            self.inner
                .emit(SessionEvent::PollingChanged(Some(PollMode::Game)));
            epoch
        };
        self.inner.engage_game(epoch).await
    }

    /// Stop the running poll timer. No-op when nothing is polling.
    pub async fn stop_polling(&self) {
        let mut core = self.inner.core.lock().await;
        self.inner.stop_polling_locked(&mut core);
    }

    /// Stop polling. Requests already in flight on the caller's side are not
    /// affected.
    pub async fn shutdown(&self) {
        debug!("SessionController: shutdown requested");
        self.stop_polling().await;
    }

    // ── Presenter surface ───────────────────────────────────────────

    /// Run a presenter action.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ActionUnavailable`] if the current view does not
    /// offer `action`, otherwise the result of the operation it maps to.
    pub async fn dispatch(&self, action: Action) -> Result<()> {
        let view = self.view().await;
        if !view.offers(&action) {
            debug!(action = action.name(), route = ?view.route(), "action not offered");
            return Err(SessionError::ActionUnavailable);
        }
        match action {
            Action::EditUsername(text) => {
                self.set_username_draft(text).await;
                Ok(())
            }
            Action::Login { username } => self.login(username).await,
            Action::Logout => self.logout().await,
            Action::ShowLobbies | Action::Refresh => self.list_lobbies().await,
            Action::CreateLobby => self.create_lobby().await,
            Action::JoinLobby(lobby_id) => self.join_lobby(lobby_id).await,
            Action::Back => {
                self.go_back_from_lobbies().await;
                Ok(())
            }
            Action::Leave => self.leave_lobby().await,
            Action::Start => self.start_game().await,
        }
    }

    /// A copy of the current state.
    pub async fn state(&self) -> SessionState {
        let core = self.inner.core.lock().await;
        SessionState {
            route: core.route,
            loading: self.inner.requests.is_busy(),
            username: core.username.clone(),
            username_draft: core.username_draft.clone(),
            lobbies: core.lobbies.clone(),
            lobby: core.lobby.clone(),
            game: core.game.clone(),
            polling: core.poller.mode(),
        }
    }

    /// The view for the current screen.
    pub async fn view(&self) -> View {
        present(&self.state().await)
    }

    pub async fn route(&self) -> Route {
        self.inner.core.lock().await.route
    }

    /// Returns `true` while any request is in flight.
    pub fn is_loading(&self) -> bool {
        self.inner.requests.is_busy()
    }

    /// Subscribe to the loading flag.
    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.inner.requests.subscribe()
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("loading", &self.is_loading())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

// ── Internals ───────────────────────────────────────────────────────

impl Inner {
    /// Issue one request with the stored token attached, tracking it as in flight.
    async fn call(&self, method: Method, path: &'static str, body: Option<Value>) -> Result<Value> {
        let token = self.token().await?;
        let request = Request {
            method,
            path,
            body,
            token,
        };
        let _in_flight = self.requests.begin();
        debug!(%method, path, "request");
        let response = self.remote.request(request);
        match self.config.request_timeout {
            Some(timeout) => tokio::time::timeout(timeout, response)
                .await
                .map_err(|_| SessionError::Timeout)?,
            None => response.await,
        }
    }

    /// The bearer token, read from the store only the first time it is needed.
    async fn token(&self) -> Result<Option<String>> {
        let mut core = self.core.lock().await;
        if let Some(token) = &core.token {
            return Ok(token.clone());
        }
        let token = self.store.read()?;
        core.token = Some(token.clone());
        Ok(token)
    }

    async fn fetch_lobby(&self) -> Result<Option<LobbySnapshot>> {
        let raw = self.call(Method::Get, protocol::PATH_MY_LOBBY, None).await?;
        LobbySnapshot::from_response(raw)
    }

    async fn fetch_game(&self) -> Result<Option<GameSnapshot>> {
        let raw = self.call(Method::Get, protocol::PATH_MY_GAME, None).await?;
        GameSnapshot::from_response(raw)
    }

    async fn current_lobby_id(&self) -> Result<LobbyId> {
        self.core
            .lock()
            .await
            .lobby
            .as_ref()
            .map(|lobby| lobby.lobby_id.clone())
            .ok_or(SessionError::NoActiveLobby)
    }

    /// Surface a failed user operation.
    async fn report<T>(&self, action: &'static str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            warn!(action, error = %e, "action failed");
            self.emit(SessionEvent::ActionFailed {
                action,
                message: user_message(e),
            });
            if matches!(e, SessionError::AuthInvalid) {
                let mut core = self.core.lock().await;
                self.expire(&mut core);
            }
        }
        result
    }

    fn emit(&self, event: SessionEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                warn!(
                    "event channel full, dropping event: {:?}",
                    std::mem::discriminant(&dropped)
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("event channel closed, receiver dropped");
            }
        }
    }

    fn set_route(&self, core: &mut MutexGuard<'_, Core>, to: Route) {
        let from = core.route;
        if from != to {
            core.route = to;
            debug!(?from, ?to, "route changed");
            self.emit(SessionEvent::RouteChanged { from, to });
        }
    }

    fn stop_polling_locked(&self, core: &mut MutexGuard<'_, Core>) {
        if core.poller.cancel().is_some() {
            self.emit(SessionEvent::PollingChanged(None));
        }
    }

    /// Reset everything derived from the session and show the sign-in screen.
    fn clear_session(&self, core: &mut MutexGuard<'_, Core>) {
        self.stop_polling_locked(core);
        core.username = None;
        core.lobbies.clear();
        core.lobby = None;
        core.game = None;
        self.set_route(core, Route::SignIn);
    }

    /// The server stopped accepting the token.
    fn expire(&self, core: &mut MutexGuard<'_, Core>) {
        if let Err(e) = self.store.erase() {
            warn!(error = %e, "failed to erase rejected token");
        }
        core.token = Some(None);
        let had_session = core.username.is_some();
        self.clear_session(core);
        if had_session {
            info!("session expired");
            self.emit(SessionEvent::SessionExpired);
        }
    }

    fn enter_lobby(self: &Arc<Self>, core: &mut MutexGuard<'_, Core>, lobby: LobbySnapshot) {
        core.lobby = Some(lobby.clone());
        core.game = None;
        self.emit(SessionEvent::LobbyUpdated(lobby));
        self.set_route(core, Route::FullLobby);
        self.arm_lobby(core);
    }

    fn arm_lobby(self: &Arc<Self>, core: &mut MutexGuard<'_, Core>) {
        let epoch = core.poller.begin(PollMode::Lobby);
        let task = tokio::spawn(lobby_poll_loop(
            Arc::downgrade(self),
            epoch,
            self.config.poll_interval,
        ));
        core.poller.attach(epoch, task);
        self.emit(SessionEvent::PollingChanged(Some(PollMode::Lobby)));
    }

    /// First fetch of game polling, then arm its timer.
    ///
    /// `epoch` must already be installed in the poller. If it was cancelled
    /// while the fetch was in flight the result is discarded and no timer is
    /// armed.
    async fn engage_game(self: &Arc<Self>, epoch: u64) -> Result<()> {
        let fetched = self.fetch_game().await;

        let mut core = self.core.lock().await;
        if !core.poller.is_current(epoch) {
            debug!(epoch, "discarding game fetch of a cancelled poll handle");
            return Ok(());
        }
        let outcome = match fetched {
            Ok(game) => {
                self.apply_game(&mut core, epoch, game);
                Ok(())
            }
            Err(SessionError::AuthInvalid) => {
                self.expire(&mut core);
                return Err(SessionError::AuthInvalid);
            }
            Err(e) => {
                self.note_failure(&mut core, epoch, PollMode::Game, &e);
                Err(e)
            }
        };

        let task = tokio::spawn(game_poll_loop(
            Arc::downgrade(self),
            epoch,
            self.config.poll_interval,
        ));
        core.poller.attach(epoch, task);
        outcome
    }

    async fn lobby_tick(&self, epoch: u64) -> TickOutcome {
        let fetched = self.fetch_lobby().await;

        let mut core = self.core.lock().await;
        if !core.poller.is_current(epoch) {
            debug!(epoch, "discarding lobby tick of a cancelled poll handle");
            return TickOutcome::Stop;
        }
        match fetched {
            Ok(Some(lobby)) => {
                self.note_success(&mut core, epoch, PollMode::Lobby);
                let started = lobby.game_started;
                core.lobby = Some(lobby.clone());
                self.emit(SessionEvent::LobbyUpdated(lobby));
                if !started {
                    return TickOutcome::Continue;
                }
                info!("lobby game started, switching to game polling");
                match core.poller.hand_over(epoch, PollMode::Game) {
                    Some(game_epoch) => {
                        self.emit(SessionEvent::PollingChanged(Some(PollMode::Game)));
                        TickOutcome::HandOver(game_epoch)
                    }
                    None => TickOutcome::Stop,
                }
            }
            Ok(None) => {
                info!("lobby closed");
                self.stop_polling_locked(&mut core);
                core.lobby = None;
                self.emit(SessionEvent::LobbyClosed);
                self.set_route(&mut core, Route::MainMenu);
                TickOutcome::Stop
            }
            Err(SessionError::AuthInvalid) => {
                self.expire(&mut core);
                TickOutcome::Stop
            }
            Err(e) => {
                self.note_failure(&mut core, epoch, PollMode::Lobby, &e);
                TickOutcome::Continue
            }
        }
    }

    async fn game_tick(&self, epoch: u64) -> TickOutcome {
        let fetched = self.fetch_game().await;

        let mut core = self.core.lock().await;
        if !core.poller.is_current(epoch) {
            debug!(epoch, "discarding game tick of a cancelled poll handle");
            return TickOutcome::Stop;
        }
        match fetched {
            Ok(game) => {
                self.apply_game(&mut core, epoch, game);
                TickOutcome::Continue
            }
            Err(SessionError::AuthInvalid) => {
                self.expire(&mut core);
                TickOutcome::Stop
            }
            Err(e) => {
                self.note_failure(&mut core, epoch, PollMode::Game, &e);
                TickOutcome::Continue
            }
        }
    }

    fn apply_game(&self, core: &mut MutexGuard<'_, Core>, epoch: u64, game: Option<GameSnapshot>) {
        self.note_success(core, epoch, PollMode::Game);
        let Some(game) = game else {
            debug!("no game reported yet");
            return;
        };
        core.game = Some(game.clone());
        self.emit(SessionEvent::GameUpdated(game));
        if core.route != Route::Game {
            core.lobby = None;
            self.set_route(core, Route::Game);
        }
    }

    fn note_success(&self, core: &mut MutexGuard<'_, Core>, epoch: u64, mode: PollMode) {
        if core.poller.record_success(epoch) {
            info!(%mode, "synchronization restored");
            self.emit(SessionEvent::SyncRestored { mode });
        }
    }

    fn note_failure(
        &self,
        core: &mut MutexGuard<'_, Core>,
        epoch: u64,
        mode: PollMode,
        error: &SessionError,
    ) {
        let Some(count) = core
            .poller
            .record_failure(epoch, self.config.poll_failure_threshold)
        else {
            return;
        };
        warn!(%mode, consecutive = count.consecutive, %error, "poll tick failed");
        self.emit(SessionEvent::PollFailed {
            mode,
            error: error.to_string(),
            consecutive: count.consecutive,
        });
        if count.degraded_now {
            self.emit(SessionEvent::SyncDegraded {
                mode,
                consecutive: count.consecutive,
            });
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        // The poller's own Drop aborts the poll task.
        if let Some(task) = self.loading_task.take() {
            task.abort();
        }
    }
}

/// A message suitable for showing the user.
fn user_message(error: &SessionError) -> String {
    match error {
        SessionError::RemoteRejected { message, .. } => message.clone(),
        SessionError::AuthInvalid => "Your session is no longer valid. Please sign in again.".into(),
        SessionError::TransportFailure(_) | SessionError::Timeout => {
            "Could not reach the server. Please try again.".into()
        }
        SessionError::NoActiveLobby => "You are not in a lobby.".into(),
        other => other.to_string(),
    }
}

// ── Poll loops ──────────────────────────────────────────────────────

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// Timer task of lobby polling.
///
/// Exits when the controller is dropped, the handle is cancelled, the lobby
/// disappears, or the lobby's game starts (after handing over to game
/// polling, from this same task).
async fn lobby_poll_loop(inner: Weak<Inner>, epoch: u64, period: Duration) {
    debug!(epoch, "lobby poll loop started");
    let mut ticker = ticker(period);
    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        match inner.lobby_tick(epoch).await {
            TickOutcome::Continue => {}
            TickOutcome::Stop => break,
            TickOutcome::HandOver(game_epoch) => {
                if let Err(e) = inner.engage_game(game_epoch).await {
                    debug!(error = %e, "first game fetch after hand-over failed");
                }
                break;
            }
        }
    }
    debug!(epoch, "lobby poll loop exited");
}

/// Timer task of game polling.
async fn game_poll_loop(inner: Weak<Inner>, epoch: u64, period: Duration) {
    debug!(epoch, "game poll loop started");
    let mut ticker = ticker(period);
    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        match inner.game_tick(epoch).await {
            TickOutcome::Continue => {}
            TickOutcome::Stop | TickOutcome::HandOver(_) => break,
        }
    }
    debug!(epoch, "game poll loop exited");
}

/// Forward busy-flag changes of the request tracker as events.
async fn forward_loading(mut busy_rx: watch::Receiver<bool>, event_tx: mpsc::Sender<SessionEvent>) {
    while busy_rx.changed().await.is_ok() {
        let busy = *busy_rx.borrow_and_update();
        if event_tx
            .try_send(SessionEvent::LoadingChanged(busy))
            .is_err()
        {
            debug!("loading event not delivered");
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::credentials::MemoryCredentialStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    // ── Mock remote ─────────────────────────────────────────────────

    /// Answers every path with a fixed body and records requests.
    struct FixedRemote {
        lobby: Value,
        requests: Arc<StdMutex<Vec<Request>>>,
    }

    #[async_trait]
    impl RemoteClient for FixedRemote {
        async fn request(&self, request: Request) -> std::result::Result<Value, SessionError> {
            let path = request.path;
            self.requests.lock().unwrap().push(request);
            match path {
                protocol::PATH_TOKEN => Ok(json!({ "access_token": "opaque" })),
                protocol::PATH_MY_LOBBY => Ok(self.lobby.clone()),
                protocol::PATH_MY_GAME => Ok(json!({ "has_game": false })),
                _ => Err(SessionError::rejected(404, None)),
            }
        }
    }

    #[allow(clippy::type_complexity)]
    fn start(
        lobby: Value,
    ) -> (
        SessionController,
        mpsc::Receiver<SessionEvent>,
        Arc<StdMutex<Vec<Request>>>,
    ) {
        let requests = Arc::new(StdMutex::new(Vec::new()));
        let remote = FixedRemote {
            lobby,
            requests: Arc::clone(&requests),
        };
        let (session, events) = SessionController::start(
            remote,
            MemoryCredentialStore::new(),
            SessionConfig::default(),
        );
        (session, events, requests)
    }

    // ── Tests ───────────────────────────────────────────────────────

    #[test]
    fn config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.poll_interval, Duration::from_millis(5000));
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.poll_failure_threshold, 3);
        assert!(config.request_timeout.is_none());
    }

    #[test]
    fn config_clamps() {
        let config = SessionConfig::default()
            .with_event_channel_capacity(0)
            .with_poll_failure_threshold(0)
            .with_poll_interval(Duration::ZERO);
        assert_eq!(config.event_channel_capacity, 1);
        assert_eq!(config.poll_failure_threshold, 1);
        assert_eq!(config.poll_interval, Duration::from_millis(1));
    }

    #[tokio::test]
    async fn initial_state_is_root() {
        let (session, _events, _requests) = start(json!({ "has_lobby": false }));
        let state = session.state().await;
        assert_eq!(state, SessionState::default());
        assert_eq!(session.view().await, View::Root);
    }

    #[tokio::test]
    async fn login_attaches_stored_token_to_later_requests() {
        let (session, _events, requests) = start(json!({ "has_lobby": false }));
        session.login("dora").await.unwrap();

        let state = session.state().await;
        assert_eq!(state.route, Route::MainMenu);
        // "opaque" is not a JWT, so the submitted name is kept.
        assert_eq!(state.username.as_deref(), Some("dora"));

        let requests = requests.lock().unwrap();
        let lobby_lookup = requests
            .iter()
            .find(|r| r.path == protocol::PATH_MY_LOBBY)
            .expect("my-lobby requested");
        assert_eq!(lobby_lookup.token.as_deref(), Some("opaque"));
    }

    #[tokio::test]
    async fn dispatch_rejects_actions_not_on_screen() {
        let (session, _events, _requests) = start(json!({ "has_lobby": false }));
        let result = session.dispatch(Action::Leave).await;
        assert!(matches!(result, Err(SessionError::ActionUnavailable)));
    }

    #[tokio::test]
    async fn leave_without_lobby_is_an_error() {
        let (session, mut events, _requests) = start(json!({ "has_lobby": false }));
        let result = session.leave_lobby().await;
        assert!(matches!(result, Err(SessionError::NoActiveLobby)));
        let mut saw_failure = false;
        while let Ok(event) = events.try_recv() {
            if let SessionEvent::ActionFailed { action, .. } = event {
                assert_eq!(action, "leave_lobby");
                saw_failure = true;
            }
        }
        assert!(saw_failure);
    }

    #[test]
    fn user_messages() {
        assert_eq!(
            user_message(&SessionError::rejected(409, Some("Lobby is full".into()))),
            "Lobby is full"
        );
        assert!(user_message(&SessionError::Timeout).contains("server"));
    }
}
