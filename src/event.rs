//! Events emitted by the session controller.
//!
//! A UI layer drains the receiver returned from
//! [`SessionController::start`](crate::SessionController::start) and re-renders
//! [`SessionController::view`](crate::SessionController::view) whenever an
//! event arrives. Events are informational: the controller's state is always
//! the source of truth.

use crate::poll::PollMode;
use crate::protocol::{GameSnapshot, LobbySnapshot};
use crate::screen::Route;

/// Something observable happened in the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The active screen changed.
    RouteChanged { from: Route, to: Route },
    /// A request started while none was in flight (`true`), or the last
    /// in-flight request settled (`false`).
    ///
    /// Changes are coalesced: a request that starts and settles before the
    /// notification is forwarded may produce no `LoadingChanged(true)` at all.
    /// Read [`SessionController::is_loading`](crate::SessionController::is_loading)
    /// or [`SessionState::loading`](crate::SessionState::loading) for the exact
    /// value at a given moment.
    LoadingChanged(bool),
    /// A fresh lobby snapshot replaced the previous one.
    LobbyUpdated(LobbySnapshot),
    /// A fresh game snapshot replaced the previous one.
    GameUpdated(GameSnapshot),
    /// The lobby being polled no longer exists for this user.
    LobbyClosed,
    /// Polling switched to a different mode, or stopped (`None`).
    PollingChanged(Option<PollMode>),
    /// A poll tick failed. Polling continues.
    PollFailed {
        mode: PollMode,
        error: String,
        consecutive: u32,
    },
    /// Enough consecutive poll ticks failed that the displayed data is stale.
    SyncDegraded { mode: PollMode, consecutive: u32 },
    /// A poll tick succeeded after [`SyncDegraded`](SessionEvent::SyncDegraded).
    SyncRestored { mode: PollMode },
    /// A user action failed; `message` is suitable for display.
    ActionFailed {
        action: &'static str,
        message: String,
    },
    /// The server stopped accepting the session token; the user was signed out.
    SessionExpired,
}
