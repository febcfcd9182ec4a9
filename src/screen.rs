//! Screens, the views presented for them, and the actions each view offers.
//!
//! [`present`] is the whole presenter: a pure function from controller state
//! to a [`View`] that carries exactly the data its screen renders. Which
//! callbacks a screen exposes is described by [`View::actions`], and
//! [`SessionController::dispatch`](crate::SessionController::dispatch) runs
//! them.

use crate::client::SessionState;
use crate::protocol::{GameSnapshot, LobbyId, LobbySnapshot, LobbySummary};

/// The active screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Route {
    /// Initial screen before the stored session was checked. Also shown when
    /// the state is inconsistent.
    #[default]
    Root,
    SignIn,
    MainMenu,
    Lobbies,
    FullLobby,
    Game,
}

/// What to render for the active screen.
#[derive(Debug, Clone, PartialEq)]
pub enum View {
    Root,
    SignIn { draft: String },
    MainMenu { username: String },
    Lobbies { lobbies: Vec<LobbySummary> },
    FullLobby { username: String, lobby: LobbySnapshot },
    Game { game: GameSnapshot },
}

/// A user-initiated callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    EditUsername(String),
    Login { username: String },
    Logout,
    ShowLobbies,
    CreateLobby,
    JoinLobby(LobbyId),
    Back,
    Refresh,
    Leave,
    Start,
}

/// Discriminant of an [`Action`], used to describe what a view offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    EditUsername,
    Login,
    Logout,
    ShowLobbies,
    CreateLobby,
    JoinLobby,
    Back,
    Refresh,
    Leave,
    Start,
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::EditUsername(_) => ActionKind::EditUsername,
            Self::Login { .. } => ActionKind::Login,
            Self::Logout => ActionKind::Logout,
            Self::ShowLobbies => ActionKind::ShowLobbies,
            Self::CreateLobby => ActionKind::CreateLobby,
            Self::JoinLobby(_) => ActionKind::JoinLobby,
            Self::Back => ActionKind::Back,
            Self::Refresh => ActionKind::Refresh,
            Self::Leave => ActionKind::Leave,
            Self::Start => ActionKind::Start,
        }
    }

    /// Short name used in logs and [`SessionEvent::ActionFailed`](crate::SessionEvent::ActionFailed).
    pub fn name(&self) -> &'static str {
        match self.kind() {
            ActionKind::EditUsername => "edit_username",
            ActionKind::Login => "login",
            ActionKind::Logout => "logout",
            ActionKind::ShowLobbies => "show_lobbies",
            ActionKind::CreateLobby => "create_lobby",
            ActionKind::JoinLobby => "join_lobby",
            ActionKind::Back => "back",
            ActionKind::Refresh => "refresh",
            ActionKind::Leave => "leave_lobby",
            ActionKind::Start => "start_game",
        }
    }
}

impl View {
    pub fn route(&self) -> Route {
        match self {
            Self::Root => Route::Root,
            Self::SignIn { .. } => Route::SignIn,
            Self::MainMenu { .. } => Route::MainMenu,
            Self::Lobbies { .. } => Route::Lobbies,
            Self::FullLobby { .. } => Route::FullLobby,
            Self::Game { .. } => Route::Game,
        }
    }

    /// The callbacks this view exposes.
    pub fn actions(&self) -> &'static [ActionKind] {
        match self {
            Self::Root | Self::Game { .. } => &[],
            Self::SignIn { .. } => &[ActionKind::EditUsername, ActionKind::Login],
            Self::MainMenu { .. } => &[
                ActionKind::Logout,
                ActionKind::ShowLobbies,
                ActionKind::CreateLobby,
                ActionKind::JoinLobby,
            ],
            Self::Lobbies { .. } => &[ActionKind::Back, ActionKind::Refresh],
            Self::FullLobby { .. } => &[ActionKind::Leave, ActionKind::Start],
        }
    }

    pub fn offers(&self, action: &Action) -> bool {
        self.actions().contains(&action.kind())
    }
}

/// Map controller state to the view for its active screen.
///
/// A screen whose data is missing (for example `FullLobby` without a lobby
/// snapshot) renders as [`View::Root`].
pub fn present(state: &SessionState) -> View {
    match state.route {
        Route::Root => View::Root,
        Route::SignIn => View::SignIn {
            draft: state.username_draft.clone(),
        },
        Route::MainMenu => match &state.username {
            Some(username) => View::MainMenu {
                username: username.clone(),
            },
            None => View::Root,
        },
        Route::Lobbies => View::Lobbies {
            lobbies: state.lobbies.clone(),
        },
        Route::FullLobby => match (&state.username, &state.lobby) {
            (Some(username), Some(lobby)) => View::FullLobby {
                username: username.clone(),
                lobby: lobby.clone(),
            },
            _ => View::Root,
        },
        Route::Game => match &state.game {
            Some(game) => View::Game { game: game.clone() },
            None => View::Root,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lobby() -> LobbySnapshot {
        LobbySnapshot {
            lobby_id: LobbyId::from("1"),
            members: vec![],
            game_started: false,
            raw: json!({}),
        }
    }

    #[test]
    fn initial_state_presents_root() {
        assert_eq!(present(&SessionState::default()), View::Root);
    }

    #[test]
    fn full_lobby_without_snapshot_presents_root() {
        let state = SessionState {
            route: Route::FullLobby,
            username: Some("alice".into()),
            ..SessionState::default()
        };
        assert_eq!(present(&state), View::Root);
    }

    #[test]
    fn full_lobby_offers_leave_and_start() {
        let state = SessionState {
            route: Route::FullLobby,
            username: Some("alice".into()),
            lobby: Some(lobby()),
            ..SessionState::default()
        };
        let view = present(&state);
        assert_eq!(view.route(), Route::FullLobby);
        assert!(view.offers(&Action::Leave));
        assert!(view.offers(&Action::Start));
        assert!(!view.offers(&Action::CreateLobby));
    }

    #[test]
    fn sign_in_carries_draft() {
        let state = SessionState {
            route: Route::SignIn,
            username_draft: "bo".into(),
            ..SessionState::default()
        };
        assert_eq!(present(&state), View::SignIn { draft: "bo".into() });
    }
}
