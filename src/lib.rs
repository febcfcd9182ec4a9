//! # Lobby Session Client
//!
//! Session and lobby state machine for turn-based game clients that stay in
//! sync with their server by polling.
//!
//! The crate drives a client through its screens (sign-in, main menu, lobby
//! browser, lobby, game), authenticates the user with a bearer token, and keeps
//! the lobby or game snapshot fresh with a single repeating poll timer.
//!
//! ## Features
//!
//! - **Remote-agnostic**: implement the [`RemoteClient`] trait for any backend
//! - **HTTP built-in**: the default `transport-http` feature provides [`HttpRemote`]
//! - **One poll timer**: starting lobby or game polling always replaces the running timer,
//!   and results of a cancelled timer are discarded
//! - **Event-driven**: receive typed [`SessionEvent`]s via a channel and render
//!   [`SessionController::view`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use lobby_session_client::{
//!     FileCredentialStore, HttpRemote, SessionConfig, SessionController, View,
//! };
//!
//! let remote = HttpRemote::new("http://localhost:8000")?;
//! let store = FileCredentialStore::new("session.token");
//! let (session, mut events) = SessionController::start(remote, store, SessionConfig::default());
//!
//! session.verify_session().await?;
//! if let View::SignIn { .. } = session.view().await {
//!     session.login("alice").await?;
//! }
//! session.create_lobby().await?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{event:?} -> {:?}", session.view().await);
//! }
//! ```

pub mod client;
pub mod credentials;
pub mod error;
pub mod error_codes;
pub mod event;
pub mod poll;
pub mod protocol;
pub mod remote;
pub mod remotes;
pub mod screen;
pub mod token;

// Re-export primary types for ergonomic imports.
pub use client::{SessionConfig, SessionController, SessionState};
pub use credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use error::SessionError;
pub use error_codes::RejectionCode;
pub use event::SessionEvent;
pub use poll::PollMode;
pub use protocol::{GameSnapshot, LobbyId, LobbySnapshot, LobbySummary};
pub use remote::RemoteClient;
pub use screen::{present, Action, Route, View};
pub use token::{JwtUsernameDecoder, TokenDecoder};

#[cfg(feature = "transport-http")]
pub use remotes::HttpRemote;
