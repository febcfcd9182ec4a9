//! Remote client implementations for the lobby server.
//!
//! This module provides concrete [`RemoteClient`](crate::RemoteClient)
//! implementations behind feature gates. Enable the corresponding Cargo
//! feature to pull in a remote:
//!
//! | Feature          | Remote         |
//! |------------------|----------------|
//! | `transport-http` | [`HttpRemote`] |
//!
//! # Example
//!
//! ```rust,ignore
//! # async fn example() -> Result<(), lobby_session_client::SessionError> {
//! use lobby_session_client::{HttpRemote, MemoryCredentialStore, SessionConfig, SessionController};
//!
//! let remote = HttpRemote::new("http://localhost:8000")?;
//! let (session, _events) =
//!     SessionController::start(remote, MemoryCredentialStore::new(), SessionConfig::default());
//! session.login("alice").await?;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "transport-http")]
pub mod http;

#[cfg(feature = "transport-http")]
pub use http::HttpRemote;
