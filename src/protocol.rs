//! Wire types for the lobby server's HTTP API and the snapshots built from them.
//!
//! Only the fields the client acts on are typed. Everything else a response
//! carries is preserved in the snapshot's `raw` value so a presenter can show
//! it without this crate knowing its schema.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SessionError};

// ── Paths ───────────────────────────────────────────────────────────

pub const PATH_TOKEN: &str = "/token";
pub const PATH_TOKEN_VERIFY: &str = "/token/verify";
pub const PATH_LOBBY: &str = "/lobby";
pub const PATH_MY_LOBBY: &str = "/lobby/my-lobby";
pub const PATH_LOBBY_JOIN: &str = "/lobby/join";
pub const PATH_LOBBY_LEAVE: &str = "/lobby/leave";
pub const PATH_LOBBY_START: &str = "/lobby/start";
pub const PATH_MY_GAME: &str = "/game/my-game";

// ── Requests ────────────────────────────────────────────────────────

/// HTTP method of a [`Request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single call to the remote authority.
///
/// `token` is the bearer credential read from the credential store when the
/// request was built; remotes attach it as an `Authorization` header.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub path: &'static str,
    pub body: Option<Value>,
    pub token: Option<String>,
}

impl Request {
    pub fn new(method: Method, path: &'static str) -> Self {
        Self {
            method,
            path,
            body: None,
            token: None,
        }
    }

    /// Attach a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Serialization`] if `body` cannot be encoded.
    pub fn with_json(mut self, body: &impl Serialize) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }
}

/// Body of `POST /token/verify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyTokenRequest {
    pub token: String,
}

/// Body of `POST /token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueTokenRequest {
    pub username: String,
}

/// Body of the join, leave and start lobby requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyIdRequest {
    pub lobby_id: LobbyId,
}

// ── Responses ───────────────────────────────────────────────────────

/// Response of `POST /token/verify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyTokenResponse {
    pub valid: bool,
}

/// Response of `POST /token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueTokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

/// Response of `GET /lobby/my-lobby`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MyLobbyResponse {
    pub has_lobby: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lobby: Option<LobbyInfo>,
}

/// Response of `GET /game/my-game`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MyGameResponse {
    pub has_game: bool,
    #[serde(default)]
    pub game_status: Value,
}

/// Response of `GET /lobby`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyListResponse {
    #[serde(default)]
    pub lobbies: Vec<LobbySummary>,
}

/// Identifier of a lobby.
///
/// Servers emit ids either as strings or as integers. The id keeps the JSON
/// type it arrived with and is sent back unchanged in join, leave and start
/// requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LobbyId {
    Text(String),
    Number(serde_json::Number),
}

impl LobbyId {
    /// The id as text, if the server sent a string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Number(_) => None,
        }
    }
}

impl From<&str> for LobbyId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_string())
    }
}

impl From<String> for LobbyId {
    fn from(id: String) -> Self {
        Self::Text(id)
    }
}

impl From<u64> for LobbyId {
    fn from(id: u64) -> Self {
        Self::Number(id.into())
    }
}

impl From<i64> for LobbyId {
    fn from(id: i64) -> Self {
        Self::Number(id.into())
    }
}

impl std::fmt::Display for LobbyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

/// A member of a lobby, as listed by the server.
///
/// Plain usernames and member objects carrying a `username` field are both
/// accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LobbyMember {
    Name(String),
    Detailed {
        username: String,
        #[serde(flatten)]
        extra: serde_json::Map<String, Value>,
    },
}

impl LobbyMember {
    pub fn username(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Detailed { username, .. } => username,
        }
    }
}

/// The `lobby` object of a lobby response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyInfo {
    pub id: LobbyId,
    #[serde(default)]
    pub game_started: bool,
    #[serde(default, alias = "players")]
    pub members: Vec<LobbyMember>,
}

/// An entry of the open lobby list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LobbySummary {
    pub id: LobbyId,
    #[serde(default, alias = "players")]
    pub members: Vec<LobbyMember>,
    /// Any additional fields the server sent (owner, capacity, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

// ── Snapshots ───────────────────────────────────────────────────────

/// The most recently fetched state of the user's lobby.
#[derive(Debug, Clone, PartialEq)]
pub struct LobbySnapshot {
    pub lobby_id: LobbyId,
    pub members: Vec<LobbyMember>,
    pub game_started: bool,
    /// The full response body the snapshot was built from.
    pub raw: Value,
}

impl LobbySnapshot {
    /// Build a snapshot from a lobby response body.
    ///
    /// Accepts both the `my-lobby` shape (`{has_lobby, lobby: {...}}`) and a
    /// bare lobby object. Returns `Ok(None)` when the body is empty (`null`)
    /// or reports that the user has no lobby.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Serialization`] if the lobby object is malformed.
    pub fn from_response(raw: Value) -> Result<Option<Self>> {
        if raw.is_null() || raw.get("has_lobby").and_then(Value::as_bool) == Some(false) {
            return Ok(None);
        }
        let info: LobbyInfo = match raw.get("lobby") {
            Some(lobby) if !lobby.is_null() => LobbyInfo::deserialize(lobby)?,
            _ => LobbyInfo::deserialize(&raw)?,
        };
        Ok(Some(Self {
            lobby_id: info.id,
            members: info.members,
            game_started: info.game_started,
            raw,
        }))
    }

    /// Returns `true` if `raw` carries lobby data at all, either a `lobby`
    /// object or a bare lobby with an `id`.
    pub fn is_described_by(raw: &Value) -> bool {
        ["lobby", "id"]
            .iter()
            .any(|key| raw.get(key).is_some_and(|v| !v.is_null()))
    }

    /// Returns `true` if `username` is listed as a member.
    pub fn has_member(&self, username: &str) -> bool {
        self.members.iter().any(|m| m.username() == username)
    }
}

/// The most recently fetched game status. Its schema belongs to the server.
#[derive(Debug, Clone, PartialEq)]
pub struct GameSnapshot {
    pub status: Value,
}

impl GameSnapshot {
    /// Build a snapshot from a `my-game` response body.
    ///
    /// Returns `Ok(None)` when the body reports that the user has no game.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Serialization`] if the body is malformed.
    pub fn from_response(raw: Value) -> Result<Option<Self>> {
        let response: MyGameResponse = serde_json::from_value(raw)?;
        if !response.has_game {
            return Ok(None);
        }
        Ok(Some(Self {
            status: response.game_status,
        }))
    }
}

/// Decode a response body into `T`, mapping failures to [`SessionError`].
pub(crate) fn decode<T: serde::de::DeserializeOwned>(raw: Value) -> Result<T> {
    serde_json::from_value(raw).map_err(SessionError::from)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lobby_snapshot_from_my_lobby_shape() {
        let raw = json!({
            "has_lobby": true,
            "lobby": { "id": 7, "game_started": false, "players": ["alice", "bob"] }
        });
        let snap = LobbySnapshot::from_response(raw.clone()).unwrap().unwrap();
        assert_eq!(snap.lobby_id, LobbyId::from(7u64));
        assert!(!snap.game_started);
        assert!(snap.has_member("bob"));
        assert_eq!(snap.raw, raw);
    }

    #[test]
    fn lobby_snapshot_from_bare_lobby() {
        let raw = json!({ "id": "abc", "game_started": true, "members": [{"username": "carol", "ready": true}] });
        let snap = LobbySnapshot::from_response(raw).unwrap().unwrap();
        assert_eq!(snap.lobby_id, LobbyId::from("abc"));
        assert!(snap.game_started);
        assert!(snap.has_member("carol"));
    }

    #[test]
    fn lobby_snapshot_absent_when_no_lobby() {
        let raw = json!({ "has_lobby": false, "lobby": null });
        assert!(LobbySnapshot::from_response(raw).unwrap().is_none());
        assert!(LobbySnapshot::from_response(Value::Null).unwrap().is_none());
    }

    #[test]
    fn acknowledgement_bodies_carry_no_lobby() {
        assert!(!LobbySnapshot::is_described_by(&Value::Null));
        assert!(!LobbySnapshot::is_described_by(&json!({ "detail": "joined" })));
        assert!(!LobbySnapshot::is_described_by(&json!({ "lobby": null })));
        assert!(LobbySnapshot::is_described_by(&json!({ "id": 3 })));
        assert!(LobbySnapshot::is_described_by(&json!({ "lobby": { "id": 3 } })));
    }

    #[test]
    fn game_snapshot_keeps_status_verbatim() {
        let raw = json!({ "has_game": true, "game_status": { "turn": "alice", "pot": 40 } });
        let snap = GameSnapshot::from_response(raw).unwrap().unwrap();
        assert_eq!(snap.status["pot"], 40);
    }

    #[test]
    fn lobby_id_request_serializes_as_string() {
        let body = serde_json::to_value(LobbyIdRequest {
            lobby_id: LobbyId::from("42"),
        })
        .unwrap();
        assert_eq!(body, json!({ "lobby_id": "42" }));
    }

    #[test]
    fn numeric_lobby_id_is_sent_back_as_a_number() {
        let id: LobbyId = serde_json::from_value(json!(7)).unwrap();
        assert_eq!(id.to_string(), "7");
        assert_eq!(id.as_text(), None);
        let body = serde_json::to_value(LobbyIdRequest { lobby_id: id }).unwrap();
        assert_eq!(body, json!({ "lobby_id": 7 }));
    }
}
