//! Classification of server rejections.
//!
//! The lobby server reports refusals through HTTP status codes. These are
//! grouped into a small closed set so that callers can react (or show a
//! message) without matching on raw numbers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why the server declined a request.
///
/// Serialized as `"SCREAMING_SNAKE_CASE"` strings (e.g. `"LOBBY_FULL"`) so the
/// code can be forwarded to a UI layer as-is.
///
/// Use [`description()`](RejectionCode::description) for a human-readable explanation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionCode {
    /// 400: the request body was refused.
    BadRequest,
    /// 401: the bearer token is missing or no longer accepted.
    Unauthorized,
    /// 403: the user may not perform this action (e.g. starting a lobby they do not own).
    Forbidden,
    /// 404: the lobby or game does not exist.
    NotFound,
    /// 409: the action conflicts with current server state (already in a lobby, lobby full).
    Conflict,
    /// 422: the request failed server-side validation (e.g. malformed lobby id).
    Unprocessable,
    /// 429: rate limited.
    RateLimited,
    /// Any 5xx status.
    ServerError,
    /// Any other non-success status.
    Other,
}

impl RejectionCode {
    /// Classify an HTTP status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            409 => Self::Conflict,
            422 => Self::Unprocessable,
            429 => Self::RateLimited,
            500..=599 => Self::ServerError,
            _ => Self::Other,
        }
    }

    /// Returns a human-readable description of this rejection.
    pub fn description(&self) -> &'static str {
        match self {
            Self::BadRequest => "The server could not process the request.",
            Self::Unauthorized => "Your session is no longer valid. Please sign in again.",
            Self::Forbidden => "You are not allowed to do that.",
            Self::NotFound => {
                "The lobby could not be found. It may have been closed or the id is incorrect."
            }
            Self::Conflict => {
                "The lobby is full, has already started, or you are already in a lobby."
            }
            Self::Unprocessable => "The request was invalid. Check the lobby id and try again.",
            Self::RateLimited => "Too many requests in a short time. Please try again later.",
            Self::ServerError => "The server encountered an error. Please try again later.",
            Self::Other => "The server declined the request.",
        }
    }
}

impl fmt::Display for RejectionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}
