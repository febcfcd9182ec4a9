//! Error types for the lobby session client.

use thiserror::Error;

use crate::error_codes::RejectionCode;

/// Errors that can occur while driving a [`SessionController`](crate::SessionController).
#[derive(Debug, Error)]
pub enum SessionError {
    /// The stored token is missing, failed verification, could not be decoded,
    /// or the server refused it (HTTP 401).
    #[error("authentication invalid")]
    AuthInvalid,

    /// The server declined the request.
    #[error("request rejected by server ({status}): {message}")]
    RemoteRejected {
        /// HTTP status returned by the server.
        status: u16,
        /// Classification of `status`.
        code: RejectionCode,
        /// Human-readable reason, taken from the response body when present.
        message: String,
    },

    /// The remote authority could not be reached.
    #[error("transport failure: {0}")]
    TransportFailure(String),

    /// A request did not settle within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// A response body did not have the expected shape.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A lobby operation was attempted without a current lobby.
    #[error("not in a lobby")]
    NoActiveLobby,

    /// The action is not offered by the screen that is currently active.
    #[error("action not available on the current screen")]
    ActionUnavailable,

    /// An I/O error occurred in a credential store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    /// Build a [`RemoteRejected`](SessionError::RemoteRejected) error from an
    /// HTTP status and an optional server message.
    pub fn rejected(status: u16, message: Option<String>) -> Self {
        let code = RejectionCode::from_status(status);
        let message = message.unwrap_or_else(|| code.description().to_string());
        Self::RemoteRejected {
            status,
            code,
            message,
        }
    }

    /// Returns `true` if the server was unreachable or did not answer in time.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::TransportFailure(_) | Self::Timeout)
    }

    /// Returns `true` if the server answered but declined the request.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::RemoteRejected { .. })
    }
}

/// A specialized [`Result`] type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn rejected_falls_back_to_code_description() {
        let err = SessionError::rejected(404, None);
        match err {
            SessionError::RemoteRejected {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 404);
                assert_eq!(code, RejectionCode::NotFound);
                assert_eq!(message, RejectionCode::NotFound.description());
            }
            other => panic!("expected RemoteRejected, got {other:?}"),
        }
    }

    #[test]
    fn classification_helpers() {
        assert!(SessionError::Timeout.is_transport());
        assert!(SessionError::TransportFailure("refused".into()).is_transport());
        assert!(!SessionError::AuthInvalid.is_transport());
        assert!(SessionError::rejected(409, Some("lobby full".into())).is_rejection());
    }
}
