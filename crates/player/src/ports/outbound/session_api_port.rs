//! Session API Port - request/response boundary to the session REST API
//!
//! The live channel never calls this itself. The session service uses it for the
//! initial load and for authoritative re-fetches; DM controls (scene, turn,
//! initiative) go straight through it.

use async_trait::async_trait;
use tavern_protocol::SessionData;
use thiserror::Error;

/// Errors returned by the session REST API
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The request never produced a response (DNS, refused, timeout)
    #[error("Request failed: {0}")]
    RequestFailed(String),
    /// Non-success status; `message` is the server's `error` field when present
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("Failed to parse response: {0}")]
    Parse(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Server { status: 404, .. })
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Server { status: 401 | 403, .. })
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionApi: Send + Sync {
    /// `GET /sessions/{id}`
    async fn get_session(&self, session_id: &str) -> Result<SessionData, ApiError>;

    /// `PUT /sessions/{id}/scene`
    async fn update_scene(
        &self,
        session_id: &str,
        scene: &str,
        notes: Option<String>,
    ) -> Result<(), ApiError>;

    /// `POST /sessions/{id}/turn/advance`
    async fn advance_turn(&self, session_id: &str, force: bool) -> Result<(), ApiError>;

    /// `POST /sessions/{id}/initiative`
    async fn set_initiative(
        &self,
        session_id: &str,
        character_id: &str,
        initiative: i32,
    ) -> Result<(), ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_helpers() {
        let not_found = ApiError::Server {
            status: 404,
            message: "Session not found".into(),
        };
        assert!(not_found.is_not_found());
        assert!(!not_found.is_unauthorized());
        assert!(ApiError::Server {
            status: 401,
            message: String::new()
        }
        .is_unauthorized());
        assert!(!ApiError::RequestFailed("refused".into()).is_not_found());
    }
}
