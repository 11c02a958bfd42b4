//! reqwest-backed client for the session REST API

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tavern_protocol::SessionData;
use url::Url;

use crate::ports::outbound::{ApiError, SessionApi};

/// Client for the session REST API
#[derive(Clone)]
pub struct HttpSessionApi {
    client: Client,
    base_url: Url,
    token: String,
}

#[derive(Serialize)]
struct UpdateSceneRequest<'a> {
    scene: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<String>,
}

#[derive(Serialize)]
struct AdvanceTurnRequest {
    force: bool,
}

#[derive(Serialize)]
struct SetInitiativeRequest<'a> {
    character_id: &'a str,
    initiative: i32,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl HttpSessionApi {
    pub fn new(base_url: &Url, token: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.clone(),
            token: token.into(),
        }
    }

    /// `{base}/sessions/{id}/{suffix..}`, each segment percent-encoded.
    fn session_url(&self, session_id: &str, suffix: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ApiError::RequestFailed(format!("{} cannot be a base URL", self.base_url))
            })?
            .pop_if_empty()
            .push("sessions")
            .push(session_id)
            .extend(suffix);
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, ApiError> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ApiError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });
        tracing::warn!(status = status.as_u16(), %message, "Session API request failed");
        Err(ApiError::Server {
            status: status.as_u16(),
            message,
        })
    }
}

/// Extract the server's `{"error": "..."}` message, or the raw body text.
fn error_message(body: &str) -> Option<String> {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return Some(parsed.error);
    }
    let trimmed = body.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[async_trait]
impl SessionApi for HttpSessionApi {
    async fn get_session(&self, session_id: &str) -> Result<SessionData, ApiError> {
        let response = self
            .send(self.client.get(self.session_url(session_id, &[])?))
            .await?;

        response
            .json::<SessionData>()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    }

    async fn update_scene(
        &self,
        session_id: &str,
        scene: &str,
        notes: Option<String>,
    ) -> Result<(), ApiError> {
        let body = UpdateSceneRequest { scene, notes };
        self.send(
            self.client
                .put(self.session_url(session_id, &["scene"])?)
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn advance_turn(&self, session_id: &str, force: bool) -> Result<(), ApiError> {
        self.send(
            self.client
                .post(self.session_url(session_id, &["turn", "advance"])?)
                .json(&AdvanceTurnRequest { force }),
        )
        .await?;
        Ok(())
    }

    async fn set_initiative(
        &self,
        session_id: &str,
        character_id: &str,
        initiative: i32,
    ) -> Result<(), ApiError> {
        let body = SetInitiativeRequest {
            character_id,
            initiative,
        };
        self.send(
            self.client
                .post(self.session_url(session_id, &["initiative"])?)
                .json(&body),
        )
        .await?;
        Ok(())
    }
}
