//! Endpoint construction and reconnection defaults for the session client.

use url::Url;

use crate::infrastructure::websocket::transport::TransportError;

// Reconnection defaults
pub const INITIAL_RETRY_DELAY_MS: u64 = 1_000;
pub const MAX_RETRY_ATTEMPTS: u32 = 5;

/// How long a cancelled connection gets to send its close frame.
pub const CLOSE_TIMEOUT_MS: u64 = 1_000;

/// Identifies the session to join and the credentials to join it with.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionTarget {
    pub session_id: String,
    pub token: String,
    pub character_id: Option<String>,
}

impl SessionTarget {
    pub fn new(session_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            token: token.into(),
            character_id: None,
        }
    }

    pub fn with_character(mut self, character_id: impl Into<String>) -> Self {
        self.character_id = Some(character_id.into());
        self
    }
}

impl std::fmt::Debug for SessionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTarget")
            .field("session_id", &self.session_id)
            .field("token", &"<redacted>")
            .field("character_id", &self.character_id)
            .finish()
    }
}

/// Build `{base}/sessions/{id}/ws?session_id=..&token=..[&character_id=..]`.
pub fn session_endpoint(base: &Url, target: &SessionTarget) -> Result<Url, TransportError> {
    if target.session_id.is_empty() {
        return Err(TransportError::InvalidEndpoint(
            "session id is empty".to_string(),
        ));
    }

    let mut url = base.clone();
    {
        let mut segments = url.path_segments_mut().map_err(|_| {
            TransportError::InvalidEndpoint(format!("{base} cannot be a base URL"))
        })?;
        segments
            .pop_if_empty()
            .extend(["sessions", target.session_id.as_str(), "ws"]);
    }
    url.set_query(None);
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("session_id", &target.session_id)
            .append_pair("token", &target.token);
        if let Some(character_id) = &target.character_id {
            query.append_pair("character_id", character_id);
        }
    }
    Ok(url)
}

/// Copy of `url` with the `token` query parameter masked, for logging.
pub fn redact_token(url: &Url) -> String {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "token" {
                "***".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), v)
        })
        .collect();

    let mut redacted = url.clone();
    if pairs.is_empty() {
        return redacted.to_string();
    }
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}
