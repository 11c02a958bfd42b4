//! Client configuration

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

use crate::infrastructure::websocket::{delay_millis, ReconnectPolicy, SessionTarget};

pub const DEFAULT_WS_URL: &str = "ws://localhost:8080/api";
pub const DEFAULT_API_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Client configuration loaded from environment
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base endpoint of the live session channel
    pub ws_url: Url,
    /// Base URL of the session REST API
    pub api_url: Url,
    pub reconnect: ReconnectPolicy,
    pub http_timeout: Duration,
}

impl ClientConfig {
    /// Load configuration from environment variables (and `.env`, if present).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = ReconnectPolicy::default();

        let ws_url = lookup("TAVERN_WS_URL").unwrap_or_else(|| DEFAULT_WS_URL.to_string());
        let ws_url = Url::parse(&ws_url).context("TAVERN_WS_URL must be a valid URL")?;

        let api_url = lookup("TAVERN_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url = Url::parse(&api_url).context("TAVERN_API_URL must be a valid URL")?;

        let base_delay_ms = parse_or(
            &lookup,
            "TAVERN_RECONNECT_BASE_DELAY_MS",
            delay_millis(defaults.base_delay),
        )?;
        let max_attempts = parse_or(
            &lookup,
            "TAVERN_RECONNECT_MAX_ATTEMPTS",
            defaults.max_attempts,
        )?;
        let timeout_secs = parse_or(
            &lookup,
            "TAVERN_HTTP_TIMEOUT_SECS",
            DEFAULT_HTTP_TIMEOUT_SECS,
        )?;

        Ok(Self {
            ws_url,
            api_url,
            reconnect: ReconnectPolicy {
                base_delay: Duration::from_millis(base_delay_ms),
                max_attempts,
            },
            http_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// The session to join, from `TAVERN_SESSION_ID`, `TAVERN_TOKEN` and
/// `TAVERN_CHARACTER_ID`.
pub fn session_target_from_lookup(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<SessionTarget> {
    let session_id = lookup("TAVERN_SESSION_ID")
        .filter(|v| !v.is_empty())
        .context("TAVERN_SESSION_ID environment variable is required")?;
    let token = lookup("TAVERN_TOKEN")
        .filter(|v| !v.is_empty())
        .context("TAVERN_TOKEN environment variable is required")?;

    let target = SessionTarget::new(session_id, token);
    Ok(match lookup("TAVERN_CHARACTER_ID").filter(|v| !v.is_empty()) {
        Some(character_id) => target.with_character(character_id),
        None => target,
    })
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a valid number, got {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.ws_url.as_str(), "ws://localhost:8080/api");
        assert_eq!(config.api_url.as_str(), DEFAULT_API_URL);
        assert_eq!(config.reconnect, ReconnectPolicy::default());
        assert_eq!(config.reconnect.base_delay, Duration::from_millis(1000));
        assert_eq!(config.reconnect.max_attempts, 5);
        assert_eq!(config.http_timeout, Duration::from_secs(30));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("TAVERN_WS_URL", "wss://play.example.com/api"),
            ("TAVERN_RECONNECT_BASE_DELAY_MS", "250"),
            ("TAVERN_RECONNECT_MAX_ATTEMPTS", "8"),
            ("TAVERN_HTTP_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.ws_url.scheme(), "wss");
        assert_eq!(config.reconnect.base_delay, Duration::from_millis(250));
        assert_eq!(config.reconnect.max_attempts, 8);
        assert_eq!(config.http_timeout, Duration::from_secs(5));
    }

    #[test]
    fn invalid_numbers_are_errors() {
        let err = ClientConfig::from_lookup(lookup(&[("TAVERN_RECONNECT_MAX_ATTEMPTS", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("TAVERN_RECONNECT_MAX_ATTEMPTS"));

        assert!(ClientConfig::from_lookup(lookup(&[("TAVERN_WS_URL", "not a url")])).is_err());
        assert!(ClientConfig::from_lookup(lookup(&[("TAVERN_API_URL", "not a url")])).is_err());
    }

    #[test]
    fn session_target_requires_id_and_token() {
        assert!(session_target_from_lookup(lookup(&[("TAVERN_TOKEN", "t")])).is_err());
        assert!(session_target_from_lookup(lookup(&[("TAVERN_SESSION_ID", "s1")])).is_err());

        let target = session_target_from_lookup(lookup(&[
            ("TAVERN_SESSION_ID", "s1"),
            ("TAVERN_TOKEN", "t"),
            ("TAVERN_CHARACTER_ID", "c1"),
        ]))
        .unwrap();
        assert_eq!(target.session_id, "s1");
        assert_eq!(target.character_id.as_deref(), Some("c1"));
    }
}
