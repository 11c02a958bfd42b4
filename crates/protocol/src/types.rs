//! Session snapshot DTOs returned by the session REST API
//!
//! These also appear inside `session_update` and `turn_update` frames.

use serde::{Deserialize, Serialize};

/// One participant in the initiative order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnEntry {
    pub character_id: String,
    /// Older servers send this as `name`.
    #[serde(default, alias = "name")]
    pub character_name: String,
    #[serde(default)]
    pub initiative: i32,
}

/// A user in the session roster and the character they play.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPlayer {
    pub user_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hit_points: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_hit_points: Option<i32>,
}

/// Full session as returned by `GET /sessions/{id}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionData {
    pub id: String,
    #[serde(default)]
    pub campaign_id: String,
    #[serde(default)]
    pub campaign_name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub current_scene: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_turn: Option<String>,
    #[serde(default)]
    pub turn_order: Vec<TurnEntry>,
    #[serde(default)]
    pub players: Vec<SessionPlayer>,
    #[serde(default)]
    pub dm_id: String,
    #[serde(default)]
    pub dm_username: String,
}
