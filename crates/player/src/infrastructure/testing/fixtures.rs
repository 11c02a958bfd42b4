//! Frame and session fixtures used across unit tests.

use serde_json::{json, Value};
use tavern_protocol::{SessionData, SessionPlayer, TurnEntry};

use crate::ports::outbound::ApiError;

pub fn api_request_failed(msg: &str) -> ApiError {
    ApiError::RequestFailed(msg.to_string())
}

/// Serialize an inbound envelope.
pub fn server_frame(message_type: &str, data: Value) -> String {
    json!({
        "type": message_type,
        "data": data,
        "user_id": "u1",
        "username": "alice",
        "timestamp": "2024-05-01T12:00:00Z"
    })
    .to_string()
}

pub fn chat_frame(content: &str, in_character: bool) -> String {
    let message_type = if in_character { "chat_ic" } else { "chat_ooc" };
    server_frame(
        message_type,
        json!({"content": content, "character_id": "c1", "is_ic": in_character}),
    )
}

pub fn dice_frame(dice: &str, rolls: &[i64], total: i64) -> String {
    server_frame(
        "dice_result",
        json!({
            "dice": dice,
            "result": rolls,
            "total": total,
            "character_id": "c1",
            "character_name": "Aria"
        }),
    )
}

pub fn turn_entry(character_id: &str, name: &str, initiative: i32) -> TurnEntry {
    TurnEntry {
        character_id: character_id.to_string(),
        character_name: name.to_string(),
        initiative,
    }
}

pub fn player(user_id: &str, character_id: &str) -> SessionPlayer {
    SessionPlayer {
        user_id: user_id.to_string(),
        username: format!("user-{user_id}"),
        character_id: Some(character_id.to_string()),
        character_name: None,
        character_class: None,
        character_level: None,
        hit_points: Some(10),
        max_hit_points: Some(10),
    }
}

/// Session with two combatants, A (15) and B (20), and one player.
pub fn session_data(session_id: &str) -> SessionData {
    SessionData {
        id: session_id.to_string(),
        campaign_id: "camp-1".to_string(),
        campaign_name: "Lost Mine".to_string(),
        status: "active".to_string(),
        current_scene: "Goblin Ambush".to_string(),
        scene_notes: Some("Four goblins hide in the brush".to_string()),
        current_turn: Some("A".to_string()),
        turn_order: vec![turn_entry("A", "Aria", 15), turn_entry("B", "Bram", 20)],
        players: vec![player("u1", "A")],
        dm_id: "dm-1".to_string(),
        dm_username: "dungeonmaster".to_string(),
    }
}
