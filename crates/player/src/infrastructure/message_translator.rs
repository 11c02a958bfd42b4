//! Translates inbound envelopes into `PlayerEvent`s
//!
//! Envelope parsing and type matching are separate steps: a frame that is valid
//! JSON but carries a tag outside [`ServerMessageType`] yields
//! [`CodecError::UnrecognizedType`], which callers log and drop rather than
//! treating as a broken connection.

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use tavern_protocol::{
    AiResponseData, CharacterUpdateData, ChatData, DiceResultData, DiceResultValue, PresenceData,
    ServerEnvelope, ServerMessageType, SessionUpdateData, TurnUpdateData,
};

use crate::ports::outbound::player_events::{
    AiResponse, CharacterUpdate, ChatMessage, DiceRoll, PlayerEvent, PlayerPresence, TurnUpdate,
};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Unrecognized message type: {0}")]
    UnrecognizedType(String),

    #[error("Invalid {message_type} payload: {source}")]
    InvalidPayload {
        message_type: &'static str,
        source: serde_json::Error,
    },

    #[error("{message_type} payload is missing {field}")]
    MissingField {
        message_type: &'static str,
        field: &'static str,
    },

    #[error("{message_type} payload has an out of range {field}")]
    OutOfRange {
        message_type: &'static str,
        field: &'static str,
    },
}

/// Parse a raw text frame and translate it.
pub fn decode_frame(text: &str) -> Result<PlayerEvent, CodecError> {
    let envelope: ServerEnvelope = serde_json::from_str(text)?;
    translate(envelope)
}

/// Translate a parsed envelope into a PlayerEvent.
pub fn translate(envelope: ServerEnvelope) -> Result<PlayerEvent, CodecError> {
    let Some(message_type) = ServerMessageType::from_tag(&envelope.message_type) else {
        return Err(CodecError::UnrecognizedType(envelope.message_type));
    };

    let ServerEnvelope {
        data,
        user_id,
        username,
        timestamp,
        ..
    } = envelope;

    let event = match message_type {
        ServerMessageType::PlayerJoined | ServerMessageType::PlayerLeft => {
            let presence: PresenceData = payload(message_type, data)?;
            let presence = PlayerPresence {
                user_id: non_empty(presence.user_id).or_else(|| non_empty(user_id)),
                username: non_empty(presence.username).or_else(|| non_empty(username)),
                character_id: object_id(presence.character_id),
            };
            if message_type == ServerMessageType::PlayerJoined {
                PlayerEvent::PlayerJoined(presence)
            } else {
                PlayerEvent::PlayerLeft(presence)
            }
        }

        ServerMessageType::ChatIc | ServerMessageType::ChatOoc => {
            let chat: ChatData = payload(message_type, data)?;
            PlayerEvent::ChatMessage(ChatMessage {
                user_id: user_id.unwrap_or_default(),
                username: username.unwrap_or_default(),
                character_id: object_id(chat.character_id),
                message: chat.content,
                timestamp,
                in_character: message_type == ServerMessageType::ChatIc,
            })
        }

        ServerMessageType::DiceResult => {
            let dice: DiceResultData = payload(message_type, data)?;
            translate_dice(dice, user_id, username, timestamp)?
        }

        ServerMessageType::SessionUpdate => {
            PlayerEvent::SessionUpdate(payload::<SessionUpdateData>(message_type, data)?)
        }

        ServerMessageType::CharacterUpdate => {
            let update: CharacterUpdateData = payload(message_type, data)?;
            PlayerEvent::CharacterUpdate(CharacterUpdate {
                character_id: update.character_id,
                field: update.field,
                value: update.value,
                old_value: update.old_value,
            })
        }

        ServerMessageType::AiResponse => {
            let ai: AiResponseData = payload(message_type, data)?;
            PlayerEvent::AiResponse(AiResponse {
                message: ai.message,
                context: ai.context,
                timestamp,
            })
        }

        ServerMessageType::TurnUpdate => {
            let turn: TurnUpdateData = payload(message_type, data)?;
            PlayerEvent::TurnUpdate(TurnUpdate {
                current_turn: object_id(turn.current_turn),
                turn_order: turn.turn_order,
            })
        }
    };

    Ok(event)
}

fn translate_dice(
    dice: DiceResultData,
    user_id: Option<String>,
    username: Option<String>,
    timestamp: String,
) -> Result<PlayerEvent, CodecError> {
    let message_type = ServerMessageType::DiceResult.as_str();
    let (numeric, rolls) = match dice.result {
        Some(DiceResultValue::Total(n)) => (Some(Some(n)), None),
        Some(DiceResultValue::Rolls(rolls)) => {
            let sum = rolls.iter().try_fold(0i64, |acc, v| acc.checked_add(*v));
            (Some(sum), Some(rolls))
        }
        None => (None, None),
    };

    let result = match (dice.total, numeric) {
        (Some(total), _) => total,
        (None, Some(Some(n))) => n,
        (None, Some(None)) => {
            return Err(CodecError::OutOfRange {
                message_type,
                field: "result",
            })
        }
        (None, None) => {
            return Err(CodecError::MissingField {
                message_type,
                field: "result",
            })
        }
    };

    Ok(PlayerEvent::DiceRoll(DiceRoll {
        user_id: non_empty(user_id),
        username: non_empty(username),
        character_id: object_id(dice.character_id),
        character_name: non_empty(dice.character_name),
        dice: dice.dice,
        result,
        breakdown: rolls.or(dice.details),
        purpose: non_empty(dice.purpose),
        special_message: non_empty(dice.special_message),
        timestamp,
    }))
}

/// Decode a typed payload. A missing `data` decodes as an empty object.
fn payload<T: DeserializeOwned>(
    message_type: ServerMessageType,
    data: Value,
) -> Result<T, CodecError> {
    let data = match data {
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other,
    };
    serde_json::from_value(data).map_err(|source| CodecError::InvalidPayload {
        message_type: message_type.as_str(),
        source,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// The server renders unset ids as empty or all-zero strings.
fn object_id(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty() && !s.bytes().all(|b| b == b'0'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(value: Value) -> String {
        value.to_string()
    }

    #[test]
    fn test_chat_ic_and_ooc_share_an_event() {
        let ic = decode_frame(&frame(json!({
            "type": "chat_ic",
            "data": {"content": "For the king!", "character_id": "c1", "is_ic": true},
            "user_id": "u1",
            "username": "alice",
            "timestamp": "2024-05-01T12:00:00Z"
        })))
        .unwrap();

        let PlayerEvent::ChatMessage(chat) = ic else {
            panic!("expected chat message");
        };
        assert!(chat.in_character);
        assert_eq!(chat.message, "For the king!");
        assert_eq!(chat.user_id, "u1");
        assert_eq!(chat.username, "alice");
        assert_eq!(chat.character_id.as_deref(), Some("c1"));
        assert_eq!(chat.timestamp, "2024-05-01T12:00:00Z");

        let ooc = decode_frame(&frame(json!({
            "type": "chat_ooc",
            "data": {"content": "pizza's here", "character_id": "000000000000000000000000"},
            "user_id": "u2",
            "username": "bob"
        })))
        .unwrap();
        let PlayerEvent::ChatMessage(chat) = ooc else {
            panic!("expected chat message");
        };
        assert!(!chat.in_character);
        assert_eq!(chat.character_id, None);
    }

    #[test]
    fn test_dice_result_with_rolls_array() {
        let event = decode_frame(&frame(json!({
            "type": "dice_result",
            "data": {
                "dice": "2d6+3",
                "result": [4, 5],
                "total": 12,
                "modifier": 3,
                "character_id": "c1",
                "character_name": "Aria",
                "purpose": "Damage",
                "special_message": ""
            },
            "user_id": "u1",
            "username": "alice"
        })))
        .unwrap();

        let PlayerEvent::DiceRoll(roll) = event else {
            panic!("expected dice roll");
        };
        assert_eq!(roll.result, 12);
        assert_eq!(roll.breakdown, Some(vec![4, 5]));
        assert_eq!(roll.purpose.as_deref(), Some("Damage"));
        assert_eq!(roll.special_message, None);
        assert_eq!(roll.actor(), "Aria");
    }

    #[test]
    fn test_dice_result_legacy_numeric_result() {
        let event = decode_frame(&frame(json!({
            "type": "dice_result",
            "data": {"dice": "1d20", "result": 17, "details": [17]}
        })))
        .unwrap();

        let PlayerEvent::DiceRoll(roll) = event else {
            panic!("expected dice roll");
        };
        assert_eq!(roll.result, 17);
        assert_eq!(roll.breakdown, Some(vec![17]));
        assert_eq!(roll.character_name, None);
    }

    #[test]
    fn test_dice_result_sums_rolls_without_total() {
        let event = decode_frame(&frame(json!({
            "type": "dice_result",
            "data": {"dice": "3d6", "result": [1, 2, 3]}
        })))
        .unwrap();
        let PlayerEvent::DiceRoll(roll) = event else {
            panic!("expected dice roll");
        };
        assert_eq!(roll.result, 6);
    }

    #[test]
    fn test_dice_result_overflowing_rolls_are_rejected() {
        let err = decode_frame(&frame(json!({
            "type": "dice_result",
            "data": {"dice": "2d6", "result": [i64::MAX, 1]}
        })))
        .unwrap_err();
        assert!(matches!(
            err,
            CodecError::OutOfRange {
                field: "result",
                ..
            }
        ));

        // An explicit total makes the rolls informational only.
        let event = decode_frame(&frame(json!({
            "type": "dice_result",
            "data": {"dice": "2d6", "result": [i64::MAX, 1], "total": 7}
        })))
        .unwrap();
        let PlayerEvent::DiceRoll(roll) = event else {
            panic!("expected dice roll");
        };
        assert_eq!(roll.result, 7);
    }

    #[test]
    fn test_dice_result_without_value_is_rejected() {
        let err = decode_frame(&frame(json!({
            "type": "dice_result",
            "data": {"dice": "1d20"}
        })))
        .unwrap_err();
        assert!(matches!(
            err,
            CodecError::MissingField {
                field: "result",
                ..
            }
        ));
    }

    #[test]
    fn test_turn_update_without_order() {
        let event = decode_frame(&frame(json!({
            "type": "turn_update",
            "data": {"current_turn": "c2"}
        })))
        .unwrap();
        assert_eq!(
            event,
            PlayerEvent::TurnUpdate(TurnUpdate {
                current_turn: Some("c2".into()),
                turn_order: None,
            })
        );
    }

    #[test]
    fn test_presence_falls_back_to_envelope_identity() {
        let event = decode_frame(&frame(json!({
            "type": "player_left",
            "user_id": "u9",
            "username": "zed"
        })))
        .unwrap();
        assert_eq!(
            event,
            PlayerEvent::PlayerLeft(PlayerPresence {
                user_id: Some("u9".into()),
                username: Some("zed".into()),
                character_id: None,
            })
        );
    }

    #[test]
    fn test_session_update_and_ai_response() {
        let update = decode_frame(&frame(json!({
            "type": "session_update",
            "data": {"current_scene": "The Crypt", "weather": "rain"}
        })))
        .unwrap();
        let PlayerEvent::SessionUpdate(update) = update else {
            panic!("expected session update");
        };
        assert_eq!(update.current_scene.as_deref(), Some("The Crypt"));
        assert_eq!(update.extra["weather"], "rain");

        let ai = decode_frame(&frame(json!({
            "type": "ai_response",
            "data": {"message": "The door creaks open.", "context": {"scene": "crypt"}}
        })))
        .unwrap();
        let PlayerEvent::AiResponse(ai) = ai else {
            panic!("expected ai response");
        };
        assert_eq!(ai.message, "The door creaks open.");
        assert!(ai.context.is_some());
    }

    #[test]
    fn test_character_update() {
        let event = decode_frame(&frame(json!({
            "type": "character_update",
            "data": {"character_id": "c1", "field": "hit_points", "value": 4, "old_value": 9}
        })))
        .unwrap();
        let PlayerEvent::CharacterUpdate(update) = event else {
            panic!("expected character update");
        };
        assert_eq!(update.field, "hit_points");
        assert_eq!(update.old_value, Some(json!(9)));
    }

    #[test]
    fn test_unknown_type_is_unrecognized() {
        let err = decode_frame(r#"{"type":"unknown_future_event","data":{"x":1}}"#).unwrap_err();
        assert!(matches!(err, CodecError::UnrecognizedType(t) if t == "unknown_future_event"));
    }

    #[test]
    fn test_malformed_frames() {
        assert!(matches!(
            decode_frame("not json").unwrap_err(),
            CodecError::Malformed(_)
        ));
        assert!(matches!(
            decode_frame(r#"{"data":{}}"#).unwrap_err(),
            CodecError::Malformed(_)
        ));
        assert!(matches!(
            decode_frame(r#"{"type":"character_update","data":{"field":1}}"#).unwrap_err(),
            CodecError::InvalidPayload {
                message_type: "character_update",
                ..
            }
        ));
    }
}
