//! Outbound message construction
//!
//! Every intent the UI can send over the live channel is built here, so the
//! session client's helpers and any caller of the raw `send` agree on payload
//! shape.

use serde_json::Value;
use tavern_protocol::{
    CharacterUpdateData, ChatData, ClientMessageType, DiceRollData, PlayerActionData,
};

/// A typed outbound message, ready to be wrapped in an envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Chat(ChatData),
    DiceRoll(DiceRollData),
    CharacterUpdate(CharacterUpdateData),
    PlayerAction(PlayerActionData),
}

impl OutboundMessage {
    pub fn message_type(&self) -> ClientMessageType {
        match self {
            OutboundMessage::Chat(chat) if chat.is_ic => ClientMessageType::ChatIc,
            OutboundMessage::Chat(_) => ClientMessageType::ChatOoc,
            OutboundMessage::DiceRoll(_) => ClientMessageType::DiceRoll,
            OutboundMessage::CharacterUpdate(_) => ClientMessageType::CharacterUpdate,
            OutboundMessage::PlayerAction(_) => ClientMessageType::PlayerAction,
        }
    }

    /// The envelope's `data` object.
    pub fn to_data(&self) -> Result<Value, serde_json::Error> {
        match self {
            OutboundMessage::Chat(data) => serde_json::to_value(data),
            OutboundMessage::DiceRoll(data) => serde_json::to_value(data),
            OutboundMessage::CharacterUpdate(data) => serde_json::to_value(data),
            OutboundMessage::PlayerAction(data) => serde_json::to_value(data),
        }
    }
}

/// Builder for outbound messages
///
/// ```rust,ignore
/// let msg = ClientMessageBuilder::roll_dice("1d20+5", "char_123", Some("Stealth"));
/// client.send_message(msg);
/// ```
pub struct ClientMessageBuilder;

impl ClientMessageBuilder {
    /// `chat_ic` when `in_character`, otherwise `chat_ooc`
    pub fn chat(content: &str, character_id: Option<&str>, in_character: bool) -> OutboundMessage {
        OutboundMessage::Chat(ChatData {
            content: content.to_string(),
            character_id: character_id.map(str::to_string),
            is_ic: in_character,
        })
    }

    pub fn roll_dice(dice: &str, character_id: &str, purpose: Option<&str>) -> OutboundMessage {
        OutboundMessage::DiceRoll(DiceRollData {
            dice: dice.to_string(),
            character_id: character_id.to_string(),
            purpose: purpose.map(str::to_string),
        })
    }

    pub fn update_character(
        character_id: &str,
        field: &str,
        value: Value,
        old_value: Option<Value>,
    ) -> OutboundMessage {
        OutboundMessage::CharacterUpdate(CharacterUpdateData {
            character_id: character_id.to_string(),
            field: field.to_string(),
            value,
            old_value,
        })
    }

    pub fn player_action(
        character_id: &str,
        action: &str,
        action_type: &str,
        target: Option<&str>,
    ) -> OutboundMessage {
        OutboundMessage::PlayerAction(PlayerActionData {
            character_id: character_id.to_string(),
            action: action.to_string(),
            action_type: action_type.to_string(),
            target: target.map(str::to_string),
        })
    }
}
