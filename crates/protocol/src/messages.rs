//! Envelope and message types for the live session connection
//!
//! Every frame on the connection is a JSON envelope `{type, data, timestamp}`.
//! The client stamps outbound envelopes; the server stamps inbound ones and adds
//! the originating `user_id`/`username`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{SessionPlayer, TurnEntry};

// =============================================================================
// Client Envelope (Player → Server)
// =============================================================================

/// Outbound envelope.
///
/// `message_type` is a free string so callers can use message types the server
/// understands but this crate does not name yet. The typed helpers use
/// [`ClientMessageType`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientEnvelope {
    #[serde(rename = "type")]
    pub message_type: String,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl ClientEnvelope {
    /// Wrap a payload, stamping the current time.
    pub fn new(message_type: impl Into<String>, data: Value) -> Self {
        Self::with_timestamp(message_type, data, Utc::now())
    }

    pub fn with_timestamp(
        message_type: impl Into<String>,
        data: Value,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            message_type: message_type.into(),
            data,
            timestamp,
        }
    }
}

/// Message types the client sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientMessageType {
    ChatIc,
    ChatOoc,
    DiceRoll,
    CharacterUpdate,
    PlayerAction,
}

impl ClientMessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            ClientMessageType::ChatIc => "chat_ic",
            ClientMessageType::ChatOoc => "chat_ooc",
            ClientMessageType::DiceRoll => "dice_roll",
            ClientMessageType::CharacterUpdate => "character_update",
            ClientMessageType::PlayerAction => "player_action",
        }
    }
}

/// Body of `chat_ic` / `chat_ooc`, both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatData {
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_id: Option<String>,
    #[serde(default)]
    pub is_ic: bool,
}

/// Body of an outbound `dice_roll` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiceRollData {
    pub dice: String,
    pub character_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
}

/// Body of `character_update`, both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterUpdateData {
    pub character_id: String,
    pub field: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
}

/// Body of an outbound `player_action`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerActionData {
    pub character_id: String,
    pub action: String,
    pub action_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

// =============================================================================
// Server Envelope (Server → Player)
// =============================================================================

/// Inbound envelope.
///
/// Parsing the envelope never looks at `type`; matching it against
/// [`ServerMessageType`] is a separate step so unknown types can be logged and
/// dropped instead of failing the frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerEnvelope {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub timestamp: String,
}

/// The closed vocabulary of inbound message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerMessageType {
    PlayerJoined,
    PlayerLeft,
    ChatIc,
    ChatOoc,
    DiceResult,
    SessionUpdate,
    CharacterUpdate,
    AiResponse,
    TurnUpdate,
}

impl ServerMessageType {
    pub const ALL: [ServerMessageType; 9] = [
        ServerMessageType::PlayerJoined,
        ServerMessageType::PlayerLeft,
        ServerMessageType::ChatIc,
        ServerMessageType::ChatOoc,
        ServerMessageType::DiceResult,
        ServerMessageType::SessionUpdate,
        ServerMessageType::CharacterUpdate,
        ServerMessageType::AiResponse,
        ServerMessageType::TurnUpdate,
    ];

    /// Look up a wire tag. Returns `None` for tags outside the vocabulary.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == tag)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ServerMessageType::PlayerJoined => "player_joined",
            ServerMessageType::PlayerLeft => "player_left",
            ServerMessageType::ChatIc => "chat_ic",
            ServerMessageType::ChatOoc => "chat_ooc",
            ServerMessageType::DiceResult => "dice_result",
            ServerMessageType::SessionUpdate => "session_update",
            ServerMessageType::CharacterUpdate => "character_update",
            ServerMessageType::AiResponse => "ai_response",
            ServerMessageType::TurnUpdate => "turn_update",
        }
    }
}

/// `player_joined` / `player_left` payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PresenceData {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub character_id: Option<String>,
}

/// `result` of a `dice_result` frame.
///
/// Current servers send the individual die values; older ones sent the total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DiceResultValue {
    Total(i64),
    Rolls(Vec<i64>),
}

/// `dice_result` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiceResultData {
    #[serde(default)]
    pub dice: String,
    #[serde(default)]
    pub result: Option<DiceResultValue>,
    #[serde(default)]
    pub total: Option<i64>,
    #[serde(default)]
    pub details: Option<Vec<i64>>,
    #[serde(default)]
    pub modifier: Option<i64>,
    #[serde(default)]
    pub character_id: Option<String>,
    #[serde(default)]
    pub character_name: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub special_message: Option<String>,
}

/// `session_update` payload: any subset of the session attributes.
///
/// Attributes this crate does not name are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionUpdateData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_scene: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_turn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_order: Option<Vec<TurnEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub players: Option<Vec<SessionPlayer>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// `turn_update` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnUpdateData {
    #[serde(default)]
    pub current_turn: Option<String>,
    #[serde(default)]
    pub turn_order: Option<Vec<TurnEntry>>,
}

/// `ai_response` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiResponseData {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub context: Option<Value>,
}
