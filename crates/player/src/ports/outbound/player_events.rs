//! Player events - the application's view of the live session channel
//!
//! These types are the contract between the transport layer (which parses
//! envelopes and translates them in `message_translator.rs`) and everything that
//! consumes session traffic: the session snapshot reducer, dice-history panels,
//! character sheets.
//!
//! # Design Rationale
//!
//! The nine inbound wire types fold into a smaller set: `chat_ic` and `chat_ooc`
//! both become `ChatMessage` with an in-character flag, and `dice_result`
//! becomes `DiceRoll`. Connection lifecycle notifications travel through the same
//! bus so observers need one subscription mechanism for both.

use serde_json::Value;

pub use tavern_protocol::{SessionUpdateData, TurnEntry};

/// Event-type names observers subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connected,
    Disconnected,
    Error,
    ReconnectExhausted,
    PlayerJoined,
    PlayerLeft,
    ChatMessage,
    DiceRoll,
    SessionUpdate,
    CharacterUpdate,
    AiResponse,
    TurnUpdate,
}

impl EventKind {
    pub const ALL: [EventKind; 12] = [
        EventKind::Connected,
        EventKind::Disconnected,
        EventKind::Error,
        EventKind::ReconnectExhausted,
        EventKind::PlayerJoined,
        EventKind::PlayerLeft,
        EventKind::ChatMessage,
        EventKind::DiceRoll,
        EventKind::SessionUpdate,
        EventKind::CharacterUpdate,
        EventKind::AiResponse,
        EventKind::TurnUpdate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Connected => "connected",
            EventKind::Disconnected => "disconnected",
            EventKind::Error => "error",
            EventKind::ReconnectExhausted => "reconnect_exhausted",
            EventKind::PlayerJoined => "player_joined",
            EventKind::PlayerLeft => "player_left",
            EventKind::ChatMessage => "chat_message",
            EventKind::DiceRoll => "dice_roll",
            EventKind::SessionUpdate => "session_update",
            EventKind::CharacterUpdate => "character_update",
            EventKind::AiResponse => "ai_response",
            EventKind::TurnUpdate => "turn_update",
        }
    }

    /// Whether this kind comes from the server rather than the connection itself.
    pub fn is_server_event(self) -> bool {
        !matches!(
            self,
            EventKind::Connected
                | EventKind::Disconnected
                | EventKind::Error
                | EventKind::ReconnectExhausted
        )
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chat line, in or out of character.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub user_id: String,
    pub username: String,
    pub character_id: Option<String>,
    pub message: String,
    pub timestamp: String,
    pub in_character: bool,
}

/// A resolved dice roll broadcast by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct DiceRoll {
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub character_id: Option<String>,
    pub character_name: Option<String>,
    /// Dice expression, e.g. `1d20+5`
    pub dice: String,
    pub result: i64,
    /// Individual die values in roll order
    pub breakdown: Option<Vec<i64>>,
    pub purpose: Option<String>,
    /// Flavor text for natural 20s and 1s
    pub special_message: Option<String>,
    pub timestamp: String,
}

impl DiceRoll {
    /// Who to credit the roll to: the character, else the user.
    pub fn actor(&self) -> &str {
        self.character_name
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or("Someone")
    }
}

/// Membership change. Carries no roster delta.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlayerPresence {
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub character_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CharacterUpdate {
    pub character_id: String,
    pub field: String,
    pub value: Value,
    pub old_value: Option<Value>,
}

/// Narration produced by the AI dungeon master.
#[derive(Debug, Clone, PartialEq)]
pub struct AiResponse {
    pub message: String,
    pub context: Option<Value>,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnUpdate {
    pub current_turn: Option<String>,
    /// `None` means the server did not resend the order
    pub turn_order: Option<Vec<TurnEntry>>,
}

/// Everything published on the event bus.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// Handshake completed
    Connected,
    /// Channel closed. `will_reconnect` is false after an explicit disconnect
    /// or when the retry budget is spent.
    Disconnected { will_reconnect: bool },
    /// Transport failure; always followed by `Disconnected`
    Error { message: String },
    /// Automatic reconnection gave up; a fresh `connect()` is required
    ReconnectExhausted { attempts: u32 },

    PlayerJoined(PlayerPresence),
    PlayerLeft(PlayerPresence),
    ChatMessage(ChatMessage),
    DiceRoll(DiceRoll),
    SessionUpdate(SessionUpdateData),
    CharacterUpdate(CharacterUpdate),
    AiResponse(AiResponse),
    TurnUpdate(TurnUpdate),
}

impl PlayerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PlayerEvent::Connected => EventKind::Connected,
            PlayerEvent::Disconnected { .. } => EventKind::Disconnected,
            PlayerEvent::Error { .. } => EventKind::Error,
            PlayerEvent::ReconnectExhausted { .. } => EventKind::ReconnectExhausted,
            PlayerEvent::PlayerJoined(_) => EventKind::PlayerJoined,
            PlayerEvent::PlayerLeft(_) => EventKind::PlayerLeft,
            PlayerEvent::ChatMessage(_) => EventKind::ChatMessage,
            PlayerEvent::DiceRoll(_) => EventKind::DiceRoll,
            PlayerEvent::SessionUpdate(_) => EventKind::SessionUpdate,
            PlayerEvent::CharacterUpdate(_) => EventKind::CharacterUpdate,
            PlayerEvent::AiResponse(_) => EventKind::AiResponse,
            PlayerEvent::TurnUpdate(_) => EventKind::TurnUpdate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_are_unique() {
        let mut names: Vec<_> = EventKind::ALL.iter().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), EventKind::ALL.len());
    }

    #[test]
    fn lifecycle_kinds_are_not_server_events() {
        assert!(!EventKind::Connected.is_server_event());
        assert!(!EventKind::ReconnectExhausted.is_server_event());
        assert!(EventKind::ChatMessage.is_server_event());
        assert!(EventKind::TurnUpdate.is_server_event());
    }

    #[test]
    fn dice_actor_falls_back_to_username() {
        let mut roll = DiceRoll {
            user_id: Some("u1".into()),
            username: Some("alice".into()),
            character_id: None,
            character_name: None,
            dice: "1d20".into(),
            result: 12,
            breakdown: None,
            purpose: None,
            special_message: None,
            timestamp: String::new(),
        };
        assert_eq!(roll.actor(), "alice");

        roll.character_name = Some("Aria".into());
        assert_eq!(roll.actor(), "Aria");

        roll.character_name = None;
        roll.username = None;
        assert_eq!(roll.actor(), "Someone");
    }
}
